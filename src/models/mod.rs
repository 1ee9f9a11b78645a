// src/models/mod.rs

pub mod borrow;
pub mod damaged_lost;
pub mod equipment;
pub mod laboratory;
pub mod loose;
pub mod status;

pub use borrow::*;
pub use damaged_lost::*;
pub use equipment::*;
pub use laboratory::*;
pub use loose::TreeRecord;
pub use status::*;

// ==================== COLLECTIONS ====================

pub const LABORATORIES: &str = "laboratories";
pub const USERS: &str = "users";
pub const EQUIPMENT_CATEGORIES: &str = "equipment_categories";
pub const BORROW_REQUESTS: &str = "borrow_requests";
pub const DAMAGED_LOST_RECORDS: &str = "damaged_lost_records";
pub const RESTRICTED_USERS: &str = "restricted_users";

/// Every top-level collection the dashboard reads.
pub const ALL_COLLECTIONS: &[&str] = &[
    LABORATORIES,
    USERS,
    EQUIPMENT_CATEGORIES,
    BORROW_REQUESTS,
    DAMAGED_LOST_RECORDS,
    RESTRICTED_USERS,
];
