// src/monitoring.rs
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::AppState;

/// Process-wide counters, shared through `AppState`.
#[derive(Debug)]
pub struct Metrics {
    started: Instant,
    requests: AtomicU64,
    errors: AtomicU64,
    audits_run: AtomicU64,
    audit_failures: AtomicU64,
    fixes_applied: AtomicU64,
    apply_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            audits_run: AtomicU64::new(0),
            audit_failures: AtomicU64::new(0),
            fixes_applied: AtomicU64::new(0),
            apply_failures: AtomicU64::new(0),
        }
    }

    pub fn record_audit(&self, succeeded: bool) {
        self.audits_run.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.audit_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_fixes_applied(&self, applied: usize) {
        self.fixes_applied.fetch_add(applied as u64, Ordering::Relaxed);
    }

    pub fn record_apply_failure(&self) {
        self.apply_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsResponse {
        MetricsResponse {
            requests_total: self.requests.load(Ordering::Relaxed),
            errors_total: self.errors.load(Ordering::Relaxed),
            audits_run: self.audits_run.load(Ordering::Relaxed),
            audit_failures: self.audit_failures.load(Ordering::Relaxed),
            fixes_applied: self.fixes_applied.load(Ordering::Relaxed),
            apply_failures: self.apply_failures.load(Ordering::Relaxed),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MetricsResponse {
    pub requests_total: u64,
    pub errors_total: u64,
    pub audits_run: u64,
    pub audit_failures: u64,
    pub fixes_applied: u64,
    pub apply_failures: u64,
    pub uptime_seconds: u64,
}

pub async fn health_check(app_state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: app_state.metrics.uptime_seconds(),
    })
}

pub async fn readiness_check(app_state: web::Data<Arc<AppState>>) -> HttpResponse {
    match app_state.store.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ready",
            "store": "connected"
        })),
        Err(e) => {
            log::warn!("Readiness probe failed: {}", e);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "not ready",
                "store": "disconnected"
            }))
        }
    }
}

pub async fn metrics_endpoint(app_state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(app_state.metrics.snapshot())
}

// ==================== REQUEST COUNTING MIDDLEWARE ====================

pub struct RequestLogger {
    metrics: Arc<Metrics>,
}

impl RequestLogger {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware {
            service,
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: S,
    metrics: Arc<Metrics>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_web::dev::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let metrics = self.metrics.clone();
        let fut = self.service.call(req);

        Box::pin(async move {
            metrics.requests.fetch_add(1, Ordering::Relaxed);
            let res = fut.await;
            let failed = match &res {
                Ok(response) => response.status().is_client_error() || response.status().is_server_error(),
                Err(_) => true,
            };
            if failed {
                metrics.errors.fetch_add(1, Ordering::Relaxed);
            }
            res
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::MemoryTreeStore;
    use actix_web::{test as actix_test, App};

    fn state(store: MemoryTreeStore) -> Arc<AppState> {
        Arc::new(AppState {
            store: Arc::new(store),
            config: Config::default(),
            metrics: Arc::new(Metrics::new()),
        })
    }

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.record_audit(true);
        metrics.record_audit(false);
        metrics.record_fixes_applied(3);
        metrics.record_apply_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.audits_run, 2);
        assert_eq!(snapshot.audit_failures, 1);
        assert_eq!(snapshot.fixes_applied, 3);
        assert_eq!(snapshot.apply_failures, 1);
    }

    #[actix_rt::test]
    async fn test_readiness_reflects_store() {
        let store = MemoryTreeStore::new();
        store.set_online(false);
        let app_state = state(store);

        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(app_state.clone()))
                .route("/health/ready", web::get().to(readiness_check)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/health/ready").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_rt::test]
    async fn test_request_logger_counts_errors() {
        let app_state = state(MemoryTreeStore::new());
        let app = actix_test::init_service(
            App::new()
                .wrap(RequestLogger::new(app_state.metrics.clone()))
                .app_data(web::Data::new(app_state.clone()))
                .route("/health", web::get().to(health_check)),
        )
        .await;

        let ok = actix_test::TestRequest::get().uri("/health").to_request();
        assert!(actix_test::call_service(&app, ok).await.status().is_success());
        let missing = actix_test::TestRequest::get().uri("/nope").to_request();
        assert_eq!(actix_test::call_service(&app, missing).await.status(), 404);

        let snapshot = app_state.metrics.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.errors_total, 1);
    }
}
