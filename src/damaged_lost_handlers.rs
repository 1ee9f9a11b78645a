// src/damaged_lost_handlers.rs
use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::damaged_lost;
use crate::error::ApiResult;
use crate::handlers::{path_segment, validate_request, ApiResponse};
use crate::models::{CreateDamagedLostRequest, UpdateSettlementRequest};
use crate::AppState;

pub async fn create_record(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<CreateDamagedLostRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    validate_request(&request)?;

    let created = damaged_lost::create_damaged_lost_record(app_state.store.as_ref(), &request).await?;
    let message = created.message.clone();
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(created, message)))
}

pub async fn get_statistics(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let stats = damaged_lost::get_damaged_lost_statistics(app_state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

pub async fn update_settlement(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<UpdateSettlementRequest>,
) -> ApiResult<HttpResponse> {
    let record_id = path_segment(&path.into_inner(), "record id")?;
    let request = body.into_inner();
    validate_request(&request)?;

    let updated = damaged_lost::update_item_settlement_status(app_state.store.as_ref(), &record_id, &request).await?;
    let message = updated.message.clone();
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(updated, message)))
}

pub async fn get_borrower_records(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let borrower_id = path_segment(&path.into_inner(), "borrower id")?;
    let records = damaged_lost::get_borrower_damaged_lost_records(app_state.store.as_ref(), &borrower_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(records)))
}

pub async fn get_borrower_eligibility(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let borrower_id = path_segment(&path.into_inner(), "borrower id")?;
    let eligibility = damaged_lost::validate_borrower_eligibility(app_state.store.as_ref(), &borrower_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(eligibility)))
}

pub async fn get_restricted_borrowers(app_state: web::Data<Arc<AppState>>) -> ApiResult<HttpResponse> {
    let borrowers = damaged_lost::get_all_restricted_borrowers(app_state.store.as_ref()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(borrowers)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::monitoring::Metrics;
    use crate::store::MemoryTreeStore;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    fn state() -> Arc<AppState> {
        Arc::new(AppState {
            store: Arc::new(MemoryTreeStore::new()),
            config: Config::default(),
            metrics: Arc::new(Metrics::new()),
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .route("/damaged-lost", web::post().to(create_record))
                    .route("/damaged-lost/stats", web::get().to(get_statistics))
                    .route("/damaged-lost/{id}/settlement", web::put().to(update_settlement))
                    .route("/borrowers/{id}/damaged-lost", web::get().to(get_borrower_records))
                    .route("/borrowers/{id}/eligibility", web::get().to(get_borrower_eligibility))
                    .route("/restricted-users", web::get().to(get_restricted_borrowers)),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn test_record_lifecycle() {
        let app_state = state();
        let app = app!(app_state);

        let req = test::TestRequest::post()
            .uri("/damaged-lost")
            .set_json(json!({
                "returnData": {"userId": "u1", "condition": "lost"},
                "borrower": {"name": "Ana", "email": "ana@school.edu"},
                "item": {"id": "E1", "name": "Beaker"},
                "borrowedQuantity": 1,
                "returnedQuantity": 0
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        assert_eq!(created["data"]["itemStatus"], json!("Lost"));
        let record_id = created["data"]["recordId"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri("/borrowers/u1/eligibility").to_request();
        let eligibility: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(eligibility["data"]["eligible"], json!(false));

        let req = test::TestRequest::get().uri("/restricted-users").to_request();
        let restricted: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(restricted["data"][0]["id"], json!("u1"));

        let req = test::TestRequest::put()
            .uri(&format!("/damaged-lost/{}/settlement", record_id))
            .set_json(json!({"status": "Settled", "adminRemarks": "Replaced"}))
            .to_request();
        let settled: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(settled["data"]["restrictionCleared"], json!(true));

        let req = test::TestRequest::get().uri("/borrowers/u1/damaged-lost").to_request();
        let records: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(records["data"][0]["status"], json!("Settled"));

        let req = test::TestRequest::get().uri("/damaged-lost/stats").to_request();
        let stats: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["data"]["settledRecords"], json!(1));
        assert_eq!(stats["data"]["restrictedBorrowers"], json!(0));
    }

    #[actix_rt::test]
    async fn test_invalid_email_is_rejected() {
        let app_state = state();
        let app = app!(app_state);

        let req = test::TestRequest::post()
            .uri("/damaged-lost")
            .set_json(json!({
                "returnData": {"userId": "u1"},
                "borrower": {"email": "nope"},
                "borrowedQuantity": 1,
                "returnedQuantity": 1
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_rt::test]
    async fn test_unknown_settlement_status_is_rejected() {
        let app_state = state();
        let app = app!(app_state);

        let req = test::TestRequest::put()
            .uri("/damaged-lost/D1/settlement")
            .set_json(json!({"status": "Forgiven"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_rt::test]
    async fn test_settling_missing_record_is_404() {
        let app_state = state();
        let app = app!(app_state);

        let req = test::TestRequest::put()
            .uri("/damaged-lost/D1/settlement")
            .set_json(json!({"status": "Settled"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
