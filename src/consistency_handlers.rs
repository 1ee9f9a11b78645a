// src/consistency_handlers.rs
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::audit::{self, AuditOptions, AuditReport, FixRequest};
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFixesRequest {
    #[serde(default)]
    pub fixes: Vec<FixRequest>,
    pub only_safe: Option<bool>,
    pub rerun: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFixesResponse {
    pub success: bool,
    pub applied: usize,
    /// Fixes held back because they were not marked safe
    pub skipped_unsafe: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<AuditReport>,
}

/// An empty body runs with the defaults; anything else must parse.
fn parse_audit_options(body: &[u8]) -> ApiResult<AuditOptions> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(AuditOptions::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid audit options: {}", e)))
}

pub async fn run_audit(app_state: web::Data<Arc<AppState>>, body: web::Bytes) -> ApiResult<HttpResponse> {
    let options = parse_audit_options(&body)?;

    let result = audit::audit_data_consistency(app_state.store.as_ref(), &options).await;
    app_state.metrics.record_audit(result.is_ok());
    let report = result?;

    let message = format!(
        "{} finding(s), {} fix(es) proposed",
        report.summary.findings, report.summary.fixes
    );
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(report, message)))
}

pub async fn apply_fixes(
    app_state: web::Data<Arc<AppState>>,
    body: web::Json<ApplyFixesRequest>,
) -> ApiResult<HttpResponse> {
    let request = body.into_inner();
    let only_safe = request.only_safe.unwrap_or(app_state.config.audit.only_safe_by_default);
    let rerun = request.rerun.unwrap_or(app_state.config.audit.rerun_after_apply);

    let (selected, held_back): (Vec<FixRequest>, Vec<FixRequest>) = request
        .fixes
        .into_iter()
        .partition(|fix| fix.safe || !only_safe);

    if !held_back.is_empty() {
        log::info!("Holding back {} fix(es) not marked safe", held_back.len());
    }

    let result = match audit::apply_data_consistency_fixes(app_state.store.as_ref(), &selected).await {
        Ok(result) => result,
        Err(e) => {
            app_state.metrics.record_apply_failure();
            return Err(e);
        }
    };
    app_state.metrics.record_fixes_applied(result.applied);

    let report = if rerun {
        let rerun_result = audit::audit_data_consistency(app_state.store.as_ref(), &AuditOptions::default()).await;
        app_state.metrics.record_audit(rerun_result.is_ok());
        Some(rerun_result?)
    } else {
        None
    };

    let message = format!("Applied {} fix(es)", result.applied);
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        ApplyFixesResponse {
            success: result.success,
            applied: result.applied,
            skipped_unsafe: held_back.len(),
            report,
        },
        message,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::monitoring::Metrics;
    use crate::store::MemoryTreeStore;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    fn state(tree: Value) -> Arc<AppState> {
        Arc::new(AppState {
            store: Arc::new(MemoryTreeStore::with_tree(tree)),
            config: Config::default(),
            metrics: Arc::new(Metrics::new()),
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .route("/audit", web::post().to(run_audit))
                    .route("/fixes", web::post().to(apply_fixes)),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn test_audit_without_body_defaults_to_dry_run() {
        let app_state = state(json!({"laboratories": {"L1": {}}}));
        let app = app!(app_state);

        let req = test::TestRequest::post().uri("/audit").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["dryRun"], json!(true));
        assert_eq!(body["data"]["fixes"][0]["path"], json!("laboratories/L1/labId"));
        assert_eq!(app_state.metrics.snapshot().audits_run, 1);
    }

    #[actix_rt::test]
    async fn test_malformed_audit_options_are_rejected() {
        let app_state = state(json!({}));
        let app = app!(app_state);

        let req = test::TestRequest::post()
            .uri("/audit")
            .set_json(json!({"dryRun": "yes"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post().uri("/audit").set_payload("{not json").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(app_state.metrics.snapshot().audits_run, 0);
    }

    #[actix_rt::test]
    async fn test_blank_body_and_explicit_options() {
        let app_state = state(json!({}));
        let app = app!(app_state);

        let req = test::TestRequest::post().uri("/audit").set_payload("  \n").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["dryRun"], json!(true));

        let req = test::TestRequest::post()
            .uri("/audit")
            .set_json(json!({"dryRun": false}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["dryRun"], json!(false));
    }

    #[actix_rt::test]
    async fn test_apply_only_safe_and_rerun() {
        let app_state = state(json!({"laboratories": {"L1": {"labName": "Chem"}}}));
        let app = app!(app_state);

        let req = test::TestRequest::post()
            .uri("/fixes")
            .set_json(json!({
                "fixes": [
                    {"path": "laboratories/L1/labId", "value": "LAB001", "safe": true},
                    {"path": "laboratories/L1/labName", "value": "Overwritten", "safe": false}
                ]
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["data"]["applied"], json!(1));
        assert_eq!(body["data"]["skippedUnsafe"], json!(1));
        assert_eq!(body["data"]["report"]["summary"]["fixes"], json!(0));

        let metrics = app_state.metrics.snapshot();
        assert_eq!(metrics.fixes_applied, 1);
        assert_eq!(metrics.audits_run, 1);
    }

    #[actix_rt::test]
    async fn test_apply_all_without_rerun() {
        let app_state = state(json!({}));
        let app = app!(app_state);

        let req = test::TestRequest::post()
            .uri("/fixes")
            .set_json(json!({
                "fixes": [{"path": "borrow_requests/R1/labId", "value": "LAB001", "safe": false}],
                "onlySafe": false,
                "rerun": false
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["data"]["applied"], json!(1));
        assert!(body["data"].get("report").is_none());
    }

    #[actix_rt::test]
    async fn test_audit_on_unreachable_store_is_503() {
        let store = MemoryTreeStore::new();
        store.set_online(false);
        let app_state = Arc::new(AppState {
            store: Arc::new(store),
            config: Config::default(),
            metrics: Arc::new(Metrics::new()),
        });
        let app = app!(app_state);

        let req = test::TestRequest::post().uri("/audit").set_json(json!({"dryRun": true})).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(app_state.metrics.snapshot().audit_failures, 1);
    }
}
