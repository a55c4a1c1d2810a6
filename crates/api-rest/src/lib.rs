//! # API REST
//!
//! REST API implementation for Exames.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! Business rules live in `exames-core`; handlers translate between wire types
//! ([`dto`]) and core calls. Core calls are blocking and run on the blocking pool.

#![warn(rust_2018_idioms)]

pub mod dto;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use dto::{
    AttentionItemRes, DashboardRes, ExamEntryRes, ExamRes, ExamsQuery, ExpiryPreviewReq,
    ExpiryPreviewRes, HealthRes, ListExamsRes, MatrixRowRes, NotificationLineRes,
    NotificationPreviewRes, NotificationRunRes, ProcedureCellRes, ProcedureMatrixRes,
    ProcedureRes, RegisterExamReq, RenewExamReq, TenantReportRes, TodayQuery, UpdateExamReq,
};
use exames_core::validation::{parse_date, preview_expiry};
use exames_core::{
    Clock, CoreConfig, ExamError, ExamResult, ExamService, NotificationService, OutboxTransport,
    RecordStore, SnapshotStore, SystemClock,
};

/// Shared state of the REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub exams: ExamService,
    pub notifier: NotificationService,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wires the snapshot store, the outbox transport and the system clock from `cfg`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded.
    pub fn from_config(cfg: &CoreConfig) -> ExamResult<Self> {
        let store: Arc<dyn RecordStore> = Arc::new(SnapshotStore::open(cfg.snapshot_path())?);
        let transport = Arc::new(OutboxTransport::new(cfg.outbox_dir(), cfg.sender().clone()));
        Ok(Self {
            exams: ExamService::new(store.clone()),
            notifier: NotificationService::new(store, transport),
            clock: Arc::new(SystemClock::new(cfg.reference_offset())),
        })
    }

    fn today(&self, override_day: Option<&str>) -> Result<NaiveDate, ApiError> {
        match override_day.filter(|d| !d.trim().is_empty()) {
            Some(day) => parse_date("today", day).map_err(|e| error_response("Parse today", e)),
            None => Ok(self.clock.today()),
        }
    }
}

type ApiError = (StatusCode, String);

fn error_response(context: &'static str, err: ExamError) -> ApiError {
    if err.is_validation() {
        (StatusCode::BAD_REQUEST, err.to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, err.to_string())
    } else {
        tracing::error!("{} error: {:?}", context, err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
    }
}

async fn blocking<T, F>(context: &'static str, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ExamError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(|e| error_response(context, e)),
        Err(e) => {
            tracing::error!("{} task failed: {:?}", context, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()))
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        dashboard,
        procedure_matrix,
        list_exams,
        notification_preview,
        register_exam,
        renew_exam,
        update_exam,
        expiry_preview,
        run_notifications,
    ),
    components(schemas(
        HealthRes,
        AttentionItemRes,
        DashboardRes,
        ProcedureRes,
        ProcedureCellRes,
        MatrixRowRes,
        ProcedureMatrixRes,
        ExamRes,
        ExamEntryRes,
        ListExamsRes,
        RegisterExamReq,
        RenewExamReq,
        UpdateExamReq,
        ExpiryPreviewReq,
        ExpiryPreviewRes,
        NotificationLineRes,
        NotificationPreviewRes,
        TenantReportRes,
        NotificationRunRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router, Swagger UI included.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tenants/:id/dashboard", get(dashboard))
        .route("/tenants/:id/procedures", get(procedure_matrix))
        .route("/tenants/:id/exams", get(list_exams))
        .route("/tenants/:id/notifications/preview", get(notification_preview))
        .route("/exams", post(register_exam))
        .route("/exams/:id", patch(update_exam))
        .route("/exams/:id/renew", post(renew_exam))
        .route("/expiry/preview", post(expiry_preview))
        .route("/notifications/run", post(run_notifications))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Exames REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/tenants/{id}/dashboard",
    params(("id" = String, Path, description = "Tenant id"), TodayQuery),
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Tenant not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Dashboard summary of a tenant
///
/// Counts, total cost and the list of active exams that are expired or expiring soon.
#[axum::debug_handler]
async fn dashboard(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<TodayQuery>,
) -> Result<Json<DashboardRes>, ApiError> {
    let today = state.today(query.today.as_deref())?;
    let summary = blocking("Dashboard", move || state.exams.dashboard(&id, today)).await?;
    Ok(Json(summary.into()))
}

#[utoipa::path(
    get,
    path = "/tenants/{id}/procedures",
    params(("id" = String, Path, description = "Tenant id"), TodayQuery),
    responses(
        (status = 200, description = "Colaborador × procedure matrix", body = ProcedureMatrixRes),
        (status = 404, description = "Tenant not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn procedure_matrix(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<TodayQuery>,
) -> Result<Json<ProcedureMatrixRes>, ApiError> {
    let today = state.today(query.today.as_deref())?;
    let matrix =
        blocking("Procedure matrix", move || state.exams.procedure_matrix(&id, today)).await?;
    Ok(Json(matrix.into()))
}

#[utoipa::path(
    get,
    path = "/tenants/{id}/exams",
    params(("id" = String, Path, description = "Tenant id"), ExamsQuery),
    responses(
        (status = 200, description = "Every exam of the tenant, history included", body = ListExamsRes),
        (status = 404, description = "Tenant not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn list_exams(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<ExamsQuery>,
) -> Result<Json<ListExamsRes>, ApiError> {
    let today = state.today(query.today.as_deref())?;
    let colaborador = query.colaborador;
    let entries = blocking("List exams", move || {
        state.exams.exams(&id, colaborador.as_deref(), today)
    })
    .await?;
    Ok(Json(ListExamsRes {
        exams: entries.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/tenants/{id}/notifications/preview",
    params(("id" = String, Path, description = "Tenant id"), TodayQuery),
    responses(
        (status = 200, description = "Alert that would be sent today", body = NotificationPreviewRes),
        (status = 404, description = "Tenant not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn notification_preview(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<TodayQuery>,
) -> Result<Json<NotificationPreviewRes>, ApiError> {
    let today = state.today(query.today.as_deref())?;
    let preview = blocking("Notification preview", move || {
        state.exams.notification_preview(&id, today)
    })
    .await?;
    Ok(Json(preview.into()))
}

#[utoipa::path(
    post,
    path = "/exams",
    request_body = RegisterExamReq,
    responses(
        (status = 201, description = "Exam registered", body = ExamRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Referenced colaborador, exam type or procedure not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register an exam
///
/// Either `validity_days` or `expiry_date` is required; if both are sent they must agree.
#[axum::debug_handler]
async fn register_exam(
    State(state): State<AppState>,
    Json(req): Json<RegisterExamReq>,
) -> Result<(StatusCode, Json<ExamRes>), ApiError> {
    let exam = req.into_new_exam().ok_or((
        StatusCode::BAD_REQUEST,
        "value must be a finite amount".to_string(),
    ))?;
    let record = blocking("Register exam", move || state.exams.register(exam)).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[utoipa::path(
    post,
    path = "/exams/{id}/renew",
    params(("id" = String, Path, description = "Id of the exam being renewed")),
    request_body = RenewExamReq,
    responses(
        (status = 201, description = "Renewal registered", body = ExamRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Exam not found"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn renew_exam(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<RenewExamReq>,
) -> Result<(StatusCode, Json<ExamRes>), ApiError> {
    let record = blocking("Renew exam", move || {
        state
            .exams
            .renew(&id, &req.realization_date, req.validity_days)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[utoipa::path(
    patch,
    path = "/exams/{id}",
    params(("id" = String, Path, description = "Id of the exam to edit")),
    request_body = UpdateExamReq,
    responses(
        (status = 200, description = "Exam updated", body = ExamRes),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Exam or referenced procedure not found"),
        (status = 500, description = "Internal server error")
    )
)]
/// Edit an exam
///
/// The expiry date is recomputed when the realization date or validity changes.
#[axum::debug_handler]
async fn update_exam(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<UpdateExamReq>,
) -> Result<Json<ExamRes>, ApiError> {
    let update = req.into_update().ok_or((
        StatusCode::BAD_REQUEST,
        "value must be a finite amount".to_string(),
    ))?;
    let record = blocking("Update exam", move || state.exams.update(&id, update)).await?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    post,
    path = "/expiry/preview",
    request_body = ExpiryPreviewReq,
    responses(
        (status = 200, description = "Expiry date a registration would store", body = ExpiryPreviewRes),
        (status = 400, description = "Bad request")
    )
)]
#[axum::debug_handler]
async fn expiry_preview(
    State(_state): State<AppState>,
    Json(req): Json<ExpiryPreviewReq>,
) -> Result<Json<ExpiryPreviewRes>, ApiError> {
    preview_expiry(
        &req.realization_date,
        req.validity_days,
        req.expiry_date.as_deref(),
    )
    .map(|expiry| Json(ExpiryPreviewRes::new(expiry)))
    .map_err(|e| error_response("Expiry preview", e))
}

#[utoipa::path(
    post,
    path = "/notifications/run",
    params(TodayQuery),
    responses(
        (status = 200, description = "Per-tenant outcome of the run", body = NotificationRunRes),
        (status = 500, description = "Internal server error")
    )
)]
/// Run the expiry notifier now
#[axum::debug_handler]
async fn run_notifications(
    State(state): State<AppState>,
    Query(query): Query<TodayQuery>,
) -> Result<Json<NotificationRunRes>, ApiError> {
    let today = state.today(query.today.as_deref())?;
    let report = blocking("Notification run", move || state.notifier.run(today)).await?;
    Ok(Json(report.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use exames_core::{FixedClock, LogTransport, Snapshot, SnapshotStore};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    const SNAPSHOT: &str = r#"
tenants:
  - { id: acme, name: ACME }
  - { id: beta, name: Beta }
recipients:
  - { id: r1, tenant_id: acme, email: sst@acme.com.br }
colaboradores:
  - { id: c1, tenant_id: acme, name: Ana, admission_date: 2020-01-06 }
  - { id: c2, tenant_id: beta, name: Bruno, admission_date: 2021-03-01 }
exam_types:
  - { id: t1, name: Periódico, alert_threshold_days: 30 }
procedures:
  - { id: p1, name: NR-35 }
exams:
  - { id: e1, colaborador_id: c1, exam_type_id: t1, realization_date: 2023-01-01, validity_days: 365, expiry_date: 2024-01-01, value: 100.0 }
  - { id: e2, colaborador_id: c1, exam_type_id: t1, realization_date: 2024-01-01, validity_days: 365, expiry_date: 2025-01-01, value: 120.5 }
  - { id: e3, colaborador_id: c2, exam_type_id: t1, realization_date: 2023-06-01, validity_days: 365, expiry_date: 2024-06-01 }
"#;

    fn app() -> Router {
        let store = Arc::new(SnapshotStore::in_memory(Snapshot::parse(SNAPSHOT).unwrap()).unwrap());
        let today = NaiveDate::from_ymd_opt(2024, 12, 15).unwrap();
        router(AppState {
            exams: ExamService::new(store.clone()),
            notifier: NotificationService::new(store, Arc::new(LogTransport)),
            clock: Arc::new(FixedClock(today)),
        })
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = send(app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn dashboard_uses_injected_clock() {
        let (status, body) = send(app(), "GET", "/tenants/acme/dashboard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generated_on"], "2024-12-15");
        assert_eq!(body["active_exams"], 1);
        assert_eq!(body["expiring_soon"], 1);
        assert_eq!(body["expired"], 0);
        assert_eq!(body["total_cost_display"], "R$ 220,50");
        assert_eq!(body["attention"][0]["exam_id"], "e2");
        assert_eq!(body["attention"][0]["days_to_expire"], 17);
        assert_eq!(body["attention"][0]["status"], "expiring_soon");
    }

    #[tokio::test]
    async fn today_can_be_overridden_and_is_validated() {
        let (status, body) =
            send(app(), "GET", "/tenants/acme/dashboard?today=2025-01-02", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["expired"], 1);

        let (status, _) = send(app(), "GET", "/tenants/acme/dashboard?today=02/01/2025", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_tenant_is_404() {
        let (status, _) = send(app(), "GET", "/tenants/nobody/exams", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn exam_listing_marks_history() {
        let (status, body) = send(app(), "GET", "/tenants/acme/exams", None).await;
        assert_eq!(status, StatusCode::OK);
        let exams = body["exams"].as_array().unwrap();
        assert_eq!(exams.len(), 2);
        assert_eq!(exams[0]["id"], "e1");
        assert_eq!(exams[0]["active"], false);
        assert_eq!(exams[1]["id"], "e2");
        assert_eq!(exams[1]["active"], true);
    }

    #[tokio::test]
    async fn register_rejects_disagreeing_expiry() {
        let body = serde_json::json!({
            "colaborador_id": "c1",
            "exam_type_id": "t1",
            "realization_date": "2024-01-01",
            "validity_days": 365,
            "expiry_date": "2025-01-02"
        });
        let (status, _) = send(app(), "POST", "/exams", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_and_renew() {
        let app = app();
        let body = serde_json::json!({
            "colaborador_id": "c1",
            "exam_type_id": "t1",
            "procedure_ids": ["p1"],
            "realization_date": "2024-03-01",
            "validity_days": 365,
            "value": 80.0
        });
        let (status, created) = send(app.clone(), "POST", "/exams", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["expiry_date"], "2025-03-01");

        let uri = format!("/exams/{}/renew", created["id"].as_str().unwrap());
        let renew = serde_json::json!({ "realization_date": "2025-02-20" });
        let (status, renewed) = send(app, "POST", &uri, Some(renew)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(renewed["expiry_date"], "2026-02-20");
        assert_eq!(renewed["procedure_ids"][0], "p1");
    }

    #[tokio::test]
    async fn update_recomputes_expiry_and_sets_procedures() {
        let app = app();
        let body = serde_json::json!({
            "validity_days": 180,
            "procedure_ids": ["p1"],
            "value": 99.9
        });
        let (status, updated) = send(app.clone(), "PATCH", "/exams/e2", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["expiry_date"], "2024-06-29");
        assert_eq!(updated["procedure_ids"][0], "p1");
        assert_eq!(updated["value"], 99.9);

        let bad = serde_json::json!({ "procedure_ids": ["missing"] });
        let (status, _) = send(app.clone(), "PATCH", "/exams/e2", Some(bad)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(app, "PATCH", "/exams/missing", Some(serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn renewing_unknown_exam_is_404() {
        let renew = serde_json::json!({ "realization_date": "2025-02-20" });
        let (status, _) = send(app(), "POST", "/exams/missing/renew", Some(renew)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn expiry_preview_counts_whole_years() {
        let body = serde_json::json!({ "realization_date": "2024-01-01", "validity_days": 365 });
        let (status, preview) = send(app(), "POST", "/expiry/preview", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(preview["expiry_date"], "2025-01-01");
    }

    #[tokio::test]
    async fn notification_preview_and_run() {
        let (status, preview) =
            send(app(), "GET", "/tenants/acme/notifications/preview", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(preview["recipients"][0], "sst@acme.com.br");
        assert_eq!(preview["lines"][0]["expiry_date"], "2025-01-01");

        let (status, report) = send(app(), "POST", "/notifications/run", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["tenants"][0]["tenant_id"], "acme");
        assert_eq!(report["tenants"][0]["outcome"], "sent");
        assert_eq!(report["tenants"][1]["tenant_id"], "beta");
        assert_eq!(report["tenants"][1]["outcome"], "skipped_no_recipients");
    }
}
