use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    app_state::AppState,
    entities::{Job, JobType},
    health::{self, HealthResponse},
    listings::{
        dtos::{CreateJobRequest, ErrorResponse, UpdateJobRequest},
        handlers,
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        handlers::list_jobs,
        handlers::create_job,
        handlers::get_job,
        handlers::update_job,
        handlers::delete_job,
    ),
    components(schemas(
        Job,
        JobType,
        CreateJobRequest,
        UpdateJobRequest,
        ErrorResponse,
        HealthResponse
    )),
    tags(
        (name = "jobs", description = "Stored job listings"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

/// Full API router with docs, CORS and request tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::health_check))
        .route("/jobs", get(handlers::list_jobs).post(handlers::create_job))
        .route(
            "/jobs/{id}",
            get(handlers::get_job)
                .put(handlers::update_job)
                .delete(handlers::delete_job),
        )
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryJobStore;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(AppState::with_repository(Arc::new(InMemoryJobStore::new())))
    }

    #[tokio::test]
    async fn test_openapi_lists_job_routes() {
        let request = Request::builder()
            .uri("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["paths"]["/jobs"].is_object());
        assert!(doc["paths"]["/jobs/{id}"]["delete"].is_object());
    }

    #[tokio::test]
    async fn test_cors_headers_present() {
        let request = Request::builder()
            .uri("/jobs")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }
}
