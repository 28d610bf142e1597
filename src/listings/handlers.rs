use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info};

use crate::{
    app_state::AppState,
    entities::Job,
    listings::dtos::{CreateJobRequest, ErrorResponse, JobListParams, UpdateJobRequest},
    repositories::StoreError,
};

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn store_error_response(e: StoreError) -> Response {
    match e {
        StoreError::UniquenessViolation { link } => error_response(
            StatusCode::CONFLICT,
            format!("A job with link {} already exists", link),
        ),
        StoreError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "Job not found"),
        StoreError::InvalidRecord(reason) => error_response(StatusCode::BAD_REQUEST, reason),
        StoreError::Database(e) => {
            error!("Database error: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

#[utoipa::path(
    get,
    path = "/jobs",
    tag = "jobs",
    params(JobListParams),
    responses(
        (status = 200, description = "Matching jobs", body = [Job]),
        (status = 400, description = "Invalid filter", body = ErrorResponse)
    )
)]
pub async fn list_jobs(State(state): State<AppState>, Query(params): Query<JobListParams>) -> Response {
    let query = match params.into_query() {
        Ok(query) => query,
        Err(error) => return error_response(StatusCode::BAD_REQUEST, error),
    };

    match state.jobs.list(&query).await {
        Ok(jobs) => (StatusCode::OK, Json(jobs)).into_response(),
        Err(e) => store_error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/jobs",
    tag = "jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created", body = Job),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 409, description = "Link already stored", body = ErrorResponse)
    )
)]
pub async fn create_job(
    State(state): State<AppState>,
    Json(payload): Json<CreateJobRequest>,
) -> Response {
    let new_job = match payload.validate() {
        Ok(job) => job,
        Err(error) => return error_response(StatusCode::BAD_REQUEST, error),
    };

    match state.jobs.insert(&new_job).await {
        Ok(job) => {
            info!(id = job.id, "Created job");
            (StatusCode::CREATED, Json(job)).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

#[utoipa::path(
    get,
    path = "/jobs/{id}",
    tag = "jobs",
    params(("id" = i64, Path, description = "Job id")),
    responses(
        (status = 200, description = "The job", body = Job),
        (status = 404, description = "Job not found", body = ErrorResponse)
    )
)]
pub async fn get_job(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.jobs.get(id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Job not found"),
        Err(e) => store_error_response(e),
    }
}

#[utoipa::path(
    put,
    path = "/jobs/{id}",
    tag = "jobs",
    params(("id" = i64, Path, description = "Job id")),
    request_body = UpdateJobRequest,
    responses(
        (status = 200, description = "Updated job", body = Job),
        (status = 400, description = "Invalid fields", body = ErrorResponse),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 409, description = "Link already stored", body = ErrorResponse)
    )
)]
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateJobRequest>,
) -> Response {
    let patch = match payload.validate() {
        Ok(patch) => patch,
        Err(error) => return error_response(StatusCode::BAD_REQUEST, error),
    };

    match state.jobs.update(id, patch).await {
        Ok(job) => (StatusCode::OK, Json(job)).into_response(),
        Err(e) => store_error_response(e),
    }
}

#[utoipa::path(
    delete,
    path = "/jobs/{id}",
    tag = "jobs",
    params(("id" = i64, Path, description = "Job id")),
    responses(
        (status = 204, description = "Job deleted"),
        (status = 404, description = "Job not found", body = ErrorResponse)
    )
)]
pub async fn delete_job(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.jobs.delete(id).await {
        Ok(true) => {
            info!(id, "Deleted job");
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(false) => error_response(StatusCode::NOT_FOUND, "Job not found"),
        Err(e) => store_error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{JobType, NewJob};
    use crate::repositories::{InMemoryJobStore, JobStore};
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::Request,
        routing::get,
    };
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn new_job(link: &str, date: (i32, u32, u32), job_type: JobType, tags: &[&str]) -> NewJob {
        NewJob {
            title: "Actuary".to_string(),
            company: "Acme".to_string(),
            location: "Austin, USA".to_string(),
            posting_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            job_type,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            link: link.to_string(),
        }
    }

    async fn create_test_app() -> (Router, Arc<InMemoryJobStore>) {
        let store = Arc::new(InMemoryJobStore::new());
        store
            .insert(&new_job("https://board.example/job/1", (2024, 6, 1), JobType::FullTime, &["Life"]))
            .await
            .unwrap();
        store
            .insert(&new_job("https://board.example/job/2", (2024, 6, 3), JobType::Intern, &["Internship"]))
            .await
            .unwrap();

        let state = AppState::with_repository(store.clone());
        let app = Router::new()
            .route("/jobs", get(list_jobs).post(create_job))
            .route("/jobs/{id}", get(get_job).put(update_job).delete(delete_job))
            .with_state(state);
        (app, store)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_list_defaults_to_newest_first() {
        let (app, _) = create_test_app().await;
        let request = Request::builder().uri("/jobs").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let links: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|j| j["link"].as_str().unwrap())
            .collect();
        assert_eq!(links, vec!["https://board.example/job/2", "https://board.example/job/1"]);
        assert_eq!(body[0]["tags"], serde_json::json!(["Internship"]));
        assert_eq!(body[0]["posting_date"], "2024-06-03");
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (app, _) = create_test_app().await;

        let request = Request::builder()
            .uri("/jobs?job_type=Intern&sort=posting_date_asc")
            .body(Body::empty())
            .unwrap();
        let body = body_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["job_type"], "Intern");

        let request = Request::builder()
            .uri("/jobs?tag=LIFE&location=austin")
            .body(Body::empty())
            .unwrap();
        let body = body_json(app.clone().oneshot(request).await.unwrap()).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["link"], "https://board.example/job/1");

        let request = Request::builder()
            .uri("/jobs?job_type=Gig")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_validates_and_rejects_duplicates() {
        let (app, store) = create_test_app().await;
        let payload = serde_json::json!({
            "title": "Valuation Analyst",
            "company": "Beta Life",
            "location": "London, UK",
            "posting_date": "2024-06-09",
            "job_type": "Part-Time",
            "tags": ["Life", "Part-Time"],
            "link": "https://board.example/job/3"
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/jobs", payload.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["job_type"], "Part-Time");
        assert_eq!(store.len().await, 3);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/jobs", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(json_request(
                "POST",
                "/jobs",
                serde_json::json!({"title": "Only a title"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Missing required fields");
    }

    #[tokio::test]
    async fn test_get_update_delete_roundtrip() {
        let (app, _) = create_test_app().await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/jobs/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/jobs/1",
                serde_json::json!({"company": "Acme Re", "posting_date": "2024-06-02"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["company"], "Acme Re");
        assert_eq!(body["title"], "Actuary");
        assert_eq!(body["posting_date"], "2024-06-02");

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/jobs/1",
                serde_json::json!({"posting_date": "June 2"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri("/jobs/1")
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(json_request("PUT", "/jobs/1", serde_json::json!({"title": "x"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
