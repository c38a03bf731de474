use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::auth::AccessError;
use super::domain::{
    ApplicationId, ApplicationStatus, InterviewId, JobFilters, JobId, JobUpdate, NewApplication,
    NewInterview, NewJob, NewOffer, NewUser, NewVerification, OfferId, User, VerificationDecision,
    VerificationId,
};
use super::notify::Notifier;
use super::service::{MarketplaceError, MarketplaceService};
use super::storage::{Storage, StorageError};

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            MarketplaceError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("invalid {field}: {message}"), "field": field }),
            ),
            MarketplaceError::Access(AccessError::Unauthorized) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "authentication required" }),
            ),
            MarketplaceError::Access(AccessError::Forbidden(message)) => {
                (StatusCode::FORBIDDEN, json!({ "error": message }))
            }
            MarketplaceError::NotFound(entity) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("{entity} not found") }),
            ),
            MarketplaceError::Conflict(_) | MarketplaceError::InvalidTransition { .. } => {
                (StatusCode::CONFLICT, json!({ "error": self.to_string() }))
            }
            MarketplaceError::Storage(StorageError::StaleWrite) => {
                (StatusCode::CONFLICT, json!({ "error": self.to_string() }))
            }
            MarketplaceError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "internal storage failure" }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) email: String,
    pub(crate) password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    pub(crate) token: String,
    pub(crate) user: User,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChangeRequest {
    pub(crate) status: ApplicationStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OfferResponseRequest {
    pub(crate) accept: bool,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Router builder exposing the full marketplace HTTP surface.
pub fn marketplace_router<S, N>(service: Arc<MarketplaceService<S, N>>) -> Router
where
    S: Storage + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/auth/register", post(register_handler::<S, N>))
        .route("/api/auth/login", post(login_handler::<S, N>))
        .route("/api/auth/logout", post(logout_handler::<S, N>))
        .route(
            "/api/jobs",
            get(list_jobs_handler::<S, N>).post(post_job_handler::<S, N>),
        )
        .route(
            "/api/jobs/:id",
            get(get_job_handler::<S, N>)
                .patch(update_job_handler::<S, N>)
                .delete(delete_job_handler::<S, N>),
        )
        .route("/api/my-jobs", get(my_jobs_handler::<S, N>))
        .route(
            "/api/jobs/:id/applications",
            get(job_applications_handler::<S, N>),
        )
        .route("/api/applications", post(apply_handler::<S, N>))
        .route("/api/my-applications", get(my_applications_handler::<S, N>))
        .route(
            "/api/applications/:id",
            get(get_application_handler::<S, N>).patch(update_status_handler::<S, N>),
        )
        .route(
            "/api/applications/:id/history",
            get(application_history_handler::<S, N>),
        )
        .route(
            "/api/applications/:id/cancel",
            post(cancel_application_handler::<S, N>),
        )
        .route(
            "/api/applications/:id/offers",
            post(send_offer_handler::<S, N>).get(list_offers_handler::<S, N>),
        )
        .route(
            "/api/offers/:id/respond",
            post(respond_offer_handler::<S, N>),
        )
        .route(
            "/api/applications/:id/interviews",
            post(schedule_interview_handler::<S, N>).get(list_interviews_handler::<S, N>),
        )
        .route(
            "/api/interviews/:id/cancel",
            post(cancel_interview_handler::<S, N>),
        )
        .route(
            "/api/verification",
            post(submit_verification_handler::<S, N>).get(my_verification_handler::<S, N>),
        )
        .route(
            "/api/admin/verifications",
            get(pending_verifications_handler::<S, N>),
        )
        .route(
            "/api/admin/verifications/:id",
            patch(review_verification_handler::<S, N>),
        )
        .with_state(service)
}

pub(crate) async fn register_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Json(payload): Json<NewUser>,
) -> Result<Response, MarketplaceError> {
    let user = service.register(payload)?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

pub(crate) async fn login_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, MarketplaceError> {
    let (user, token) = service.login(&payload.email, &payload.password)?;
    Ok(Json(LoginResponse { token, user }))
}

pub(crate) async fn logout_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    headers: HeaderMap,
) -> StatusCode {
    if let Some(token) = bearer_token(&headers) {
        service.logout(token);
    }
    StatusCode::NO_CONTENT
}

pub(crate) async fn list_jobs_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Query(filters): Query<JobFilters>,
) -> Result<Response, MarketplaceError> {
    let jobs = service.list_jobs(filters)?;
    Ok(Json(jobs).into_response())
}

pub(crate) async fn get_job_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
) -> Result<Response, MarketplaceError> {
    let job = service.get_job(JobId(id))?;
    Ok(Json(job).into_response())
}

pub(crate) async fn post_job_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    headers: HeaderMap,
    Json(payload): Json<NewJob>,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let job = service.post_job(&actor, payload)?;
    Ok((StatusCode::CREATED, Json(job)).into_response())
}

pub(crate) async fn update_job_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(payload): Json<JobUpdate>,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let job = service.update_job(&actor, JobId(id), payload)?;
    Ok(Json(job).into_response())
}

pub(crate) async fn delete_job_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    service.delete_job(&actor, JobId(id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn my_jobs_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let jobs = service.employer_jobs(&actor)?;
    Ok(Json(jobs).into_response())
}

pub(crate) async fn apply_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    headers: HeaderMap,
    Json(payload): Json<NewApplication>,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let application = service.apply(&actor, payload)?;
    Ok((StatusCode::CREATED, Json(application)).into_response())
}

pub(crate) async fn my_applications_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let applications = service.my_applications(&actor)?;
    Ok(Json(applications).into_response())
}

pub(crate) async fn job_applications_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let applications = service.applications_for_job(&actor, JobId(id))?;
    Ok(Json(applications).into_response())
}

pub(crate) async fn get_application_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let application = service.get_application(&actor, ApplicationId(id))?;
    Ok(Json(application).into_response())
}

pub(crate) async fn application_history_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let history = service.application_history(&actor, ApplicationId(id))?;
    Ok(Json(history).into_response())
}

pub(crate) async fn update_status_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(payload): Json<StatusChangeRequest>,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let application = service.update_status(&actor, ApplicationId(id), payload.status)?;
    Ok(Json(application).into_response())
}

pub(crate) async fn cancel_application_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let application = service.cancel_application(&actor, ApplicationId(id))?;
    Ok(Json(application).into_response())
}

pub(crate) async fn send_offer_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(payload): Json<NewOffer>,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let offer = service.send_offer(&actor, ApplicationId(id), payload)?;
    Ok((StatusCode::CREATED, Json(offer)).into_response())
}

pub(crate) async fn list_offers_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let offers = service.offers_for_application(&actor, ApplicationId(id))?;
    Ok(Json(offers).into_response())
}

pub(crate) async fn respond_offer_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(payload): Json<OfferResponseRequest>,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let (offer, application) = service.respond_offer(&actor, OfferId(id), payload.accept)?;
    Ok(Json(json!({ "offer": offer, "application": application })).into_response())
}

pub(crate) async fn schedule_interview_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(payload): Json<NewInterview>,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let interview = service.schedule_interview(&actor, ApplicationId(id), payload)?;
    Ok((StatusCode::CREATED, Json(interview)).into_response())
}

pub(crate) async fn list_interviews_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let interviews = service.interviews_for_application(&actor, ApplicationId(id))?;
    Ok(Json(interviews).into_response())
}

pub(crate) async fn cancel_interview_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let interview = service.cancel_interview(&actor, InterviewId(id))?;
    Ok(Json(interview).into_response())
}

pub(crate) async fn submit_verification_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    headers: HeaderMap,
    Json(payload): Json<NewVerification>,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let request = service.submit_verification(&actor, payload)?;
    Ok((StatusCode::CREATED, Json(request)).into_response())
}

pub(crate) async fn my_verification_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let request = service.my_verification(&actor)?;
    Ok(Json(request).into_response())
}

pub(crate) async fn pending_verifications_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let requests = service.pending_verifications(&actor)?;
    Ok(Json(requests).into_response())
}

pub(crate) async fn review_verification_handler<S: Storage + 'static, N: Notifier + 'static>(
    State(service): State<Arc<MarketplaceService<S, N>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(payload): Json<VerificationDecision>,
) -> Result<Response, MarketplaceError> {
    let actor = service.resolve_actor(bearer_token(&headers))?;
    let request = service.review_verification(&actor, VerificationId(id), payload)?;
    Ok(Json(request).into_response())
}
