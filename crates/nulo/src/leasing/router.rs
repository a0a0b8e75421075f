use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde_json::json;

use super::domain::{ApplicationId, Identity, PropertyId};
use super::error::{ErrorKind, LeasingError};
use super::favorites::{AddFavorite, FavoritesService};
use super::identity::{authenticate, IdentityGateway};
use super::onboarding::{CompleteProfile, ProfileService, ProfileUpdate};
use super::repository::{LeasingStore, NotificationHook};
use super::retry::CallPolicy;
use super::service::{ApplicationLifecycle, RejectApplication, SubmitApplication};
use crate::config::LeasingConfig;

/// Services and collaborators shared by every leasing route.
pub struct LeasingState<S, N, G> {
    pub applications: ApplicationLifecycle<S, N>,
    pub profiles: ProfileService<S>,
    pub favorites: FavoritesService<S>,
    identity: Arc<G>,
    identity_timeout: Duration,
}

impl<S, N, G> LeasingState<S, N, G>
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, identity: Arc<G>, config: &LeasingConfig) -> Self {
        let policy = CallPolicy::from_config(config);
        Self {
            applications: ApplicationLifecycle::new(store.clone(), notifications, config),
            profiles: ProfileService::new(store.clone(), policy.clone()),
            favorites: FavoritesService::new(store, policy),
            identity,
            identity_timeout: config.identity_timeout,
        }
    }

    async fn caller(&self, headers: &HeaderMap) -> Result<Identity, LeasingError> {
        authenticate(
            self.identity.as_ref(),
            bearer_token(headers),
            self.identity_timeout,
        )
        .await
    }
}

/// Router builder exposing the application lifecycle, onboarding, and favorites endpoints.
pub fn leasing_router<S, N, G>(state: Arc<LeasingState<S, N, G>>) -> Router
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(submit_handler::<S, N, G>).get(list_handler::<S, N, G>),
        )
        .route(
            "/api/v1/applications/:application_id/review",
            patch(review_handler::<S, N, G>),
        )
        .route(
            "/api/v1/applications/:application_id/approve",
            patch(approve_handler::<S, N, G>),
        )
        .route(
            "/api/v1/applications/:application_id/reject",
            patch(reject_handler::<S, N, G>),
        )
        .route(
            "/api/v1/tenants/profile",
            get(profile_handler::<S, N, G>).patch(update_profile_handler::<S, N, G>),
        )
        .route(
            "/api/v1/tenants/profile-status",
            get(profile_status_handler::<S, N, G>),
        )
        .route(
            "/api/v1/tenants/complete-profile",
            post(complete_profile_handler::<S, N, G>),
        )
        .route("/api/v1/favorites", post(add_favorite_handler::<S, N, G>))
        .route(
            "/api/v1/favorites/:property_id",
            delete(remove_favorite_handler::<S, N, G>),
        )
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden | ErrorKind::ProfileIncomplete => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::DuplicateApplication
        | ErrorKind::DuplicateFavorite
        | ErrorKind::InvalidTransition => StatusCode::CONFLICT,
        ErrorKind::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for LeasingError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let payload = json!({
            "error": kind.label(),
            "message": self.to_string(),
        });
        let mut response = (status_for(kind), Json(payload)).into_response();
        if kind == ErrorKind::Unauthenticated {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Bearer"));
        }
        response
    }
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, LeasingError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn submit_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
    Json(request): Json<SubmitApplication>,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let result = match state.caller(&headers).await {
        Ok(identity) => state.applications.submit(&identity, request).await,
        Err(err) => Err(err),
    };
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let result = match state.caller(&headers).await {
        Ok(identity) => state
            .applications
            .list(&identity)
            .await
            .map(|applications| json!({ "applications": applications })),
        Err(err) => Err(err),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn review_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let id = ApplicationId(application_id);
    let result = match state.caller(&headers).await {
        Ok(identity) => state.applications.begin_review(&identity, &id).await,
        Err(err) => Err(err),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn approve_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let id = ApplicationId(application_id);
    let result = match state.caller(&headers).await {
        Ok(identity) => state.applications.approve(&identity, &id).await,
        Err(err) => Err(err),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn reject_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(request): Json<RejectApplication>,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let id = ApplicationId(application_id);
    let result = match state.caller(&headers).await {
        Ok(identity) => state.applications.reject(&identity, &id, request).await,
        Err(err) => Err(err),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn profile_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let result = match state.caller(&headers).await {
        Ok(identity) => state.profiles.profile(&identity).await,
        Err(err) => Err(err),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn update_profile_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
    Json(update): Json<ProfileUpdate>,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let result = match state.caller(&headers).await {
        Ok(identity) => state.profiles.update_profile(&identity, update).await,
        Err(err) => Err(err),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn profile_status_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let result = match state.caller(&headers).await {
        Ok(identity) => state.profiles.profile_status(&identity).await,
        Err(err) => Err(err),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn complete_profile_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
    Json(request): Json<CompleteProfile>,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let result = match state.caller(&headers).await {
        Ok(identity) => state.profiles.complete_profile(&identity, request).await,
        Err(err) => Err(err),
    };
    respond(StatusCode::OK, result)
}

pub(crate) async fn add_favorite_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
    Json(request): Json<AddFavorite>,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let result = match state.caller(&headers).await {
        Ok(identity) => {
            state
                .favorites
                .add_favorite(&identity, &request.property_id)
                .await
        }
        Err(err) => Err(err),
    };
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn remove_favorite_handler<S, N, G>(
    State(state): State<Arc<LeasingState<S, N, G>>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Response
where
    S: LeasingStore + 'static,
    N: NotificationHook + 'static,
    G: IdentityGateway + 'static,
{
    let property_id = PropertyId(property_id);
    let result = match state.caller(&headers).await {
        Ok(identity) => state
            .favorites
            .remove_favorite(&identity, &property_id)
            .await
            .map(|()| json!({ "message": "Property removed from favorites" })),
        Err(err) => Err(err),
    };
    respond(StatusCode::OK, result)
}
