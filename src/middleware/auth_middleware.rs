// Authentication middleware for protected routes
// Validates JWT tokens and injects AuthenticatedUser into request extensions

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    app::AppState, middleware::auth::AuthenticatedUser, utils::service_error::ServiceError,
};

/// Pull the bearer token out of an Authorization header value
pub fn bearer_token(header_value: Option<&str>) -> Option<&str> {
    header_value
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware function that validates JWT tokens and adds AuthenticatedUser to extensions
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = bearer_token(auth_header) else {
        return ServiceError::Unauthorized("Missing or invalid authorization header".to_string())
            .into_response();
    };

    let claims = match app_state.jwt_service.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("JWT validation failed: {}", e);
            return ServiceError::Unauthorized("Invalid or expired token".to_string())
                .into_response();
        },
    };

    match AuthenticatedUser::from_claims(claims) {
        Ok(auth_user) => {
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        },
        Err(e) => e.into_response(),
    }
}
