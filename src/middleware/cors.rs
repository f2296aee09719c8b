use axum::{
    body::Body,
    extract::State,
    http::{
        header::{self, HeaderValue},
        Method, Request, Response, StatusCode,
    },
    middleware::Next,
};
use tracing::debug;

use crate::app::AppState;

/// Resolve which origin (if any) may be echoed back for this request.
/// Wildcard reflects the origin outside production so credentials keep working.
pub fn resolve_allowed_origin(
    allowed_origins: &[String],
    is_production: bool,
    origin: Option<&str>,
) -> Option<String> {
    let origin = origin?;
    let has_wildcard = allowed_origins.iter().any(|o| o == "*");

    if has_wildcard && !is_production {
        debug!("CORS: Reflecting origin for non-production: {}", origin);
        Some(origin.to_string())
    } else if allowed_origins.iter().any(|o| o == origin) {
        debug!("CORS: Origin allowed from whitelist: {}", origin);
        Some(origin.to_string())
    } else {
        debug!("CORS: Origin not in whitelist: {}", origin);
        None
    }
}

/// Dynamic CORS middleware supporting credentials (RingCentral cookies)
pub async fn dynamic_cors_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response<Body> {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());

    let allowed_origin = resolve_allowed_origin(
        &state.config.security.cors_allowed_origins,
        state.config.is_production(),
        origin,
    )
    .and_then(|o| HeaderValue::from_str(&o).ok());

    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());

        if let Some(allowed) = allowed_origin {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
            );
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(
                    "content-type, authorization, accept, origin, x-requested-with",
                ),
            );
            headers.insert(
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from_static("3600"),
            );
        }

        *response.status_mut() = StatusCode::OK;
        return response;
    }

    let mut response = next.run(req).await;

    if let Some(allowed) = allowed_origin {
        response
            .headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }

    response
}
