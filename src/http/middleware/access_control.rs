//! Access Control Middleware.
//! Runs the access engine before any routing happens.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::security::{Decision, RequestContext};

pub async fn access_control_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts);

    if state.log_urls {
        tracing::info!(method = %ctx.method, path = %ctx.path, "Request");
    }

    match state.engine.evaluate(&ctx) {
        Decision::Allowed(reason) => {
            tracing::trace!(path = %ctx.path, reason = %reason, "Access granted");
            let mut request = Request::from_parts(parts, body);
            request.extensions_mut().insert(Decision::Allowed(reason).verdict());
            next.run(request).await
        }
        Decision::Denied(denial) => {
            tracing::debug!(
                request_id = %request_id(&parts.headers),
                path = %ctx.path,
                reason = %denial.reason(),
                "Access denied"
            );
            denial.into_response()
        }
    }
}
