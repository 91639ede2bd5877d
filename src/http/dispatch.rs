//! Request dispatch for requests the access engine let through.
//!
//! Proxy rule → upstream, else static responder, else `404 Not Found`.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::http::server::AppState;

pub const NOT_FOUND_BODY: &str = "Not Found";

pub async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    if let Some(rule) = state.router.route_for(request.uri().path()) {
        return state.transport.forward(rule, request).await;
    }

    let req_id = request_id(request.headers()).to_string();
    let path = request.uri().path().to_string();

    match state.responder.respond(request).await {
        Some(response) => response,
        None => {
            tracing::debug!(request_id = %req_id, path = %path, "Nothing to serve");
            (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
        }
    }
}
