use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::auth;
use super::handlers::{briefs, content, integrations};

/// Browser origins allowed to call the API: the loopback names plus the
/// configured bind host, all on the API port.
fn build_cors(api_host: &str, api_port: u16) -> CorsLayer {
    let mut hosts = vec!["127.0.0.1", "localhost"];
    if !hosts.contains(&api_host) && !api_host.is_empty() && api_host != "0.0.0.0" {
        hosts.push(api_host);
    }
    let origins: Vec<HeaderValue> = hosts
        .into_iter()
        .filter_map(|host| format!("http://{}:{}", host, api_port).parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/briefs", get(briefs::list_briefs))
        .route("/api/briefs/{id}/transition", post(briefs::transition_brief))
        .route("/api/content/{id}/review", post(content::review_content))
        .route("/api/clients/{id}/sync", post(integrations::sync_client))
        .route("/api/integrations/health", get(integrations::get_health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ))
        .layer(middleware::from_fn(security_headers))
        .layer(build_cors(&state.api_host, state.api_port))
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

#[cfg(test)]
mod tests;
