pub mod handlers;
pub(crate) mod prediction;

use crate::config::Settings;
use crate::error::Result as AppResult;
use crate::http_client::client_for_upstream;
use axum::Router;
use axum::http::HeaderValue;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Settings,
    pub client: reqwest::Client,
}

pub fn create_app(config: Settings) -> AppResult<Router> {
    let client = client_for_upstream(&config.upstream)?;

    tracing::info!(
        "Forwarding predictions to {} (key {})",
        config.upstream.base_url,
        crate::config::settings::mask_key(&config.upstream.api_key)
    );

    let app_state = AppState { config, client };

    // CORS is fixed and applied outside the router so that framework
    // rejections (oversized body etc.) carry the headers too.
    let cors = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, Authorization"),
        ));

    let app = handlers::routes()
        .with_state(Arc::new(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}
