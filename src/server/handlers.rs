use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::{
        Method, StatusCode,
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;
use std::sync::Arc;

use crate::error::ProxyError;
use crate::server::AppState;
use crate::server::prediction::PredictionRequest;

/// Every path answers with the same handler; the widget posts to the root.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().fallback(prediction_proxy)
}

pub async fn prediction_proxy(
    State(app_state): State<Arc<AppState>>,
    method: Method,
    body: Bytes,
) -> Result<Response, ProxyError> {
    match method {
        Method::OPTIONS => Ok(StatusCode::OK.into_response()),
        Method::POST => forward_prediction(&app_state, &body).await,
        _ => Ok((StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed").into_response()),
    }
}

async fn forward_prediction(app_state: &AppState, body: &[u8]) -> Result<Response, ProxyError> {
    let prediction = PredictionRequest::from_slice(body)?.validate()?;
    let upstream = &app_state.config.upstream;
    let url = prediction.endpoint(&upstream.base_url)?;

    let response = app_state
        .client
        .post(url)
        .bearer_auth(&upstream.api_key)
        .json(&prediction.upstream_body())
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProxyError::Upstream(status));
    }

    tracing::debug!(
        chatflow_id = %prediction.chatflow_id,
        upstream_status = %status,
        "Relaying prediction stream"
    );

    // Dropping the body (caller hung up) drops the upstream response with it.
    let chatflow_id = prediction.chatflow_id;
    let stream = response.bytes_stream().inspect_err(move |e| {
        tracing::error!(chatflow_id = %chatflow_id, "Upstream stream interrupted: {}", e);
    });

    Ok((
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            // HTTP/1.1 only; connection-specific headers are illegal on h2 responses.
            (CONNECTION, "keep-alive"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
