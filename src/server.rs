use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics::counter;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::handlers::{
    self, FORECAST_ALLOWED_METHODS, InvocationContext, LambdaResponse, REGRESSION_ALLOWED_METHODS,
};
use crate::invoker::ModelInvoker;

#[derive(Clone)]
pub struct AppState {
    invoker: Arc<dyn ModelInvoker>,
    forecast_endpoint: Arc<str>,
    regression_endpoint: Arc<str>,
}

impl AppState {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        forecast_endpoint: &str,
        regression_endpoint: &str,
    ) -> Self {
        Self {
            invoker,
            forecast_endpoint: forecast_endpoint.into(),
            regression_endpoint: regression_endpoint.into(),
        }
    }
}

/// Routes for both functions. `/predictions` and `/predict` behave like the
/// API gateway proxy in front of them; `/functions/{name}/invocations` takes
/// the event as the request body and returns the raw response envelope.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/predictions",
            post(forecast_proxy).options(|| async { preflight(FORECAST_ALLOWED_METHODS) }),
        )
        .route(
            "/predict",
            post(regression_proxy).options(|| async { preflight(REGRESSION_ALLOWED_METHODS) }),
        )
        .route("/functions/:name/invocations", post(invoke_function))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .with_state(state)
}

fn preflight(allowed_methods: &str) -> Response {
    into_http(LambdaResponse::preflight(allowed_methods))
}

/// Converts a function's response envelope into an HTTP response.
fn into_http(response: LambdaResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    if !response.body.is_empty() {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    for (name, value) in &response.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping invalid response header"),
        }
    }

    (status, headers, response.body).into_response()
}

async fn forecast_event(state: &AppState, event: Value) -> LambdaResponse {
    counter!("forecast_requests_total").increment(1);
    handlers::forecast_handler(
        event,
        &InvocationContext::new(),
        state.invoker.as_ref(),
        &state.forecast_endpoint,
    )
    .await
}

async fn regression_event(state: &AppState, event: Value) -> LambdaResponse {
    counter!("regression_requests_total").increment(1);
    handlers::regression_handler(
        event,
        &InvocationContext::new(),
        state.invoker.as_ref(),
        &state.regression_endpoint,
    )
    .await
}

async fn forecast_proxy(State(state): State<AppState>, body: String) -> Response {
    into_http(forecast_event(&state, json!({ "body": body })).await)
}

async fn regression_proxy(State(state): State<AppState>, body: String) -> Response {
    into_http(regression_event(&state, json!({ "body": body })).await)
}

#[tracing::instrument(skip(state, body))]
async fn invoke_function(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: String,
) -> Result<Json<LambdaResponse>, (StatusCode, String)> {
    let event: Value = serde_json::from_str(&body).map_err(|e| {
        tracing::warn!(error = %e, "Invocation payload is not JSON");
        (StatusCode::BAD_REQUEST, format!("Invalid event: {e}"))
    })?;

    let response = match name.as_str() {
        "forecast" => forecast_event(&state, event).await,
        "regression" => regression_event(&state, event).await,
        _ => {
            return Err((
                StatusCode::NOT_FOUND,
                format!("Function not found: {name}"),
            ));
        }
    };
    Ok(Json(response))
}
