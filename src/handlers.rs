//! Cloud-function handlers sitting between the public API and the hosted
//! models. Each takes a JSON event and always returns an HTTP-style
//! response envelope carrying CORS headers, including on failure.

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::HandlerError;
use crate::invoker::ModelInvoker;
use crate::regression::FEATURE_NAMES;
use crate::types::{
    ForecastEvent, ForecastResult, LOWER_QUANTILE, ModelInvocation, ModelResponse, UPPER_QUANTILE,
};

pub const FORECAST_ALLOWED_METHODS: &str = "POST";
pub const REGRESSION_ALLOWED_METHODS: &str = "OPTIONS,POST";

#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub request_id: Uuid,
}

impl InvocationContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
        }
    }
}

impl Default for InvocationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl LambdaResponse {
    pub fn ok<T: Serialize>(allowed_methods: &str, body: &T) -> Result<Self, HandlerError> {
        let body = serde_json::to_string(body)
            .map_err(|e| HandlerError::UnexpectedResponse(e.to_string()))?;
        Ok(Self {
            status_code: 200,
            headers: cors_headers(allowed_methods),
            body,
        })
    }

    pub fn error(allowed_methods: &str, error: &HandlerError) -> Self {
        Self {
            status_code: error.status_code(),
            headers: cors_headers(allowed_methods),
            body: json!({ "error": error.to_string() }).to_string(),
        }
    }

    /// Empty 200 answer to a CORS preflight.
    pub fn preflight(allowed_methods: &str) -> Self {
        Self {
            status_code: 200,
            headers: cors_headers(allowed_methods),
            body: String::new(),
        }
    }
}

pub fn cors_headers(allowed_methods: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        (
            "Access-Control-Allow-Headers".to_string(),
            "Content-Type".to_string(),
        ),
        (
            "Access-Control-Allow-Methods".to_string(),
            allowed_methods.to_string(),
        ),
    ])
}

fn parse_json(raw: &str) -> Result<Value, HandlerError> {
    serde_json::from_str(raw).map_err(HandlerError::InvalidJson)
}

fn string_field(object: &mut Map<String, Value>, key: &str) -> Result<String, HandlerError> {
    match object.remove(key) {
        Some(Value::String(raw)) => Ok(raw),
        Some(other) => Err(HandlerError::InvalidRequest(format!(
            "`{key}` must be a JSON string, got {other}"
        ))),
        None => Err(HandlerError::InvalidRequest(format!("missing `{key}`"))),
    }
}

/// Events from the API gateway carry the payload as a JSON string in `body`;
/// direct invocations pass the payload itself.
fn unwrap_event(event: Value) -> Result<Value, HandlerError> {
    match event {
        Value::Object(mut object) if object.contains_key("body") => {
            parse_json(&string_field(&mut object, "body")?)
        }
        payload => Ok(payload),
    }
}

async fn forecast(
    event: Value,
    invoker: &dyn ModelInvoker,
    endpoint_name: &str,
) -> Result<ForecastResult, HandlerError> {
    let payload = unwrap_event(event)?;
    let request: ForecastEvent = serde_json::from_value(payload)
        .map_err(|e| HandlerError::InvalidRequest(e.to_string()))?;

    let invocation = ModelInvocation::from(request);
    let body = serde_json::to_vec(&invocation)
        .map_err(|e| HandlerError::InvalidRequest(e.to_string()))?;
    tracing::debug!(body = %String::from_utf8_lossy(&body), "Invoking forecast model");

    let output = invoker
        .invoke(endpoint_name, "application/json", body)
        .await
        .map_err(HandlerError::Invocation)?;

    let response: ModelResponse = serde_json::from_slice(&output)
        .map_err(|e| HandlerError::UnexpectedResponse(e.to_string()))?;
    let mut prediction = response
        .predictions
        .into_iter()
        .next()
        .ok_or_else(|| HandlerError::UnexpectedResponse("no predictions returned".to_string()))?;

    let mut quantile = |q: &str| {
        prediction
            .quantiles
            .remove(q)
            .ok_or_else(|| HandlerError::UnexpectedResponse(format!("missing quantile {q}")))
    };
    let predicted_lower_quantile = quantile(LOWER_QUANTILE)?;
    let predicted_upper_quantile = quantile(UPPER_QUANTILE)?;

    Ok(ForecastResult {
        predicted_means: prediction.mean,
        predicted_lower_quantile,
        predicted_upper_quantile,
    })
}

/// Forecast function: translates the sales history into a model invocation
/// and flattens the model's mean and quantile output.
#[tracing::instrument(skip(event, ctx, invoker), fields(request_id = %ctx.request_id))]
pub async fn forecast_handler(
    event: Value,
    ctx: &InvocationContext,
    invoker: &dyn ModelInvoker,
    endpoint_name: &str,
) -> LambdaResponse {
    let result = forecast(event, invoker, endpoint_name)
        .await
        .and_then(|result| {
            tracing::info!(
                points = result.predicted_means.len(),
                "Forecast completed"
            );
            LambdaResponse::ok(FORECAST_ALLOWED_METHODS, &result)
        });

    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, detail = ?e.detail(), "Forecast request failed");
        counter!("handler_failures_total", "handler" => "forecast").increment(1);
        LambdaResponse::error(FORECAST_ALLOWED_METHODS, &e)
    })
}

fn feature_value(body: &Map<String, Value>, name: &str) -> Result<f64, HandlerError> {
    let not_numeric = |value: &Value| {
        HandlerError::InvalidRequest(format!("feature `{name}` is not numeric: {value}"))
    };

    match body.get(name) {
        None => Ok(0.0),
        Some(value) => match value {
            Value::Number(n) => n.as_f64().ok_or_else(|| not_numeric(value)),
            Value::String(raw) => raw.trim().parse().map_err(|_| not_numeric(value)),
            _ => Err(not_numeric(value)),
        },
    }
}

/// Shortest round-trip text of `value`, with exponents signed and at least
/// two digits wide (`1e-05`, `1.5e+16`), as the linear model's CSV rows use.
pub fn csv_float(value: f64) -> String {
    let text = format!("{value:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

/// One CSV line with the features in training order; missing ones are zero.
pub fn features_csv(body: &Map<String, Value>) -> Result<String, HandlerError> {
    let values = FEATURE_NAMES
        .iter()
        .map(|name| feature_value(body, name).map(csv_float))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(values.join(","))
}

async fn regression(
    event: Value,
    invoker: &dyn ModelInvoker,
    endpoint_name: &str,
) -> Result<String, HandlerError> {
    let Value::Object(mut event) = event else {
        return Err(HandlerError::InvalidRequest("event must be a JSON object".into()));
    };

    // The form arrives encoded twice: the request body is an envelope whose
    // own `body` is the JSON-encoded feature map.
    let envelope = parse_json(&string_field(&mut event, "body")?)?;
    let Value::Object(mut envelope) = envelope else {
        return Err(HandlerError::InvalidRequest("body must be a JSON object".into()));
    };
    let Value::Object(body) = parse_json(&string_field(&mut envelope, "body")?)? else {
        return Err(HandlerError::InvalidRequest("features must be a JSON object".into()));
    };
    let parsed = Value::Object(body.clone());
    tracing::info!(body = %parsed, "Double-parsed body");

    let payload = features_csv(&body)?;
    tracing::info!(%payload, "Payload for regression model");

    let output = invoker
        .invoke(endpoint_name, "text/csv", payload.into_bytes())
        .await
        .map_err(HandlerError::Invocation)?;
    let prediction = String::from_utf8(output)
        .map_err(|e| HandlerError::UnexpectedResponse(e.to_string()))?;
    tracing::info!(%prediction, "Received prediction");

    Ok(prediction)
}

/// Regression function: converts the submitted form into a CSV row for the
/// linear model and returns the raw model output as `prediction`.
#[tracing::instrument(skip(event, ctx, invoker), fields(request_id = %ctx.request_id))]
pub async fn regression_handler(
    event: Value,
    ctx: &InvocationContext,
    invoker: &dyn ModelInvoker,
    endpoint_name: &str,
) -> LambdaResponse {
    tracing::info!(%event, "Received event");

    let result = regression(event, invoker, endpoint_name)
        .await
        .and_then(|prediction| {
            LambdaResponse::ok(
                REGRESSION_ALLOWED_METHODS,
                &json!({ "prediction": prediction }),
            )
        });

    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, detail = ?e.detail(), "Regression request failed");
        counter!("handler_failures_total", "handler" => "regression").increment(1);
        LambdaResponse::error(REGRESSION_ALLOWED_METHODS, &e)
    })
}
