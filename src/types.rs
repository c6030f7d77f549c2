use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::HashMap;

/// Number of sample paths drawn by the forecasting model
pub const NUM_SAMPLES: u32 = 100;
pub const LOWER_QUANTILE: &str = "0.1";
pub const UPPER_QUANTILE: &str = "0.9";

/// Outer request envelope of the regression API; `body` holds the form as a JSON string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionEnvelope {
    pub body: String,
}

/// Regression API response; `prediction` is the model output, itself JSON-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionResponse {
    pub prediction: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPredictions {
    pub predictions: Vec<Score>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Score {
    pub score: f64,
}

/// Payload sent by the forecast form.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRequest {
    pub country_code: i64,
    pub sales_data: Vec<f64>,
    pub start_date: String,
}

/// Payload received by the forecast handler. Sales values are kept as the
/// caller wrote them; `null` stands for a missing observation.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastEvent {
    pub country_code: i64,
    pub sales_data: Vec<Option<Number>>,
    pub start_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInvocation {
    pub instances: Vec<Instance>,
    pub configuration: InferenceConfiguration,
}

#[derive(Debug, Clone, Serialize)]
pub struct Instance {
    pub start: String,
    pub target: Vec<Option<Number>>,
    pub cat: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceConfiguration {
    pub num_samples: u32,
    pub output_types: Vec<&'static str>,
    pub quantiles: Vec<&'static str>,
}

impl Default for InferenceConfiguration {
    fn default() -> Self {
        Self {
            num_samples: NUM_SAMPLES,
            output_types: vec!["mean", "quantiles"],
            quantiles: vec![LOWER_QUANTILE, UPPER_QUANTILE],
        }
    }
}

impl From<ForecastEvent> for ModelInvocation {
    fn from(event: ForecastEvent) -> Self {
        Self {
            instances: vec![Instance {
                start: event.start_date,
                target: event.sales_data,
                cat: vec![event.country_code],
            }],
            configuration: InferenceConfiguration::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelResponse {
    pub predictions: Vec<ModelPrediction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelPrediction {
    pub mean: Vec<Number>,
    pub quantiles: HashMap<String, Vec<Number>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub predicted_means: Vec<Number>,
    pub predicted_lower_quantile: Vec<Number>,
    pub predicted_upper_quantile: Vec<Number>,
}
