//! Housing-price regression form: collects thirteen features, posts them to
//! the regression API and shows the returned score.

use serde::Serialize;

use crate::error::{FormError, PipelineError};
use crate::http::HttpClient;
use crate::page::{DisplaySink, FormSource, PREDICTION_RESULT};
use crate::types::{RegressionEnvelope, RegressionResponse, ScoredPredictions};

/// Feature names in the order the model was trained on.
pub const FEATURE_NAMES: [&str; 13] = [
    "crim", "zn", "indus", "chas", "nox", "rm", "age", "dis", "rad", "tax", "ptratio", "b",
    "lstat",
];

/// Raw form values. Nothing is parsed or validated client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegressionFeatures {
    pub crim: String,
    pub zn: String,
    pub indus: String,
    pub chas: String,
    pub nox: String,
    pub rm: String,
    pub age: String,
    pub dis: String,
    pub rad: String,
    pub tax: String,
    pub ptratio: String,
    pub b: String,
    pub lstat: String,
}

impl RegressionFeatures {
    pub fn collect<F: FormSource + ?Sized>(form: &F) -> Result<Self, FormError> {
        let field = |id: &str| {
            form.value_of(id)
                .ok_or_else(|| FormError::MissingField(id.to_string()))
        };

        Ok(Self {
            crim: field("crim")?,
            zn: field("zn")?,
            indus: field("indus")?,
            chas: field("chas")?,
            nox: field("nox")?,
            rm: field("rm")?,
            age: field("age")?,
            dis: field("dis")?,
            rad: field("rad")?,
            tax: field("tax")?,
            ptratio: field("ptratio")?,
            b: field("b")?,
            lstat: field("lstat")?,
        })
    }

    /// `{"body":"<features as JSON>"}`: the API expects the form encoded twice.
    pub fn build_request_body(&self) -> serde_json::Result<String> {
        let body = serde_json::to_string(self)?;
        serde_json::to_string(&RegressionEnvelope { body })
    }
}

/// Extracts `predictions[0].score` from the doubly encoded response.
pub fn parse_score(body: &str) -> Result<f64, PipelineError> {
    let response: RegressionResponse = serde_json::from_str(body)?;
    let scored: ScoredPredictions = serde_json::from_str(&response.prediction)?;
    scored
        .predictions
        .first()
        .map(|p| p.score)
        .ok_or(PipelineError::MissingField("predictions[0].score"))
}

async fn request_score<F: FormSource + ?Sized>(
    form: &F,
    client: &dyn HttpClient,
    url: &str,
) -> Result<f64, PipelineError> {
    let features = RegressionFeatures::collect(form)?;
    let body = features.build_request_body()?;
    tracing::debug!(%body, "Submitting regression form");

    // The status code is not inspected; an error body fails in parse_score.
    let response = client
        .post_json(url, body)
        .await
        .map_err(PipelineError::Transport)?;
    parse_score(&response.body)
}

/// Runs the form submission and writes the outcome to `predictionResult`.
#[tracing::instrument(skip(form, client, display))]
pub async fn submit<F: FormSource + ?Sized>(
    form: &F,
    client: &dyn HttpClient,
    display: &mut dyn DisplaySink,
    url: &str,
) -> Result<f64, PipelineError> {
    let result = request_score(form, client, url).await;
    match &result {
        Ok(score) => {
            tracing::info!(score, "Regression prediction received");
            display.show_text(PREDICTION_RESULT, &format!("Prediction Result: {score}"));
        }
        Err(e) => {
            tracing::error!(error = %e, "Regression prediction failed");
            display.show_text(PREDICTION_RESULT, &format!("Error: {e}"));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::page::FormValues;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct CannedClient {
        response: Option<HttpResponse>,
        sent: Mutex<Vec<(String, String)>>,
    }

    impl CannedClient {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                response: Some(HttpResponse {
                    status,
                    status_text: String::new(),
                    body: body.to_string(),
                }),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                response: None,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        async fn post_json(&self, url: &str, body: String) -> Result<HttpResponse> {
            self.sent.lock().unwrap().push((url.to_string(), body));
            self.response
                .clone()
                .ok_or_else(|| anyhow::anyhow!("Failed to fetch"))
        }
    }

    #[derive(Default)]
    struct RecordingPage {
        text: HashMap<String, String>,
    }

    impl DisplaySink for RecordingPage {
        fn show_text(&mut self, id: &str, text: &str) {
            self.text.insert(id.to_string(), text.to_string());
        }

        fn show_html(&mut self, id: &str, html: &str) {
            self.text.insert(id.to_string(), html.to_string());
        }
    }

    fn boston_form() -> FormValues {
        let values = [
            "0.00632", "18", "2.31", "0", "0.538", "6.575", "65.2", "4.09", "1", "296", "15.3",
            "396.9", "4.98",
        ];
        FEATURE_NAMES.iter().copied().zip(values).collect()
    }

    #[test]
    fn request_body_is_double_encoded_in_declared_order() {
        let features = RegressionFeatures::collect(&boston_form()).unwrap();
        let body = features.build_request_body().unwrap();
        assert_eq!(
            body,
            r#"{"body":"{\"crim\":\"0.00632\",\"zn\":\"18\",\"indus\":\"2.31\",\"chas\":\"0\",\"nox\":\"0.538\",\"rm\":\"6.575\",\"age\":\"65.2\",\"dis\":\"4.09\",\"rad\":\"1\",\"tax\":\"296\",\"ptratio\":\"15.3\",\"b\":\"396.9\",\"lstat\":\"4.98\"}"}"#
        );
    }

    #[test]
    fn values_are_forwarded_verbatim() {
        let form = boston_form().with("rm", "lots").with("age", "");
        let features = RegressionFeatures::collect(&form).unwrap();
        assert_eq!(features.rm, "lots");
        assert_eq!(features.age, "");
    }

    #[test]
    fn missing_field_is_reported() {
        let form: FormValues = [("crim", "1")].into_iter().collect();
        let err = RegressionFeatures::collect(&form).unwrap_err();
        assert!(matches!(err, FormError::MissingField(ref id) if id == "zn"));
    }

    #[test]
    fn score_is_read_from_nested_json() {
        let body = r#"{"prediction":"{\"predictions\":[{\"score\":24.5}]}"}"#;
        let score = parse_score(body).unwrap();
        assert_eq!(score, 24.5);
    }

    #[test]
    fn empty_predictions_fail() {
        let err = parse_score(r#"{"prediction":"{\"predictions\":[]}"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::MissingField(_)));
    }

    #[test]
    fn non_json_prediction_fails() {
        let err = parse_score(r#"{"prediction":"24.5,"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Json(_)));
    }

    #[tokio::test]
    async fn submit_displays_score() {
        let client = CannedClient::replying(
            200,
            r#"{"prediction":"{\"predictions\":[{\"score\":24.5}]}"}"#,
        );
        let mut page = RecordingPage::default();

        let score = submit(&boston_form(), &client, &mut page, "https://api.test/prod/predict")
            .await
            .unwrap();

        assert_eq!(score, 24.5);
        assert_eq!(page.text[PREDICTION_RESULT], "Prediction Result: 24.5");
        let sent = client.sent.lock().unwrap();
        assert_eq!(sent[0].0, "https://api.test/prod/predict");
        assert!(sent[0].1.starts_with(r#"{"body":"{\"crim\""#));
    }

    #[tokio::test]
    async fn error_status_surfaces_as_parse_failure() {
        let client = CannedClient::replying(502, r#"{"message":"Internal server error"}"#);
        let mut page = RecordingPage::default();

        let err = submit(&boston_form(), &client, &mut page, "https://api.test/prod/predict")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Json(_)));
        assert!(page.text[PREDICTION_RESULT].starts_with("Error: "));
    }

    #[tokio::test]
    async fn transport_failure_is_displayed() {
        let client = CannedClient::unreachable();
        let mut page = RecordingPage::default();

        let err = submit(&boston_form(), &client, &mut page, "https://api.test/prod/predict")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Transport(_)));
        assert_eq!(page.text[PREDICTION_RESULT], "Error: Failed to fetch");
    }
}
