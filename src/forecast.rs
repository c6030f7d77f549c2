//! Sales forecast form: builds the forecast request, posts it to the
//! forecast API, shows the response and charts the predicted means.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::error::{FormError, PipelineError};
use crate::http::{HttpClient, HttpResponse};
use crate::page::{
    CHART, COUNTRY_CODE, ChartSink, DisplaySink, FormSource, LineChart, RESULT, SALES_DATA,
    START_DATE,
};
use crate::types::ForecastRequest;

/// How malformed sales values are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SalesDataMode {
    /// Reject the form, naming the first bad value.
    #[default]
    Strict,
    /// Coerce to NaN and send anyway (serialized as `null`).
    Lenient,
}

/// Loose numeric coercion of a single form token: surrounding whitespace is
/// ignored, an empty token is zero and anything unparseable is NaN.
pub fn coerce_number(token: &str) -> f64 {
    let token = token.trim();
    if token.is_empty() {
        return 0.0;
    }
    if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    match token {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    // f64::from_str also takes "inf" and "nan", which are not numbers here.
    if token
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return f64::NAN;
    }
    token.parse().unwrap_or(f64::NAN)
}

pub fn parse_sales_data(raw: &str) -> Vec<f64> {
    raw.split(',').map(coerce_number).collect()
}

pub fn validate_sales_data(raw: &str) -> Result<Vec<f64>, FormError> {
    raw.split(',')
        .enumerate()
        .map(|(index, token)| {
            let value = coerce_number(token);
            if token.trim().is_empty() || !value.is_finite() {
                Err(FormError::InvalidSalesValue {
                    index,
                    token: token.to_string(),
                })
            } else {
                Ok(value)
            }
        })
        .collect()
}

/// Reads the leading integer of `raw`, ignoring whatever follows it.
pub fn parse_country_code(raw: &str) -> Result<i64, FormError> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end]
        .parse::<i64>()
        .map(|value| sign * value)
        .map_err(|_| FormError::InvalidCountryCode(raw.to_string()))
}

fn is_date(raw: &str) -> bool {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").is_ok()
}

impl ForecastRequest {
    pub fn collect<F: FormSource + ?Sized>(
        form: &F,
        mode: SalesDataMode,
    ) -> Result<Self, FormError> {
        let field = |id: &str| {
            form.value_of(id)
                .ok_or_else(|| FormError::MissingField(id.to_string()))
        };

        let country_code = parse_country_code(&field(COUNTRY_CODE)?)?;
        let raw_sales = field(SALES_DATA)?;
        let start_date = field(START_DATE)?;

        let sales_data = match mode {
            SalesDataMode::Lenient => parse_sales_data(&raw_sales),
            SalesDataMode::Strict => {
                if !is_date(&start_date) {
                    return Err(FormError::InvalidStartDate(start_date));
                }
                validate_sales_data(&raw_sales)?
            }
        };

        Ok(Self {
            country_code,
            sales_data,
            start_date,
        })
    }
}

/// Turns a non-success status into an error carrying the response body.
pub fn check_status(response: HttpResponse) -> Result<String, PipelineError> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(PipelineError::Status {
            status: response.status,
            status_text: response.status_text,
            body: response.body,
        })
    }
}

/// Predicted means as plain numbers; non-numeric entries become NaN.
pub fn predicted_means(data: &Value) -> Result<Vec<f64>, PipelineError> {
    let means = data
        .get("predicted_means")
        .and_then(Value::as_array)
        .ok_or(PipelineError::MissingField("predicted_means"))?;
    Ok(means
        .iter()
        .map(|v| v.as_f64().unwrap_or(f64::NAN))
        .collect())
}

async fn fetch_forecast<F: FormSource + ?Sized>(
    form: &F,
    mode: SalesDataMode,
    client: &dyn HttpClient,
    url: &str,
) -> Result<Value, PipelineError> {
    let request = ForecastRequest::collect(form, mode)?;
    tracing::debug!(
        country_code = request.country_code,
        points = request.sales_data.len(),
        "Submitting forecast form"
    );
    let body = serde_json::to_string(&request)?;

    let response = client
        .post_json(url, body)
        .await
        .map_err(PipelineError::Transport)?;
    let body = check_status(response)?;
    Ok(serde_json::from_str(&body)?)
}

async fn run<F, P>(
    form: &F,
    mode: SalesDataMode,
    client: &dyn HttpClient,
    page: &mut P,
    url: &str,
) -> Result<Value, PipelineError>
where
    F: FormSource + ?Sized,
    P: DisplaySink + ChartSink + ?Sized,
{
    let data = fetch_forecast(form, mode, client, url).await?;
    page.show_html(
        RESULT,
        &format!("Predicted Sales: {}", serde_json::to_string(&data)?),
    );

    let means = predicted_means(&data)?;
    page.draw_line_chart(CHART, &LineChart::predicted_sales(&means))
        .map_err(PipelineError::Render)?;
    Ok(data)
}

/// Runs the form submission. The response (or the error) is written to
/// `result` and the predicted means are charted on `myChart`.
#[tracing::instrument(skip(form, client, page))]
pub async fn submit<F, P>(
    form: &F,
    mode: SalesDataMode,
    client: &dyn HttpClient,
    page: &mut P,
    url: &str,
) -> Result<Value, PipelineError>
where
    F: FormSource + ?Sized,
    P: DisplaySink + ChartSink + ?Sized,
{
    let result = run(form, mode, client, page, url).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "Forecast failed");
        page.show_html(RESULT, &format!("Error: {e}"));
    }
    result
}
