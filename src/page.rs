//! The page a pipeline reads its form from and writes its results to.
//!
//! Pipelines never touch a concrete page; they receive a [`FormSource`] for
//! input and [`DisplaySink`] / [`ChartSink`] implementations for output.

use anyhow::Result;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;

pub const PREDICTION_RESULT: &str = "predictionResult";
pub const RESULT: &str = "result";
pub const CHART: &str = "myChart";

pub const COUNTRY_CODE: &str = "countryCode";
pub const SALES_DATA: &str = "salesData";
pub const START_DATE: &str = "startDate";

pub trait FormSource {
    fn value_of(&self, id: &str) -> Option<String>;
}

pub trait DisplaySink {
    /// Replace the element's text content.
    fn show_text(&mut self, id: &str, text: &str);
    /// Replace the element's markup.
    fn show_html(&mut self, id: &str, html: &str);
}

pub trait ChartSink {
    fn draw_line_chart(&mut self, id: &str, chart: &LineChart) -> Result<()>;
}

/// Form values held in memory, keyed by element id.
#[derive(Debug, Clone, Default)]
pub struct FormValues {
    values: HashMap<String, String>,
}

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, value: impl Into<String>) -> Self {
        self.values.insert(id.to_string(), value.into());
        self
    }
}

impl FormSource for FormValues {
    fn value_of(&self, id: &str) -> Option<String> {
        self.values.get(id).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Line chart over a forecast, labelled by 1-based step.
#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub labels: Vec<usize>,
    pub label: String,
    pub data: Vec<f64>,
    pub background_color: String,
    pub border_color: String,
    pub border_width: u32,
    pub begin_at_zero: bool,
}

impl LineChart {
    pub fn predicted_sales(means: &[f64]) -> Self {
        Self {
            labels: (1..=means.len()).collect(),
            label: "Predicted Sales".to_string(),
            data: means.to_vec(),
            background_color: "rgba(255, 99, 132, 0.2)".to_string(),
            border_color: "rgba(255, 99, 132, 1)".to_string(),
            border_width: 1,
            begin_at_zero: true,
        }
    }

    /// Chart.js configuration for this chart.
    pub fn to_chartjs(&self) -> Value {
        json!({
            "type": "line",
            "data": {
                "labels": self.labels,
                "datasets": [{
                    "label": self.label,
                    "data": self.data,
                    "backgroundColor": self.background_color,
                    "borderColor": self.border_color,
                    "borderWidth": self.border_width,
                }]
            },
            "options": {
                "scales": {
                    "y": { "beginAtZero": self.begin_at_zero }
                }
            }
        })
    }
}

/// Prints results to stdout; charts go to `chart_out` when set.
#[derive(Debug, Default)]
pub struct TerminalPage {
    chart_out: Option<PathBuf>,
}

impl TerminalPage {
    pub fn new(chart_out: Option<PathBuf>) -> Self {
        Self { chart_out }
    }
}

impl DisplaySink for TerminalPage {
    fn show_text(&mut self, id: &str, text: &str) {
        tracing::debug!(element = id, "Updating text");
        println!("{text}");
    }

    fn show_html(&mut self, id: &str, html: &str) {
        tracing::debug!(element = id, "Updating markup");
        println!("{html}");
    }
}

impl ChartSink for TerminalPage {
    fn draw_line_chart(&mut self, id: &str, chart: &LineChart) -> Result<()> {
        match &self.chart_out {
            Some(path) => {
                let config = serde_json::to_string_pretty(&chart.to_chartjs())?;
                std::fs::write(path, config)?;
                tracing::info!(
                    element = id,
                    path = %path.display(),
                    points = chart.data.len(),
                    "Chart written"
                );
            }
            None => {
                tracing::info!(
                    element = id,
                    points = chart.data.len(),
                    "No chart output configured, skipping chart"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_is_keyed_by_one_based_position() {
        let chart = LineChart::predicted_sales(&[4.0, 5.5, 6.0]);
        assert_eq!(chart.labels, vec![1, 2, 3]);

        let config = chart.to_chartjs();
        assert_eq!(config["type"], "line");
        assert_eq!(config["data"]["labels"], json!([1, 2, 3]));
        assert_eq!(config["data"]["datasets"][0]["label"], "Predicted Sales");
        assert_eq!(config["data"]["datasets"][0]["data"], json!([4.0, 5.5, 6.0]));
        assert_eq!(config["options"]["scales"]["y"]["beginAtZero"], true);
    }

    #[test]
    fn empty_forecast_yields_empty_chart() {
        let chart = LineChart::predicted_sales(&[]);
        assert!(chart.labels.is_empty());
        assert!(chart.data.is_empty());
    }

    #[test]
    fn terminal_page_writes_chart_file() {
        let path = std::env::temp_dir()
            .join(format!("sagecast-chart-{}.json", uuid::Uuid::new_v4()));
        let mut page = TerminalPage::new(Some(path.clone()));
        page.draw_line_chart(CHART, &LineChart::predicted_sales(&[1.0, 2.0]))
            .unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["data"]["labels"], json!([1, 2]));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn form_values_lookup() {
        let form: FormValues = [("crim", "0.1"), (COUNTRY_CODE, "7")].into_iter().collect();
        assert_eq!(form.value_of("crim").as_deref(), Some("0.1"));
        assert_eq!(form.value_of(COUNTRY_CODE).as_deref(), Some("7"));
        assert_eq!(form.value_of("zn"), None);
    }
}
