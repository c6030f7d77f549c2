use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::forecast::SalesDataMode;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Host the forecast and regression handlers over HTTP
    Serve(ServeConfig),
    /// Submit the housing regression form
    Predict(PredictConfig),
    /// Submit the sales forecast form
    Forecast(ForecastConfig),
}

#[derive(Debug, Clone, Args)]
pub struct ServeConfig {
    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port to bind to
    #[arg(long, env = "PORT", default_value = "8000")]
    pub port: u16,

    /// Base URL of the hosted model runtime
    #[arg(
        long,
        env = "MODEL_RUNTIME_URL",
        default_value = "https://runtime.sagemaker.us-east-1.amazonaws.com"
    )]
    pub model_runtime_url: String,

    /// Name of the deployed forecasting model endpoint
    #[arg(long, env = "FORECAST_ENDPOINT_NAME", default_value = "online-retail-endpoint-cat")]
    pub forecast_endpoint: String,

    /// Name of the deployed regression model endpoint
    #[arg(
        long,
        env = "REGRESSION_ENDPOINT_NAME",
        default_value = "regression-linear-learner-endpoint"
    )]
    pub regression_endpoint: String,
}

impl ServeConfig {
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Args)]
pub struct PredictConfig {
    /// Regression API endpoint
    #[arg(
        long,
        env = "REGRESSION_API_URL",
        default_value = "https://nhuihvwng2.execute-api.us-east-1.amazonaws.com/prod/predict"
    )]
    pub api_url: String,

    #[command(flatten)]
    pub features: FeatureArgs,
}

/// One flag per form field. Values are forwarded as typed, without numeric checks.
#[derive(Debug, Clone, Default, Args)]
pub struct FeatureArgs {
    /// Per capita crime rate
    #[arg(long)]
    pub crim: Option<String>,
    /// Share of residential land zoned for large lots
    #[arg(long)]
    pub zn: Option<String>,
    /// Share of non-retail business acres
    #[arg(long)]
    pub indus: Option<String>,
    /// Charles River dummy (1 if the tract bounds the river)
    #[arg(long)]
    pub chas: Option<String>,
    /// Nitric oxide concentration
    #[arg(long)]
    pub nox: Option<String>,
    /// Average number of rooms per dwelling
    #[arg(long)]
    pub rm: Option<String>,
    /// Share of owner-occupied units built before 1940
    #[arg(long)]
    pub age: Option<String>,
    /// Weighted distance to employment centres
    #[arg(long)]
    pub dis: Option<String>,
    /// Index of accessibility to radial highways
    #[arg(long)]
    pub rad: Option<String>,
    /// Property tax rate per $10,000
    #[arg(long)]
    pub tax: Option<String>,
    /// Pupil-teacher ratio
    #[arg(long)]
    pub ptratio: Option<String>,
    /// Proportion of Black residents, as encoded in the dataset
    #[arg(long)]
    pub b: Option<String>,
    /// Share of lower-status population
    #[arg(long)]
    pub lstat: Option<String>,
}

impl FeatureArgs {
    pub fn pairs(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("crim", self.crim.clone()),
            ("zn", self.zn.clone()),
            ("indus", self.indus.clone()),
            ("chas", self.chas.clone()),
            ("nox", self.nox.clone()),
            ("rm", self.rm.clone()),
            ("age", self.age.clone()),
            ("dis", self.dis.clone()),
            ("rad", self.rad.clone()),
            ("tax", self.tax.clone()),
            ("ptratio", self.ptratio.clone()),
            ("b", self.b.clone()),
            ("lstat", self.lstat.clone()),
        ]
    }
}

#[derive(Debug, Clone, Args)]
pub struct ForecastConfig {
    /// Forecast API endpoint
    #[arg(
        long,
        env = "FORECAST_API_URL",
        default_value = "https://m3ge077ly9.execute-api.us-east-1.amazonaws.com/prod/predictions"
    )]
    pub api_url: String,

    /// Country category code
    #[arg(long)]
    pub country_code: Option<String>,

    /// Comma separated sales history, e.g. "10,20,30"
    #[arg(long)]
    pub sales_data: Option<String>,

    /// First timestamp of the sales history
    #[arg(long)]
    pub start_date: Option<String>,

    /// Coerce malformed sales values to NaN instead of rejecting them
    #[arg(long)]
    pub lenient: bool,

    /// Write the chart configuration to this file
    #[arg(long)]
    pub chart_out: Option<PathBuf>,
}

impl ForecastConfig {
    pub fn sales_data_mode(&self) -> SalesDataMode {
        if self.lenient {
            SalesDataMode::Lenient
        } else {
            SalesDataMode::Strict
        }
    }
}
