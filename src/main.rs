mod config;
mod error;
mod forecast;
mod handlers;
mod http;
mod invoker;
mod page;
mod regression;
mod server;
mod types;

use axum::routing::get;
use axum_prometheus::PrometheusMetricLayer;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use config::{Command, Config, ForecastConfig, LogFormat, PredictConfig, ServeConfig};
use http::ReqwestClient;
use invoker::HttpModelInvoker;
use page::{COUNTRY_CODE, FormValues, SALES_DATA, START_DATE, TerminalPage};
use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Config::parse();
    init_tracing(config.log_format);

    // Form submissions report their own failures on the page.
    match config.command {
        Command::Serve(serve) => run_server(serve).await.map(|()| ExitCode::SUCCESS),
        Command::Predict(predict) => Ok(run_predict(predict).await),
        Command::Forecast(forecast) => Ok(run_forecast(forecast).await),
    }
}

fn exit_code<T, E>(result: Result<T, E>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sagecast=debug".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_server(config: ServeConfig) -> anyhow::Result<()> {
    tracing::info!("Starting prediction functions with config: {:?}", config);

    let invoker = Arc::new(HttpModelInvoker::new(config.model_runtime_url.clone()));
    let state = AppState::new(
        invoker,
        &config.forecast_endpoint,
        &config.regression_endpoint,
    );

    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    let app = server::router(state)
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&config.server_address()).await?;
    tracing::info!("Server running on http://{}", config.server_address());
    tracing::info!(
        "Forecast endpoint: {}, regression endpoint: {}",
        config.forecast_endpoint,
        config.regression_endpoint
    );

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_predict(config: PredictConfig) -> ExitCode {
    let form: FormValues = config
        .features
        .pairs()
        .into_iter()
        .filter_map(|(id, value)| value.map(|value| (id, value)))
        .collect();

    let mut page = TerminalPage::default();
    let result = regression::submit(&form, &ReqwestClient::new(), &mut page, &config.api_url).await;
    exit_code(result)
}

async fn run_forecast(config: ForecastConfig) -> ExitCode {
    let form = [
        (COUNTRY_CODE, config.country_code.clone()),
        (SALES_DATA, config.sales_data.clone()),
        (START_DATE, config.start_date.clone()),
    ]
    .into_iter()
    .fold(FormValues::new(), |form, (id, value)| match value {
        Some(value) => form.with(id, value),
        None => form,
    });

    let mut page = TerminalPage::new(config.chart_out.clone());
    let result = forecast::submit(
        &form,
        config.sales_data_mode(),
        &ReqwestClient::new(),
        &mut page,
        &config.api_url,
    )
    .await;
    exit_code(result)
}
