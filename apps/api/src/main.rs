mod config;
mod errors;
mod llm_client;
mod routes;
mod state;
mod triage;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::triage::compensation::{ExpectedRangeEstimator, LlmSalaryEstimator, SalaryEstimator};
use crate::triage::notifier::{LogNotifier, RejectionNotifier, SmtpNotifier};
use crate::triage::pipeline::{PipelineSettings, TriagePipeline};
use crate::triage::scorer::LlmAnalysisClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResumeRank API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Rejection notices: SMTP when configured, log-only otherwise
    let notifier: Arc<dyn RejectionNotifier> = match config.smtp.clone() {
        Some(smtp) => {
            info!("Rejection notices via SMTP relay {}", smtp.server);
            Arc::new(SmtpNotifier::new(smtp)?)
        }
        None => {
            info!("SMTP not configured; rejection notices are logged only");
            Arc::new(LogNotifier)
        }
    };

    // Salary suggestions (ExpectedRangeEstimator by default, swap via ENABLE_LLM_SALARY_ESTIMATION)
    let estimator: Arc<dyn SalaryEstimator> = if config.enable_llm_salary_estimation {
        Arc::new(LlmSalaryEstimator(llm.clone()))
    } else {
        Arc::new(ExpectedRangeEstimator)
    };

    let settings = PipelineSettings::from_config(&config);
    info!(
        "Pipeline limits: {} analyses, {} dispatches in flight; dispatch timeout {:?}, run timeout {:?}",
        settings.max_concurrent_analyses,
        settings.max_concurrent_dispatches,
        settings.dispatch_timeout,
        config.run_timeout
    );
    let pipeline = TriagePipeline::new(
        Arc::new(LlmAnalysisClient(llm)),
        notifier,
        estimator,
        settings,
    );

    // Build app state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
