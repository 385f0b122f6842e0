use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use verisight_common::observability::{LogConfig, LogFormat, init_logging};
use verisight_config::{VerisightConfig, VerisightConfigLoader, default_config_path};
use verisight_runtime::{VerisightHandle, VerisightRuntime};

mod app;
mod state;

/// Forensic gateway: media integrity and claim verification over HTTP.
#[derive(Debug, Parser)]
#[command(name = "verisight", version, about)]
struct Cli {
    /// YAML config file (defaults to ./verisight.yaml when present).
    #[arg(long, env = "VERISIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding `server.bind`.
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// `text` or `json`, overriding `logging.format`.
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    #[arg(long, env = "VERISIGHT_WORKER_THREADS")]
    worker_threads: Option<usize>,
}

fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    match raw.to_ascii_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format {other:?} (expected text or json)")),
    }
}

fn load_config(cli: &Cli) -> Result<VerisightConfig> {
    let loader = VerisightConfigLoader::new();
    let loader = match cli.config.clone().or_else(default_config_path) {
        Some(path) => loader.with_file(path),
        None => loader,
    };
    let mut cfg = loader.load().context("loading configuration")?;
    if let Some(bind) = cli.bind {
        cfg.server.bind = bind;
    }
    if let Some(format) = cli.log_format {
        cfg.logging.format = format;
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    let log_path = init_logging(LogConfig {
        app_name: "verisight",
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
    })?;
    tracing::info!(log_dir = %log_path.display(), "verisight.start");

    cfg.validate().context("invalid configuration")?;

    let runtime = VerisightRuntime::build("verisight-worker", cli.worker_threads)?;
    let result = runtime.block_on(serve(cfg, runtime.handle()));
    runtime.shutdown(Duration::from_secs(5));
    result
}

async fn serve(cfg: VerisightConfig, handle: VerisightHandle) -> Result<()> {
    let state = state::build_state(&cfg).await?;
    let router = app::build_router(state, cfg.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    tracing::info!(addr = %cfg.server.bind, "server.listening");

    handle.cancel_on_ctrl_c();
    axum::serve(listener, router)
        .with_graceful_shutdown(handle.shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("server.stopped");
    Ok(())
}
