use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use parking_lot::RwLock;
use tokio::net::TcpListener;
use tracing::{info, warn};

use pipervox_app::models::scan_models;
use pipervox_app::server::{router, ServiceState};
use pipervox_app::settings::{auto_thread_count, detected_cpu_cores, Settings};
use pipervox_queue::{clamp_capacity, TaskQueue};
use pipervox_tts::{SynthesisOrchestrator, TtsEngine};
use pipervox_tts_piper::PiperEngine;

#[derive(Debug, Parser)]
#[command(name = "pipervox", version, about = "Parallel Piper text-to-speech server")]
struct Cli {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Maximum accepted text length in bytes (0 disables the limit)
    #[arg(long, env = "MAX_TEXT", default_value_t = 0)]
    max_text: usize,

    /// Directory scanned for voice models; repeatable. Defaults to
    /// ./models and ~/Documents/onnx-tts.
    #[arg(long = "models-dir", env = "MODELS_DIR")]
    models_dirs: Vec<PathBuf>,

    /// Path to the piper executable
    #[arg(long, env = "PIPER_BIN", default_value = "piper/piper")]
    piper_bin: PathBuf,

    /// Directory holding piper's shared libraries, prepended to
    /// LD_LIBRARY_PATH for every synthesis process
    #[arg(long, env = "PIPER_LIB_DIR")]
    piper_lib_dir: Option<PathBuf>,

    /// Concurrency cap override (clamped to 1-32); when absent the cap
    /// is auto-detected as twice the CPU count
    #[arg(long, env = "MAX_CONCURRENT")]
    max_concurrent: Option<usize>,

    /// Per-sentence synthesis deadline in seconds
    #[arg(long, env = "TASK_TIMEOUT_SECS", default_value_t = 120)]
    task_timeout_secs: u64,
}

fn init_logging() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn default_model_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("models")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join("Documents").join("onnx-tts"));
    }
    paths
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let cpu_cores = detected_cpu_cores();
    info!(cpu_cores, "starting pipervox server");

    let (capacity, auto_detect) = match cli.max_concurrent {
        Some(requested) => (clamp_capacity(requested), false),
        None => (auto_thread_count(cpu_cores), true),
    };
    let queue = Arc::new(TaskQueue::new(capacity));

    let mut engine = PiperEngine::new(&cli.piper_bin);
    if let Some(dir) = &cli.piper_lib_dir {
        engine = engine.with_library_dir(dir);
    }
    let engine = Arc::new(engine);
    if engine.is_available().await {
        info!(binary = %cli.piper_bin.display(), "piper executable found");
    } else {
        warn!(binary = %cli.piper_bin.display(), "piper executable not found, synthesis will fail");
    }

    let orchestrator = SynthesisOrchestrator::new(queue.clone(), engine)
        .with_task_timeout(Duration::from_secs(cli.task_timeout_secs.max(1)));

    let model_paths = if cli.models_dirs.is_empty() {
        default_model_paths()
    } else {
        cli.models_dirs.clone()
    };
    let models = scan_models(&model_paths);

    let state = Arc::new(ServiceState {
        models: RwLock::new(models),
        model_paths: RwLock::new(model_paths),
        settings: RwLock::new(Settings {
            max_threads: capacity,
            auto_detect,
        }),
        queue,
        orchestrator,
        max_text: cli.max_text,
        cpu_cores,
    });

    let app = router(state);
    let listener = bind_with_fallback(&cli.host, cli.port).await?;
    let addr = listener.local_addr().context("listener has no address")?;
    info!("pipervox listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("server stopped");
    Ok(())
}

/// Bind the requested port, falling back to random high ports when it
/// is already taken.
async fn bind_with_fallback(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    match TcpListener::bind((host, port)).await {
        Ok(listener) => Ok(listener),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            warn!(port, "port in use, trying random ports");
            for _ in 0..10 {
                let candidate = 3001 + fastrand::u16(0..6998);
                if let Ok(listener) = TcpListener::bind((host, candidate)).await {
                    return Ok(listener);
                }
                warn!(port = candidate, "port in use, trying another");
            }
            anyhow::bail!("no available ports found after 10 attempts")
        }
        Err(e) => Err(e).with_context(|| format!("failed to bind {host}:{port}")),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received, draining");
}
