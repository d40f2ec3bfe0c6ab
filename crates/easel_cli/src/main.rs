//! Easel CLI
//!
//! Replays a call script through a batched context proxy bound to a recording channel and
//! prints what crossed the channel at each step.

mod script;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use easel_canvas::{create_canvas_2d, create_webgl, Canvas2dContext, WebGlVersion};
use easel_core::{BatchedContextProxy, ContextHandle, ProxyConfig, RecordingChannel};
use script::{load_script, run_script, StepReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "easel")]
#[command(about = "Replay drawing-context call scripts against a simulated host")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a JSON call script
    Run {
        /// Script file (JSON array of steps)
        script: PathBuf,

        /// Proxy configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Kind of context to drive
        #[arg(long, value_enum, default_value_t = ContextKind::Canvas2d)]
        context: ContextKind,

        /// Surface handle id
        #[arg(long, default_value = "surface-0")]
        surface: String,

        /// Log filter, e.g. `debug` or `easel_core=trace` (overrides RUST_LOG)
        #[arg(long)]
        log: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ContextKind {
    Canvas2d,
    Webgl,
    Webgl2,
}

/// Keeps whichever context owns the proxy alive for the run.
enum Surface {
    Canvas(Canvas2dContext),
    Gl(BatchedContextProxy),
}

impl Surface {
    fn proxy(&self) -> &BatchedContextProxy {
        match self {
            Surface::Canvas(canvas) => canvas.proxy(),
            Surface::Gl(proxy) => proxy,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            config,
            context,
            surface,
            log,
        } => {
            init_logging(log.as_deref())?;
            run(&script, config.as_deref(), context, surface).await
        }
    }
}

fn init_logging(filter: Option<&str>) -> Result<()> {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid log filter: {directives}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn run(
    script: &Path,
    config: Option<&Path>,
    context: ContextKind,
    surface: String,
) -> Result<()> {
    let steps = load_script(script)?;
    let config = match config {
        Some(path) => ProxyConfig::load(path)?,
        None => ProxyConfig::default(),
    };
    tracing::info!("running {} step(s) from {}", steps.len(), script.display());

    let channel = Arc::new(RecordingChannel::new());
    let handle = ContextHandle::new(surface);
    let surface = match context {
        ContextKind::Canvas2d => {
            Surface::Canvas(create_canvas_2d(handle, channel.clone(), config).await?)
        }
        ContextKind::Webgl | ContextKind::Webgl2 => {
            let version = if context == ContextKind::Webgl2 {
                WebGlVersion::WebGl2
            } else {
                WebGlVersion::WebGl1
            };
            Surface::Gl(create_webgl(handle, channel.clone(), config, version, None).await?)
        }
    };

    println!("setup");
    for call in channel.calls() {
        println!("  -> {} {}", call.path, serde_json::Value::Array(call.args));
    }

    let reports = run_script(surface.proxy(), &channel, &steps).await;
    let failed = reports.iter().filter(|r| r.outcome.is_err()).count();
    for (index, report) in reports.iter().enumerate() {
        print_report(index, report);
    }

    surface.proxy().dispose_async().await;
    if failed > 0 {
        anyhow::bail!("{failed} of {} step(s) failed", reports.len());
    }
    Ok(())
}

fn print_report(index: usize, report: &StepReport) {
    println!("[{index}] {}", report.step);
    for call in &report.transmissions {
        println!(
            "  -> {} {}",
            call.path,
            serde_json::Value::Array(call.args.clone())
        );
    }
    match &report.outcome {
        Ok(Some(value)) => println!("  <- {value}"),
        Ok(None) => {}
        Err(err) => println!("  !! {err}"),
    }
}
