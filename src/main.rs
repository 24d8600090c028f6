use anyhow::Context;
use axum::{routing::get, Json, Router};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tickit_inference::{
    config::Config,
    metrics,
    ml::RiskRequest,
    recommend::RecommendationRequest,
    InferenceRuntime,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tickit-inference")]
#[command(about = "Resolution recommendation and SLA breach risk for incident tickets", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Warm up both models and serve metrics until Ctrl-C
    Serve {
        /// Address for the /metrics and /status endpoints
        #[arg(long, default_value = "127.0.0.1:9090")]
        metrics_addr: SocketAddr,
    },

    /// Recommend past resolutions for a ticket description
    Recommend {
        #[arg(short, long)]
        description: String,

        #[arg(short, long)]
        category: Option<String>,

        #[arg(short = 'n', long)]
        top_n: Option<usize>,
    },

    /// Score a ticket for SLA breach risk
    Risk {
        #[arg(short, long)]
        priority: String,

        #[arg(short, long)]
        category: String,

        /// Hours the ticket has been open
        #[arg(short = 'o', long)]
        open_hours: f64,
    },

    /// Rebuild model artifacts and persist them
    Rebuild {
        #[arg(short, long, value_enum, default_value = "all")]
        target: RebuildTarget,
    },

    /// Show lifecycle status of both models
    Status {
        /// Load or build the models before reporting
        #[arg(short, long)]
        warm: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RebuildTarget {
    Recommend,
    Risk,
    All,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    init_tracing(&config);

    if config.observability.prometheus_enabled {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
        }
    }

    tracing::info!(
        service = %config.observability.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting tickit-inference"
    );

    let runtime = Arc::new(InferenceRuntime::from_config(&config)?);

    match cli.command {
        Commands::Serve { metrics_addr } => serve(runtime, metrics_addr).await?,

        Commands::Recommend {
            description,
            category,
            top_n,
        } => {
            let service = runtime.recommendations();
            service.initialize().await?;

            let mut request = RecommendationRequest::new(description);
            if let Some(category) = category {
                request = request.with_category(category);
            }
            if let Some(top_n) = top_n {
                request = request.with_top_n(top_n);
            }

            print_json(&service.recommend_resolution(request).await?)?;
        }

        Commands::Risk {
            priority,
            category,
            open_hours,
        } => {
            let service = runtime.risk();
            service.initialize().await?;

            let prediction = service
                .predict_sla_risk(RiskRequest::new(priority, category, open_hours))
                .await?;
            print_json(&prediction)?;
        }

        Commands::Rebuild { target } => {
            if matches!(target, RebuildTarget::Recommend | RebuildTarget::All) {
                runtime.recommendations().rebuild().await?;
            }
            if matches!(target, RebuildTarget::Risk | RebuildTarget::All) {
                runtime.risk().rebuild().await?;
            }
            print_json(&runtime.status())?;
        }

        Commands::Status { warm } => {
            if warm {
                let (recommend, risk) = runtime.warm_up().await;
                if let Err(e) = recommend {
                    tracing::warn!(error = %e, "Recommender not ready");
                }
                if let Err(e) = risk {
                    tracing::warn!(error = %e, "Risk model not ready");
                }
            }
            print_json(&runtime.status())?;
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("tickit_inference={}", config.observability.log_level))
    });

    // stdout carries command output, so logs go to stderr
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(runtime: Arc<InferenceRuntime>, addr: SocketAddr) -> anyhow::Result<()> {
    let warmups = runtime.start();

    let status_runtime = Arc::clone(&runtime);
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(|| async { metrics::gather_metrics() }))
        .route(
            "/status",
            get(move || {
                let runtime = Arc::clone(&status_runtime);
                async move { Json(runtime.status()) }
            }),
        );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "Serving /metrics and /status");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    for handle in warmups {
        handle.abort();
    }

    print_json(&runtime.status())?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
