//! queuescope - admin front-end for SQS queues
//!
//! Lists, creates and deletes queues, sends messages, and browses queue
//! contents without consuming them.

use clap::Parser;
use queuescope::{create_router, AppState, Backend, Config};
use queuescope_sqs::{Inspector, MemoryTransport, QueueTransport, SqsTransport};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "queuescope")]
#[command(about = "Admin front-end for SQS queues", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "QUEUESCOPE_PORT")]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "QUEUESCOPE_HOST")]
    host: Option<String>,

    /// Queue service to use
    #[arg(long, value_enum, env = "QUEUESCOPE_BACKEND")]
    backend: Option<Backend>,

    /// AWS region (defaults to the standard AWS environment)
    #[arg(long, env = "QUEUESCOPE_REGION")]
    region: Option<String>,

    /// Custom SQS endpoint, e.g. http://localhost:4566 for LocalStack
    #[arg(long, env = "QUEUESCOPE_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Configuration file (defaults to ./queuescope.toml if present)
    #[arg(short, long, env = "QUEUESCOPE_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "QUEUESCOPE_LOG_LEVEL")]
    log_level: String,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if self.region.is_some() {
            config.aws.region = self.region;
        }
        if self.endpoint_url.is_some() {
            config.aws.endpoint_url = self.endpoint_url;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "queuescope={level},queuescope_sqs={level},tower_http=debug",
                    level = args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let transport: Arc<dyn QueueTransport> = match config.backend {
        Backend::Aws => Arc::new(
            SqsTransport::from_env(config.aws.region.clone(), config.aws.endpoint_url.clone())
                .await,
        ),
        Backend::Memory => Arc::new(MemoryTransport::new(format!(
            "http://localhost:{}",
            config.server.port
        ))),
    };

    info!("Starting queuescope...");
    info!("  Backend: {:?}", config.backend);
    if let Some(endpoint) = &config.aws.endpoint_url {
        info!("  Endpoint: {}", endpoint);
    }

    let inspector = Inspector::new(transport)
        .with_peek_policy(config.peek.clone())
        .with_refetch_policy(config.refetch.clone())
        .with_limits(config.limits);
    let state = AppState::new(inspector, config.server.request_timeout());

    // Create router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
