use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use devops_mcp::adapters::{self, AdapterKind};
use devops_mcp::config::ServerConfig;
use devops_mcp::http::pretty;
use devops_mcp::mcp::{self, McpServer};
use devops_mcp::state::AppState;

#[derive(Parser)]
#[command(name = "devops-mcp", version, about = "MCP adapter servers for DevOps REST APIs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve one adapter over MCP
    Serve {
        adapter: AdapterKind,
        #[arg(long, value_enum, default_value_t = Transport::Stdio)]
        transport: Transport,
        /// HTTP port (defaults to $PORT, then 8081)
        #[arg(long)]
        port: Option<u16>,
        /// HTTP bind address (defaults to $MCP_HOST, then 0.0.0.0)
        #[arg(long)]
        host: Option<String>,
    },
    /// Print an adapter's tool catalogue as JSON
    Tools { adapter: AdapterKind },
    /// Run a single tool and print its output
    Call {
        adapter: AdapterKind,
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// List available adapters
    Adapters,
}

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Stdio,
    Http,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            adapter,
            transport,
            port,
            host,
        } => {
            let server = McpServer::new(adapters::build(adapter)?);
            match transport {
                Transport::Stdio => mcp::stdio::run(server).await,
                Transport::Http => {
                    let mut config = ServerConfig::from_env();
                    if let Some(port) = port {
                        config.port = port;
                    }
                    if let Some(host) = host {
                        config.host = host;
                    }
                    serve_http(server, config).await
                }
            }
        }
        Command::Tools { adapter } => {
            let adapter = adapters::build(adapter)?;
            println!("{}", pretty(&serde_json::Value::Array(adapter.tools())));
            Ok(())
        }
        Command::Call {
            adapter,
            tool,
            args,
        } => {
            let args: serde_json::Value =
                serde_json::from_str(&args).context("--args must be a JSON object")?;
            let adapter = adapters::build(adapter)?;
            let text = adapter.call_tool(&tool, &args).await?;
            println!("{}", text);
            Ok(())
        }
        Command::Adapters => {
            for kind in AdapterKind::ALL {
                println!("{}", kind.as_str());
            }
            Ok(())
        }
    }
}

/// Logs always go to stderr: on the stdio transport stdout is the protocol channel.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    if std::env::var("RUST_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn serve_http(server: McpServer, config: ServerConfig) -> anyhow::Result<()> {
    let adapter_name = server.adapter().name();
    let state = AppState::new(server, config.auth_secret.clone());

    // Rate limiting: 30 req burst, replenish 1 per 2 seconds, per IP
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(30)
        .finish()
        .context("invalid rate limiter configuration")?;

    let app = devops_mcp::create_router(state)
        .layer(GovernorLayer::new(governor_conf))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        );

    let ip: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid bind address {:?}", config.host))?;
    let addr = SocketAddr::new(ip, config.port);

    tracing::info!("{} MCP server listening on http://{}/mcp", adapter_name, addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
