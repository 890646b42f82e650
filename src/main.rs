//! switchyard demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ axum + tower-http layers ──▶ dispatch ──▶ worker pool
//!                                                                   │
//!                                                                   ▼
//!     Client Response                                   Router::handle(&mut Context)
//!     ◀────────────── oneshot / stream channel ◀──────── route pipeline + renderer
//! ```
//!
//! Configuration comes from an optional TOML file, with `--port` and
//! `--log-level` taking precedence.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tokio::net::TcpListener;

use switchyard::config::{load_config, AppConfig};
use switchyard::context::{Context, MediaType, Output};
use switchyard::lifecycle::shutdown_signal;
use switchyard::observability::{logging::init_logging, metrics::init_metrics};
use switchyard::{HttpServer, Router};

#[derive(Parser, Debug)]
#[command(name = "switchyard", version, about = "switchyard demo HTTP server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configuration.
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level, overriding the configuration.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Serialize)]
struct Greeting<'a> {
    message: String,
    remote: String,
    request_path: &'a str,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "switchyard starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let router = demo_router(&config)?;
    tracing::info!(
        routes = router.routes().len(),
        context_path = %router.context_path(),
        "Routes compiled"
    );

    let listener = TcpListener::bind(config.server.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config.server);
    server.run(router, listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_router(config: &AppConfig) -> switchyard::Result<Router> {
    let mut routes = Router::builder();
    routes.with_config(&config.router);

    routes.after(|ctx, _output| ctx.set_header("x-powered-by", "switchyard"));

    routes.get("/", |_| Ok("switchyard is running"));

    routes.get("/hello/{name}", |ctx| {
        let greeting = Greeting {
            message: format!("hello {}", ctx.path_param("name")?),
            remote: ctx.remote_address(),
            request_path: ctx.path(),
        };
        Output::json(&greeting)
    });

    routes.post("/echo", |ctx| {
        let media = ctx.content_type().unwrap_or_else(MediaType::octet_stream);
        ctx.set_response_type(&media)?;
        Ok(Output::Bytes(ctx.body().bytes().clone()))
    });

    routes.get("/count/{n:[0-9]+}", |ctx| {
        let n: usize = ctx.path_map().value("n")?;
        let mut sender = ctx.sender()?;
        for i in 0..n {
            sender.write(format!("{}\n", i).into())?;
        }
        sender.close();
        Ok(())
    });

    routes.build()
}
