use std::net::SocketAddr;

use clap::Parser;
use dms_mock_server::{router, shared, Fleet};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dms-mock-server", about = "Local replication control plane for testing")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:4566")]
    addr: SocketAddr,
    /// Start with no tasks instead of the three seeded ones.
    #[arg(long, default_value_t = false)]
    empty: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging();

    let fleet = if args.empty {
        Fleet::new()
    } else {
        Fleet::seeded()
    };
    let names: Vec<String> = fleet
        .tasks()
        .iter()
        .map(|task| task.replication_task_identifier.clone())
        .collect();
    let app = router(shared(fleet));

    let listener = match tokio::net::TcpListener::bind(args.addr).await {
        Ok(value) => value,
        Err(err) => {
            error!(event = "mock_error", error = %err, addr = %args.addr);
            return;
        }
    };

    info!(event = "mock_start", addr = %args.addr, tasks = ?names);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(event = "mock_error", error = %err);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
