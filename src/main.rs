use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use riptide::server::RedisServer;

/// Parses the invocation options, boots the server, and runs it until the
/// process is terminated. Exits non-zero only on fatal initialization
/// failures (bad options, bind failure, snapshot decode failure).
#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let server = match RedisServer::new(std::env::args()) {
        Ok(server) => server,
        Err(cli_error) => {
            error!(%cli_error, "invalid invocation");
            std::process::exit(1);
        }
    };

    if let Err(init_error) = server.run().await {
        error!(%init_error, "fatal initialization failure");
        std::process::exit(1);
    }
}
