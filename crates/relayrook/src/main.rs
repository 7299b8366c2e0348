//! Server binary: parse flags, install logging, run until terminated.

use relayrook::{RelayServer, ServerConfig, ServerError};

fn usage() -> ! {
    eprintln!("usage: relayrook [--config FILE] [--host HOST] [--port PORT]");
    std::process::exit(2);
}

/// Flags are applied in order, so `--config server.json --port 9000`
/// loads the file and then overrides its port.
fn parse_args() -> Result<ServerConfig, ServerError> {
    let mut config = ServerConfig::default();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else { usage() };
                config = ServerConfig::from_file(path)?;
            }
            "--host" => {
                let Some(host) = args.next() else { usage() };
                config.host = host;
            }
            "--port" => {
                let Some(port) = args.next() else { usage() };
                match port.parse() {
                    Ok(port) => config.port = port,
                    Err(_) => usage(),
                }
            }
            _ => usage(),
        }
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = parse_args()?;
    let server = RelayServer::builder().config(config).build().await?;
    server.run().await
}
