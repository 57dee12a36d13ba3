use clap::Parser;
use env_logger::Env;
use log::{error, info};
use server::{GameServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    let mut server = GameServer::new(config);
    let listener = server.bind().await?;

    let trigger = server.shutdown_trigger();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down gracefully...");
                trigger.fire();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run(listener).await;
    server.shutdown().await;
    Ok(())
}
