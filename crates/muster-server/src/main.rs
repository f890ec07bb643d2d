use anyhow::Context;
use muster_server::{
    client,
    config::ServerConfig,
    lobby::{self, localization::Catalog, stations::StationList, timing::ServerTiming, LobbyServices},
    state::ServerState,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Server Version: {}", muster_server::VERSION);

    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    let services = LobbyServices::new(
        StationList::from_names(config.stations),
        Catalog::english(),
        ServerTiming::new(),
    );
    let state = ServerState::new(lobby::start_lobby(config.lobby, services));

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!("Listening on port {}", config.port);

    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                tracing::debug!(%addr, "Accepted connection");
                tokio::spawn(client::handle_new_connection(state.clone(), socket));
            }
            Err(e) => tracing::error!(%e, "Failed to accept connection"),
        }
    }
}
