use tracing_subscriber::EnvFilter;

use laserdash_host::config::HostConfig;
use laserdash_host::{SessionBroadcast, SessionCommand, SessionConfig, spawn_race_session};
use laserdash_race::config::RaceConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let host = HostConfig::load();
    let problems = host.validate();
    if !problems.is_empty() {
        for problem in &problems {
            tracing::error!("{problem}");
        }
        std::process::exit(1);
    }

    tracing::info!(tick_rate = host.tick_rate_hz, "laserdash host starting");
    let config = SessionConfig {
        host,
        race: RaceConfig::load(),
    };
    let (cmd_tx, mut broadcast_rx, handle) = spawn_race_session(config, Vec::new());

    loop {
        tokio::select! {
            b = broadcast_rx.recv() => match b {
                Some(SessionBroadcast::EncodedMessage(data)) => {
                    tracing::trace!(bytes = data.len(), "broadcast");
                },
                Some(SessionBroadcast::SessionEnded) | None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                let _ = cmd_tx.send(SessionCommand::Stop);
            }
        }
    }
    let _ = handle.await;
}
