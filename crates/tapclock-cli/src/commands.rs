//! Subcommand bodies, generic over the reader driver.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tapclock_agent::{Agent, ProgramOutcome};
use tapclock_hardware::ReaderDriver;
use tapclock_network::HttpBackend;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::TapclockConfig;

fn build_agent<D: ReaderDriver>(
    driver: Arc<D>,
    config: TapclockConfig,
) -> Result<Agent<D, HttpBackend>> {
    let chime = config.chime.build();
    let backend = HttpBackend::new(config.backend).context("Failed to build HTTP client")?;
    Ok(Agent::new(driver, Arc::new(backend), chime, config.agent))
}

/// A token cancelled on the first Ctrl-C.
pub fn shutdown_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupt received, shutting down"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
        token.cancel();
    });
    cancel
}

/// Run the agent loop until `cancel` fires.
pub async fn run<D: ReaderDriver>(
    driver: Arc<D>,
    config: TapclockConfig,
    cancel: CancellationToken,
) -> Result<()> {
    info!(backend = ?config.backend, "Starting tapclock agent");
    let mut agent = build_agent(driver, config)?;
    agent.run(cancel).await?;
    Ok(())
}

/// Program `data` onto the next presented card and exit.
pub async fn program<D: ReaderDriver>(
    driver: Arc<D>,
    config: TapclockConfig,
    data: &str,
    cancel: CancellationToken,
) -> Result<()> {
    let deadline_secs = config.agent.program_deadline().as_secs();
    let mut agent = build_agent(driver, config)?;

    match agent.program_once(data, &cancel).await? {
        ProgramOutcome::Written { key } => {
            info!(data, %key, "Card programmed");
            Ok(())
        }
        ProgramOutcome::TimedOut => bail!("No card was programmed within {deadline_secs}s"),
    }
}

/// Print the attached readers, one per line.
pub async fn readers<D: ReaderDriver>(driver: Arc<D>) -> Result<()> {
    let readers = driver.list_readers().await.context("Failed to list readers")?;
    if readers.is_empty() {
        warn!("No card readers attached");
    }
    for reader in readers {
        println!("{reader}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapclock_hardware::mock::{MockCard, MockReader};

    #[tokio::test]
    async fn test_program_writes_presented_card() {
        let (driver, reader) = MockReader::new();
        reader.insert_card(MockCard::blank());

        program(
            Arc::new(driver),
            TapclockConfig::default(),
            "grace",
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(reader.card_payload().unwrap().identity, "grace");
        assert_eq!(reader.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_program_cancelled() {
        let (driver, _reader) = MockReader::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = program(Arc::new(driver), TapclockConfig::default(), "grace", cancel)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_readers_without_readers() {
        let (driver, reader) = MockReader::new();
        reader.unplug_reader();

        readers(Arc::new(driver)).await.unwrap();
    }
}
