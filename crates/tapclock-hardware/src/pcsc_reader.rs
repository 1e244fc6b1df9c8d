//! PC/SC reader driver.
//!
//! Thin adapter from the system smart-card service (pcsclite on Linux and
//! macOS, WinSCard on Windows) to [`ReaderDriver`]. Each call is a short
//! synchronous exchange with the service; presence checks use a zero
//! timeout so they never wait for a card.

use std::ffi::CString;
use std::time::Duration;

use pcsc::{Card, Context, Disposition, Protocols, ReaderState, Scope, ShareMode, State};
use tracing::debug;

use crate::{
    HardwareError, Result,
    traits::{CardChannel, ReaderDriver},
};

/// Reader driver backed by the system PC/SC service.
pub struct PcscReader {
    context: Context,
}

impl PcscReader {
    /// Establish a user-scope PC/SC context.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the smart-card service is not running.
    pub fn establish() -> Result<Self> {
        let context = Context::establish(Scope::User)
            .map_err(|e| HardwareError::connection(format!("PC/SC context: {e}")))?;
        debug!("PC/SC context established");
        Ok(Self { context })
    }
}

fn reader_name(reader: &str) -> Result<CString> {
    CString::new(reader)
        .map_err(|_| HardwareError::connection(format!("Invalid reader name {reader:?}")))
}

impl ReaderDriver for PcscReader {
    type Channel = PcscChannel;

    async fn list_readers(&self) -> Result<Vec<String>> {
        match self.context.list_readers_owned() {
            Ok(readers) => Ok(readers
                .into_iter()
                .map(|name| name.to_string_lossy().into_owned())
                .collect()),
            Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
            Err(e) => Err(HardwareError::communication(format!("List readers: {e}"))),
        }
    }

    async fn is_card_present(&self, reader: &str) -> Result<bool> {
        let mut states = [ReaderState::new(reader_name(reader)?, State::UNAWARE)];
        match self.context.get_status_change(Duration::ZERO, &mut states) {
            Ok(()) => Ok(states[0].event_state().contains(State::PRESENT)),
            Err(pcsc::Error::Timeout) => Ok(false),
            Err(e) => Err(HardwareError::communication(format!(
                "Status of {reader}: {e}"
            ))),
        }
    }

    async fn connect(&self, reader: &str) -> Result<PcscChannel> {
        let name = reader_name(reader)?;
        match self.context.connect(&name, ShareMode::Shared, Protocols::ANY) {
            Ok(card) => Ok(PcscChannel { card }),
            Err(pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard) => {
                Err(HardwareError::no_card(reader))
            }
            Err(e) => Err(HardwareError::connection(format!("Connect to {reader}: {e}"))),
        }
    }
}

/// Connection to a card through PC/SC.
pub struct PcscChannel {
    card: Card,
}

impl CardChannel for PcscChannel {
    async fn transmit(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE];
        self.card
            .transmit(frame, &mut buffer)
            .map(<[u8]>::to_vec)
            .map_err(|e| HardwareError::communication(format!("Transmit: {e}")))
    }

    async fn disconnect(self) -> Result<()> {
        self.card
            .disconnect(Disposition::LeaveCard)
            .map_err(|(_, e)| HardwareError::communication(format!("Disconnect: {e}")))
    }
}
