//! Presence poller: is a card in the field of the first reader right now?

use std::{fmt, sync::Arc};

use crate::{
    error::{HardwareError, Result},
    traits::ReaderDriver,
};

/// Outcome of one presence poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    CardPresent,
    CardAbsent,
}

impl Presence {
    /// Returns `true` if a card is in the field.
    pub fn is_present(self) -> bool {
        matches!(self, Self::CardPresent)
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CardPresent => write!(f, "card present"),
            Self::CardAbsent => write!(f, "card absent"),
        }
    }
}

/// Non-blocking presence check against the first attached reader.
#[derive(Debug)]
pub struct PresencePoller<D> {
    driver: Arc<D>,
}

impl<D> Clone for PresencePoller<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
        }
    }
}

impl<D: ReaderDriver> PresencePoller<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver }
    }

    /// Query the first reader once.
    ///
    /// # Errors
    ///
    /// Returns `NoReaderAvailable` when no reader is attached, or the
    /// driver's error if the query itself failed.
    pub async fn poll(&self) -> Result<Presence> {
        let reader = self
            .driver
            .list_readers()
            .await?
            .into_iter()
            .next()
            .ok_or(HardwareError::NoReaderAvailable)?;

        if self.driver.is_card_present(&reader).await? {
            Ok(Presence::CardPresent)
        } else {
            Ok(Presence::CardAbsent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockCard, MockReader};

    #[tokio::test]
    async fn test_poll_follows_card() {
        let (reader, handle) = MockReader::new();
        let poller = PresencePoller::new(Arc::new(reader));

        assert_eq!(poller.poll().await.unwrap(), Presence::CardAbsent);

        handle.insert_card(MockCard::blank());
        assert!(poller.poll().await.unwrap().is_present());

        handle.remove_card();
        assert_eq!(poller.poll().await.unwrap(), Presence::CardAbsent);
    }

    #[tokio::test]
    async fn test_poll_without_reader() {
        let (reader, handle) = MockReader::new();
        handle.unplug_reader();
        let poller = PresencePoller::new(Arc::new(reader));

        assert!(matches!(
            poller.poll().await,
            Err(HardwareError::NoReaderAvailable)
        ));
    }

    #[tokio::test]
    async fn test_poll_uses_first_reader() {
        let (reader, handle) = MockReader::with_name("Reader A");
        handle.plug_reader("Reader B");
        handle.insert_card(MockCard::blank());
        let poller = PresencePoller::new(Arc::new(reader));

        assert_eq!(poller.poll().await.unwrap(), Presence::CardPresent);
    }
}
