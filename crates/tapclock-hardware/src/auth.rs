//! Authentication strategy over ordered key candidates.
//!
//! Reads scan an ordered list of candidates on one connection. Writes use a
//! fixed pair, a primary key and a fallback key, where any failure of the
//! primary attempt falls through to the fallback.
//!
//! # Default Keys
//!
//! | Path | Order | Key | Type |
//! |------|-------|-----|------|
//! | read | 1 | `FFFFFFFFFFFF` | A |
//! | read | 2 | `A0A1A2A3A4A5` | A |
//! | write | primary | `A0A1A2A3A4A5` | A |
//! | write | fallback | `FFFFFFFFFFFF` | B |

use std::future::Future;

use tapclock_core::{
    KeyCandidate, KeyType,
    constants::{DEFAULT_KEY_SLOT, KEY_FACTORY_DEFAULT, KEY_MAD_PUBLIC},
};
use tracing::{debug, warn};

use crate::error::{HardwareError, Result};
use crate::link::CardHandle;
use crate::traits::CardChannel;

/// Key candidates known to the agent, fixed at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRing {
    read: Vec<KeyCandidate>,
    write_primary: KeyCandidate,
    write_fallback: KeyCandidate,
}

impl Default for KeyRing {
    fn default() -> Self {
        Self {
            read: vec![
                KeyCandidate::new(KEY_FACTORY_DEFAULT, DEFAULT_KEY_SLOT, KeyType::A),
                KeyCandidate::new(KEY_MAD_PUBLIC, DEFAULT_KEY_SLOT, KeyType::A),
            ],
            write_primary: KeyCandidate::new(KEY_MAD_PUBLIC, DEFAULT_KEY_SLOT, KeyType::A),
            write_fallback: KeyCandidate::new(KEY_FACTORY_DEFAULT, DEFAULT_KEY_SLOT, KeyType::B),
        }
    }
}

impl KeyRing {
    /// Create a key ring from explicit candidates.
    pub fn new(
        read: Vec<KeyCandidate>,
        write_primary: KeyCandidate,
        write_fallback: KeyCandidate,
    ) -> Self {
        Self {
            read,
            write_primary,
            write_fallback,
        }
    }

    /// Read candidates in the order they are tried.
    pub fn read_candidates(&self) -> &[KeyCandidate] {
        &self.read
    }

    /// Write candidates in the order they are tried.
    pub fn write_candidates(&self) -> [KeyCandidate; 2] {
        [self.write_primary, self.write_fallback]
    }

    /// Load one candidate and authenticate `block` with it.
    pub async fn authenticate_with<C: CardChannel>(
        handle: &mut CardHandle<C>,
        block: u8,
        candidate: &KeyCandidate,
    ) -> Result<()> {
        handle.load_key(candidate.slot, &candidate.key).await?;
        handle
            .authenticate(block, candidate.slot, candidate.key_type)
            .await
    }

    /// Authenticate `block` for reading, trying each read candidate in order.
    ///
    /// A candidate whose key load is rejected is skipped without being
    /// recorded as a failure. The first successful authentication stops the
    /// scan.
    ///
    /// # Errors
    ///
    /// Returns `AllKeysExhausted` carrying the last failure seen.
    pub async fn authenticate_for_read<C: CardChannel>(
        &self,
        handle: &mut CardHandle<C>,
        block: u8,
    ) -> Result<KeyCandidate> {
        let mut last: Option<HardwareError> = None;

        for candidate in &self.read {
            match handle.load_key(candidate.slot, &candidate.key).await {
                Ok(()) => {}
                Err(HardwareError::KeyLoadRejected { status, .. }) => {
                    debug!(%candidate, %status, "Key load rejected, skipping candidate");
                    continue;
                }
                Err(e) => {
                    debug!(%candidate, error = %e, "Key load failed");
                    last = Some(e);
                    continue;
                }
            }

            match handle
                .authenticate(block, candidate.slot, candidate.key_type)
                .await
            {
                Ok(()) => return Ok(*candidate),
                Err(e) => {
                    debug!(%candidate, error = %e, "Authentication failed");
                    last = Some(e);
                }
            }
        }

        Err(HardwareError::AllKeysExhausted {
            attempted: self.read.len(),
            last: last.map(Box::new),
        })
    }

    /// Run `attempt` with the primary write key, then with the fallback key
    /// if the primary attempt failed for any reason.
    ///
    /// Each attempt is expected to open its own connection and perform key
    /// load, authentication and the write itself. When both attempts fail,
    /// the fallback's error is returned and the primary's is only logged.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapclock_core::KeyType;
    /// use tapclock_hardware::{HardwareError, KeyRing};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let keys = KeyRing::default();
    /// let (used, ()) = keys
    ///     .authenticate_for_write(|candidate| async move {
    ///         match candidate.key_type {
    ///             KeyType::A => Err(HardwareError::communication("primary refused")),
    ///             KeyType::B => Ok(()),
    ///         }
    ///     })
    ///     .await
    ///     .unwrap();
    /// assert_eq!(used.key_type, KeyType::B);
    /// # }
    /// ```
    pub async fn authenticate_for_write<F, Fut, T>(&self, mut attempt: F) -> Result<(KeyCandidate, T)>
    where
        F: FnMut(KeyCandidate) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match attempt(self.write_primary).await {
            Ok(value) => return Ok((self.write_primary, value)),
            Err(e) => {
                warn!(candidate = %self.write_primary, error = %e, "Primary write key failed, trying fallback");
            }
        }

        attempt(self.write_fallback)
            .await
            .map(|value| (self.write_fallback, value))
    }
}
