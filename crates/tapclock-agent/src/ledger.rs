//! Per-identity stamp cooldowns and post-programming locks.
//!
//! Each identity carries two independent deadlines:
//!
//! | Deadline | Set after | Duration |
//! |----------|-----------|----------|
//! | cooldown | every stamp attempt, successful or not | 60 s |
//! | lock | programming a card with that identity | 10 s |
//!
//! While a lock is active it takes precedence over the cooldown. Entries are
//! never removed; an expired deadline is simply ignored.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Stand-in for "never" when a configured duration does not fit in an
/// `Instant`. About thirty years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The instant `duration` from now, clamped to [`FAR_FUTURE`] on overflow.
pub(crate) fn deadline_after(duration: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(duration).unwrap_or(now + FAR_FUTURE)
}

#[derive(Debug, Clone, Copy, Default)]
struct LedgerEntry {
    cooldown_until: Option<Instant>,
    lock_until: Option<Instant>,
}

/// Whether an identity may be stamped right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clearance {
    Clear,
    /// A card with this identity was just programmed.
    Locked { remaining: Duration },
    /// This identity was stamped recently.
    CoolingDown { remaining: Duration },
}

impl Clearance {
    pub fn is_clear(&self) -> bool {
        matches!(self, Self::Clear)
    }

    /// Time left until the identity is clear again.
    pub fn remaining(&self) -> Duration {
        match self {
            Self::Clear => Duration::ZERO,
            Self::Locked { remaining } | Self::CoolingDown { remaining } => *remaining,
        }
    }
}

/// In-memory ledger of cooldown and lock deadlines.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tapclock_agent::{Clearance, LockLedger};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut ledger = LockLedger::new();
/// assert!(ledger.check("alice").is_clear());
///
/// ledger.record_cooldown("alice", Duration::from_secs(60));
/// assert!(matches!(ledger.check("alice"), Clearance::CoolingDown { .. }));
/// # }
/// ```
#[derive(Debug, Default)]
pub struct LockLedger {
    entries: HashMap<String, LedgerEntry>,
}

impl LockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forbid stamping `identity` for `duration` from now.
    pub fn record_cooldown(&mut self, identity: &str, duration: Duration) {
        self.entry(identity).cooldown_until = Some(deadline_after(duration));
    }

    /// Lock `identity` for `duration` from now, after programming a card.
    pub fn record_lock(&mut self, identity: &str, duration: Duration) {
        self.entry(identity).lock_until = Some(deadline_after(duration));
    }

    /// Check `identity` against the current time.
    pub fn check(&self, identity: &str) -> Clearance {
        self.check_at(identity, Instant::now())
    }

    /// Check `identity` against an explicit instant.
    pub fn check_at(&self, identity: &str, now: Instant) -> Clearance {
        let Some(entry) = self.entries.get(identity) else {
            return Clearance::Clear;
        };

        let pending = |until: Option<Instant>| until.filter(|until| *until > now).map(|until| until - now);

        if let Some(remaining) = pending(entry.lock_until) {
            Clearance::Locked { remaining }
        } else if let Some(remaining) = pending(entry.cooldown_until) {
            Clearance::CoolingDown { remaining }
        } else {
            Clearance::Clear
        }
    }

    /// Number of identities ever recorded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&mut self, identity: &str) -> &mut LedgerEntry {
        self.entries.entry(identity.to_string()).or_default()
    }
}
