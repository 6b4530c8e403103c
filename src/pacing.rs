use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// How fast a quiz may be delivered to one chat.
///
/// Telegram tolerates roughly one message per second in a private chat and
/// twenty per minute in a group; the defaults stay under both and leave the
/// reader a pause after every poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub private_interval: Duration,
    pub group_interval: Duration,
    pub after_poll: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            private_interval: Duration::from_secs(2),
            group_interval: Duration::from_secs(3),
            after_poll: Duration::from_secs(3),
        }
    }
}

impl PacingPolicy {
    pub fn interval_for(&self, is_group: bool) -> Duration {
        if is_group {
            self.group_interval
        } else {
            self.private_interval
        }
    }
}

/// Spaces out the outbound calls of one delivery run.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    after_poll: Duration,
    next_slot: Option<Instant>,
}

impl Pacer {
    pub fn new(policy: &PacingPolicy, is_group: bool) -> Self {
        Self {
            interval: policy.interval_for(is_group),
            after_poll: policy.after_poll,
            next_slot: None,
        }
    }

    /// Waits for the next free slot and books the one after it.
    pub async fn acquire(&mut self) {
        if let Some(slot) = self.next_slot {
            sleep_until(slot).await;
        }
        self.next_slot = Some(Instant::now() + self.interval);
    }

    /// Pushes the next slot back by the reading pause.
    pub fn hold(&mut self) {
        let base = self.next_slot.unwrap_or_else(Instant::now);
        self.next_slot = Some(base + self.after_poll);
    }
}
