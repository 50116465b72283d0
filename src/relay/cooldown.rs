//! Per-user cooldowns for gift commands.
//!
//! Each user gets a slot holding the time of their last successful gated
//! action. A slot is locked for the whole check → backend → record sequence,
//! so two overlapping invocations by the same user cannot both pass the
//! check. Different users never contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

type Slot = Arc<Mutex<Option<Instant>>>;

/// Result of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    Ready,
    Active { remaining_secs: u64 },
}

/// Cooldown tracker keyed by user id.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    /// Table size above which idle entries are swept.
    max_entries: usize,
    slots: Mutex<HashMap<String, Slot>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration, max_entries: usize) -> Self {
        Self {
            cooldown,
            max_entries: max_entries.max(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Lock `user_id`'s slot. Waits while another invocation by the same
    /// user holds it.
    pub async fn lock(&self, user_id: &str) -> CooldownGuard {
        let slot = {
            let mut slots = self.slots.lock().await;
            if !slots.contains_key(user_id) && slots.len() >= self.max_entries {
                self.sweep(&mut slots);
            }
            Arc::clone(slots.entry(user_id.to_string()).or_default())
        };

        CooldownGuard {
            cooldown: self.cooldown,
            last_action: slot.lock_owned().await,
        }
    }

    pub async fn is_on_cooldown(&self, user_id: &str) -> bool {
        self.lock(user_id).await.is_on_cooldown()
    }

    pub async fn remaining_seconds(&self, user_id: &str) -> u64 {
        self.lock(user_id).await.remaining_seconds()
    }

    pub async fn record_action(&self, user_id: &str) {
        self.lock(user_id).await.record_action();
    }

    /// Number of users currently tracked.
    pub async fn tracked_users(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Drop entries whose cooldown has run out and that nobody holds.
    fn sweep(&self, slots: &mut HashMap<String, Slot>) {
        let before = slots.len();
        let now = Instant::now();
        let cooldown = self.cooldown;

        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(last) => matches!(*last, Some(at) if now.saturating_duration_since(at) < cooldown),
                Err(_) => true,
            }
        });

        debug!(
            "Swept cooldown table: {} -> {} entries",
            before,
            slots.len()
        );
    }
}

/// Exclusive access to one user's cooldown entry.
pub struct CooldownGuard {
    cooldown: Duration,
    last_action: OwnedMutexGuard<Option<Instant>>,
}

impl CooldownGuard {
    fn elapsed(&self) -> Option<Duration> {
        self.last_action
            .map(|at| Instant::now().saturating_duration_since(at))
    }

    /// Users with no recorded action are never limited.
    pub fn is_on_cooldown(&self) -> bool {
        self.elapsed().is_some_and(|elapsed| elapsed < self.cooldown)
    }

    /// Whole seconds left, rounded up; zero when not limited.
    pub fn remaining_seconds(&self) -> u64 {
        let Some(elapsed) = self.elapsed() else {
            return 0;
        };
        let remaining = self.cooldown.saturating_sub(elapsed);
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }

    pub fn status(&self) -> CooldownStatus {
        if self.is_on_cooldown() {
            CooldownStatus::Active {
                remaining_secs: self.remaining_seconds(),
            }
        } else {
            CooldownStatus::Ready
        }
    }

    pub fn record_action(&mut self) {
        *self.last_action = Some(Instant::now());
    }
}
