use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::domain::Fingerprint;

/// What a tick should do with one mailbox observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Same fingerprint as last time: nothing to write, nothing to send.
    Unchanged,
    /// Warm-up pass: record the baseline, never notify. Prevents a
    /// notification storm over every mailbox's backlog after a restart.
    Seed,
    /// Content changed inside the cooldown window: mark it seen so it can
    /// never re-trigger, but stay quiet. Dampens upstream flapping between
    /// two representations of the same message.
    RecordOnly,
    /// Content changed, warm-up done, cooldown elapsed: record and deliver.
    Notify,
}

impl Decision {
    pub fn writes_state(self) -> bool {
        matches!(self, Decision::Seed | Decision::RecordOnly | Decision::Notify)
    }
}

/// Pure decision function for a single observation. Holds no state of its
/// own, so every transition is unit-testable without a running timer.
pub fn evaluate(
    warmed_up: bool,
    last_seen: Option<&str>,
    observed: &Fingerprint,
    last_notified: Option<Instant>,
    cooldown: Duration,
    now: Instant,
) -> Decision {
    if last_seen == Some(observed.as_str()) {
        return Decision::Unchanged;
    }
    if !warmed_up {
        return Decision::Seed;
    }
    let cooling = !cooldown.is_zero()
        && last_notified.is_some_and(|at| now.duration_since(at) < cooldown);
    if cooling {
        Decision::RecordOnly
    } else {
        Decision::Notify
    }
}

/// Per-mailbox seen-state plus the process-lifetime pieces around it.
///
/// The seen map mirrors the durable store; cooldown stamps and the warm-up
/// flag deliberately reset on restart.
#[derive(Debug, Default)]
pub struct WatchState {
    seen: HashMap<String, String>,
    last_notified: HashMap<String, Instant>,
    warmed_up: bool,
}

impl WatchState {
    pub fn new(seen: HashMap<String, String>) -> Self {
        Self {
            seen,
            last_notified: HashMap::new(),
            warmed_up: false,
        }
    }

    /// Applies one observation: decides, then mutates accordingly.
    pub fn observe(
        &mut self,
        name: &str,
        observed: &Fingerprint,
        cooldown: Duration,
        now: Instant,
    ) -> Decision {
        let decision = evaluate(
            self.warmed_up,
            self.seen.get(name).map(String::as_str),
            observed,
            self.last_notified.get(name).copied(),
            cooldown,
            now,
        );
        if decision.writes_state() {
            self.seen
                .insert(name.to_string(), observed.as_str().to_string());
        }
        if decision == Decision::Notify {
            self.last_notified.insert(name.to_string(), now);
        }
        decision
    }

    /// Arms notifications. Returns true only on the first call, so the
    /// caller can flush the warm-up baseline exactly once.
    pub fn mark_warmed_up(&mut self) -> bool {
        let first = !self.warmed_up;
        self.warmed_up = true;
        first
    }

    pub fn is_warmed_up(&self) -> bool {
        self.warmed_up
    }

    /// Drops all trace of a mailbox. A removed-then-re-added mailbox must
    /// start from cold, otherwise stale state would swallow its first real
    /// notification.
    pub fn forget(&mut self, name: &str) -> bool {
        self.last_notified.remove(name);
        self.seen.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.last_notified.clear();
    }

    pub fn tracked(&self) -> usize {
        self.seen.len()
    }

    pub fn snapshot_seen(&self) -> HashMap<String, String> {
        self.seen.clone()
    }
}
