//! Device presence tracking
//!
//! Every logical source (sensor node, this gateway) has a last-seen
//! timestamp. A source is online while liveness keeps arriving within the
//! timeout; a periodic [`PresenceTracker::sweep`] flips silent sources
//! offline. Only transitions produce [`PresenceEvent`]s.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

use vigil_core::Instant;

/// Liveness record for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevicePresence {
    /// Source is considered reachable
    pub online: bool,
    /// Last liveness signal (`None` if never heard from)
    pub last_seen: Option<Instant>,
    /// Operator enable flag for the source's subsystem
    pub control_enabled: bool,
}

impl Default for DevicePresence {
    fn default() -> Self {
        Self {
            online: false,
            last_seen: None,
            control_enabled: true,
        }
    }
}

/// Why a source went offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineReason {
    /// No liveness within the timeout
    Timeout,
    /// Source announced it is going away
    Reported,
}

/// Presence transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEventKind {
    /// Source went from offline to online
    Recovered,
    /// Source went from online to offline
    Lost(OfflineReason),
    /// Control flag flipped
    ControlChanged(bool),
}

/// Edge-triggered presence notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    /// Source the transition belongs to
    pub source: String,
    /// What changed
    pub kind: PresenceEventKind,
}

impl PresenceEvent {
    fn new(source: &str, kind: PresenceEventKind) -> Self {
        Self {
            source: source.to_string(),
            kind,
        }
    }
}

/// Per-source liveness tracker.
///
/// All operations on a source are serialized by one mutex; sources never
/// affect each other's state.
#[derive(Debug)]
pub struct PresenceTracker {
    timeout: Duration,
    sources: Mutex<HashMap<String, DevicePresence>>,
}

impl PresenceTracker {
    /// Tracker that declares a source offline after `timeout` of silence.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Silence threshold.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Make `source` known (offline, control enabled) without a liveness signal.
    pub fn register(&self, source: &str) {
        self.lock().entry(source.to_string()).or_default();
    }

    /// Record a liveness signal from `source`.
    pub fn touch(&self, source: &str, now: Instant) -> Option<PresenceEvent> {
        let mut sources = self.lock();
        let entry = sources.entry(source.to_string()).or_default();
        entry.last_seen = Some(now);
        if entry.online {
            return None;
        }
        entry.online = true;
        info!(source, "device online");
        Some(PresenceEvent::new(source, PresenceEventKind::Recovered))
    }

    /// Apply an explicit liveness report (retained status message).
    pub fn report(&self, source: &str, online: bool, now: Instant) -> Option<PresenceEvent> {
        if online {
            return self.touch(source, now);
        }
        let mut sources = self.lock();
        let entry = sources.entry(source.to_string()).or_default();
        if !entry.online {
            return None;
        }
        entry.online = false;
        warn!(source, "device reported offline");
        Some(PresenceEvent::new(
            source,
            PresenceEventKind::Lost(OfflineReason::Reported),
        ))
    }

    /// Record the control flag for `source`; only a change produces an event.
    pub fn set_control_enabled(&self, source: &str, enabled: bool) -> Option<PresenceEvent> {
        let mut sources = self.lock();
        let entry = sources.entry(source.to_string()).or_default();
        if entry.control_enabled == enabled {
            return None;
        }
        entry.control_enabled = enabled;
        info!(source, enabled, "control flag changed");
        Some(PresenceEvent::new(
            source,
            PresenceEventKind::ControlChanged(enabled),
        ))
    }

    /// Flip every online source silent for longer than the timeout to offline.
    pub fn sweep(&self, now: Instant) -> Vec<PresenceEvent> {
        let mut events = Vec::new();
        for (source, entry) in self.lock().iter_mut() {
            let Some(last_seen) = entry.last_seen else {
                continue;
            };
            if entry.online && now.saturating_duration_since(last_seen) > self.timeout {
                entry.online = false;
                warn!(
                    source = source.as_str(),
                    silent_ms = now.saturating_duration_since(last_seen).as_millis() as u64,
                    "device timed out"
                );
                events.push(PresenceEvent::new(
                    source,
                    PresenceEventKind::Lost(OfflineReason::Timeout),
                ));
            }
        }
        events.sort_by(|a, b| a.source.cmp(&b.source));
        events
    }

    /// Current record for `source`.
    pub fn get(&self, source: &str) -> Option<DevicePresence> {
        self.lock().get(source).copied()
    }

    /// True if `source` is known and online.
    pub fn is_online(&self, source: &str) -> bool {
        self.get(source).is_some_and(|p| p.online)
    }

    /// Control flag for `source`; unknown sources are enabled.
    pub fn control_enabled(&self, source: &str) -> bool {
        self.get(source).map_or(true, |p| p.control_enabled)
    }

    /// Copy of every tracked source, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, DevicePresence> {
        self.lock()
            .iter()
            .map(|(source, presence)| (source.clone(), *presence))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DevicePresence>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
