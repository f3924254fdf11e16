//! Suppression of change-driven rebuilds during internal writes.

use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct GateState {
    processing_enabled: bool,
    pending_rebuild: bool,
}

/// Decides whether a possible on-disk change should trigger a rebuild now.
///
/// While disabled, notifications only record that a rebuild is owed; any
/// number of them coalesce into the single rebuild reported by `enable`.
#[derive(Debug)]
pub struct ChangeGate {
    state: Mutex<GateState>,
}

impl Default for ChangeGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeGate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                processing_enabled: true,
                pending_rebuild: false,
            }),
        }
    }

    /// Stop processing change notifications.
    pub fn disable(&self) {
        self.lock().processing_enabled = false;
    }

    /// Returns true if the caller should rebuild now.
    pub fn notify_possible_change(&self) -> bool {
        let mut state = self.lock();
        if state.processing_enabled {
            true
        } else {
            state.pending_rebuild = true;
            false
        }
    }

    /// Resume processing. Returns true if a rebuild is owed.
    pub fn enable(&self) -> bool {
        let mut state = self.lock();
        state.processing_enabled = true;
        std::mem::take(&mut state.pending_rebuild)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.lock().processing_enabled
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_by_default() {
        let gate = ChangeGate::new();
        assert!(gate.is_enabled());
        assert!(gate.notify_possible_change());
        assert!(!gate.enable());
    }

    #[test]
    fn test_suppressed_notifications_coalesce() {
        let gate = ChangeGate::new();
        gate.disable();

        assert!(!gate.notify_possible_change());
        assert!(!gate.notify_possible_change());
        assert!(!gate.notify_possible_change());

        assert!(gate.enable());
        assert!(!gate.enable());
    }

    #[test]
    fn test_no_rebuild_owed_without_notification() {
        let gate = ChangeGate::new();
        gate.disable();
        assert!(!gate.is_enabled());
        assert!(!gate.enable());
        assert!(gate.is_enabled());
    }
}
