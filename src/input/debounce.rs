//! Debounce state machine.
//!
//! Pure timing logic with no I/O: the caller reports falling edges and
//! line samples together with a monotonic tick, and the debouncer
//! decides whether a logical press happened.

use std::time::Duration;

/// How a button confirms a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressKind {
    /// Line must still be asserted after a short settle window.
    Short,
    /// Line must still be asserted after a multi-second hold.
    Hold,
}

/// Per-button timing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    /// Short-press window running since the given tick.
    Timing { since: Duration },
    /// Hold timer running since the given tick.
    PendingHold { since: Duration },
}

/// Converts edges into at most one logical event per physical press.
#[derive(Debug, Clone)]
pub struct Debouncer {
    kind: PressKind,
    window: Duration,
    rearm_guard: Duration,
    state: DebounceState,
    resolved_at: Option<Duration>,
}

impl Debouncer {
    /// Debouncer for a momentary button.
    pub fn short(window: Duration, rearm_guard: Duration) -> Self {
        Self::new(PressKind::Short, window, rearm_guard)
    }

    /// Debouncer for a hold-to-toggle button.
    pub fn hold(window: Duration, rearm_guard: Duration) -> Self {
        Self::new(PressKind::Hold, window, rearm_guard)
    }

    fn new(kind: PressKind, window: Duration, rearm_guard: Duration) -> Self {
        Self {
            kind,
            window,
            rearm_guard,
            state: DebounceState::Idle,
            resolved_at: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> PressKind {
        self.kind
    }

    #[inline]
    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Starts timing a press.
    ///
    /// Returns the tick at which the line must be re-sampled, or `None`
    /// when the edge is ignored: a press is already being timed, or the
    /// edge is bounce from the press that just resolved.
    pub fn on_falling_edge(&mut self, now: Duration) -> Option<Duration> {
        if self.state != DebounceState::Idle {
            return None;
        }
        if let Some(resolved) = self.resolved_at {
            if now.saturating_sub(resolved) < self.rearm_guard {
                return None;
            }
        }

        self.state = match self.kind {
            PressKind::Short => DebounceState::Timing { since: now },
            PressKind::Hold => DebounceState::PendingHold { since: now },
        };
        Some(now + self.window)
    }

    /// Reports a line sample taken at `now`.
    ///
    /// Returns `true` exactly once per confirmed press: when the window
    /// has elapsed and the line is still asserted. Once the window has
    /// elapsed the debouncer returns to idle whatever the outcome. A
    /// sample taken before expiry changes nothing.
    pub fn resolve(&mut self, now: Duration, asserted: bool) -> bool {
        let since = match self.state {
            DebounceState::Idle => return false,
            DebounceState::Timing { since } | DebounceState::PendingHold { since } => since,
        };
        if now < since + self.window {
            return false;
        }

        self.state = DebounceState::Idle;
        self.resolved_at = Some(now);
        asserted
    }
}
