//! Endpoint lifecycle states.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of an endpoint.
///
/// Configuration is only accepted while [`EndpointState::Editable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointState {
    /// Initial state; setters are accepted.
    Editable,
    /// `start()` is acquiring broker resources.
    Starting,
    /// Consumer attached and delivering.
    Active,
    /// `start()` failed; partially acquired resources are being released.
    StartFailed,
    /// `stop()` is releasing broker resources.
    Stopping,
}

impl EndpointState {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Editable => "editable",
            Self::Starting => "starting",
            Self::Active => "active",
            Self::StartFailed => "start_failed",
            Self::Stopping => "stopping",
        }
    }

    /// Returns whether configuration may change in this state.
    #[must_use]
    pub const fn is_editable(self) -> bool {
        matches!(self, Self::Editable)
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Editable => 0,
            Self::Starting => 1,
            Self::Active => 2,
            Self::StartFailed => 3,
            Self::Stopping => 4,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Active,
            3 => Self::StartFailed,
            4 => Self::Stopping,
            _ => Self::Editable,
        }
    }
}

impl fmt::Display for EndpointState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Atomically readable lifecycle state shared with the delivery thread.
///
/// This guards configuration against edits once `start()` begins. It does
/// not serialize deliveries against `stop()`.
#[derive(Debug, Default)]
pub struct LifecycleCell(AtomicU8);

impl LifecycleCell {
    /// Creates a cell in the editable state.
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Returns the current state.
    #[must_use]
    pub fn load(&self) -> EndpointState {
        EndpointState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Replaces the current state.
    pub fn store(&self, state: EndpointState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }

    /// Moves from `current` to `next`, returning the observed state when it
    /// was not `current`.
    ///
    /// # Errors
    ///
    /// Returns the actual state when the transition was not applied.
    pub fn transition(&self, current: EndpointState, next: EndpointState) -> Result<(), EndpointState> {
        self.0
            .compare_exchange(
                current.to_u8(),
                next.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(EndpointState::from_u8)
    }
}
