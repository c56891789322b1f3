//! Machine run state.
use crate::error::Fault;

/// Whether the machine executes instructions, and if not, why.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// Executing instructions.
    #[default]
    Running,
    /// Suspended by the user. No instructions execute.
    Paused,
    /// Stopped by a fault. Terminal.
    Halted(Fault),
    /// Suspended by `Fx0A` until a key is pressed.
    AwaitingKey,
}

/// Occurrence that may move the machine to another state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// User requested pause or resume.
    ///
    /// `awaiting_key` tells where a resume lands, since pausing
    /// does not cancel a pending key wait.
    TogglePause { awaiting_key: bool },
    /// Instruction engine failure.
    Fault(Fault),
    /// `Fx0A` found no fresh keypress.
    AwaitKey,
    /// A key was pressed while awaiting one.
    KeyPressed,
}

impl MachineState {
    /// Apply an event, returning the next state.
    ///
    /// Events that make no sense in the current state leave it unchanged.
    #[must_use]
    pub fn transition(self, event: Event) -> MachineState {
        use Event as E;
        use MachineState as S;

        match (self, event) {
            (S::Halted(fault), _) => S::Halted(fault),
            (_, E::Fault(fault)) => S::Halted(fault),

            (S::Running | S::AwaitingKey, E::TogglePause { .. }) => S::Paused,
            (S::Paused, E::TogglePause { awaiting_key: true }) => S::AwaitingKey,
            (S::Paused, E::TogglePause { awaiting_key: false }) => S::Running,

            (S::Running, E::AwaitKey) => S::AwaitingKey,
            (S::AwaitingKey, E::KeyPressed) => S::Running,

            (state, _) => state,
        }
    }

    /// Instructions, or a pending key wait, may make progress.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, MachineState::Running | MachineState::AwaitingKey)
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        matches!(self, MachineState::Halted(_))
    }

    /// The fault that halted the machine.
    pub fn halt_reason(&self) -> Option<Fault> {
        match self {
            MachineState::Halted(fault) => Some(*fault),
            _ => None,
        }
    }
}
