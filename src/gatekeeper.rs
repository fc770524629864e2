use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::attestation::{AttestationProvider, AttestationStatus};
use crate::error::AttestationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingToken,
    TokenActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateInput {
    /// User pressed mint; carries the provider status at that instant.
    UserAction { status: AttestationStatus },
    StatusChanged(AttestationStatus),
    /// The submission triggered by `TokenActive` reached a terminal outcome.
    MintFinished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateCommand {
    None,
    RequestToken,
    SubmitMint,
}

/// Transition table of the attestation gate.
pub fn transition(state: GateState, input: GateInput) -> (GateState, GateCommand) {
    use AttestationStatus::{Active, Error};
    use GateInput::*;
    use GateState::*;

    match (state, input) {
        (_, Cancelled) => (Idle, GateCommand::None),

        (Idle | AwaitingToken, UserAction { status: Active }) => (TokenActive, GateCommand::SubmitMint),
        (Idle, UserAction { .. }) => (AwaitingToken, GateCommand::RequestToken),
        (AwaitingToken, UserAction { .. }) => (AwaitingToken, GateCommand::None),

        (AwaitingToken, StatusChanged(Active)) => (TokenActive, GateCommand::SubmitMint),
        (AwaitingToken, StatusChanged(Error)) => (Idle, GateCommand::None),
        (AwaitingToken, StatusChanged(_)) => (AwaitingToken, GateCommand::None),

        (TokenActive, MintFinished) => (Idle, GateCommand::None),
        (TokenActive, _) => (TokenActive, GateCommand::None),

        (Idle, StatusChanged(_) | MintFinished) => (Idle, GateCommand::None),
        (AwaitingToken, MintFinished) => (AwaitingToken, GateCommand::None),
    }
}

/// Guards gated mints behind an attestation provider.
pub struct GatekeeperGate {
    provider: Arc<dyn AttestationProvider>,
    state: Mutex<GateState>,
}

/// Authorization for one submission. Dropping it returns the gate to `Idle`,
/// including when the owning mint future is dropped mid-flight.
#[must_use]
pub struct GatePass {
    gate: Arc<GatekeeperGate>,
    on_drop: GateInput,
}

impl GatePass {
    /// Marks the submission as finished.
    pub fn finish(self) {}
}

impl Drop for GatePass {
    fn drop(&mut self) {
        self.gate.apply(self.on_drop);
    }
}

impl GatekeeperGate {
    pub fn new(provider: Arc<dyn AttestationProvider>) -> Self {
        Self { provider, state: Mutex::new(GateState::Idle) }
    }

    pub fn state(&self) -> GateState {
        *self.state.lock()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == GateState::AwaitingToken
    }

    fn apply(&self, input: GateInput) -> GateCommand {
        let mut state = self.state.lock();
        let (next, command) = transition(*state, input);
        if next != *state {
            debug!(from = ?*state, to = ?next, input = ?input, "gate transition");
        }
        *state = next;
        command
    }

    /// Resolves once a mint may be submitted. Hold the returned pass until
    /// the submission completes.
    pub async fn authorize(
        self: &Arc<Self>,
        cancel: &CancellationToken,
    ) -> Result<GatePass, AttestationError> {
        let mut updates = self.provider.subscribe();

        let mut pass = match self.apply(GateInput::UserAction { status: self.provider.status() }) {
            GateCommand::None => return Err(AttestationError::Pending),
            GateCommand::SubmitMint => {
                return Ok(GatePass { gate: self.clone(), on_drop: GateInput::MintFinished })
            }
            // From here on this call owns the gate; any early exit cancels it.
            GateCommand::RequestToken => GatePass { gate: self.clone(), on_drop: GateInput::Cancelled },
        };
        if let Err(e) = self.provider.request_token().await {
            warn!("attestation request failed: {}", e);
            return Err(e);
        }

        loop {
            let status = *updates.borrow_and_update();
            if self.apply(GateInput::StatusChanged(status)) == GateCommand::SubmitMint {
                pass.on_drop = GateInput::MintFinished;
                return Ok(pass);
            }
            if self.state() == GateState::Idle {
                warn!("attestation provider reported an error");
                return Err(AttestationError::Request("attestation was not granted".into()));
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(AttestationError::Cancelled),
                changed = updates.changed() => {
                    if changed.is_err() {
                        return Err(AttestationError::Cancelled);
                    }
                }
            }
        }
    }
}
