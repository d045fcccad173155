//! Second-factor verification flow.
//!
//! A `StepUpFlow` is created from the challenge a login attempt returned
//! and drives code submission until it reaches a terminal state. Code
//! shape is checked locally before anything goes on the wire, so a typo
//! never burns a verification attempt.

use crate::api::AuthBackend;
use crate::error::{AuthError, AuthResult};
use crate::types::{CredentialPair, StepUpChallenge, StepUpCode};
use rust_fsm::*;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::{debug, info, warn};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub step_up_machine(AwaitingCode)

    AwaitingCode => {
        // Backend accepted the code.
        CodeAccepted => Succeeded,
        // Code rejected or attempt rate limited; the challenge is still live.
        CodeRejected => AwaitingCode,
        // Challenge expired or the account got locked.
        ChallengeDead => Failed,
        Cancel => Cancelled
    }
}

use step_up_machine::Input as StepUpInput;
use step_up_machine::StateMachine as StepUpMachine;

/// Externally visible phase of a step-up flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUpPhase {
    AwaitingCode,
    Succeeded,
    Failed,
    Cancelled,
}

impl From<&step_up_machine::State> for StepUpPhase {
    fn from(state: &step_up_machine::State) -> Self {
        match state {
            step_up_machine::State::AwaitingCode => StepUpPhase::AwaitingCode,
            step_up_machine::State::Succeeded => StepUpPhase::Succeeded,
            step_up_machine::State::Failed => StepUpPhase::Failed,
            step_up_machine::State::Cancelled => StepUpPhase::Cancelled,
        }
    }
}

pub struct StepUpFlow {
    backend: Arc<dyn AuthBackend>,
    challenge: StepUpChallenge,
    fsm: Mutex<StepUpMachine>,
}

impl std::fmt::Debug for StepUpFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepUpFlow")
            .field("challenge", &self.challenge)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl StepUpFlow {
    pub fn new(backend: Arc<dyn AuthBackend>, challenge: StepUpChallenge) -> Self {
        Self {
            backend,
            challenge,
            fsm: Mutex::new(StepUpMachine::new()),
        }
    }

    pub fn phase(&self) -> StepUpPhase {
        let fsm = self.fsm.lock().unwrap();
        StepUpPhase::from(fsm.state())
    }

    fn transition(&self, input: &StepUpInput) -> AuthResult<StepUpPhase> {
        let mut fsm = self.fsm.lock().unwrap();
        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;
        let phase = StepUpPhase::from(fsm.state());
        debug!(phase = ?phase, "step-up transition");
        Ok(phase)
    }

    /// Submit a second-factor code against the held challenge.
    ///
    /// Malformed codes fail with `Validation` before any network call and
    /// leave the flow where it was. A rejected or rate-limited attempt
    /// keeps the flow open; lockout and challenge expiry end it.
    pub async fn submit(&self, code: &StepUpCode) -> AuthResult<CredentialPair> {
        if self.phase() != StepUpPhase::AwaitingCode {
            return Err(AuthError::InvalidStateTransition(format!(
                "cannot submit a code in phase {:?}",
                self.phase()
            )));
        }
        code.validate()?;

        match self
            .backend
            .verify_step_up(&self.challenge, code.value(), code.method())
            .await
        {
            Ok(pair) => {
                self.transition(&StepUpInput::CodeAccepted)?;
                info!("step-up verification succeeded");
                Ok(pair)
            }
            Err(err @ AuthError::InvalidStepUpCode(_)) => {
                self.transition(&StepUpInput::CodeRejected)?;
                warn!("step-up code rejected, challenge still live");
                Err(err)
            }
            Err(err @ AuthError::RateLimited(_)) => {
                // The backend caps attempts, not the flow. The caller
                // renders the error and may retry after waiting.
                self.transition(&StepUpInput::CodeRejected)?;
                warn!("step-up attempt rate limited, challenge still live");
                Err(err)
            }
            Err(err @ AuthError::Network(_)) => {
                // Transport failure says nothing about the challenge.
                Err(err)
            }
            Err(err) => {
                self.transition(&StepUpInput::ChallengeDead)?;
                warn!(error = %err, "step-up challenge is dead");
                Err(err)
            }
        }
    }

    /// Abandon the flow. The challenge handle is dropped unconsumed.
    pub fn cancel(&self) -> AuthResult<()> {
        self.transition(&StepUpInput::Cancel)?;
        info!("step-up flow cancelled");
        Ok(())
    }
}
