use serde::Serialize;
use std::fmt;

use crate::error::SessionError;

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Configuring,
    /// Waiting for an answer to the current question
    Active,
    /// An answer is being analysed
    Submitting,
    Completed,
    /// Cancelled by the user; nothing is persisted
    Aborted,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Aborted)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionPhase::Configuring => "configuring",
            SessionPhase::Active => "active",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Completed => "completed",
            SessionPhase::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Pure session state machine
///
/// `Configuring -> Active(0) -> Submitting(0) -> Active(1) -> ... -> Completed`,
/// with `Aborted` reachable from `Active` and `Submitting`. Reaching index `i`
/// requires answers for every index below it, so completing the last index
/// means every question has an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMachine {
    phase: SessionPhase,
    index: usize,
    total: usize,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Configuring,
            index: 0,
            total: 0,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Questions are loaded; start at the first one
    pub fn activate(&mut self, total: usize) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Configuring, "start the session")?;
        if total == 0 {
            return Err(SessionError::Validation(
                "a session needs at least one question".to_string(),
            ));
        }

        self.total = total;
        self.index = 0;
        self.phase = SessionPhase::Active;
        Ok(())
    }

    pub fn begin_submit(&mut self) -> Result<usize, SessionError> {
        if self.phase == SessionPhase::Submitting {
            return Err(SessionError::SubmissionInFlight);
        }
        self.require_phase(SessionPhase::Active, "submit an answer")?;

        self.phase = SessionPhase::Submitting;
        Ok(self.index)
    }

    /// Record a successful submission. Returns the phase moved to.
    pub fn submit_succeeded(&mut self) -> Result<SessionPhase, SessionError> {
        self.require_phase(SessionPhase::Submitting, "accept an answer")?;

        if self.index + 1 >= self.total {
            self.phase = SessionPhase::Completed;
        } else {
            self.index += 1;
            self.phase = SessionPhase::Active;
        }
        Ok(self.phase)
    }

    /// Analysis failed; stay on the same question
    pub fn submit_failed(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Submitting, "reject an answer")?;
        self.phase = SessionPhase::Active;
        Ok(())
    }

    pub fn go_to_previous(&mut self) -> Result<usize, SessionError> {
        if self.phase == SessionPhase::Submitting {
            return Err(SessionError::SubmissionInFlight);
        }
        self.require_phase(SessionPhase::Active, "go to the previous question")?;
        if self.index == 0 {
            return Err(SessionError::Validation(
                "already at the first question".to_string(),
            ));
        }

        self.index -= 1;
        Ok(self.index)
    }

    pub fn cancel(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Active | SessionPhase::Submitting => {
                self.phase = SessionPhase::Aborted;
                Ok(())
            }
            SessionPhase::Aborted => Err(SessionError::Cancelled),
            phase => Err(SessionError::InvalidState {
                action: "cancel",
                phase,
            }),
        }
    }

    fn require_phase(&self, phase: SessionPhase, action: &'static str) -> Result<(), SessionError> {
        match self.phase {
            p if p == phase => Ok(()),
            SessionPhase::Aborted => Err(SessionError::Cancelled),
            p => Err(SessionError::InvalidState { action, phase: p }),
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}
