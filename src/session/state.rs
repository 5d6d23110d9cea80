use crate::{Error, Result};

/// Per-chat send state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// A request is in flight; no other send is allowed.
    Streaming,
    /// The last reply failed; `reason` is what was shown to the user.
    Erroring { reason: String },
}

/// Inputs to [`SessionState::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Send,
    Complete,
    Cancel,
    Fail(String),
    Acknowledge,
}

impl SessionState {
    /// Apply `event`, returning the next state.
    ///
    /// ```text
    /// Idle      --Send-->        Streaming
    /// Erroring  --Send-->        Streaming
    /// Streaming --Complete-->    Idle
    /// Streaming --Cancel-->      Idle
    /// Streaming --Fail(r)-->     Erroring { r }
    /// Erroring  --Acknowledge--> Idle
    /// ```
    ///
    /// Any other pair is rejected and `self` is left as it was.
    pub fn apply(&mut self, event: SessionEvent) -> Result<()> {
        let next = match (&*self, &event) {
            (SessionState::Idle | SessionState::Erroring { .. }, SessionEvent::Send) => SessionState::Streaming,
            (SessionState::Streaming, SessionEvent::Complete | SessionEvent::Cancel) => SessionState::Idle,
            (SessionState::Streaming, SessionEvent::Fail(reason)) => SessionState::Erroring {
                reason: reason.clone(),
            },
            (SessionState::Erroring { .. }, SessionEvent::Acknowledge) => SessionState::Idle,
            _ => {
                return Err(Error::IllegalTransition {
                    state: self.clone(),
                    event,
                })
            }
        };
        *self = next;
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, SessionState::Streaming)
    }
}
