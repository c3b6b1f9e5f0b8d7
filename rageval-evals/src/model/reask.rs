// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Validate-and-reask state machine.

use thiserror::Error;

use crate::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaskState {
    AwaitingReply,
    Validating,
    Reasking,
    Succeeded,
    Failed,
}

impl ReaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReaskState::Succeeded | ReaskState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaskEvent {
    ReplyReceived,
    Accepted,
    Rejected,
    Reasked,
}

#[derive(Debug, Error)]
#[error("Invalid reask transition: {current:?} -> {event:?}")]
pub struct InvalidTransition {
    pub current: ReaskState,
    pub event: ReaskEvent,
}

impl From<InvalidTransition> for EvalError {
    fn from(err: InvalidTransition) -> Self {
        EvalError::Internal(err.to_string())
    }
}

/// One structured-output request with at most `max_reask` corrective retries
#[derive(Debug, Clone)]
pub struct ReaskLoop {
    state: ReaskState,
    max_reask: usize,
    reasks_used: usize,
    replies: usize,
}

impl ReaskLoop {
    pub fn new(max_reask: usize) -> Self {
        Self {
            state: ReaskState::AwaitingReply,
            max_reask,
            reasks_used: 0,
            replies: 0,
        }
    }

    pub fn state(&self) -> ReaskState {
        self.state
    }

    /// Replies received so far
    pub fn attempts(&self) -> usize {
        self.replies
    }

    pub fn reasks_used(&self) -> usize {
        self.reasks_used
    }

    pub fn advance(&mut self, event: ReaskEvent) -> Result<ReaskState, InvalidTransition> {
        use ReaskEvent::*;
        use ReaskState::*;

        let next = match (self.state, event) {
            (AwaitingReply, ReplyReceived) => {
                self.replies += 1;
                Validating
            }
            (Validating, Accepted) => Succeeded,
            (Validating, Rejected) if self.reasks_used < self.max_reask => Reasking,
            (Validating, Rejected) => Failed,
            (Reasking, Reasked) => {
                self.reasks_used += 1;
                AwaitingReply
            }
            (current, event) => return Err(InvalidTransition { current, event }),
        };

        self.state = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_first_reply() {
        let mut reask = ReaskLoop::new(2);
        assert_eq!(reask.advance(ReaskEvent::ReplyReceived).unwrap(), ReaskState::Validating);
        assert_eq!(reask.advance(ReaskEvent::Accepted).unwrap(), ReaskState::Succeeded);
        assert!(reask.state().is_terminal());
        assert_eq!(reask.attempts(), 1);
    }

    #[test]
    fn test_budget_exhaustion() {
        let mut reask = ReaskLoop::new(2);
        for _ in 0..2 {
            reask.advance(ReaskEvent::ReplyReceived).unwrap();
            assert_eq!(reask.advance(ReaskEvent::Rejected).unwrap(), ReaskState::Reasking);
            reask.advance(ReaskEvent::Reasked).unwrap();
        }
        reask.advance(ReaskEvent::ReplyReceived).unwrap();
        assert_eq!(reask.advance(ReaskEvent::Rejected).unwrap(), ReaskState::Failed);
        assert_eq!(reask.attempts(), 3);
        assert_eq!(reask.reasks_used(), 2);
    }

    #[test]
    fn test_zero_budget_fails_immediately() {
        let mut reask = ReaskLoop::new(0);
        reask.advance(ReaskEvent::ReplyReceived).unwrap();
        assert_eq!(reask.advance(ReaskEvent::Rejected).unwrap(), ReaskState::Failed);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut reask = ReaskLoop::new(1);
        let err = reask.advance(ReaskEvent::Accepted).unwrap_err();
        assert_eq!(err.current, ReaskState::AwaitingReply);

        reask.advance(ReaskEvent::ReplyReceived).unwrap();
        reask.advance(ReaskEvent::Accepted).unwrap();
        assert!(reask.advance(ReaskEvent::ReplyReceived).is_err());

        let eval_err: EvalError = err.into();
        assert!(matches!(eval_err, EvalError::Internal(_)));
    }
}
