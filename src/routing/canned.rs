//! Finite canned-response sequence.

use std::collections::VecDeque;
use thiserror::Error;

use crate::config::CannedResponse;

/// Returned once every canned response has been handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("canned response sequence exhausted after {served} responses")]
pub struct SequenceExhausted {
    pub served: usize,
}

/// Ordered responses popped front to back. Never wraps around.
#[derive(Debug, Clone)]
pub struct CannedSequence {
    remaining: VecDeque<CannedResponse>,
    served: usize,
}

impl CannedSequence {
    pub fn new(responses: impl IntoIterator<Item = CannedResponse>) -> Self {
        Self {
            remaining: responses.into_iter().collect(),
            served: 0,
        }
    }

    pub fn next_response(&mut self) -> Result<CannedResponse, SequenceExhausted> {
        let next = self.remaining.pop_front().ok_or(SequenceExhausted {
            served: self.served,
        })?;
        self.served += 1;
        Ok(next)
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}
