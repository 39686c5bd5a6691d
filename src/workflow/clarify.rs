//! Operator review of the stated intent.

use async_trait::async_trait;

use crate::advisor::Intent;
use crate::query::Query;

/// Operator decision after seeing an [`Intent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clarification {
    /// Use the stated intent as-is.
    Accept,
    /// Re-explain with this amendment.
    Clarify(String),
    /// Stop the run without an error.
    Abort,
}

/// Source of [`Clarification`]s, typically an interactive prompt.
///
/// Called once per explanation; there is no bound on how many times.
#[async_trait]
pub trait ClarificationProvider: Send {
    async fn review(&mut self, query: &Query, intent: &Intent) -> Clarification;
}

#[async_trait]
impl<F> ClarificationProvider for F
where
    F: FnMut(&Query, &Intent) -> Clarification + Send,
{
    async fn review(&mut self, query: &Query, intent: &Intent) -> Clarification {
        self(query, intent)
    }
}

/// Accepts every intent; for non-interactive runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl ClarificationProvider for AcceptAll {
    async fn review(&mut self, _query: &Query, _intent: &Intent) -> Clarification {
        Clarification::Accept
    }
}
