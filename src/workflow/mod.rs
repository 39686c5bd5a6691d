//! Clarify, optimize, retry.
//!
//! ```text
//!  text ─► admit ─► Query ─► explain ─► review ──Accept──► optimize ─► admit(candidate)
//!                              ▲          │                   ▲              │
//!                              └─Clarify──┘                   └── retry ─────┘ (max 3)
//!                                         │
//!                                       Abort ─► Outcome::Cancelled
//! ```
//!
//! A candidate only becomes the result after it passes the same admission
//! (validation + analysis) as the input, so a `Done` query is always one the
//! database accepts.

mod clarify;
mod error;
mod orchestrator;
mod state;

pub use clarify::{AcceptAll, Clarification, ClarificationProvider};
pub use error::{WorkflowError, WorkflowResult};
pub use orchestrator::{Optimization, Orchestrator, Outcome, DEFAULT_MAX_ATTEMPTS};
pub use state::WorkflowState;

use std::sync::Arc;

use crate::config::DEFAULT_MODEL;
use crate::db::Database;
use crate::llm::CompletionClient;

/// Run the workflow with a default [`Orchestrator`].
///
/// The default orchestrator has its own metadata cache, so nothing is
/// shared with other calls. Build an [`Orchestrator`] to share one.
pub async fn run<P>(
    query_text: &str,
    database: &dyn Database,
    completion_client: Arc<dyn CompletionClient>,
    clarification_provider: &mut P,
) -> WorkflowResult<Outcome>
where
    P: ClarificationProvider + ?Sized,
{
    Orchestrator::new(completion_client, DEFAULT_MODEL)
        .run(query_text, database, clarification_provider)
        .await
}
