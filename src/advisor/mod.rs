//! Model-backed advisors.
//!
//! Both are stateless adapters: render a payload, make one structured
//! completion call, decode the declared shape. Retry policy lives in
//! [`crate::workflow`].
//!
//! - [`IntentExplainer`] - query (+ clarification) -> [`Intent`]
//! - [`QueryOptimizer`] - query + intent + schema + plan -> [`Suggestion`]

mod explain;
mod optimize;

pub use explain::{ExplainRequest, Intent, IntentExplainer};
pub use optimize::{OptimizeRequest, QueryOptimizer, Suggestion};
