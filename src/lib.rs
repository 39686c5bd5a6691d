//! # Precinct
//!
//! A SQL query copilot: checks a query against a live PostgreSQL database,
//! gathers schema and plan context, and asks a language model for a faster
//! rewrite that the database also accepts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Query text                            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [query: parse + PREPARE/DEALLOCATE]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Query = text + EXPLAIN ANALYZE plan + Table metadata   │
//! │           (sql: references, metadata: TableCache)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [advisor: IntentExplainer]
//! ┌─────────────────────────────────────────────────────────┐
//! │      Intent  ◄──── operator clarifications (loop)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [advisor: QueryOptimizer, up to 3 tries]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Candidate text ─► admitted as a new Query ─► Outcome   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`workflow::Orchestrator`] drives the whole thing; [`workflow::run`] is the
//! one-call entry point.

pub mod advisor;
pub mod config;
pub mod db;
pub mod llm;
pub mod logging;
pub mod metadata;
pub mod query;
pub mod sql;
pub mod workflow;

pub use advisor::{Intent, Suggestion};
pub use db::{Database, DbError, PgDatabase};
pub use metadata::{Table, TableCache, TableResolver};
pub use query::{Plan, Query};
pub use workflow::{
    run, Clarification, ClarificationProvider, Optimization, Orchestrator, Outcome, WorkflowError,
};
