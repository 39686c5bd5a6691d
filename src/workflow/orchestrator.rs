use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::clarify::{Clarification, ClarificationProvider};
use super::error::{WorkflowError, WorkflowResult};
use super::state::{StateTracker, WorkflowState};
use crate::advisor::{Intent, IntentExplainer, QueryOptimizer};
use crate::config::Settings;
use crate::db::Database;
use crate::llm::{CompletionClient, Prompts};
use crate::metadata::TableResolver;
use crate::query::{Query, ValidatedText};

/// Default bound on optimization attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A validated rewrite and the model's explanation of it.
#[derive(Debug, Clone)]
pub struct Optimization {
    pub query: Query,
    pub explanation: String,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone)]
pub enum Outcome {
    Optimized(Optimization),
    /// The operator aborted during clarification.
    Cancelled,
}

/// Drives one query through validate, analyze, clarify, optimize.
///
/// Holds no per-run state; the resolver's cache is shared across runs and
/// across clones of the resolver.
pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    model: String,
    resolver: TableResolver,
    explainer: IntentExplainer,
    optimizer: QueryOptimizer,
    max_attempts: u32,
}

impl Orchestrator {
    /// Orchestrator with built-in prompts, a private default-sized cache,
    /// and [`DEFAULT_MAX_ATTEMPTS`].
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        let model = model.into();
        let prompts = Prompts::default();
        Self {
            explainer: IntentExplainer::new(Arc::clone(&client), model.as_str(), prompts.explain),
            optimizer: QueryOptimizer::new(Arc::clone(&client), model.as_str(), prompts.optimize),
            client,
            model,
            resolver: TableResolver::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Orchestrator configured from `settings`.
    pub fn from_settings(client: Arc<dyn CompletionClient>, settings: &Settings) -> Self {
        Self::new(client, settings.llm.model.as_str())
            .with_prompts(Prompts::from_settings(&settings.prompts))
            .with_resolver(TableResolver::with_capacity(settings.metadata.cache_capacity))
            .with_max_attempts(settings.optimizer.max_attempts)
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.explainer = IntentExplainer::new(Arc::clone(&self.client), self.model.as_str(), prompts.explain);
        self.optimizer = QueryOptimizer::new(Arc::clone(&self.client), self.model.as_str(), prompts.optimize);
        self
    }

    /// Share a resolver (and its cache) with other orchestrators.
    pub fn with_resolver(mut self, resolver: TableResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// At least one attempt is always made.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn resolver(&self) -> &TableResolver {
        &self.resolver
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Init -> Validated -> Analyzed for `text`.
    ///
    /// Used for the input query and again for every optimizer candidate.
    pub async fn admit(&self, text: &str, db: &dyn Database) -> WorkflowResult<Query> {
        self.admit_tracked(text, db, &mut StateTracker::new("query")).await
    }

    async fn admit_tracked(
        &self,
        text: &str,
        db: &dyn Database,
        tracker: &mut StateTracker,
    ) -> WorkflowResult<Query> {
        let validated = match ValidatedText::check(text, db).await {
            Ok(validated) => validated,
            Err(err) => {
                tracker.advance(WorkflowState::Failed);
                return Err(err.into());
            }
        };
        tracker.advance(WorkflowState::Validated);

        match Query::analyze(validated, db, &self.resolver).await {
            Ok(query) => {
                tracker.advance(WorkflowState::Analyzed);
                Ok(query)
            }
            Err(err) => {
                tracker.advance(WorkflowState::Failed);
                Err(err.into())
            }
        }
    }

    /// Run the whole workflow for `query_text`.
    #[instrument(skip_all, fields(db = %db.identity()))]
    pub async fn run<P>(
        &self,
        query_text: &str,
        db: &dyn Database,
        clarifications: &mut P,
    ) -> WorkflowResult<Outcome>
    where
        P: ClarificationProvider + ?Sized,
    {
        let mut tracker = StateTracker::new("query");
        let query = self.admit_tracked(query_text, db, &mut tracker).await?;
        info!(tables = query.tables().len(), plan = query.plan().is_available(), "query analyzed");

        let Some(intent) = self.clarify(&query, clarifications, &mut tracker).await? else {
            tracker.advance(WorkflowState::Cancelled);
            info!("run cancelled by operator");
            return Ok(Outcome::Cancelled);
        };

        tracker.advance(WorkflowState::Optimizing);
        let mut attempt = 1;
        loop {
            match self.attempt(&query, &intent, db).await {
                Ok(optimization) => {
                    tracker.advance(WorkflowState::Done);
                    info!(attempt, "optimized query validated");
                    return Ok(Outcome::Optimized(optimization));
                }
                Err(err) if attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        retriable = err.is_retriable(),
                        error = %err,
                        "optimization attempt failed, retrying"
                    );
                    attempt += 1;
                    tracker.advance(WorkflowState::Optimizing);
                }
                Err(err) => {
                    tracker.advance(WorkflowState::Failed);
                    return Err(WorkflowError::UnableToOptimize {
                        query: query.text().to_string(),
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
            }
        }
    }

    /// Explain until the operator accepts (`Some`) or aborts (`None`).
    async fn clarify<P>(
        &self,
        query: &Query,
        clarifications: &mut P,
        tracker: &mut StateTracker,
    ) -> WorkflowResult<Option<Intent>>
    where
        P: ClarificationProvider + ?Sized,
    {
        let mut clarification: Option<String> = None;
        loop {
            tracker.advance(WorkflowState::AwaitingClarification);
            let intent = match self.explainer.explain(query.text(), clarification.as_deref()).await {
                Ok(intent) => intent,
                Err(source) => {
                    tracker.advance(WorkflowState::Failed);
                    return Err(WorkflowError::ExplanationFailed {
                        query: query.text().to_string(),
                        source,
                    });
                }
            };

            match clarifications.review(query, &intent).await {
                Clarification::Accept => return Ok(Some(intent)),
                Clarification::Abort => return Ok(None),
                Clarification::Clarify(text) => {
                    tracker.advance(WorkflowState::Clarified);
                    clarification = Some(text);
                }
            }
        }
    }

    /// One optimizer call followed by admission of its candidate.
    async fn attempt(&self, query: &Query, intent: &Intent, db: &dyn Database) -> WorkflowResult<Optimization> {
        let suggestion = self
            .optimizer
            .optimize(query, intent)
            .await
            .map_err(|source| WorkflowError::OptimizationFailed {
                query: query.text().to_string(),
                source,
            })?;

        let candidate = self
            .admit_tracked(&suggestion.query, db, &mut StateTracker::new("candidate"))
            .await?;

        Ok(Optimization {
            query: candidate,
            explanation: suggestion.explanation,
        })
    }
}
