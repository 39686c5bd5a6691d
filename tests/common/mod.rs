//! In-memory doubles for the database and the completion API.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use precinct::db::{Database, DbError, DbResult};
use precinct::llm::{CompletionClient, CompletionRequest, LlmError, LlmResult};
use precinct::metadata::INDEXES_SQL;

#[derive(Clone, Default)]
struct FakeTable {
    indexes: Vec<(String, String)>,
    columns: Vec<(String, String)>,
}

/// A database that accepts everything except configured fragments.
pub struct FakeDatabase {
    identity: String,
    tables: HashMap<String, FakeTable>,
    rejected: Vec<String>,
    failing_fetch: HashSet<String>,
    plan: Option<Vec<String>>,
    prepares: AtomicUsize,
    explains: AtomicUsize,
    fetches: Mutex<HashMap<String, usize>>,
    prepared: Mutex<Vec<String>>,
}

impl FakeDatabase {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            tables: HashMap::new(),
            rejected: Vec::new(),
            failing_fetch: HashSet::new(),
            plan: Some(vec![
                "Seq Scan on orders  (cost=0.00..35.50 rows=2550 width=12) (actual time=0.010..0.011 rows=3 loops=1)".to_string(),
                "Planning Time: 0.050 ms".to_string(),
                "Execution Time: 0.030 ms".to_string(),
            ]),
            prepares: AtomicUsize::new(0),
            explains: AtomicUsize::new(0),
            fetches: Mutex::new(HashMap::new()),
            prepared: Mutex::new(Vec::new()),
        }
    }

    /// The orders/customers schema used across tests.
    pub fn shop() -> Self {
        Self::new("app@localhost:5432/shop")
            .with_table(
                "orders",
                &[
                    ("orders_pkey", "CREATE UNIQUE INDEX orders_pkey ON public.orders USING btree (id)"),
                    ("orders_cid_idx", "CREATE INDEX orders_cid_idx ON public.orders USING btree (cid)"),
                ],
                &[("id", "integer"), ("cid", "integer"), ("total", "numeric")],
            )
            .with_table(
                "customers",
                &[("customers_pkey", "CREATE UNIQUE INDEX customers_pkey ON public.customers USING btree (id)")],
                &[("id", "integer"), ("name", "text")],
            )
    }

    pub fn with_table(mut self, name: &str, indexes: &[(&str, &str)], columns: &[(&str, &str)]) -> Self {
        let pairs = |items: &[(&str, &str)]| -> Vec<(String, String)> {
            items
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        self.tables.insert(
            name.to_string(),
            FakeTable {
                indexes: pairs(indexes),
                columns: pairs(columns),
            },
        );
        self
    }

    /// Reject any prepared statement containing `fragment`.
    pub fn rejecting(mut self, fragment: &str) -> Self {
        self.rejected.push(fragment.to_string());
        self
    }

    /// Fail catalog lookups for `table`.
    pub fn failing_fetch(mut self, table: &str) -> Self {
        self.failing_fetch.insert(table.to_string());
        self
    }

    /// Raise on EXPLAIN ANALYZE.
    pub fn failing_explain(mut self) -> Self {
        self.plan = None;
        self
    }

    pub fn prepare_calls(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn explain_calls(&self) -> usize {
        self.explains.load(Ordering::SeqCst)
    }

    /// Catalog round trips for `table` (two per successful fetch).
    pub fn fetch_calls(&self, table: &str) -> usize {
        self.fetches.lock().unwrap().get(table).copied().unwrap_or(0)
    }

    pub fn total_round_trips(&self) -> usize {
        let fetches: usize = self.fetches.lock().unwrap().values().sum();
        fetches + self.prepare_calls() + self.explain_calls()
    }

    pub fn prepared_statements(&self) -> Vec<String> {
        self.prepared.lock().unwrap().clone()
    }
}

#[async_trait]
impl Database for FakeDatabase {
    fn identity(&self) -> &str {
        &self.identity
    }

    async fn fetch_pairs(&self, sql: &str, table: &str) -> DbResult<Vec<(String, String)>> {
        *self.fetches.lock().unwrap().entry(table.to_string()).or_default() += 1;
        if self.failing_fetch.contains(table) {
            return Err(DbError::new(format!("permission denied for table {}", table)));
        }

        let entry = self.tables.get(table).cloned().unwrap_or_default();
        Ok(if sql == INDEXES_SQL { entry.indexes } else { entry.columns })
    }

    async fn prepare(&self, statement: &str) -> DbResult<()> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        self.prepared.lock().unwrap().push(statement.to_string());
        match self.rejected.iter().find(|f| statement.contains(f.as_str())) {
            Some(fragment) => Err(DbError::new(format!("relation \"{}\" does not exist", fragment))),
            None => Ok(()),
        }
    }

    async fn explain_analyze(&self, _statement: &str) -> DbResult<Vec<String>> {
        self.explains.fetch_add(1, Ordering::SeqCst);
        self.plan
            .clone()
            .ok_or_else(|| DbError::new("canceling statement due to statement timeout"))
    }
}

/// One scripted completion answer.
#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Fail,
}

/// A completion client that answers from per-shape scripts.
///
/// When a script runs out its last reply repeats.
#[derive(Default)]
pub struct ScriptedCompletion {
    scripts: Mutex<HashMap<&'static str, VecDeque<Reply>>>,
    last: Mutex<HashMap<&'static str, Reply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, shape: &'static str, reply: Reply) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(shape)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn intent(self, goal: &str) -> Self {
        self.reply(
            "explain_query",
            Reply::Json(json!({ "structure": "join of two tables", "goal": goal })),
        )
    }

    pub fn suggestion(self, query: &str) -> Self {
        self.reply(
            "optimize_query",
            Reply::Json(json!({ "query": query, "explanation": "uses orders_cid_idx" })),
        )
    }

    pub fn failing(self, shape: &'static str) -> Self {
        self.reply(shape, Reply::Fail)
    }

    pub fn calls(&self, shape: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.response_format.name == shape)
            .count()
    }

    /// User messages sent for `shape`, in order.
    pub fn payloads(&self, shape: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.response_format.name == shape)
            .filter_map(|r| r.messages.last().map(|m| m.content.clone()))
            .collect()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<Value> {
        self.requests.lock().unwrap().push(request.clone());
        let shape = request.response_format.name;

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(shape)
            .and_then(|queue| queue.pop_front());
        let reply = match next {
            Some(reply) => {
                self.last.lock().unwrap().insert(shape, reply.clone());
                reply
            }
            None => self
                .last
                .lock()
                .unwrap()
                .get(shape)
                .cloned()
                .unwrap_or(Reply::Fail),
        };

        match reply {
            Reply::Json(value) => Ok(value),
            Reply::Fail => Err(LlmError::Api {
                status: 500,
                message: "upstream overloaded".to_string(),
            }),
        }
    }
}
