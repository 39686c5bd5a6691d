//! End-to-end workflow runs against in-memory doubles.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{FakeDatabase, Reply, ScriptedCompletion};
use precinct::config::Settings;
use precinct::llm::LlmError;
use precinct::query::validate;
use precinct::workflow::{
    self, AcceptAll, Clarification, Optimization, Orchestrator, Outcome, WorkflowError,
};
use precinct::{Intent, Query};
use serde_json::json;

const INPUT: &str = "SELECT * FROM orders JOIN customers ON orders.cid = customers.id";
const REWRITE: &str =
    "SELECT o.*, c.* FROM orders o JOIN customers c ON c.id = o.cid WHERE o.cid IS NOT NULL";

fn orchestrator(client: &Arc<ScriptedCompletion>) -> Orchestrator {
    Orchestrator::new(client.clone(), "gpt-4o")
}

fn optimized(outcome: Outcome) -> Optimization {
    match outcome {
        Outcome::Optimized(optimization) => optimization,
        Outcome::Cancelled => panic!("run was cancelled"),
    }
}

#[tokio::test]
async fn test_accepted_intent_is_optimized() {
    let db = FakeDatabase::shop();
    let client = Arc::new(ScriptedCompletion::new().intent("orders with customers").suggestion(REWRITE));

    let outcome = orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap();
    let optimization = optimized(outcome);

    assert_eq!(optimization.query.text(), REWRITE);
    assert_eq!(optimization.explanation, "uses orders_cid_idx");
    assert_eq!(client.calls("explain_query"), 1);
    assert_eq!(client.calls("optimize_query"), 1);
}

#[tokio::test]
async fn test_done_query_passes_validation() {
    let db = FakeDatabase::shop();
    let client = Arc::new(ScriptedCompletion::new().intent("orders").suggestion(REWRITE));

    let optimization = optimized(orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap());

    assert!(validate(optimization.query.text(), &db).await);
    // The candidate went through the same admission as the input.
    assert!(db.prepared_statements().contains(&REWRITE.to_string()));
    assert_eq!(optimization.query.tables().len(), 2);
}

#[tokio::test]
async fn test_two_failures_then_success() {
    let db = FakeDatabase::shop();
    let client = Arc::new(
        ScriptedCompletion::new()
            .intent("orders")
            .failing("optimize_query")
            .failing("optimize_query")
            .suggestion(REWRITE),
    );

    let outcome = orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap();

    assert_eq!(optimized(outcome).query.text(), REWRITE);
    assert_eq!(client.calls("optimize_query"), 3);
}

#[tokio::test]
async fn test_always_failing_stops_after_three_attempts() {
    let db = FakeDatabase::shop();
    let client = Arc::new(ScriptedCompletion::new().intent("orders").failing("optimize_query"));

    let err = orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap_err();

    match err {
        WorkflowError::UnableToOptimize { query, attempts, last } => {
            assert_eq!(query, INPUT);
            assert_eq!(attempts, 3);
            assert!(matches!(*last, WorkflowError::OptimizationFailed { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.calls("optimize_query"), 3);
    assert_eq!(client.calls("explain_query"), 1);
}

#[tokio::test]
async fn test_invalid_candidate_is_retried() {
    let db = FakeDatabase::shop().rejecting("order_lines");
    let client = Arc::new(
        ScriptedCompletion::new()
            .intent("orders")
            .suggestion("SELECT * FROM order_lines")
            .suggestion(REWRITE),
    );

    let outcome = orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap();

    assert_eq!(optimized(outcome).query.text(), REWRITE);
    assert_eq!(client.calls("optimize_query"), 2);
}

#[tokio::test]
async fn test_multi_statement_candidate_is_never_sent() {
    let db = FakeDatabase::shop();
    let client = Arc::new(
        ScriptedCompletion::new()
            .intent("orders")
            .suggestion("SELECT * FROM orders; DELETE FROM orders")
            .suggestion(REWRITE),
    );

    let outcome = orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap();

    assert_eq!(optimized(outcome).query.text(), REWRITE);
    assert_eq!(client.calls("optimize_query"), 2);
    assert!(db
        .prepared_statements()
        .iter()
        .all(|statement| !statement.contains("DELETE")));
}

#[tokio::test]
async fn test_candidate_never_valid() {
    let db = FakeDatabase::shop().rejecting("order_lines");
    let client = Arc::new(
        ScriptedCompletion::new()
            .intent("orders")
            .suggestion("SELECT * FROM order_lines"),
    );

    let err = orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::UnableToOptimize { ref last, .. }
            if matches!(**last, WorkflowError::InvalidQuery { ref query } if query == "SELECT * FROM order_lines")
    ));
    assert_eq!(client.calls("optimize_query"), 3);
}

#[tokio::test]
async fn test_malformed_suggestion_is_retried() {
    let db = FakeDatabase::shop();
    let client = Arc::new(
        ScriptedCompletion::new()
            .intent("orders")
            .reply("optimize_query", Reply::Json(json!({ "sql": REWRITE })))
            .suggestion(REWRITE),
    );

    let outcome = orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap();

    assert_eq!(optimized(outcome).query.text(), REWRITE);
    assert_eq!(client.calls("optimize_query"), 2);
}

#[tokio::test]
async fn test_clarification_then_accept() {
    let db = FakeDatabase::shop();
    let client = Arc::new(
        ScriptedCompletion::new()
            .intent("all orders")
            .intent("orders for one customer")
            .suggestion(REWRITE),
    );

    let mut answers = vec![
        Clarification::Clarify("use an index on col X".to_string()),
        Clarification::Accept,
    ]
    .into_iter();
    let mut seen_goals = Vec::new();
    let mut reviewer = |_: &Query, intent: &Intent| {
        seen_goals.push(intent.goal.clone());
        answers.next().unwrap_or(Clarification::Abort)
    };

    let outcome = orchestrator(&client).run(INPUT, &db, &mut reviewer).await.unwrap();
    assert!(matches!(outcome, Outcome::Optimized(_)));

    assert_eq!(client.calls("explain_query"), 2);
    assert_eq!(seen_goals, vec!["all orders", "orders for one customer"]);

    let payloads = client.payloads("explain_query");
    assert!(!payloads[0].contains("<clarification>"));
    assert!(payloads[1].ends_with("<clarification>use an index on col X</clarification>"));

    // The optimizer sees the accepted goal, not the first one.
    assert!(client.payloads("optimize_query")[0].contains("<goal>orders for one customer</goal>"));
}

#[tokio::test]
async fn test_abort_cancels_without_error() {
    let db = FakeDatabase::shop();
    let client = Arc::new(ScriptedCompletion::new().intent("orders").suggestion(REWRITE));
    let mut reviewer = |_: &Query, _: &Intent| Clarification::Abort;

    let outcome = orchestrator(&client).run(INPUT, &db, &mut reviewer).await.unwrap();

    assert!(matches!(outcome, Outcome::Cancelled));
    assert_eq!(client.calls("optimize_query"), 0);
}

#[tokio::test]
async fn test_invalid_input_is_not_retried() {
    let db = FakeDatabase::shop().rejecting("nonexistent");
    let client = Arc::new(ScriptedCompletion::new().intent("orders").suggestion(REWRITE));

    let err = orchestrator(&client)
        .run("SELECT * FROM nonexistent", &db, &mut AcceptAll)
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::InvalidQuery { ref query } if query == "SELECT * FROM nonexistent"));
    assert!(!err.is_retriable());
    assert_eq!(client.calls("explain_query"), 0);
    assert_eq!(db.prepare_calls(), 1);
}

#[tokio::test]
async fn test_metadata_failure_is_fatal() {
    let db = FakeDatabase::shop().failing_fetch("customers");
    let client = Arc::new(ScriptedCompletion::new().intent("orders").suggestion(REWRITE));

    let err = orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap_err();

    assert!(matches!(err, WorkflowError::MetadataFetchFailed { ref table, .. } if table == "customers"));
    assert_eq!(client.calls("explain_query"), 0);
}

#[tokio::test]
async fn test_explanation_failure_is_terminal() {
    let db = FakeDatabase::shop();
    let client = Arc::new(
        ScriptedCompletion::new()
            .reply("explain_query", Reply::Json(json!({ "goal": "missing structure" })))
            .suggestion(REWRITE),
    );

    let err = orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap_err();

    match err {
        WorkflowError::ExplanationFailed { query, source } => {
            assert_eq!(query, INPUT);
            assert!(matches!(source, LlmError::ShapeMismatch { shape: "explain_query", .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.calls("explain_query"), 1);
    assert_eq!(client.calls("optimize_query"), 0);
}

#[tokio::test]
async fn test_empty_plan_still_optimizes() {
    let db = FakeDatabase::shop().failing_explain();
    let client = Arc::new(ScriptedCompletion::new().intent("orders").suggestion(REWRITE));

    optimized(orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap());

    assert!(client.payloads("optimize_query")[0].ends_with("<analyze>[]</analyze>"));
}

#[tokio::test]
async fn test_optimizer_payload_carries_schema_context() {
    let db = FakeDatabase::shop();
    let client = Arc::new(ScriptedCompletion::new().intent("orders").suggestion(REWRITE));

    optimized(orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap());

    let payload = &client.payloads("optimize_query")[0];
    assert!(payload.starts_with(&format!("<query>{}</query>", INPUT)));
    assert!(payload.contains(r#""orders_cid_idx":"CREATE INDEX orders_cid_idx ON public.orders USING btree (cid)""#));
    assert!(payload.contains(r#""customers":{"id":"integer","name":"text"}"#));
    assert!(payload.contains("Seq Scan on orders"));
}

#[tokio::test]
async fn test_metadata_is_shared_between_input_and_candidate() {
    let db = FakeDatabase::shop();
    let client = Arc::new(ScriptedCompletion::new().intent("orders").suggestion(REWRITE));

    optimized(orchestrator(&client).run(INPUT, &db, &mut AcceptAll).await.unwrap());

    // Input and candidate reference the same tables; each is fetched once.
    assert_eq!(db.fetch_calls("orders"), 2);
    assert_eq!(db.fetch_calls("customers"), 2);
}

#[tokio::test]
async fn test_admit_for_candidate_text() {
    let db = FakeDatabase::shop().rejecting("order_lines");
    let client = Arc::new(ScriptedCompletion::new());
    let orchestrator = orchestrator(&client);

    let query = orchestrator.admit("SELECT * FROM customers", &db).await.unwrap();
    assert_eq!(query.tables()[0].name, "customers");

    assert!(matches!(
        orchestrator.admit("SELECT * FROM order_lines", &db).await,
        Err(WorkflowError::InvalidQuery { .. })
    ));
}

#[tokio::test]
async fn test_max_attempts_from_settings() {
    let db = FakeDatabase::shop();
    let client = Arc::new(ScriptedCompletion::new().intent("orders").failing("optimize_query"));
    let settings = Settings::from_toml("[optimizer]\nmax_attempts = 5\n").unwrap();

    let orchestrator = Orchestrator::from_settings(client.clone(), &settings);
    let err = orchestrator.run(INPUT, &db, &mut AcceptAll).await.unwrap_err();

    assert!(matches!(err, WorkflowError::UnableToOptimize { attempts: 5, .. }));
    assert_eq!(client.calls("optimize_query"), 5);
}

#[tokio::test]
async fn test_run_entry_point() {
    let db = FakeDatabase::shop();
    let client = Arc::new(ScriptedCompletion::new().intent("orders").suggestion(REWRITE));

    let outcome = workflow::run(INPUT, &db, client.clone(), &mut AcceptAll).await.unwrap();

    assert_eq!(optimized(outcome).query.text(), REWRITE);
    assert_eq!(client.calls("explain_query"), 1);
    assert_eq!(client.calls("optimize_query"), 1);
}
