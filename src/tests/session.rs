use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::app::{AppError, AppFactory, Session, Suggestion};
use crate::config::Config;
use crate::feedback::StoreOutcome;
use crate::learned::{SynonymHit, SynonymStore};
use crate::linguistic::RuleAnalyzer;
use crate::lock::{FileLock, StoreLock};
use crate::resolver::Stage;
use crate::schema::TableId;
use crate::semantic::{HashingEmbedder, QueryError};

use super::SALES_SCHEMA;

fn orders() -> TableId {
    TableId::new("sales", "orders")
}

fn customers() -> TableId {
    TableId::new("sales", "customers")
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding.backend = "hashing".to_string();
    config.locking.timeout_ms = 100;
    config.locking.retries = 2;
    config.history_size = 3;
    config
}

fn open_in(tmp: &TempDir, config: Config) -> Session {
    let paths = AppFactory::paths_in(tmp.path(), "sales_db").unwrap();
    if !paths.schema_file().exists() {
        std::fs::write(paths.schema_file(), SALES_SCHEMA).unwrap();
    }
    Session::open(
        paths,
        config,
        Arc::new(HashingEmbedder::new(256)),
        Arc::new(RuleAnalyzer::new()),
    )
    .unwrap()
}

fn open(tmp: &TempDir) -> Session {
    open_in(tmp, test_config())
}

#[test]
fn confirm_then_identify_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = open(&tmp);

    match session.identify("orders placed last year").unwrap() {
        Suggestion::Suggested(resolution) => assert!(resolution.tables.contains(&orders())),
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(
        session.confirm("orders placed last year", &["sales.orders"]).unwrap(),
        StoreOutcome::Created
    );

    match session.identify("orders placed last year").unwrap() {
        Suggestion::Suggested(resolution) => {
            assert_eq!(resolution.tables, vec![orders()]);
            assert_eq!(resolution.confidence, 0.9);
            assert_eq!(resolution.stage, Stage::Feedback);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn confirm_checkpoints_weights() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let mut session = open(&tmp);
        session.confirm("orders placed last year", &["sales.orders"]).unwrap();
        assert!((session.weights().get(&orders()) - 1.1).abs() < 1e-6);
        assert!((session.weights().get(&customers()) - 0.95).abs() < 1e-6);
    }

    let reopened = open(&tmp);
    assert!((reopened.weights().get(&orders()) - 1.1).abs() < 1e-6);
    assert!((reopened.weights().get(&customers()) - 0.95).abs() < 1e-6);
}

#[test]
fn correction_replaces_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = open(&tmp);

    session.confirm("customers in each city", &["sales.orders"]).unwrap();
    assert_eq!(
        session.correct("customers in each city", &["sales.customers"]).unwrap(),
        StoreOutcome::Updated
    );

    match session.identify("customers in each city").unwrap() {
        Suggestion::Suggested(resolution) => assert_eq!(resolution.tables, vec![customers()]),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(session.top_queries(5).unwrap(), vec![("customers in each city".to_string(), 2)]);
}

#[test]
fn unknown_tables_are_rejected_without_side_effects() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = open(&tmp);

    let err = session
        .confirm("orders placed last year", &["badschema.badtable"])
        .unwrap_err();
    assert!(matches!(err, AppError::Schema(_)));
    assert!(session.top_queries(5).unwrap().is_empty());
    assert_eq!(session.weights().get(&orders()), 1.0);
    assert_eq!(session.history().count(), 0);
}

#[test]
fn vague_queries_are_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = open(&tmp);

    assert!(matches!(
        session.identify("   "),
        Err(AppError::InvalidQuery(QueryError::Empty))
    ));
    assert!(matches!(
        session.identify("orders"),
        Err(AppError::InvalidQuery(QueryError::TooShort))
    ));
    assert!(matches!(
        session.identify("2021 2022"),
        Err(AppError::InvalidQuery(QueryError::NoWords))
    ));
}

#[test]
fn history_keeps_most_recent_queries() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = open(&tmp);

    for query in ["first orders query", "second orders query", "third orders query", "fourth orders query"] {
        session.identify(query).unwrap();
    }
    session.confirm("fifth orders query", &["sales.orders"]).unwrap();

    let history: Vec<(&str, bool)> = session
        .history()
        .map(|entry| (entry.query.as_str(), entry.confirmed))
        .collect();
    assert_eq!(
        history,
        vec![
            ("third orders query", false),
            ("fourth orders query", false),
            ("fifth orders query", true),
        ]
    );
}

#[test]
fn history_is_shared_across_runs() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let mut first = open(&tmp);
        first.identify("first orders query").unwrap();
        first.confirm("second orders query", &["sales.orders"]).unwrap();
    }

    let mut second = open(&tmp);
    second.identify("third orders query").unwrap();
    second.identify("fourth orders query").unwrap();

    let queries: Vec<&str> = second.history().map(|entry| entry.query.as_str()).collect();
    assert_eq!(queries, vec!["second orders query", "third orders query", "fourth orders query"]);
    assert_eq!(second.history().next().unwrap().tables, vec![orders()]);
}

#[test]
fn exit_checkpoint_keeps_synonyms_promoted_elsewhere() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = open(&tmp);
    let db_path = session.paths().db_path.clone();

    let other = SynonymStore::open(&db_path, StoreLock::new(&db_path, Duration::from_millis(100)), 0.75);
    other
        .learn(&[SynonymHit { token: "town".into(), table: customers(), weight: 0.9 }])
        .unwrap();
    session.save().unwrap();
    assert_eq!(other.promote().unwrap(), 1);
    session.save().unwrap();

    let reopened = SynonymStore::open(&db_path, StoreLock::new(&db_path, Duration::from_millis(100)), 0.75);
    assert_eq!((reopened.dynamic_len(), reopened.default_len()), (0, 1));

    session.reload_schema().unwrap();
    assert_eq!(session.synonym_layers(), (0, 1));
}

#[test]
fn busy_store_falls_back_to_manual_selection() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = open(&tmp);
    let db_path = session.paths().db_path.clone();

    std::fs::write(db_path.join("feedback").join("REVISION"), "42").unwrap();
    let held = FileLock::try_acquire(&db_path, "feedback").unwrap();

    match session.identify("orders placed last year").unwrap() {
        Suggestion::ManualFallback { attempts, tables } => {
            assert_eq!(attempts, 2);
            assert_eq!(tables, vec![orders(), customers()]);
        }
        other => panic!("unexpected {other:?}"),
    }

    let err = session.confirm("orders placed last year", &["sales.orders"]).unwrap_err();
    assert!(matches!(err, AppError::Busy { attempts: 2 }));

    drop(held);
    assert!(matches!(
        session.identify("orders placed last year").unwrap(),
        Suggestion::Suggested(_)
    ));
}

#[test]
fn export_import_round_trip_is_idempotent() {
    let source_dir = tempfile::tempdir().unwrap();
    let export_dir = tempfile::tempdir().unwrap();
    {
        let mut source = open(&source_dir);
        source.confirm("orders placed last year", &["sales.orders"]).unwrap();
        source.confirm("orders placed last year", &["sales.orders"]).unwrap();
        source.confirm("customers in each city", &["sales.customers"]).unwrap();
        assert_eq!(source.export_feedback(export_dir.path()).unwrap(), 2);
    }

    let target_dir = tempfile::tempdir().unwrap();
    let mut target = open(&target_dir);

    let first = target.import_feedback(export_dir.path()).unwrap();
    assert_eq!(first.created, 2);
    assert!(first.skipped.is_empty());

    let second = target.import_feedback(export_dir.path()).unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.unchanged, 2);

    assert_eq!(
        target.top_queries(5).unwrap(),
        vec![
            ("orders placed last year".to_string(), 2),
            ("customers in each city".to_string(), 1),
        ]
    );
    match target.identify("customers in each city").unwrap() {
        Suggestion::Suggested(resolution) => {
            assert_eq!(resolution.stage, Stage::Feedback);
            assert_eq!(resolution.tables, vec![customers()]);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn clear_feedback_forgets_confirmations() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = open(&tmp);

    session.confirm("customers in each city", &["sales.orders"]).unwrap();
    assert_eq!(session.clear_feedback().unwrap(), 1);

    match session.identify("customers in each city").unwrap() {
        Suggestion::Suggested(resolution) => assert_ne!(resolution.stage, Stage::Feedback),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_schema_opens_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = AppFactory::paths_in(tmp.path(), "fresh").unwrap();
    let mut session = Session::open(
        paths,
        test_config(),
        Arc::new(HashingEmbedder::new(64)),
        Arc::new(RuleAnalyzer::new()),
    )
    .unwrap();

    assert!(session.schema().is_empty());
    match session.identify("orders placed last year").unwrap() {
        Suggestion::Suggested(resolution) => assert_eq!(resolution.stage, Stage::Unresolved),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn reload_picks_up_schema_changes() {
    let tmp = tempfile::tempdir().unwrap();
    let mut session = open(&tmp);
    session.confirm("orders placed last year", &["sales.orders"]).unwrap();

    std::fs::write(
        session.paths().schema_file(),
        r#"{"tables": {"sales": ["orders", "customers", "stores"]},
            "columns": {"sales": {"stores": {"store_name": {"type": "varchar"}}}}}"#,
    )
    .unwrap();

    assert_eq!(session.reload_schema().unwrap(), 3);
    let stores = TableId::new("sales", "stores");
    assert_eq!(session.weights().get(&stores), 1.0);
    assert!((session.weights().get(&orders()) - 1.1).abs() < 1e-6);

    match session.identify("show all stores with store names").unwrap() {
        Suggestion::Suggested(resolution) => assert!(resolution.tables.contains(&stores)),
        other => panic!("unexpected {other:?}"),
    }
}
