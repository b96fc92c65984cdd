use std::path::Path;
use std::sync::Arc;

use crate::app::{AppFactory, Session, Suggestion};
use crate::config::Config;
use crate::feedback::FeedbackStore;
use crate::learned::{PatternStore, SynonymStore};
use crate::linguistic::RuleAnalyzer;
use crate::resolver::Stage;
use crate::schema::TableId;
use crate::semantic::HashingEmbedder;
use crate::training::{self, TrainingRow, TrainingSet};

use super::{sales_schema, test_locks, SALES_SCHEMA};

const TRAINING_CSV: &str = "\
DB_Config,Schema,Table_Name,Primary_Keys,Foreign_Keys,Associated_Tables,Associated_Views,Description,Columns_List
warehouse,sales,orders,order_id,customer_id,customers,,Every order a customer placed with its date,\"order_id,order_date,customer_id\"
warehouse,sales,customers,customer_id,,,,Customer master data with home city,\"customer_id,city\"
warehouse,sales,refunds,refund_id,,,,Refunds issued to customers,refund_id
warehouse,sales,orders,,,,,,
";

fn write_csv(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("input.csv");
    std::fs::write(&path, TRAINING_CSV).unwrap();
    path
}

#[test]
fn load_keeps_described_rows_of_known_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let set = TrainingSet::load(&write_csv(tmp.path()), &sales_schema()).unwrap();

    assert_eq!(set.len(), 2);
    let orders = &set.records()[0];
    assert_eq!(
        orders.tables,
        vec![TableId::new("sales", "orders"), TableId::new("sales", "customers")]
    );
    assert_eq!(orders.columns, vec!["order_id", "order_date", "customer_id"]);
    assert_eq!(orders.description, "every order a customer placed with its date");
}

#[test]
fn find_matches_description_substrings() {
    let rows = vec![TrainingRow {
        schema: "SALES".to_string(),
        table_name: "Customers".to_string(),
        description: "Customer master data with home city".to_string(),
        ..TrainingRow::default()
    }];
    let set = TrainingSet::from_rows(rows, &sales_schema());

    let record = set.find("Master Data").unwrap();
    assert_eq!(record.tables, vec![TableId::new("sales", "customers")]);
    assert!(set.find("invoice lines").is_none());
    assert!(set.find("  ").is_none());
}

#[test]
fn template_has_one_row_per_table() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("template.csv");

    assert_eq!(training::write_template(&path, &sales_schema(), "warehouse").unwrap(), 2);

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<TrainingRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].table_name, "orders");
    assert_eq!(rows[0].primary_keys, "order_id");
    assert_eq!(rows[0].foreign_keys, "customer_id");
    assert_eq!(rows[0].associated_tables, "sales.customers");
    assert_eq!(rows[0].columns_list, "order_id,order_date,customer_id");
    assert_eq!(rows[1].associated_tables, "sales.orders");
    assert!(rows.iter().all(|r| r.description.is_empty() && r.db_config == "warehouse"));
}

#[test]
fn ingest_seeds_every_store() {
    let tmp = tempfile::tempdir().unwrap();
    let schema = sales_schema();
    let locks = test_locks(tmp.path());
    let set = TrainingSet::load(&write_csv(tmp.path()), &schema).unwrap();

    let feedback = FeedbackStore::open(
        &tmp.path().join("feedback"),
        locks.clone(),
        Arc::new(HashingEmbedder::new(64)),
        Arc::new(RuleAnalyzer::new()),
    )
    .unwrap();
    let patterns = PatternStore::open(tmp.path(), locks.clone());
    let synonyms = SynonymStore::open(tmp.path(), locks, 0.75);

    let report = training::ingest(&set, &schema, &feedback, &patterns, &synonyms, false).unwrap();
    assert_eq!(report.records, 2);
    assert_eq!(report.feedback, 2);
    assert_eq!(report.patterns, 3);
    assert_eq!(report.synonyms, 5);
    assert_eq!(report.skipped, 0);

    let orders = TableId::new("sales", "orders");
    assert_eq!(
        patterns.weight("every order a customer placed with its date", &orders),
        1.0
    );
    assert_eq!(synonyms.peak("order_date", &orders), Some(1.0));
    assert_eq!(synonyms.dynamic_len(), 0);
    assert_eq!(feedback.len(), 2);
}

#[test]
fn session_training_feeds_the_resolver() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = AppFactory::paths_in(tmp.path(), "warehouse").unwrap();
    std::fs::write(paths.schema_file(), SALES_SCHEMA).unwrap();

    let mut config = Config::default();
    config.embedding.backend = "hashing".to_string();
    let mut session = Session::open(
        paths.clone(),
        config,
        Arc::new(HashingEmbedder::new(128)),
        Arc::new(RuleAnalyzer::new()),
    )
    .unwrap();

    let report = session.train(&write_csv(tmp.path()), false).unwrap();
    assert_eq!(report.records, 2);
    assert!(paths.training_file().exists());

    match session.identify("customer master data with home city").unwrap() {
        Suggestion::Suggested(resolution) => {
            assert_eq!(resolution.stage, Stage::Feedback);
            assert_eq!(resolution.tables, vec![TableId::new("sales", "customers")]);
        }
        other => panic!("unexpected {other:?}"),
    }
}
