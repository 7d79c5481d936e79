#![cfg(feature = "test-utils")]

use sink::batch::BatchProcessor;
use sink::error::ErrorKind;
use sink::store::memory::MemoryStore;
use sink::store::mysql::MySqlStore;
use sink::store::{StoreSession, UpsertStore};
use sink::types::{
    PersistOutcome, Record, StatusRecord, StorageFailure, TableName, ValidationFailure,
};
use sink::upsert::Upserter;
use sink_config::shared::{MySqlConnectionConfig, PoolConfig};
use sink_mysql::db::connect_to_database;
use sink_mysql::test_utils::{
    create_mysql_database, drop_mysql_database, local_mysql_connection_config,
};
use sink_telemetry::tracing::init_test_tracing;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

const RECORDS_DDL: &str = r#"
    CREATE TABLE records (
        id INT NOT NULL,
        field1 VARCHAR(64) NULL,
        field2 VARCHAR(64) NULL,
        field3 VARCHAR(64) NULL,
        status BOOLEAN NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NULL ON UPDATE CURRENT_TIMESTAMP,
        PRIMARY KEY (id)
    )
"#;

const PEOPLE_DDL: &str = r#"
    CREATE TABLE people (
        id BIGINT NOT NULL AUTO_INCREMENT,
        name VARCHAR(64) NOT NULL,
        email VARCHAR(128) NULL,
        PRIMARY KEY (id)
    )
"#;

const ORDER_ITEMS_DDL: &str = r#"
    CREATE TABLE order_items (
        order_id INT NOT NULL,
        line INT NOT NULL,
        quantity INT NULL,
        PRIMARY KEY (order_id, line)
    )
"#;

/// A throwaway database dropped at the end of the test.
struct TestDatabase {
    config: MySqlConnectionConfig,
    pool: MySqlPool,
}

impl TestDatabase {
    async fn new() -> Self {
        let config = local_mysql_connection_config(format!("sink_test_{}", Uuid::new_v4().simple()));
        create_mysql_database(&config).await;

        let pool = connect_to_database(&config, &PoolConfig::default())
            .await
            .expect("Failed to connect to test database");
        for ddl in [RECORDS_DDL, PEOPLE_DDL, ORDER_ITEMS_DDL] {
            sqlx::query(ddl)
                .execute(&pool)
                .await
                .expect("Failed to create test table");
        }

        Self { config, pool }
    }

    fn store(&self) -> MySqlStore {
        MySqlStore::new(self.pool.clone())
    }

    async fn cleanup(self) {
        self.pool.close().await;
        drop_mysql_database(&self.config).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn inspects_columns_keys_and_generated_values() {
    init_test_tracing();
    let database = TestDatabase::new().await;

    let mut session = database.store().begin().await.unwrap();
    let schema = session
        .table_schema(&TableName::unqualified("records"))
        .await
        .unwrap();
    session.rollback().await.unwrap();

    let names: Vec<_> = schema.columns.iter().map(|column| column.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["id", "field1", "field2", "field3", "status", "created_at", "updated_at"]
    );
    assert_eq!(schema.primary_keys, vec!["id"]);

    let created_at = schema.column("created_at").unwrap();
    assert!(created_at.has_live_default());
    assert!(!created_at.is_required());
    assert!(schema.column("updated_at").unwrap().auto_generated);
    assert!(schema.column("field1").unwrap().nullable);

    let mut session = database.store().begin().await.unwrap();
    let schema = session
        .table_schema(&TableName::unqualified("order_items"))
        .await
        .unwrap();
    drop(session);
    assert_eq!(schema.primary_keys, vec!["order_id", "line"]);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_table_is_schema_unavailable() {
    init_test_tracing();
    let database = TestDatabase::new().await;

    let mut session = database.store().begin().await.unwrap();
    let err = session
        .table_schema(&TableName::unqualified("missing"))
        .await
        .unwrap_err();
    drop(session);

    assert_eq!(err.kind(), ErrorKind::SchemaUnavailable);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn event_record_is_inserted_then_updated() {
    init_test_tracing();
    let database = TestDatabase::new().await;
    let table_name = TableName::unqualified("records");
    let upserter = Upserter::new(database.store());

    let record = Record::new()
        .with("id", 20)
        .with("field1", "value1")
        .with("field2", "value2")
        .with("field3", "value3")
        .with("status", true);
    let outcome = upserter.upsert(&table_name, record.clone()).await.unwrap();
    assert_eq!(outcome, PersistOutcome::Inserted);

    let record = record.with("field2", "changed");
    let outcome = upserter.upsert(&table_name, record).await.unwrap();
    assert_eq!(outcome, PersistOutcome::Updated);

    let row = sqlx::query("SELECT field1, field2, field3 FROM records WHERE id = 20")
        .fetch_one(&database.pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("field1"), "value1");
    assert_eq!(row.get::<String, _>("field2"), "changed");
    assert_eq!(row.get::<String, _>("field3"), "value3");

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_update_keeps_absent_columns() {
    init_test_tracing();
    let database = TestDatabase::new().await;
    let table_name = TableName::unqualified("order_items");
    let upserter = Upserter::new(database.store());

    let record = Record::new()
        .with("order_id", 1)
        .with("line", 1)
        .with("quantity", 5);
    assert_eq!(
        upserter.upsert(&table_name, record).await.unwrap(),
        PersistOutcome::Inserted
    );

    let record = Record::new().with("order_id", 1).with("quantity", 6);
    assert_eq!(
        upserter.upsert(&table_name, record).await.unwrap(),
        PersistOutcome::ValidationFailed(ValidationFailure::MissingPrimaryKey {
            column: "line".to_string()
        })
    );

    let quantity: i32 =
        sqlx::query("SELECT quantity FROM order_items WHERE order_id = 1 AND line = 1")
            .fetch_one(&database.pool)
            .await
            .unwrap()
            .get("quantity");
    assert_eq!(quantity, 5);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn constraint_violation_fails_only_its_record() {
    init_test_tracing();
    let database = TestDatabase::new().await;
    let processor = BatchProcessor::new(database.store(), TableName::unqualified("people"));

    let batch = vec![
        StatusRecord::new(true, Record::new().with("name", "first")),
        StatusRecord::new(true, Record::new().with("name", None::<String>)),
        StatusRecord::new(true, Record::new().with("name", "third")),
        StatusRecord::new(false, Record::new().with("name", "inactive")),
    ];
    let report = processor.process(batch).await.unwrap();

    let outcomes: Vec<_> = report.outcomes().cloned().collect();
    assert_eq!(outcomes[0], PersistOutcome::Inserted);
    assert!(matches!(
        outcomes[1],
        PersistOutcome::StorageFailed(StorageFailure::Execution { .. })
    ));
    assert_eq!(outcomes[2], PersistOutcome::Inserted);
    assert_eq!(report.skipped, 1);

    let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM people")
        .fetch_one(&database.pool)
        .await
        .unwrap()
        .get("count");
    assert_eq!(count, 2);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_store_agrees_with_mysql_on_outcomes() {
    init_test_tracing();
    let database = TestDatabase::new().await;
    let table_name = TableName::unqualified("people");

    let mut session = database.store().begin().await.unwrap();
    let schema = session.table_schema(&table_name).await.unwrap();
    drop(session);

    let memory = MemoryStore::new();
    memory.create_table(schema).await;

    let records = [
        Record::new().with("name", "ada"),
        Record::new().with("email", "missing-name@example.com"),
        Record::new().with("id", 1).with("email", "ada@example.com"),
    ];

    let mysql_upserter = Upserter::new(database.store());
    let memory_upserter = Upserter::new(memory);
    for record in records {
        let expected = mysql_upserter
            .upsert(&table_name, record.clone())
            .await
            .unwrap();
        let actual = memory_upserter.upsert(&table_name, record).await.unwrap();
        assert_eq!(actual, expected);
    }

    database.cleanup().await;
}
