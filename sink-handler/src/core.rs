use serde::Serialize;
use serde_json::json;
use sink::batch::{BatchProcessor, BatchReport, BatchSummary};
use sink::error::SinkResult;
use sink::secrets::{ConfiguredSecretProvider, SecretProvider};
use sink::store::UpsertStore;
use sink::store::mysql::MySqlStore;
use sink::types::{StatusRecord, TableName, parse_event_batch};
use sink_config::shared::{MySqlConnectionConfig, SecretConfig, SinkConfig};
use tracing::{debug, error, info};

/// Message returned when the batch was processed.
pub const SUCCESS_MESSAGE: &str = "Records processed successfully";

/// Message returned when processing the batch failed.
pub const FAILURE_MESSAGE: &str = "Failed to process records";

/// Response of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    /// JSON document with a message and, on success, the outcome counts.
    pub body: String,
}

impl HandlerResponse {
    fn success(summary: BatchSummary) -> Self {
        Self {
            status_code: 200,
            body: json!({ "message": SUCCESS_MESSAGE, "summary": summary }).to_string(),
        }
    }

    fn failure() -> Self {
        Self {
            status_code: 500,
            body: json!({ "message": FAILURE_MESSAGE }).to_string(),
        }
    }
}

/// Applies a raw event batch to the configured MySQL table.
///
/// Per-record failures are part of a successful response. Any error that aborts the batch,
/// including malformed input and unavailable credentials, yields the failure response.
pub async fn handle_events(config: &SinkConfig, payload: &[u8]) -> HandlerResponse {
    log_config(config);

    respond(run(config, payload).await)
}

async fn run(config: &SinkConfig, payload: &[u8]) -> SinkResult<BatchReport> {
    let batch = parse_event_batch(payload)?;

    let credentials = ConfiguredSecretProvider::from(&config.secret)
        .get_secret()
        .await?;
    let connection_config = MySqlConnectionConfig::from(credentials);
    let store = MySqlStore::connect_lazy(&connection_config, &config.pool);

    let report = process_batch(store.clone(), &config.table_name, batch).await;
    store.pool().close().await;

    report
}

/// Processes parsed records with the given store.
pub async fn process_batch<S>(
    store: S,
    table_name: &str,
    batch: Vec<StatusRecord>,
) -> SinkResult<BatchReport>
where
    S: UpsertStore,
{
    let processor = BatchProcessor::new(store, TableName::parse(table_name));
    processor.process(batch).await
}

/// Maps the result of a batch to the response returned to the caller.
pub fn respond(result: SinkResult<BatchReport>) -> HandlerResponse {
    match result {
        Ok(report) => {
            let summary = report.summary();
            info!(
                processed = report.records.len(),
                skipped = report.skipped,
                all_succeeded = summary.all_succeeded(),
                "batch completed"
            );

            HandlerResponse::success(summary)
        }
        Err(err) => {
            error!("{err}");

            HandlerResponse::failure()
        }
    }
}

fn log_config(config: &SinkConfig) {
    debug!(
        table_name = %config.table_name,
        min_connections = config.pool.min_connections,
        max_connections = config.pool.max_connections,
        acquire_timeout_ms = config.pool.acquire_timeout_ms,
        "using sink config"
    );

    match &config.secret {
        SecretConfig::Env { variable } => {
            debug!(variable = %variable, "reading credentials from environment")
        }
        SecretConfig::File { path } => {
            debug!(path = %path.display(), "reading credentials from file")
        }
    }
}

#[cfg(test)]
mod tests {
    use sink::store::memory::MemoryStore;
    use sink::types::{ColumnMetadata, TableSchema};
    use sink_config::shared::PoolConfig;

    use super::*;

    const BATCH: &str = r#"[
        {"payload": {
            "topic": "records", "partition": 0, "offset": 1, "key": null,
            "value": {"data": {"id": 20, "field1": "value1", "field2": "value2", "status": true}},
            "headers": {}, "timestamp": "2024-05-01T10:00:00Z"
        }},
        {"payload": {
            "topic": "records", "partition": 0, "offset": 2, "key": null,
            "value": {"data": {"id": 21, "field1": "value1", "status": false}},
            "headers": {}, "timestamp": "2024-05-01T10:00:01Z"
        }}
    ]"#;

    fn records_schema() -> TableSchema {
        TableSchema::new(
            TableName::unqualified("records"),
            vec![
                ColumnMetadata::new("id".to_string(), false, None, false),
                ColumnMetadata::new("field1".to_string(), true, None, false),
                ColumnMetadata::new("field2".to_string(), true, None, false),
            ],
            vec!["id".to_string()],
        )
    }

    fn body(response: &HandlerResponse) -> serde_json::Value {
        serde_json::from_str(&response.body).unwrap()
    }

    fn file_secret_config(path: &str) -> SinkConfig {
        SinkConfig {
            table_name: "records".to_string(),
            secret: SecretConfig::File { path: path.into() },
            pool: PoolConfig::default(),
        }
    }

    #[tokio::test]
    async fn successful_batch_reports_summary() {
        let store = MemoryStore::new();
        store.create_table(records_schema()).await;

        let batch = parse_event_batch(BATCH.as_bytes()).unwrap();
        let response = respond(process_batch(store.clone(), "records", batch).await);

        assert_eq!(response.status_code, 200);
        let body = body(&response);
        assert_eq!(body["message"], SUCCESS_MESSAGE);
        assert_eq!(body["summary"]["inserted"], 1);
        assert_eq!(body["summary"]["skipped"], 1);
        assert_eq!(store.sessions_started().await, 1);
    }

    #[tokio::test]
    async fn failed_records_still_succeed() {
        let store = MemoryStore::new();

        let batch = parse_event_batch(BATCH.as_bytes()).unwrap();
        let response = respond(process_batch(store, "records", batch).await);

        assert_eq!(response.status_code, 200);
        assert_eq!(body(&response)["summary"]["storage_failed"], 1);
    }

    #[tokio::test]
    async fn malformed_batch_fails() {
        let config = file_secret_config("/nonexistent/secret.json");

        let response = handle_events(&config, b"{\"not\": \"a batch\"}").await;

        assert_eq!(response.status_code, 500);
        assert_eq!(body(&response)["message"], FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn unavailable_credentials_fail() {
        let config = file_secret_config("/nonexistent/secret.json");

        let response = handle_events(&config, BATCH.as_bytes()).await;

        assert_eq!(response.status_code, 500);
        assert!(!response.body.contains("secret.json"));
    }

    #[test]
    fn response_uses_camel_case_fields() {
        let response = HandlerResponse::failure();

        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["statusCode"], 500);
        assert!(value["body"].is_string());
    }
}
