use sink_config::shared::{MySqlConnectionConfig, PoolConfig};
use sink_mysql::db::connect_lazy_to_database;
use sink_mysql::schema::get_table_schema;
use sqlx::mysql::{MySqlArguments, MySqlPool};
use sqlx::query::Query;
use sqlx::{MySql, Row, Transaction};

use crate::error::SinkResult;
use crate::statement::Statement;
use crate::store::base::{StoreSession, UpsertStore};
use crate::types::{Cell, TableName, TableSchema};

/// MySQL backed store.
///
/// Every session checks a connection out of the pool and opens a transaction on it. The
/// transaction is rolled back and the connection returned to the pool when the session is
/// dropped without being committed.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store whose pool connects on first use.
    ///
    /// Connectivity problems therefore surface per record rather than at startup.
    pub fn connect_lazy(config: &MySqlConnectionConfig, pool_config: &PoolConfig) -> Self {
        Self::new(connect_lazy_to_database(config, pool_config))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

impl UpsertStore for MySqlStore {
    type Session = MySqlSession;

    async fn begin(&self) -> SinkResult<Self::Session> {
        let transaction = self.pool.begin().await?;

        Ok(MySqlSession { transaction })
    }
}

/// A transaction on a pooled MySQL connection.
pub struct MySqlSession {
    transaction: Transaction<'static, MySql>,
}

impl StoreSession for MySqlSession {
    async fn table_schema(&mut self, table_name: &TableName) -> SinkResult<TableSchema> {
        let schema = get_table_schema(&mut *self.transaction, table_name).await?;

        Ok(schema)
    }

    async fn row_exists(&mut self, statement: &Statement) -> SinkResult<bool> {
        let row = bind_values(sqlx::query(statement.sql()), statement.values())
            .fetch_one(&mut *self.transaction)
            .await?;
        let count: i64 = row.try_get(0)?;

        Ok(count > 0)
    }

    async fn execute(&mut self, statement: &Statement) -> SinkResult<u64> {
        let result = bind_values(sqlx::query(statement.sql()), statement.values())
            .execute(&mut *self.transaction)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(self) -> SinkResult<()> {
        self.transaction.commit().await?;

        Ok(())
    }

    async fn rollback(self) -> SinkResult<()> {
        self.transaction.rollback().await?;

        Ok(())
    }
}

/// Binds the statement values to their placeholders in order.
fn bind_values<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &'q [Cell],
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            Cell::Null => query.bind(None::<String>),
            Cell::Bool(value) => query.bind(*value),
            Cell::I64(value) => query.bind(*value),
            Cell::U64(value) => query.bind(*value),
            Cell::F64(value) => query.bind(*value),
            Cell::String(value) => query.bind(value.as_str()),
        };
    }

    query
}
