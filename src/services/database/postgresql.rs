// PostgreSQL gateway over a deadpool connection pool
use crate::config::StoreConfig;
use crate::error::AppError;
use crate::models::{Record, RowSet};
use crate::services::connection_pool;
use crate::services::database::adapter::StoreGateway;
use deadpool_postgres::Pool;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio_postgres::types::Type;
use tokio_postgres::SimpleQueryMessage;

pub struct PostgresGateway {
    pool: Pool,
    query_timeout: Duration,
}

impl PostgresGateway {
    pub fn new(pool: Pool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    /// Build the pool from the descriptor and verify the store answers
    pub async fn connect(store: &StoreConfig) -> Result<Self, AppError> {
        let pool = connection_pool::create_pool(store)?;
        let gateway = Self::new(pool, store.query_timeout());
        gateway.ping().await?;

        tracing::info!(
            "Connected to store: {}",
            connection_pool::mask_credentials(&connection_pool::connection_url(store))
        );
        Ok(gateway)
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, AppError> {
        self.pool
            .get()
            .await
            .map_err(|e| AppError::Query(format!("Failed to get connection from pool: {}", e)))
    }

    /// Format a driver error with SQLSTATE details when the server sent them
    fn describe_error(e: &tokio_postgres::Error) -> String {
        if let Some(db_error) = e.as_db_error() {
            format!(
                "Code: {}, Message: {}",
                db_error.code().code(),
                db_error.message()
            )
        } else {
            format!("{}", e)
        }
    }

    /// Column types from the prepared form of a single statement
    ///
    /// Input with several statements cannot be prepared; its values stay text.
    async fn column_types(client: &deadpool_postgres::Object, sql: &str) -> Option<Vec<Type>> {
        match client.prepare(sql).await {
            Ok(statement) => Some(
                statement
                    .columns()
                    .iter()
                    .map(|column| column.type_().clone())
                    .collect(),
            ),
            Err(e) => {
                tracing::debug!("Statement not preparable, values kept as text: {}", Self::describe_error(&e));
                None
            }
        }
    }

    /// Convert the server's text form of a value to JSON
    ///
    /// Integers, floats, booleans and JSON become native JSON values. Every
    /// other type (NUMERIC, UUID, INTERVAL, timestamps, arrays, ...) keeps the
    /// exact text the server sent, so no precision is lost.
    fn text_value(raw: Option<&str>, pg_type: Option<&Type>) -> Value {
        let raw = match raw {
            Some(raw) => raw,
            None => return Value::Null,
        };

        match pg_type {
            Some(&Type::BOOL) => match raw {
                "t" => Value::Bool(true),
                "f" => Value::Bool(false),
                other => json!(other),
            },
            Some(&Type::INT2) | Some(&Type::INT4) | Some(&Type::INT8) | Some(&Type::OID) => raw
                .parse::<i64>()
                .map(|v| json!(v))
                .unwrap_or_else(|_| json!(raw)),
            Some(&Type::FLOAT4) | Some(&Type::FLOAT8) => match raw.parse::<f64>() {
                // JSON numbers cannot hold NaN or infinities
                Ok(v) if v.is_finite() => json!(v),
                _ => json!(raw),
            },
            Some(&Type::JSON) | Some(&Type::JSONB) => {
                serde_json::from_str(raw).unwrap_or_else(|_| json!(raw))
            }
            _ => json!(raw),
        }
    }

    /// Collect the first result set from a simple-query response
    ///
    /// Statements that return no rows (DDL, plain INSERT) are skipped; the
    /// first statement with a row description supplies the columns and rows.
    fn first_result_set(messages: Vec<SimpleQueryMessage>, types: Option<&[Type]>) -> RowSet {
        let mut columns: Option<Vec<String>> = None;
        let mut records = Vec::new();

        for message in messages {
            match message {
                SimpleQueryMessage::RowDescription(description) => {
                    if columns.is_some() {
                        break;
                    }
                    columns = Some(description.iter().map(|c| c.name().to_string()).collect());
                }
                SimpleQueryMessage::Row(row) => {
                    let names = columns.get_or_insert_with(|| {
                        row.columns().iter().map(|c| c.name().to_string()).collect()
                    });
                    let types = types.filter(|types| types.len() == names.len());

                    let mut record = Record::new();
                    for (idx, name) in names.iter().enumerate() {
                        let pg_type = types.map(|types| &types[idx]);
                        record.insert(name.clone(), Self::text_value(row.get(idx), pg_type));
                    }
                    records.push(record);
                }
                SimpleQueryMessage::CommandComplete(_) if columns.is_some() => break,
                _ => {}
            }
        }

        RowSet::new(columns.unwrap_or_default(), records)
    }
}

#[async_trait::async_trait]
impl StoreGateway for PostgresGateway {
    async fn execute(&self, sql: &str) -> Result<RowSet, AppError> {
        let client = self.client().await?;
        let start_time = Instant::now();

        let types = Self::column_types(&client, sql).await;

        // Simple-query protocol: text values for every type, several statements allowed
        let messages = tokio::time::timeout(self.query_timeout, client.simple_query(sql))
            .await
            .map_err(|_| {
                AppError::Query(format!(
                    "Query timeout after {} seconds",
                    self.query_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                AppError::Query(format!("Query execution failed: {}", Self::describe_error(&e)))
            })?;

        let row_set = Self::first_result_set(messages, types.as_deref());

        tracing::info!(
            "Store returned {} rows in {} ms",
            row_set.len(),
            start_time.elapsed().as_millis()
        );

        Ok(row_set)
    }

    async fn columns(&self, sql: &str) -> Result<Vec<String>, AppError> {
        let client = self.client().await?;
        let statement = client
            .prepare(sql)
            .await
            .map_err(|e| AppError::Query(format!("Query preparation failed: {}", Self::describe_error(&e))))?;

        Ok(statement
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::Connection(format!("Failed to connect to the database: {}", e)))?;

        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| AppError::Connection(format!("Error to ping the database: {}", Self::describe_error(&e))))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close();
        tracing::debug!("Closed store connection pool");
    }
}
