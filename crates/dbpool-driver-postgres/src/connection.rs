//! PostgreSQL connection implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use dbpool_core::{ColumnMeta, Connection, DbPoolError, QueryResult, Result, Row};
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};

use crate::convert::postgres_to_value;

pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }

    match db_error.code().code() {
        "23505" => format!("duplicate value violates unique constraint: {}", message),
        "23503" => format!("foreign key violation: {}", message),
        "23502" => format!("null value violates not-null constraint: {}", message),
        "42P01" => format!("undefined table: {}", message),
        code => format!("{} (code: {})", message, code),
    }
}

struct Session {
    client: Client,
    in_transaction: bool,
}

impl Session {
    async fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.client
                .batch_execute("BEGIN")
                .await
                .map_err(|e| DbPoolError::Query(format_postgres_error(&e)))?;
            self.in_transaction = true;
        }
        Ok(())
    }

    /// Abort the open transaction after a failed statement
    async fn abort(&mut self) {
        if !self.in_transaction {
            return;
        }
        self.in_transaction = false;
        if let Err(e) = self.client.batch_execute("ROLLBACK").await {
            tracing::warn!(error = %format_postgres_error(&e), "failed to roll back transaction");
        }
    }
}

/// A single PostgreSQL session
///
/// Statements run in a transaction that is opened on first use and ended by
/// `commit`. A failing statement rolls its transaction back, so the session
/// can go straight back into a pool.
pub struct PostgresConnection {
    session: Mutex<Option<Session>>,
    closed: AtomicBool,
    /// Set by the background I/O task once the server side is gone
    lost: Arc<AtomicBool>,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database
    pub async fn connect(config: &tokio_postgres::Config) -> Result<Self> {
        let (client, connection) = config.connect(NoTls).await.map_err(|e| {
            DbPoolError::ConnectFailed(format!(
                "Failed to connect to PostgreSQL: {}",
                format_postgres_error(&e)
            ))
        })?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
            flag.store(true, Ordering::SeqCst);
        });

        tracing::debug!(dbname = ?config.get_dbname(), "PostgreSQL connection established");
        Ok(Self {
            session: Mutex::new(Some(Session {
                client,
                in_transaction: false,
            })),
            closed: AtomicBool::new(false),
            lost,
        })
    }
}

fn connection_closed() -> DbPoolError {
    DbPoolError::Query("connection is closed".to_string())
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement");

        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(connection_closed)?;
        session.begin().await?;

        match session.client.execute(sql, &[]).await {
            Ok(affected) => Ok(affected),
            Err(e) => {
                session.abort().await;
                Err(DbPoolError::Query(format!(
                    "Failed to execute statement: {}",
                    format_postgres_error(&e)
                )))
            }
        }
    }

    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let start_time = Instant::now();

        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(connection_closed)?;
        session.begin().await?;

        let statement = match session.client.prepare(sql).await {
            Ok(statement) => statement,
            Err(e) => {
                session.abort().await;
                return Err(DbPoolError::Query(format!(
                    "Failed to prepare query: {}",
                    format_postgres_error(&e)
                )));
            }
        };

        let pg_rows = match session.client.query(&statement, &[]).await {
            Ok(rows) => rows,
            Err(e) => {
                session.abort().await;
                return Err(DbPoolError::Query(format!(
                    "Failed to execute query: {}",
                    format_postgres_error(&e)
                )));
            }
        };

        // Column metadata comes from the statement so empty results keep their columns
        let mut result = QueryResult::empty();
        let mut column_names = Vec::with_capacity(statement.columns().len());
        for (ordinal, column) in statement.columns().iter().enumerate() {
            column_names.push(column.name().to_string());
            result.columns.push(ColumnMeta {
                name: column.name().to_string(),
                data_type: column.type_().name().to_string(),
                ordinal,
            });
        }

        for pg_row in &pg_rows {
            let values = (0..column_names.len())
                .map(|idx| postgres_to_value(pg_row, idx))
                .collect();
            result.rows.push(Row::new(column_names.clone(), values));
        }

        result.execution_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::debug!(rows = result.rows.len(), elapsed_ms = result.execution_time_ms, "query complete");
        Ok(result)
    }

    async fn commit(&self) -> Result<()> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(connection_closed)?;
        if !session.in_transaction {
            return Ok(());
        }

        session.in_transaction = false;
        session
            .client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| DbPoolError::Query(format!("Failed to commit: {}", format_postgres_error(&e))))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the client ends the session; an open transaction is discarded server side
        if self.session.lock().await.take().is_some() {
            tracing::debug!("closing PostgreSQL connection");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.lost.load(Ordering::SeqCst)
    }
}
