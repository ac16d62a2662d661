use super::error::TransactionError;
use super::logger::Logger;
use super::pool::DbHandle;
use super::router::trace_statement;
use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::any::{AnyQueryResult, AnyRow};
use sqlx::{Any, Execute, Executor, Transaction};
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use strata_common_log::spans::transaction_span;
use tracing::{debug, Instrument, Span};

/// An open transaction on the primary whose statements are traced like routed ones.
///
/// Dereferences to the sqlx [`Transaction`] for anything the helpers do not
/// cover; statements issued that way are not traced.
pub struct TracedTransaction {
    tx: Transaction<'static, Any>,
    logger: Arc<dyn Logger>,
    slow_query_logger: Arc<dyn Logger>,
}

impl TracedTransaction {
    pub async fn execute<'q, E>(&mut self, query: E) -> Result<AnyQueryResult, sqlx::Error>
    where
        E: Execute<'q, Any> + 'q,
    {
        let sql = query.sql();
        let begin = Instant::now();
        let result = (&mut *self.tx).execute(query).await;
        let rows = result.as_ref().map_or(0, AnyQueryResult::rows_affected);
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    pub async fn fetch_all<'q, E>(&mut self, query: E) -> Result<Vec<AnyRow>, sqlx::Error>
    where
        E: Execute<'q, Any> + 'q,
    {
        let sql = query.sql();
        let begin = Instant::now();
        let result = (&mut *self.tx).fetch_all(query).await;
        let rows = result.as_ref().map_or(0, |rows| rows.len() as u64);
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    pub async fn fetch_one<'q, E>(&mut self, query: E) -> Result<AnyRow, sqlx::Error>
    where
        E: Execute<'q, Any> + 'q,
    {
        let sql = query.sql();
        let begin = Instant::now();
        let result = (&mut *self.tx).fetch_one(query).await;
        let rows = u64::from(result.is_ok());
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    pub async fn fetch_optional<'q, E>(&mut self, query: E) -> Result<Option<AnyRow>, sqlx::Error>
    where
        E: Execute<'q, Any> + 'q,
    {
        let sql = query.sql();
        let begin = Instant::now();
        let result = (&mut *self.tx).fetch_optional(query).await;
        let rows = result.as_ref().map_or(0, |row| u64::from(row.is_some()));
        self.trace(begin, sql, rows, result.as_ref().err());
        result
    }

    fn trace(&self, begin: Instant, sql: &str, rows: u64, err: Option<&sqlx::Error>) {
        trace_statement(
            [self.logger.as_ref(), self.slow_query_logger.as_ref()],
            begin,
            sql,
            rows,
            err,
        );
    }
}

impl Deref for TracedTransaction {
    type Target = Transaction<'static, Any>;

    fn deref(&self) -> &Self::Target {
        &self.tx
    }
}

impl DerefMut for TracedTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tx
    }
}

/// Runs a unit of work inside one transaction on the primary.
pub struct TransactionExecutor<'a> {
    handle: &'a DbHandle,
    logger: Arc<dyn Logger>,
    slow_query_logger: Arc<dyn Logger>,
}

impl<'a> TransactionExecutor<'a> {
    pub fn new(handle: &'a DbHandle, logger: Arc<dyn Logger>, slow_query_logger: Arc<dyn Logger>) -> Self {
        Self {
            handle,
            logger,
            slow_query_logger,
        }
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`. Rolls back when it returns `Err`, and
    /// that error is returned unchanged. Rolls back when it panics, then
    /// resumes the panic.
    pub async fn run<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut TracedTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<TransactionError> + Send,
    {
        self.run_inner(f).instrument(transaction_span()).await
    }

    async fn run_inner<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut TracedTransaction) -> BoxFuture<'c, Result<T, E>> + Send,
        T: Send,
        E: From<TransactionError> + Send,
    {
        let tx = self.handle.begin().await.map_err(TransactionError::Begin)?;
        let mut traced = TracedTransaction {
            tx,
            logger: Arc::clone(&self.logger),
            slow_query_logger: Arc::clone(&self.slow_query_logger),
        };

        // The callback may panic before handing back its future.
        let work = &mut traced;
        let outcome = match panic::catch_unwind(AssertUnwindSafe(move || f(work))) {
            Ok(future) => AssertUnwindSafe(future).catch_unwind().await,
            Err(payload) => Err(payload),
        };

        match outcome {
            Ok(Ok(value)) => {
                traced.tx.commit().await.map_err(TransactionError::Commit)?;
                Span::current().record("outcome", "committed");
                debug!(name = self.handle.name(), "Transaction committed");
                Ok(value)
            }
            Ok(Err(e)) => {
                self.rollback(traced.tx).await;
                Span::current().record("outcome", "rolled_back");
                Err(e)
            }
            Err(payload) => {
                self.rollback(traced.tx).await;
                Span::current().record("outcome", "panicked");
                panic::resume_unwind(payload)
            }
        }
    }

    async fn rollback(&self, tx: Transaction<'static, Any>) {
        if let Err(e) = tx.rollback().await {
            self.logger.error(
                "transaction rollback failed",
                &[("database", &self.handle.name()), ("error", &e)],
            );
        }
    }
}
