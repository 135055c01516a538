pub mod config;
pub mod connector;
pub mod driver;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::core::{Capability, Context, DbError, NamedValue, NamedValueCheck, Result};
use crate::driver::{
    Conn, ExecResult, ExecerContext, NamedValueChecker, QueryerContext, Rows, Stmt, Tx, TxOptions,
};
use crate::retry;
use config::Config;

/// Connection decorator that retries serialization conflicts.
///
/// `exec_context` and `query_context` run through [`retry::execute`] with
/// the configured retry limit. Preparing statements, opening transactions
/// and closing are forwarded untouched. Statements issued while an
/// explicit transaction is open on this connection get exactly one attempt:
/// a conflict aborts the whole transaction, so only the caller can retry it.
///
/// The optional-interface probes mirror the wrapped connection.
pub struct RetryConn {
    inner: Box<dyn Conn>,
    config: Arc<Config>,
    in_tx: Arc<AtomicBool>,
}

impl RetryConn {
    pub fn new(inner: Box<dyn Conn>, config: Arc<Config>) -> Self {
        Self {
            inner,
            config,
            in_tx: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a transaction opened through this connection is still open.
    pub fn in_transaction(&self) -> bool {
        self.in_tx.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecerContext for RetryConn {
    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<ExecResult> {
        let execer = self
            .inner
            .as_execer()
            .ok_or(DbError::Unsupported(Capability::ExecerContext))?;

        if self.in_transaction() {
            return execer.exec_context(ctx, query, args).await;
        }

        let stamped = self.config.stamp(ctx);
        let ctx = &stamped;
        retry::execute(ctx, move || execer.exec_context(ctx, query, args)).await
    }
}

#[async_trait]
impl QueryerContext for RetryConn {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        let queryer = self
            .inner
            .as_queryer()
            .ok_or(DbError::Unsupported(Capability::QueryerContext))?;

        if self.in_transaction() {
            return queryer.query_context(ctx, query, args).await;
        }

        let stamped = self.config.stamp(ctx);
        let ctx = &stamped;
        retry::execute(ctx, move || queryer.query_context(ctx, query, args)).await
    }
}

impl NamedValueChecker for RetryConn {
    /// Only text arrays are handed to the wrapped checker; every other value
    /// gets the generic conversion.
    fn check_named_value(&self, value: &mut NamedValue) -> Result<NamedValueCheck> {
        let Some(checker) = self.inner.as_named_value_checker() else {
            return Ok(NamedValueCheck::UseDefault);
        };

        if value.value.is_text_array() {
            checker.check_named_value(value)
        } else {
            Ok(NamedValueCheck::UseDefault)
        }
    }
}

#[async_trait]
impl Conn for RetryConn {
    async fn prepare(&self, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>> {
        self.inner.prepare(ctx, query).await
    }

    async fn begin(&self, ctx: &Context, opts: TxOptions) -> Result<Box<dyn Tx>> {
        let tx = self.inner.begin(ctx, opts).await?;
        self.in_tx.store(true, Ordering::SeqCst);
        debug!(?opts, "explicit transaction started; statement retries suspended");
        Ok(Box::new(RetryTx {
            inner: tx,
            in_tx: Arc::clone(&self.in_tx),
            finished: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn as_execer(&self) -> Option<&dyn ExecerContext> {
        self.inner.as_execer().map(|_| self as &dyn ExecerContext)
    }

    fn as_queryer(&self) -> Option<&dyn QueryerContext> {
        self.inner.as_queryer().map(|_| self as &dyn QueryerContext)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        self.inner
            .as_named_value_checker()
            .map(|_| self as &dyn NamedValueChecker)
    }
}

/// Transaction handed out by [`RetryConn::begin`].
///
/// Re-enables statement retries on its connection once it is committed,
/// rolled back or dropped.
pub struct RetryTx {
    inner: Box<dyn Tx>,
    in_tx: Arc<AtomicBool>,
    finished: AtomicBool,
}

impl RetryTx {
    fn finish(&self) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            self.in_tx.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Tx for RetryTx {
    async fn commit(&self) -> Result<()> {
        let outcome = self.inner.commit().await;
        self.finish();
        outcome
    }

    async fn rollback(&self) -> Result<()> {
        let outcome = self.inner.rollback().await;
        self.finish();
        outcome
    }
}

impl Drop for RetryTx {
    fn drop(&mut self) {
        self.finish();
    }
}
