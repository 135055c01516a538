#![allow(dead_code)]
//! Scripted in-process driver used by the integration tests.
//!
//! Every statement attempt is counted and consumes the next scripted failure,
//! if any, so tests can assert exactly how many times the decorator called
//! into the driver.

use async_trait::async_trait;
use retrysql::{
    Conn, Connector, Context, DbError, Driver, DriverContext, ExecResult, ExecerContext,
    NamedValue, NamedValueCheck, NamedValueChecker, QueryerContext, Result, Rows, Stmt, Tx,
    TxOptions, Value,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn conflict() -> DbError {
    DbError::serialization_failure("restart transaction: TransactionRetryWithProtoRefreshError")
}

#[derive(Debug, Clone, Copy)]
pub struct Caps {
    pub execer: bool,
    pub queryer: bool,
    pub checker: bool,
    pub connector: bool,
}

impl Caps {
    pub fn all() -> Self {
        Self {
            execer: true,
            queryer: true,
            checker: true,
            connector: true,
        }
    }

    pub fn none() -> Self {
        Self {
            execer: false,
            queryer: false,
            checker: false,
            connector: false,
        }
    }
}

#[derive(Default)]
pub struct DriverState {
    pub opened: AtomicUsize,
    pub connectors: AtomicUsize,
    pub exec_attempts: AtomicUsize,
    pub query_attempts: AtomicUsize,
    pub stmt_calls: AtomicUsize,
    pub checker_calls: AtomicUsize,
    pub begun: AtomicUsize,
    pub committed: AtomicUsize,
    pub rolled_back: AtomicUsize,
    pub closed: AtomicUsize,
    pub seen_max_retries: Mutex<Vec<Option<usize>>>,
    failures: Mutex<VecDeque<DbError>>,
    fail_forever: Mutex<Option<DbError>>,
    commit_failures: Mutex<VecDeque<DbError>>,
    open_failure: Mutex<Option<DbError>>,
    attempt_delay: Mutex<Option<Duration>>,
}

impl DriverState {
    pub fn exec_attempts(&self) -> usize {
        self.exec_attempts.load(Ordering::SeqCst)
    }

    pub fn query_attempts(&self) -> usize {
        self.query_attempts.load(Ordering::SeqCst)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn seen_max_retries(&self) -> Vec<Option<usize>> {
        self.seen_max_retries.lock().unwrap().clone()
    }

    async fn attempt(&self, ctx: &Context, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        self.seen_max_retries.lock().unwrap().push(ctx.max_retries());

        let delay = *self.attempt_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.failures.lock().unwrap().pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }
        let forever = self.fail_forever.lock().unwrap().clone();
        match forever {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct FakeDriver {
    caps: Caps,
    state: Arc<DriverState>,
}

impl FakeDriver {
    pub fn new(caps: Caps) -> Self {
        Self {
            caps,
            state: Arc::new(DriverState::default()),
        }
    }

    pub fn full() -> Self {
        Self::new(Caps::all())
    }

    pub fn state(&self) -> Arc<DriverState> {
        Arc::clone(&self.state)
    }

    pub fn fail_next(self, errors: impl IntoIterator<Item = DbError>) -> Self {
        self.state.failures.lock().unwrap().extend(errors);
        self
    }

    pub fn fail_forever(self, err: DbError) -> Self {
        *self.state.fail_forever.lock().unwrap() = Some(err);
        self
    }

    pub fn fail_commits(self, errors: impl IntoIterator<Item = DbError>) -> Self {
        self.state.commit_failures.lock().unwrap().extend(errors);
        self
    }

    pub fn fail_open(self, err: DbError) -> Self {
        *self.state.open_failure.lock().unwrap() = Some(err);
        self
    }

    pub fn attempt_delay(self, delay: Duration) -> Self {
        *self.state.attempt_delay.lock().unwrap() = Some(delay);
        self
    }

    fn new_conn(&self) -> FakeConn {
        FakeConn {
            caps: self.caps,
            state: Arc::clone(&self.state),
        }
    }

    /// A raw, undecorated connection.
    pub fn conn(&self) -> Box<dyn Conn> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(self.new_conn())
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn open(&self, _name: &str) -> Result<Box<dyn Conn>> {
        let failure = self.state.open_failure.lock().unwrap().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        Ok(self.conn())
    }

    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        self.caps.connector.then_some(self as &dyn DriverContext)
    }
}

#[async_trait]
impl DriverContext for FakeDriver {
    async fn open_connector(&self, _name: &str) -> Result<Arc<dyn Connector>> {
        self.state.connectors.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeConnector {
            caps: self.caps,
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct FakeConnector {
    caps: Caps,
    state: Arc<DriverState>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _ctx: &Context) -> Result<Box<dyn Conn>> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConn {
            caps: self.caps,
            state: Arc::clone(&self.state),
        }))
    }

    fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(FakeDriver {
            caps: self.caps,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeConn {
    caps: Caps,
    state: Arc<DriverState>,
}

#[async_trait]
impl Conn for FakeConn {
    async fn prepare(&self, _ctx: &Context, _query: &str) -> Result<Box<dyn Stmt>> {
        Ok(Box::new(FakeStmt {
            state: Arc::clone(&self.state),
        }))
    }

    async fn begin(&self, _ctx: &Context, _opts: TxOptions) -> Result<Box<dyn Tx>> {
        self.state.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTx {
            state: Arc::clone(&self.state),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn as_execer(&self) -> Option<&dyn ExecerContext> {
        self.caps.execer.then_some(self as &dyn ExecerContext)
    }

    fn as_queryer(&self) -> Option<&dyn QueryerContext> {
        self.caps.queryer.then_some(self as &dyn QueryerContext)
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        self.caps.checker.then_some(self as &dyn NamedValueChecker)
    }
}

#[async_trait]
impl ExecerContext for FakeConn {
    async fn exec_context(
        &self,
        ctx: &Context,
        _query: &str,
        args: &[NamedValue],
    ) -> Result<ExecResult> {
        self.state.attempt(ctx, &self.state.exec_attempts).await?;
        Ok(ExecResult::new(args.len() as u64 + 1))
    }
}

#[async_trait]
impl QueryerContext for FakeConn {
    async fn query_context(
        &self,
        ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        self.state.attempt(ctx, &self.state.query_attempts).await?;
        Ok(Box::new(FakeRows::ids(&[1, 2])))
    }
}

impl NamedValueChecker for FakeConn {
    /// Encodes text arrays as a Postgres array literal.
    fn check_named_value(&self, value: &mut NamedValue) -> Result<NamedValueCheck> {
        self.state.checker_calls.fetch_add(1, Ordering::SeqCst);
        if let Value::TextArray(items) = &value.value {
            let encoded = format!("{{{}}}", items.join(","));
            value.value = Value::Text(encoded);
        }
        Ok(NamedValueCheck::Accepted)
    }
}

pub struct FakeStmt {
    state: Arc<DriverState>,
}

#[async_trait]
impl Stmt for FakeStmt {
    async fn exec(&self, ctx: &Context, _args: &[NamedValue]) -> Result<ExecResult> {
        self.state.stmt_calls.fetch_add(1, Ordering::SeqCst);
        self.state.attempt(ctx, &self.state.exec_attempts).await?;
        Ok(ExecResult::new(1))
    }

    async fn query(&self, ctx: &Context, _args: &[NamedValue]) -> Result<Box<dyn Rows>> {
        self.state.stmt_calls.fetch_add(1, Ordering::SeqCst);
        self.state.attempt(ctx, &self.state.query_attempts).await?;
        Ok(Box::new(FakeRows::ids(&[7])))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub struct FakeTx {
    state: Arc<DriverState>,
}

#[async_trait]
impl Tx for FakeTx {
    async fn commit(&self) -> Result<()> {
        let failure = self.state.commit_failures.lock().unwrap().pop_front();
        if let Some(err) = failure {
            return Err(err);
        }
        self.state.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.state.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeRows {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
}

impl FakeRows {
    pub fn ids(ids: &[i64]) -> Self {
        Self {
            columns: vec!["id".to_string()],
            rows: ids.iter().map(|id| vec![Value::Integer(*id)]).collect(),
        }
    }
}

#[async_trait]
impl Rows for FakeRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn next(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }
}
