use futures::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::connection::connector::DsnConnector;
use crate::core::{
    Context, DbError, NamedValue, NamedValueCheck, Result, Value, default_check_named_value,
};
use crate::driver::{Conn, Connector, Driver, ExecResult, Registry, Rows, Stmt, Tx, TxOptions};
use crate::retry::RetryPolicy;

/// Handle to a database reachable through one connector.
///
/// Every operation opens its own connection; there is no pooling. Use
/// [`Database::conn`] to run several statements on the same connection.
pub struct Database {
    connector: Arc<dyn Connector>,
    closed: AtomicBool,
}

impl Database {
    pub fn from_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            closed: AtomicBool::new(false),
        }
    }

    /// Opens `dsn` with the driver registered under `driver_name` in the
    /// global registry.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use retrysql::Database;
    /// # tokio_test::block_on(async {
    /// retrysql::register("postgres", [retrysql::with_max_retries(5)]).unwrap();
    /// let db = Database::open(retrysql::DRIVER_NAME, "postgres://localhost/app").await.unwrap();
    /// # });
    /// ```
    pub async fn open(driver_name: &str, dsn: &str) -> Result<Self> {
        let driver = Registry::global().driver(driver_name)?;
        Self::open_driver(driver, dsn).await
    }

    /// Opens `dsn` with `driver`, through its connector when it has one.
    pub async fn open_driver(driver: Arc<dyn Driver>, dsn: &str) -> Result<Self> {
        if let Some(driver_ctx) = driver.as_driver_context() {
            let connector = driver_ctx.open_connector(dsn).await?;
            return Ok(Self::from_connector(connector));
        }
        Ok(Self::from_connector(Arc::new(DsnConnector::new(dsn, driver))))
    }

    pub fn driver(&self) -> Arc<dyn Driver> {
        self.connector.driver()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Opens a dedicated connection.
    pub async fn conn(&self, ctx: &Context) -> Result<DbConn> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        if let Some(reason) = ctx.err() {
            return Err(reason);
        }
        let conn = self.connector.connect(ctx).await?;
        Ok(DbConn { conn })
    }

    /// Runs a statement on a fresh connection and closes it afterwards.
    pub async fn exec(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<ExecResult> {
        let conn = self.conn(ctx).await?;
        let outcome = conn.exec(ctx, query, args).await;
        conn.close().await;
        outcome
    }

    /// Runs a query on a fresh connection; the connection is closed together
    /// with the returned rows.
    pub async fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<QueryRows> {
        let conn = self.conn(ctx).await?;
        let queried = conn.query(ctx, query, args).await;
        match queried {
            Ok(mut rows) => {
                rows.conn = Some(conn);
                Ok(rows)
            }
            Err(err) => {
                conn.close().await;
                Err(err)
            }
        }
    }

    /// Starts an explicit transaction on a fresh connection.
    pub async fn begin(&self, ctx: &Context, opts: TxOptions) -> Result<DbTx> {
        self.conn(ctx).await?.begin(ctx, opts).await
    }

    /// Runs `f` in a transaction, restarting the whole transaction when it
    /// fails with a serialization conflict.
    ///
    /// The transaction is committed when `f` succeeds and rolled back
    /// otherwise, including when `ctx` is cancelled while `f` runs. The retry
    /// budget is the same as for [`crate::retry::execute`].
    pub async fn execute_tx<T, F>(&self, ctx: &Context, opts: TxOptions, f: F) -> Result<T>
    where
        F: for<'t> FnMut(&'t Context, &'t DbTx) -> BoxFuture<'t, Result<T>>,
    {
        self.execute_tx_with(&RetryPolicy::default(), ctx, opts, f).await
    }

    pub async fn execute_tx_with<T, F>(
        &self,
        policy: &RetryPolicy,
        ctx: &Context,
        opts: TxOptions,
        mut f: F,
    ) -> Result<T>
    where
        F: for<'t> FnMut(&'t Context, &'t DbTx) -> BoxFuture<'t, Result<T>>,
    {
        let mut attempt = 0;
        loop {
            if let Some(reason) = ctx.err() {
                return Err(reason);
            }
            attempt += 1;

            match self.run_tx_once(ctx, opts, &mut f).await {
                Ok(value) => return Ok(value),
                Err(err) => policy.after_failure(ctx, attempt, err).await?,
            }
        }
    }

    async fn run_tx_once<T, F>(&self, ctx: &Context, opts: TxOptions, f: &mut F) -> Result<T>
    where
        F: for<'t> FnMut(&'t Context, &'t DbTx) -> BoxFuture<'t, Result<T>>,
    {
        let tx = self.begin(ctx, opts).await?;
        let outcome = tokio::select! {
            biased;
            reason = ctx.done_err() => Err(reason),
            outcome = f(ctx, &tx) => outcome,
        };

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(error = %rollback_err, "rollback after failed transaction attempt");
                }
                Err(err)
            }
        }
    }

    /// Marks the handle closed. Connections already handed out stay usable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A single connection obtained from [`Database::conn`].
pub struct DbConn {
    conn: Box<dyn Conn>,
}

impl DbConn {
    /// Converts positional arguments, letting the connection's checker claim
    /// each value before the generic conversion applies.
    fn bind(&self, args: &[Value]) -> Result<Vec<NamedValue>> {
        let checker = self.conn.as_named_value_checker();
        args.iter()
            .enumerate()
            .map(|(idx, value)| -> Result<NamedValue> {
                let mut arg = NamedValue::positional(idx + 1, value.clone());
                let check = match checker {
                    Some(checker) => checker.check_named_value(&mut arg)?,
                    None => NamedValueCheck::UseDefault,
                };
                if check == NamedValueCheck::UseDefault {
                    default_check_named_value(&arg)?;
                }
                Ok(arg)
            })
            .collect()
    }

    pub async fn exec(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<ExecResult> {
        let args = self.bind(args)?;
        if let Some(execer) = self.conn.as_execer() {
            return execer.exec_context(ctx, query, &args).await;
        }

        let stmt = self.conn.prepare(ctx, query).await?;
        let outcome = stmt.exec(ctx, &args).await;
        close_stmt(stmt.as_ref()).await;
        outcome
    }

    pub async fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<QueryRows> {
        let args = self.bind(args)?;
        if let Some(queryer) = self.conn.as_queryer() {
            let rows = queryer.query_context(ctx, query, &args).await?;
            return Ok(QueryRows::new(rows, None));
        }

        let stmt = self.conn.prepare(ctx, query).await?;
        let queried = stmt.query(ctx, &args).await;
        match queried {
            Ok(rows) => Ok(QueryRows::new(rows, Some(stmt))),
            Err(err) => {
                close_stmt(stmt.as_ref()).await;
                Err(err)
            }
        }
    }

    /// Starts an explicit transaction that owns this connection.
    pub async fn begin(self, ctx: &Context, opts: TxOptions) -> Result<DbTx> {
        let begun = self.conn.begin(ctx, opts).await;
        match begun {
            Ok(tx) => Ok(DbTx { conn: self, tx }),
            Err(err) => {
                self.close().await;
                Err(err)
            }
        }
    }

    /// Closes the connection. Close failures are logged, not returned.
    pub async fn close(self) {
        if let Err(err) = self.conn.close().await {
            debug!(error = %err, "closing connection failed");
        }
    }
}

async fn close_stmt(stmt: &dyn Stmt) {
    if let Err(err) = stmt.close().await {
        debug!(error = %err, "closing statement failed");
    }
}

/// Explicit transaction. Statements issued through it are never retried
/// individually.
pub struct DbTx {
    conn: DbConn,
    tx: Box<dyn Tx>,
}

impl DbTx {
    pub async fn exec(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<ExecResult> {
        self.conn.exec(ctx, query, args).await
    }

    pub async fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<QueryRows> {
        self.conn.query(ctx, query, args).await
    }

    pub async fn commit(self) -> Result<()> {
        let outcome = self.tx.commit().await;
        self.conn.close().await;
        outcome
    }

    pub async fn rollback(self) -> Result<()> {
        let outcome = self.tx.rollback().await;
        self.conn.close().await;
        outcome
    }
}

/// Rows returned by a query, together with whatever must stay open while
/// they are read.
pub struct QueryRows {
    rows: Box<dyn Rows>,
    stmt: Option<Box<dyn Stmt>>,
    conn: Option<DbConn>,
}

impl QueryRows {
    fn new(rows: Box<dyn Rows>, stmt: Option<Box<dyn Stmt>>) -> Self {
        Self {
            rows,
            stmt,
            conn: None,
        }
    }

    pub fn columns(&self) -> &[String] {
        self.rows.columns()
    }

    pub async fn next(&mut self) -> Result<Option<Vec<Value>>> {
        self.rows.next().await
    }

    /// Reads every remaining row and closes the set.
    pub async fn collect(mut self) -> Result<Vec<Vec<Value>>> {
        let mut out = Vec::new();
        let outcome = loop {
            match self.rows.next().await {
                Ok(Some(row)) => out.push(row),
                Ok(None) => break Ok(out),
                Err(err) => break Err(err),
            }
        };
        self.close().await?;
        outcome
    }

    pub async fn close(mut self) -> Result<()> {
        let outcome = self.rows.close().await;
        if let Some(stmt) = self.stmt.take() {
            close_stmt(stmt.as_ref()).await;
        }
        if let Some(conn) = self.conn.take() {
            conn.close().await;
        }
        outcome
    }
}
