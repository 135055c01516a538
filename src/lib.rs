// ============================================================================
// retrysql Library
// ============================================================================

//! Transparent retries for serialization conflicts.
//!
//! `retrysql` decorates any [`Driver`] so that single statements run outside
//! an explicit transaction are retried when the backend reports a
//! serialization failure (SQLSTATE `40001`), which optimistic-concurrency
//! databases return under contention. Everything else the driver offers is
//! passed through, and the decorators advertise exactly the optional
//! capabilities of the object they wrap.
//!
//! There are two ways in:
//!
//! - [`open`] builds a retrying [`Database`] handle directly, with its own
//!   configuration and without touching the global registry.
//! - [`register`] installs the retrying driver under [`DRIVER_NAME`] so that
//!   code which opens drivers by name can use it.
//!
//! ```no_run
//! use retrysql::{Context, Value, with_max_retries};
//!
//! # tokio_test::block_on(async {
//! let dsn = "postgres://root@localhost:26257/bank";
//! let db = retrysql::open("postgres", dsn, [with_max_retries(5)]).await.unwrap();
//! db.exec(
//!     &Context::background(),
//!     "UPDATE accounts SET balance = balance - $1 WHERE id = $2",
//!     &[Value::from(10i64), Value::from(1i64)],
//! )
//! .await
//! .unwrap();
//! # });
//! ```

pub mod core;
pub mod driver;
pub mod retry;
pub mod connection;
pub mod facade;

pub use core::{Capability, Context, DbError, NamedValue, NamedValueCheck, Result, Value};
pub use driver::{
    Conn, Connector, Driver, DriverContext, ExecResult, ExecerContext, IsolationLevel,
    NamedValueChecker, QueryerContext, Registry, Rows, Stmt, Tx, TxOptions,
};
pub use connection::{
    RetryConn, RetryTx,
    config::{Config, DriverOption, with_max_retries},
    connector::{DsnConnector, RetryConnector},
    driver::RetryDriver,
};
pub use facade::{
    DRIVER_NAME, Database, DbConn, DbTx, QueryRows, open, open_in, register, register_in,
};
pub use retry::RetryPolicy;
