//! Driver contract implemented by database backends.
//!
//! A backend must implement [`Driver`] and [`Conn`]. Every other interface is
//! optional and is discovered through an `as_*` probe that returns `None`
//! by default. Code that adds behavior on top of a driver should keep its
//! own probes in step with the wrapped object's probes.

pub mod registry;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::{Context, NamedValue, NamedValueCheck, Result, Value};

pub use registry::Registry;

/// Outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    rows_affected: u64,
}

impl ExecResult {
    pub fn new(rows_affected: u64) -> Self {
        Self { rows_affected }
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Whatever the backend uses when none is requested.
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

/// Result set cursor.
#[async_trait]
pub trait Rows: Send {
    fn columns(&self) -> &[String];

    /// Next row, or `None` once the set is exhausted.
    async fn next(&mut self) -> Result<Option<Vec<Value>>>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Prepared statement bound to the connection that created it.
#[async_trait]
pub trait Stmt: Send + Sync {
    async fn exec(&self, ctx: &Context, args: &[NamedValue]) -> Result<ExecResult>;

    async fn query(&self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn Rows>>;

    async fn close(&self) -> Result<()>;
}

/// Explicit transaction opened with [`Conn::begin`].
#[async_trait]
pub trait Tx: Send + Sync {
    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;
}

/// Runs a statement directly, without a prepare round trip.
#[async_trait]
pub trait ExecerContext: Send + Sync {
    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<ExecResult>;
}

/// Runs a query directly, without a prepare round trip.
#[async_trait]
pub trait QueryerContext: Send + Sync {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn Rows>>;
}

/// Lets a connection accept or rewrite arguments before they are bound.
pub trait NamedValueChecker: Send + Sync {
    fn check_named_value(&self, value: &mut NamedValue) -> Result<NamedValueCheck>;
}

/// A single connection, used by one caller at a time.
#[async_trait]
pub trait Conn: Send + Sync {
    async fn prepare(&self, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>>;

    async fn begin(&self, ctx: &Context, opts: TxOptions) -> Result<Box<dyn Tx>>;

    async fn close(&self) -> Result<()>;

    fn as_execer(&self) -> Option<&dyn ExecerContext> {
        None
    }

    fn as_queryer(&self) -> Option<&dyn QueryerContext> {
        None
    }

    fn as_named_value_checker(&self) -> Option<&dyn NamedValueChecker> {
        None
    }
}

/// Entry point of a backend.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Opens a new connection from a data source name.
    async fn open(&self, name: &str) -> Result<Box<dyn Conn>>;

    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        None
    }
}

/// Drivers that can parse a data source name once and reuse it.
#[async_trait]
pub trait DriverContext: Send + Sync {
    async fn open_connector(&self, name: &str) -> Result<Arc<dyn Connector>>;
}

/// Reusable connection factory.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, ctx: &Context) -> Result<Box<dyn Conn>>;

    /// The driver this connector belongs to.
    fn driver(&self) -> Arc<dyn Driver>;
}
