use lazy_static::lazy_static;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::Database;
use crate::connection::config::{Config, DriverOption};
use crate::connection::driver::RetryDriver;
use crate::core::Result;
use crate::driver::Registry;

/// Name under which [`register`] installs the retrying driver.
pub const DRIVER_NAME: &str = "retrysql";

// Serializes `register` calls across the process.
lazy_static! {
    static ref REGISTER_LOCK: Mutex<()> = Mutex::new(());
}

/// Wraps the globally registered driver `driver_name` and registers the
/// result as [`DRIVER_NAME`].
///
/// Fails with [`crate::DbError::UnknownDriver`] when `driver_name` is not
/// registered, and with [`crate::DbError::DuplicateDriver`] when the alias is
/// already taken.
///
/// # Examples
///
/// ```no_run
/// # tokio_test::block_on(async {
/// retrysql::register("postgres", [retrysql::with_max_retries(5)]).unwrap();
/// let db = retrysql::Database::open(retrysql::DRIVER_NAME, "postgres://localhost/app")
///     .await
///     .unwrap();
/// # });
/// ```
pub fn register(driver_name: &str, options: impl IntoIterator<Item = DriverOption>) -> Result<()> {
    register_in(Registry::global(), driver_name, options)
}

/// [`register`] against an explicit registry.
pub fn register_in(
    registry: &Registry,
    driver_name: &str,
    options: impl IntoIterator<Item = DriverOption>,
) -> Result<()> {
    let driver = registry.driver(driver_name)?;
    let decorated = RetryDriver::new(driver, Config::new(options));

    let _guard = REGISTER_LOCK.lock()?;
    match registry.register(DRIVER_NAME, Arc::new(decorated)) {
        Ok(()) => {
            info!(driver = driver_name, alias = DRIVER_NAME, "registered retrying driver");
            Ok(())
        }
        Err(err) => {
            warn!(driver = driver_name, alias = DRIVER_NAME, error = %err, "registration failed");
            Err(err)
        }
    }
}

/// Opens `dsn` with the globally registered driver `driver_name`, wrapped
/// for retries, without registering anything.
///
/// Each call gets its own configuration, so differently configured handles
/// can coexist.
pub async fn open(
    driver_name: &str,
    dsn: &str,
    options: impl IntoIterator<Item = DriverOption>,
) -> Result<Database> {
    open_in(Registry::global(), driver_name, dsn, options).await
}

/// [`open`] against an explicit registry.
pub async fn open_in(
    registry: &Registry,
    driver_name: &str,
    dsn: &str,
    options: impl IntoIterator<Item = DriverOption>,
) -> Result<Database> {
    let driver = registry.driver(driver_name)?;
    let decorated = RetryDriver::new(driver, Config::new(options));
    Database::open_driver(Arc::new(decorated), dsn).await
}
