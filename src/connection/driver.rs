use async_trait::async_trait;
use std::sync::Arc;

use super::RetryConn;
use super::config::Config;
use super::connector::RetryConnector;
use crate::core::{Capability, DbError, Result};
use crate::driver::{Conn, Connector, Driver, DriverContext};

/// Driver decorator that makes any [`Driver`] retry serialization conflicts.
///
/// Connections opened through it are wrapped in [`RetryConn`]. Connector
/// support is advertised through [`Driver::as_driver_context`] only when the
/// wrapped driver has it, so a driver without connectors still looks like a
/// plain driver to whoever probes it.
///
/// Cloning is cheap; clones share the wrapped driver and the config.
#[derive(Clone)]
pub struct RetryDriver {
    inner: Arc<dyn Driver>,
    config: Arc<Config>,
}

impl RetryDriver {
    pub fn new(inner: Arc<dyn Driver>, config: Config) -> Self {
        Self {
            inner,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn shared_config(&self) -> &Arc<Config> {
        &self.config
    }
}

#[async_trait]
impl Driver for RetryDriver {
    async fn open(&self, name: &str) -> Result<Box<dyn Conn>> {
        let conn = self.inner.open(name).await?;
        Ok(Box::new(RetryConn::new(conn, Arc::clone(&self.config))))
    }

    fn as_driver_context(&self) -> Option<&dyn DriverContext> {
        self.inner
            .as_driver_context()
            .map(|_| self as &dyn DriverContext)
    }
}

#[async_trait]
impl DriverContext for RetryDriver {
    async fn open_connector(&self, name: &str) -> Result<Arc<dyn Connector>> {
        let driver = self
            .inner
            .as_driver_context()
            .ok_or(DbError::Unsupported(Capability::DriverContext))?;

        let connector = driver.open_connector(name).await?;
        Ok(Arc::new(RetryConnector::new(connector, self.clone())))
    }
}
