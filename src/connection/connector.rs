use async_trait::async_trait;
use std::sync::Arc;

use super::RetryConn;
use super::config::Config;
use super::driver::RetryDriver;
use crate::core::{Context, Result};
use crate::driver::{Conn, Connector, Driver};

/// Connector decorator: every connection it produces is a [`RetryConn`].
pub struct RetryConnector {
    inner: Arc<dyn Connector>,
    driver: RetryDriver,
    config: Arc<Config>,
}

impl RetryConnector {
    pub fn new(inner: Arc<dyn Connector>, driver: RetryDriver) -> Self {
        let config = Arc::clone(driver.shared_config());
        Self {
            inner,
            driver,
            config,
        }
    }
}

#[async_trait]
impl Connector for RetryConnector {
    async fn connect(&self, ctx: &Context) -> Result<Box<dyn Conn>> {
        let conn = self.inner.connect(ctx).await?;
        Ok(Box::new(RetryConn::new(conn, Arc::clone(&self.config))))
    }

    /// The decorating driver, so code that goes back from a connector to its
    /// driver stays on the retrying path.
    fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(self.driver.clone())
    }
}

/// Connector for drivers that only know how to `open` a data source name.
pub struct DsnConnector {
    dsn: String,
    driver: Arc<dyn Driver>,
}

impl DsnConnector {
    pub fn new(dsn: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        Self {
            dsn: dsn.into(),
            driver,
        }
    }

    pub fn dsn(&self) -> &str {
        &self.dsn
    }
}

#[async_trait]
impl Connector for DsnConnector {
    async fn connect(&self, _ctx: &Context) -> Result<Box<dyn Conn>> {
        self.driver.open(&self.dsn).await
    }

    fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver)
    }
}
