//! Liveness probes for the backing services.

use async_trait::async_trait;

use super::{Cache, Database};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// A dependency the health endpoint reports on.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Key used in the health report
    fn name(&self) -> &'static str;

    /// Error text when the dependency cannot be reached.
    async fn check(&self) -> Result<(), String>;
}

#[async_trait]
impl HealthCheck for Database {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> Result<(), String> {
        self.ping().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl HealthCheck for Cache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn check(&self) -> Result<(), String> {
        self.ping().await.map_err(|e| e.to_string())
    }
}
