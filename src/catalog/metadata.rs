use async_trait::async_trait;
use color_eyre::Result;

/// Read access to service and operation metadata.
///
/// Implementations answer the questions the catalog needs to enumerate
/// services and decide which operations can run without input.
#[async_trait]
pub trait Metadata: Send + Sync {
    /// Every service that exposes paginated operations.
    ///
    /// # Errors
    /// Returns an error when the metadata source as a whole is unavailable.
    async fn services(&self) -> Result<Vec<String>>;

    /// Human-readable name of a service.
    async fn description(&self, service: &str) -> Result<String>;

    /// Paginated operations of a service, in the source's own order.
    async fn operations(&self, service: &str) -> Result<Vec<String>>;

    /// Names of the parameters an operation cannot be invoked without.
    async fn required_params(&self, service: &str, operation: &str) -> Result<Vec<String>>;

    /// Keys of the collections an operation returns its results under.
    async fn result_keys(&self, service: &str, operation: &str) -> Result<Vec<String>>;
}
