//! crates/healthlens_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the external model API and of the client's storage.

use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, filesystem).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The adapter is missing a credential or the credential was rejected.
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait VisionModelService: Send + Sync {
    /// Sends the prompt together with an inlined image and returns the model's raw text.
    ///
    /// `image_base64` carries no data-URL prefix.
    async fn generate_from_image(
        &self,
        prompt: &str,
        image_base64: &str,
        mime_type: &str,
    ) -> PortResult<String>;
}

/// A string key-value store, the persistence seam of the history cache.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> PortResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> PortResult<()>;

    /// Removing a key that is not present succeeds.
    fn remove(&self, key: &str) -> PortResult<()>;
}
