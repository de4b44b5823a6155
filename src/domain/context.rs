//! Operation Context
//!
//! Contains metadata about the current request for authorization and tracing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context for an operation, built by the auth middleware.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationContext {
    /// Short fingerprint of the API key used for this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_fingerprint: Option<String>,

    /// Authenticated principal from the X-Request-Owner header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl OperationContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.api_key_fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Check whether the authenticated principal is `owner`
    pub fn is_owner(&self, owner: &str) -> bool {
        self.owner.as_deref() == Some(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new()
            .with_api_key_fingerprint("ab12cd34")
            .with_owner("alice")
            .with_correlation_id(correlation_id);

        assert_eq!(context.api_key_fingerprint.as_deref(), Some("ab12cd34"));
        assert_eq!(context.owner.as_deref(), Some("alice"));
        assert_eq!(context.correlation_id, Some(correlation_id));
    }

    #[test]
    fn test_is_owner() {
        let context = OperationContext::new().with_owner("alice");
        assert!(context.is_owner("alice"));
        assert!(!context.is_owner("bob"));
        assert!(!OperationContext::new().is_owner("alice"));
    }
}
