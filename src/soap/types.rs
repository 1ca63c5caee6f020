use chrono::NaiveDateTime;
use serde::Serialize;

use crate::codec::FileType;
use crate::models::remote_key;

/// One decoded binary payload from a result response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub sha256: String,
    pub file_type: FileType,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Outcome of one order-result call. Consumed immediately, never stored.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoteResult {
    pub local_order_code: Option<String>,
    pub remote_order_code: String,
    pub order_year: i32,
    pub success: bool,
    pub error_message: Option<String>,
    pub return_code: Option<String>,
    pub pdf_artifacts: Vec<Artifact>,
    pub graphic_artifacts: Vec<Artifact>,
    #[serde(skip)]
    pub raw_response: String,
}

impl RemoteResult {
    pub fn new(order_year: i32, remote_order_code: &str) -> Self {
        Self {
            remote_order_code: remote_order_code.to_string(),
            order_year,
            ..Self::default()
        }
    }

    pub fn failed(order_year: i32, remote_order_code: &str, message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::new(order_year, remote_order_code)
        }
    }

    pub fn with_local_code(mut self, local_order_code: &str) -> Self {
        self.local_order_code = Some(local_order_code.to_string());
        self
    }

    /// Provider key `"{year}-{code}"`.
    pub fn key(&self) -> String {
        remote_key(self.order_year, &self.remote_order_code)
    }

    pub fn has_artifacts(&self) -> bool {
        !self.pdf_artifacts.is_empty() || !self.graphic_artifacts.is_empty()
    }

    /// A result the worker can attach: successful and carrying content.
    pub fn is_usable(&self) -> bool {
        self.success && self.has_artifacts()
    }
}

/// Provider operations the worker depends on.
///
/// Implementations never raise on transport failure: `fetch_order` folds
/// errors into `success = false`, `fetch_period_results` returns `None`.
pub trait LabGateway: Send + Sync {
    fn fetch_order(&self, year: i32, remote_order_code: &str, include_pdf: bool) -> RemoteResult;

    fn fetch_period_results(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        include_graphics: bool,
    ) -> Option<String>;

    fn check_reachable(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(bytes: &[u8]) -> Artifact {
        Artifact {
            bytes: bytes.to_vec(),
            sha256: "h".into(),
            file_type: FileType::Bin,
        }
    }

    #[test]
    fn usable_requires_success_and_content() {
        let mut result = RemoteResult::new(2025, "9");
        result.success = true;
        assert!(!result.is_usable());

        result.graphic_artifacts.push(artifact(b"x"));
        assert!(result.is_usable());

        result.success = false;
        assert!(!result.is_usable());
    }

    #[test]
    fn failed_carries_message_and_key() {
        let result = RemoteResult::failed(2024, "77", "timeout").with_local_code("1001");
        assert!(!result.success);
        assert_eq!(result.error_message.as_deref(), Some("timeout"));
        assert_eq!(result.key(), "2024-77");
        assert_eq!(result.local_order_code.as_deref(), Some("1001"));
    }

    #[test]
    fn gateway_trait_is_object_safe() {
        fn _assert(_: &dyn LabGateway) {}
    }
}
