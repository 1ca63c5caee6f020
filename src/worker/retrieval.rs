//! Year-fallback retrieval.
//!
//! The provider files some orders under a different year than the one the
//! hospital knows. Retrieval tries the year recorded with the mapping, if
//! any, then the default year and a fixed number of prior years, newest
//! first, and stops at the first usable result.

use super::error::ItemError;
use super::types::CancelFlag;
use crate::soap::{LabGateway, RemoteResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearFallback {
    default_year: i32,
    prior_years: u32,
    hint: Option<i32>,
}

impl YearFallback {
    pub fn new(default_year: i32, prior_years: u32) -> Self {
        Self {
            default_year,
            prior_years,
            hint: None,
        }
    }

    /// Year to try before the default sequence. Never tried twice.
    pub fn with_hint(mut self, year: Option<i32>) -> Self {
        self.hint = year;
        self
    }

    /// The hint, then the default year and its prior years, strictly descending.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        let start = self.default_year;
        let hint = self.hint;
        hint.into_iter().chain(
            (0..=self.prior_years as i32)
                .map(move |offset| start - offset)
                .filter(move |year| Some(*year) != hint),
        )
    }
}

/// Fetch `remote_order_code` under each year of `policy` until one answer is
/// successful and carries at least one artifact.
pub fn retrieve_with_fallback(
    gateway: &dyn LabGateway,
    remote_order_code: &str,
    policy: &YearFallback,
    cancel: &CancelFlag,
) -> Result<RemoteResult, ItemError> {
    let mut attempts = 0;
    for year in policy.years() {
        if cancel.is_cancelled() {
            return Err(ItemError::Cancelled);
        }
        attempts += 1;

        let result = gateway.fetch_order(year, remote_order_code, true);
        if result.is_usable() {
            if attempts > 1 {
                tracing::info!(order = %result.key(), attempts, "Content found under fallback year");
            }
            return Ok(result);
        }
        tracing::debug!(
            order = %result.key(),
            reason = result.error_message.as_deref().unwrap_or("no artifacts"),
            "No usable result for year"
        );
    }

    Err(ItemError::ContentUnavailable {
        remote_order_code: remote_order_code.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FileType;
    use crate::soap::Artifact;
    use chrono::NaiveDateTime;
    use std::sync::Mutex;

    /// Answers with content only for `hit_year`; records every year asked.
    struct YearGateway {
        hit_year: Option<i32>,
        calls: Mutex<Vec<i32>>,
    }

    impl YearGateway {
        fn new(hit_year: Option<i32>) -> Self {
            Self {
                hit_year,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl LabGateway for YearGateway {
        fn fetch_order(&self, year: i32, code: &str, _include_pdf: bool) -> RemoteResult {
            self.calls.lock().unwrap().push(year);
            let mut result = RemoteResult::new(year, code);
            if Some(year) == self.hit_year {
                result.success = true;
                result.pdf_artifacts.push(Artifact {
                    bytes: b"%PDF-1.4".to_vec(),
                    sha256: "h".into(),
                    file_type: FileType::Pdf,
                });
            } else {
                // Successful but empty: not usable.
                result.success = true;
            }
            result
        }

        fn fetch_period_results(&self, _: NaiveDateTime, _: NaiveDateTime, _: bool) -> Option<String> {
            None
        }

        fn check_reachable(&self) -> bool {
            true
        }
    }

    #[test]
    fn years_descend_from_start() {
        let years: Vec<i32> = YearFallback::new(2025, 2).years().collect();
        assert_eq!(years, vec![2025, 2024, 2023]);
        let only: Vec<i32> = YearFallback::new(2025, 0).years().collect();
        assert_eq!(only, vec![2025]);
    }

    #[test]
    fn hint_precedes_default_sequence() {
        let years: Vec<i32> = YearFallback::new(2025, 2).with_hint(Some(2021)).years().collect();
        assert_eq!(years, vec![2021, 2025, 2024, 2023]);
    }

    #[test]
    fn hint_inside_sequence_is_not_repeated() {
        let years: Vec<i32> = YearFallback::new(2025, 2).with_hint(Some(2024)).years().collect();
        assert_eq!(years, vec![2024, 2025, 2023]);
    }

    #[test]
    fn found_two_years_back_after_three_calls() {
        let gateway = YearGateway::new(Some(2023));
        let result =
            retrieve_with_fallback(&gateway, "77", &YearFallback::new(2025, 2), &CancelFlag::new())
                .unwrap();
        assert_eq!(result.order_year, 2023);
        assert_eq!(*gateway.calls.lock().unwrap(), vec![2025, 2024, 2023]);
    }

    #[test]
    fn stops_at_first_usable_year() {
        let gateway = YearGateway::new(Some(2025));
        retrieve_with_fallback(&gateway, "77", &YearFallback::new(2025, 2), &CancelFlag::new())
            .unwrap();
        assert_eq!(gateway.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn exhausted_years_are_content_unavailable() {
        let gateway = YearGateway::new(None);
        let err =
            retrieve_with_fallback(&gateway, "77", &YearFallback::new(2025, 2), &CancelFlag::new())
                .unwrap_err();
        assert!(matches!(err, ItemError::ContentUnavailable { attempts: 3, .. }));
    }

    #[test]
    fn cancelled_before_first_attempt() {
        let gateway = YearGateway::new(Some(2025));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = retrieve_with_fallback(&gateway, "77", &YearFallback::new(2025, 2), &cancel)
            .unwrap_err();
        assert!(matches!(err, ItemError::Cancelled));
        assert!(gateway.calls.lock().unwrap().is_empty());
    }
}
