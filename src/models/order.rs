use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::SignedFlag;

/// One unresolved lab order item from the hospital store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingItem {
    pub local_order_code: String,
    pub signed_flag: SignedFlag,
    pub encounter_id: i64,
}

/// Association between a hospital order code and the provider's order code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMapping {
    pub local_order_code: String,
    pub remote_order_code: String,
    pub order_year: Option<i32>,
    pub updated_at: NaiveDateTime,
}

impl RemoteMapping {
    /// Provider key for a given year: `"{year}-{remote_code}"`.
    pub fn remote_key(&self, year: i32) -> String {
        remote_key(year, &self.remote_order_code)
    }
}

pub fn remote_key(year: i32, remote_order_code: &str) -> String {
    format!("{year}-{remote_order_code}")
}
