//! Quota-bounded storage accounts that uploaded files land on.

use serde::{Deserialize, Serialize};

const GIB: u64 = 1024 * 1024 * 1024;

/// A remote storage destination (one Drive account) with its quota.
///
/// `used_bytes <= limit_bytes` is expected but not enforced: the counter is
/// driven by upload sizes and may overshoot the limit.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageAccount {
    /// Stable identifier referenced by media records (`accountId`).
    pub id: String,

    /// Human readable label shown on the dashboard.
    pub display_name: String,

    /// Bytes currently attributed to this account.
    pub used_bytes: u64,

    /// Capacity of the account. Zero means no quota was reported.
    pub limit_bytes: u64,
}

impl StorageAccount {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        used_bytes: u64,
        limit_bytes: u64,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            used_bytes,
            limit_bytes,
        }
    }

    /// The two Drive accounts the site was deployed with.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("drive1", "Primary Wedding Drive", GIB * 12 / 5, 5 * GIB),
            Self::new("drive2", "Backup Wedding Drive", GIB * 6 / 5, 15 * GIB),
        ]
    }

    /// Remaining space. Negative once an account has been overfilled.
    pub fn free_bytes(&self) -> i128 {
        self.limit_bytes as i128 - self.used_bytes as i128
    }

    /// Usage on a 0-100 scale. Accounts without a limit report 0.
    pub fn usage_percentage(&self) -> f64 {
        if self.limit_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.limit_bytes as f64 * 100.0
    }

    pub fn usage(&self) -> AccountUsage {
        AccountUsage {
            id: self.id.clone(),
            name: self.display_name.clone(),
            used_bytes: self.used_bytes,
            limit_bytes: self.limit_bytes,
            percentage_used: self.usage_percentage(),
        }
    }
}

/// Dashboard view of one account's consumption.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountUsage {
    pub id: String,
    pub name: String,
    pub used_bytes: u64,
    pub limit_bytes: u64,
    pub percentage_used: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_reports_zero_percent() {
        let account = StorageAccount::new("empty", "Empty", 10, 0);
        let pct = account.usage_percentage();
        assert!(pct.is_finite());
        assert_eq!(pct, 0.0);
    }

    #[test]
    fn usage_serializes_dashboard_field_names() {
        let usage = StorageAccount::new("drive9", "Spare", 1, 4).usage();
        let value = serde_json::to_value(&usage).unwrap();
        assert_eq!(value["id"], "drive9");
        assert_eq!(value["name"], "Spare");
        assert_eq!(value["usedBytes"], 1);
        assert_eq!(value["limitBytes"], 4);
        assert_eq!(value["percentageUsed"], 25.0);
    }

    #[test]
    fn free_bytes_goes_negative_when_overfilled() {
        let account = StorageAccount::new("full", "Full", 12, 10);
        assert_eq!(account.free_bytes(), -2);
    }
}
