//! StorageAccountPool: the fixed set of Drive accounts uploads are spread
//! across, and the bookkeeping of how full each one is.

use crate::{
    models::account::{AccountUsage, StorageAccount},
    services::transfer::{TransferError, TransferResult},
};
use tokio::sync::RwLock;
use tracing::debug;

/// Holds the accounts and their usage counters.
///
/// Selection and the usage increment of an upload happen under one write
/// lock (`reserve_for_upload`), so two concurrent uploads never both claim
/// the same free space.
#[derive(Debug)]
pub struct StorageAccountPool {
    accounts: RwLock<Vec<StorageAccount>>,
}

impl StorageAccountPool {
    pub fn new(accounts: Vec<StorageAccount>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    /// Snapshot of every account, in pool order.
    #[cfg(test)]
    pub async fn accounts(&self) -> Vec<StorageAccount> {
        self.accounts.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<StorageAccount> {
        self.accounts
            .read()
            .await
            .iter()
            .find(|account| account.id == id)
            .cloned()
    }

    /// Account with the largest `limit - used`. Ties go to the account listed
    /// first.
    pub async fn select_account_with_most_free_space(&self) -> TransferResult<StorageAccount> {
        let accounts = self.accounts.read().await;
        most_free(&accounts)
            .map(|idx| accounts[idx].clone())
            .ok_or(TransferError::NoAccountAvailable)
    }

    /// Pick the account with the most free space and count `size` against it
    /// in the same critical section. Returns the account as it was before the
    /// reservation.
    pub async fn reserve_for_upload(&self, size: u64) -> TransferResult<StorageAccount> {
        let mut accounts = self.accounts.write().await;
        let idx = most_free(&accounts).ok_or(TransferError::NoAccountAvailable)?;
        let selected = accounts[idx].clone();
        accounts[idx].used_bytes = accounts[idx].used_bytes.saturating_add(size);
        debug!(
            account_id = %selected.id,
            size_bytes = size,
            used_bytes = accounts[idx].used_bytes,
            "reserved account space"
        );
        Ok(selected)
    }

    /// Give `size` bytes back to an account. Unknown ids are ignored.
    pub async fn release(&self, account_id: &str, size: u64) {
        let mut accounts = self.accounts.write().await;
        if let Some(account) = accounts.iter_mut().find(|a| a.id == account_id) {
            account.used_bytes = account.used_bytes.saturating_sub(size);
            debug!(
                account_id = %account.id,
                size_bytes = size,
                used_bytes = account.used_bytes,
                "released account space"
            );
        }
    }

    /// Per-account usage for the dashboard.
    pub async fn usage_stats(&self) -> Vec<AccountUsage> {
        self.accounts
            .read()
            .await
            .iter()
            .map(StorageAccount::usage)
            .collect()
    }
}

impl Default for StorageAccountPool {
    fn default() -> Self {
        Self::new(StorageAccount::defaults())
    }
}

fn most_free(accounts: &[StorageAccount]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, account) in accounts.iter().enumerate() {
        match best {
            Some(current) if accounts[current].free_bytes() >= account.free_bytes() => {}
            _ => best = Some(idx),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    const GB: u64 = 1_000_000_000;

    #[tokio::test]
    async fn selects_account_with_most_free_space() {
        let pool = StorageAccountPool::new(vec![
            StorageAccount::new("a", "A", 2_400_000_000, 5 * GB),
            StorageAccount::new("b", "B", 1_200_000_000, 15 * GB),
        ]);

        let selected = pool.select_account_with_most_free_space().await.unwrap();
        assert_eq!(selected.id, "b");
    }

    #[tokio::test]
    async fn ties_go_to_first_account() {
        let pool = StorageAccountPool::new(vec![
            StorageAccount::new("first", "First", 1, 10),
            StorageAccount::new("second", "Second", 1, 10),
        ]);

        let selected = pool.select_account_with_most_free_space().await.unwrap();
        assert_eq!(selected.id, "first");
    }

    #[tokio::test]
    async fn empty_pool_has_no_account() {
        let pool = StorageAccountPool::new(Vec::new());
        assert!(matches!(
            pool.select_account_with_most_free_space().await,
            Err(TransferError::NoAccountAvailable)
        ));
        assert!(matches!(
            pool.reserve_for_upload(1).await,
            Err(TransferError::NoAccountAvailable)
        ));
    }

    #[tokio::test]
    async fn reservations_shift_selection() {
        let pool = StorageAccountPool::new(vec![
            StorageAccount::new("a", "A", 0, 100),
            StorageAccount::new("b", "B", 0, 90),
        ]);

        let first = pool.reserve_for_upload(20).await.unwrap();
        let second = pool.reserve_for_upload(20).await.unwrap();

        assert_eq!(first.id, "a");
        assert_eq!(second.id, "b");
        assert_eq!(pool.get("a").await.unwrap().used_bytes, 20);
        assert_eq!(pool.get("b").await.unwrap().used_bytes, 20);
    }

    #[tokio::test]
    async fn release_saturates_at_zero() {
        let pool = StorageAccountPool::new(vec![StorageAccount::new("a", "A", 5, 100)]);
        pool.release("a", 50).await;
        pool.release("missing", 50).await;
        assert_eq!(pool.get("a").await.unwrap().used_bytes, 0);
    }

    #[tokio::test]
    async fn usage_stats_cover_every_account() {
        let pool = StorageAccountPool::new(vec![
            StorageAccount::new("a", "A", 25, 100),
            StorageAccount::new("z", "Zero", 3, 0),
        ]);

        let stats = pool.usage_stats().await;
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].percentage_used, 25.0);
        assert_eq!(stats[1].percentage_used, 0.0);
    }
}
