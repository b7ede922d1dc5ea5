//! File transfer to the storage accounts.
//!
//! `FileTransferClient` owns the policy (allow-listed MIME types, account
//! selection, usage accounting, timeouts) and hands the actual byte movement to
//! a [`Transport`]. The shipped transport is [`SimulatedTransport`], which
//! stands in for the Drive API with a fixed latency and a random failure draw.

use crate::{
    models::{account::StorageAccount, media::UploadFile},
    services::account_pool::StorageAccountPool,
};
use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const SUPPORTED_IMAGE_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];
pub const SUPPORTED_VIDEO_TYPES: [&str; 5] = [
    "video/mp4",
    "video/quicktime",
    "video/avi",
    "video/webm",
    "video/mov",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("no storage account available")]
    NoAccountAvailable,
    #[error("{0}")]
    Failed(String),
}

pub type TransferResult<T> = Result<T, TransferError>;

/// Moves bytes to and from one storage account.
///
/// Implementations only report whether the remote side accepted the call;
/// usage accounting stays in [`FileTransferClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn put(
        &self,
        account: &StorageAccount,
        folder: &str,
        file_id: &str,
        file: &UploadFile,
    ) -> TransferResult<()>;

    async fn remove(&self, account: &StorageAccount, file_id: &str) -> TransferResult<()>;
}

/// Drive stand-in: sleeps for a fixed latency, then succeeds with the
/// configured probability.
#[derive(Clone, Debug)]
pub struct SimulatedTransport {
    pub upload_latency: Duration,
    pub delete_latency: Duration,
    pub upload_success_rate: f64,
    pub delete_success_rate: f64,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self {
            upload_latency: Duration::from_millis(1000),
            delete_latency: Duration::from_millis(500),
            upload_success_rate: 0.9,
            delete_success_rate: 0.95,
        }
    }
}

impl SimulatedTransport {
    fn draw(rate: f64) -> bool {
        let p = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        rand::rng().random_bool(p)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn put(
        &self,
        account: &StorageAccount,
        folder: &str,
        file_id: &str,
        file: &UploadFile,
    ) -> TransferResult<()> {
        debug!(account_id = %account.id, folder, file_id, file_name = %file.file_name, "simulated upload");
        tokio::time::sleep(self.upload_latency).await;
        if Self::draw(self.upload_success_rate) {
            Ok(())
        } else {
            Err(TransferError::Failed(
                "Failed to upload file to Google Drive".into(),
            ))
        }
    }

    async fn remove(&self, account: &StorageAccount, file_id: &str) -> TransferResult<()> {
        debug!(account_id = %account.id, file_id, "simulated delete");
        tokio::time::sleep(self.delete_latency).await;
        if Self::draw(self.delete_success_rate) {
            Ok(())
        } else {
            Err(TransferError::Failed(
                "Failed to delete file from Google Drive".into(),
            ))
        }
    }
}

/// What the storage side reports back for a stored file.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub file_id: String,
    pub file_name: String,
    pub account_id: String,
    pub mime_type: String,
}

pub fn supported_image_types() -> &'static [&'static str] {
    &SUPPORTED_IMAGE_TYPES
}

pub fn supported_video_types() -> &'static [&'static str] {
    &SUPPORTED_VIDEO_TYPES
}

pub fn is_supported_file_type(mime_type: &str) -> bool {
    SUPPORTED_IMAGE_TYPES.contains(&mime_type) || SUPPORTED_VIDEO_TYPES.contains(&mime_type)
}

#[derive(Clone)]
pub struct FileTransferClient {
    pool: Arc<StorageAccountPool>,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl FileTransferClient {
    pub fn new(
        pool: Arc<StorageAccountPool>,
        transport: Arc<dyn Transport>,
        timeout: Duration,
    ) -> Self {
        Self {
            pool,
            transport,
            timeout,
        }
    }

    pub fn pool(&self) -> &Arc<StorageAccountPool> {
        &self.pool
    }

    /// Store `file` on the account with the most free space.
    ///
    /// Unsupported types are rejected before any account is touched. The
    /// file size is counted against the account up front and given back if
    /// the transport fails.
    pub async fn upload(&self, file: &UploadFile, folder: &str) -> TransferResult<UploadReceipt> {
        if !is_supported_file_type(&file.mime_type) {
            warn!(mime_type = %file.mime_type, file_name = %file.file_name, "rejecting unsupported file type");
            return Err(TransferError::UnsupportedType(file.mime_type.clone()));
        }

        let size = file.size();
        let account = self.pool.reserve_for_upload(size).await?;
        let file_id = format!("file-{}", Uuid::new_v4());

        match self
            .bounded(self.transport.put(&account, folder, &file_id, file))
            .await
        {
            Ok(()) => {
                info!(
                    account_id = %account.id,
                    file_id = %file_id,
                    size_bytes = size,
                    "file uploaded"
                );
                Ok(UploadReceipt {
                    file_id,
                    file_name: file.file_name.clone(),
                    account_id: account.id,
                    mime_type: file.mime_type.clone(),
                })
            }
            Err(err) => {
                self.pool.release(&account.id, size).await;
                warn!(account_id = %account.id, error = %err, "file upload failed");
                Err(err)
            }
        }
    }

    /// Remove a file from an account. Unknown accounts return `false` without
    /// calling the transport.
    pub async fn delete(&self, file_id: &str, account_id: &str) -> bool {
        let Some(account) = self.pool.get(account_id).await else {
            warn!(account_id, file_id, "delete requested for unknown account");
            return false;
        };

        match self.bounded(self.transport.remove(&account, file_id)).await {
            Ok(()) => {
                info!(account_id, file_id, "file deleted");
                true
            }
            Err(err) => {
                warn!(account_id, file_id, error = %err, "file delete failed");
                false
            }
        }
    }

    async fn bounded<F>(&self, call: F) -> TransferResult<()>
    where
        F: Future<Output = TransferResult<()>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TransferError::Failed(format!(
                "transfer timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}
