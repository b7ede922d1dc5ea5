//! MediaCatalog is the CRUD surface the gallery and admin dashboard use.
//!
//! Writes go through the [`FileTransferClient`] first and are only recorded
//! once the storage side confirmed them. Reads go to the configured
//! [`MediaStore`]; when it errors the built-in records are served instead, so
//! the gallery keeps rendering while the backend is down.

use crate::{
    models::{
        account::AccountUsage,
        media::{MediaKind, MediaPatch, MediaRecord, MediaStatus, MediaUploadData},
    },
    services::{
        media_store::{MediaStore, StoreError, builtin_records, sort_newest_first},
        transfer::{FileTransferClient, TransferError},
    },
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const DEFAULT_CATEGORIES: [&str; 4] = ["Engagement", "Pre-Wedding", "Ceremony", "Reception"];
pub const DEFAULT_UPLOAD_FOLDER: &str = "Wedding Media";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unsupported file type `{0}`")]
    UnsupportedType(String),
    #[error("no storage account available")]
    NoAccountAvailable,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("media `{0}` not found")]
    NotFound(String),
    #[error("transfer failed: {0}")]
    TransferFailure(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<TransferError> for CatalogError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::UnsupportedType(mime) => CatalogError::UnsupportedType(mime),
            TransferError::NoAccountAvailable => CatalogError::NoAccountAvailable,
            TransferError::Failed(msg) => CatalogError::TransferFailure(msg),
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        CatalogError::BackendUnavailable(err.to_string())
    }
}

/// Ordered, duplicate-free list of category labels. Only grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    labels: Vec<String>,
}

impl CategorySet {
    pub fn new() -> Self {
        Self {
            labels: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Returns whether the label was new.
    pub fn insert(&mut self, label: &str) -> bool {
        if self.contains(label) {
            return false;
        }
        self.labels.push(label.to_string());
        true
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::new()
    }
}

/// Catalog service. Built once in `main` and shared behind an `Arc`.
pub struct MediaCatalog {
    store: Arc<dyn MediaStore>,
    transfer: FileTransferClient,
    categories: RwLock<CategorySet>,
    upload_folder: String,
}

impl MediaCatalog {
    pub fn new(
        store: Arc<dyn MediaStore>,
        transfer: FileTransferClient,
        upload_folder: impl Into<String>,
    ) -> Self {
        Self {
            store,
            transfer,
            categories: RwLock::new(CategorySet::new()),
            upload_folder: upload_folder.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn MediaStore> {
        &self.store
    }

    pub fn transfer(&self) -> &FileTransferClient {
        &self.transfer
    }

    /// All records, newest first. Never fails: backend errors are logged and
    /// the built-in records are returned.
    pub async fn list(&self) -> Vec<MediaRecord> {
        match self.store.list_all().await {
            Ok(records) => records,
            Err(err) => {
                warn!(backend = self.store.backend_name(), error = %err, "listing media failed, serving built-in records");
                fallback(|_| true)
            }
        }
    }

    pub async fn get_by_id(&self, id: &str) -> Option<MediaRecord> {
        match self.store.get(id).await {
            Ok(record) => record,
            Err(err) => {
                warn!(backend = self.store.backend_name(), id, error = %err, "fetching media failed, serving built-in records");
                fallback(|r| r.id == id).into_iter().next()
            }
        }
    }

    pub async fn list_by_category(&self, category: &str) -> Vec<MediaRecord> {
        match self.store.list_by_category(category).await {
            Ok(records) => records,
            Err(err) => {
                warn!(backend = self.store.backend_name(), category, error = %err, "filtering media failed, serving built-in records");
                fallback(|r| r.category == category)
            }
        }
    }

    pub async fn list_by_kind(&self, kind: MediaKind) -> Vec<MediaRecord> {
        match self.store.list_by_kind(kind).await {
            Ok(records) => records,
            Err(err) => {
                warn!(backend = self.store.backend_name(), kind = %kind, error = %err, "filtering media failed, serving built-in records");
                fallback(|r| r.kind == kind)
            }
        }
    }

    /// Transfer the file and record it as a new Draft.
    ///
    /// Nothing is recorded when the transfer fails. If recording fails after
    /// the transfer succeeded, the remote file is removed again.
    pub async fn upload(&self, data: MediaUploadData) -> CatalogResult<MediaRecord> {
        let name = data.name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidInput("name is required".into()));
        }
        let category = data.category.trim();
        if category.is_empty() {
            return Err(CatalogError::InvalidInput("category is required".into()));
        }
        let Some(file) = data.file.as_ref() else {
            return Err(CatalogError::InvalidInput("file is required".into()));
        };
        if file.data.is_empty() {
            return Err(CatalogError::InvalidInput("file is empty".into()));
        }

        let receipt = self.transfer.upload(file, &self.upload_folder).await?;
        debug!(file_name = %receipt.file_name, file_id = %receipt.file_id, "transfer confirmed");

        let record = MediaRecord {
            id: format!("media-{}", Uuid::new_v4()),
            name: name.to_string(),
            kind: data.kind,
            category: category.to_string(),
            description: data.description.clone(),
            upload_date: Utc::now().date_naive(),
            status: MediaStatus::Draft,
            account_id: receipt.account_id.clone(),
            url: MediaRecord::view_url(&receipt.file_id),
            thumbnail_url: MediaRecord::thumbnail_url_for(&receipt.file_id),
            remote_file_id: receipt.file_id,
            mime_type: receipt.mime_type,
            size_bytes: i64::try_from(file.size()).unwrap_or(i64::MAX),
        };

        let stored = match self.store.insert(&record).await {
            Ok(stored) => stored,
            Err(err) => {
                error!(id = %record.id, error = %err, "recording upload failed, removing transferred file");
                if self
                    .transfer
                    .delete(&record.remote_file_id, &record.account_id)
                    .await
                {
                    self.transfer
                        .pool()
                        .release(&record.account_id, file.size())
                        .await;
                }
                return Err(err.into());
            }
        };

        self.categories.write().await.insert(&stored.category);
        info!(id = %stored.id, account_id = %stored.account_id, category = %stored.category, "media uploaded");
        Ok(stored)
    }

    /// Overwrite the fields present in `patch`. Name and category are
    /// trimmed like on upload.
    pub async fn update(&self, id: &str, mut patch: MediaPatch) -> CatalogResult<MediaRecord> {
        if let Some(name) = patch.name.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() {
                return Err(CatalogError::InvalidInput("name cannot be blank".into()));
            }
        }
        if let Some(category) = patch.category.as_mut() {
            *category = category.trim().to_string();
            if category.is_empty() {
                return Err(CatalogError::InvalidInput("category cannot be blank".into()));
            }
        }

        let updated = self
            .store
            .update(id, &patch)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        if patch.category.is_some() {
            self.categories.write().await.insert(&updated.category);
        }
        info!(id, status = ?updated.status, "media updated");
        Ok(updated)
    }

    /// Delete the remote file, then the record.
    ///
    /// A failed remote delete keeps the record as it was. The record's size
    /// is given back to its account only by the call whose store delete
    /// actually removed the record, so racing deletes release it once.
    pub async fn delete(&self, id: &str) -> CatalogResult<()> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        if !self
            .transfer
            .delete(&record.remote_file_id, &record.account_id)
            .await
        {
            return Err(CatalogError::TransferFailure(format!(
                "could not delete remote file `{}`",
                record.remote_file_id
            )));
        }

        let removed = match self.store.delete(id).await {
            Ok(removed) => removed,
            Err(err) => {
                error!(id, file_id = %record.remote_file_id, error = %err, "remote file removed but record could not be deleted");
                return Err(err.into());
            }
        };
        if !removed {
            debug!(id, "record already deleted by a concurrent call");
            return Err(CatalogError::NotFound(id.to_string()));
        }

        self.transfer
            .pool()
            .release(&record.account_id, record.size_bytes.max(0) as u64)
            .await;
        info!(id, file_id = %record.remote_file_id, "media deleted");
        Ok(())
    }

    /// Known categories: the defaults, admin additions, then any other label
    /// used by a record, in first-seen order.
    pub async fn categories(&self) -> Vec<String> {
        let in_use = self.categories_in_use().await;
        let mut set = self.categories.write().await;
        for label in &in_use {
            set.insert(label);
        }
        set.labels().to_vec()
    }

    /// Distinct categories of the current records.
    pub async fn categories_in_use(&self) -> Vec<String> {
        let mut seen = CategorySet { labels: Vec::new() };
        for record in self.list().await {
            seen.insert(&record.category);
        }
        seen.labels
    }

    /// Register a category. Returns `false` if it was already known.
    pub async fn add_category(&self, label: &str) -> CatalogResult<bool> {
        let label = label.trim();
        if label.is_empty() {
            return Err(CatalogError::InvalidInput("category cannot be blank".into()));
        }
        let added = self.categories.write().await.insert(label);
        if added {
            info!(category = label, "category added");
        }
        Ok(added)
    }

    /// Distinct kinds of the current records.
    pub async fn types(&self) -> Vec<MediaKind> {
        let mut kinds = Vec::new();
        for record in self.list().await {
            if !kinds.contains(&record.kind) {
                kinds.push(record.kind);
            }
        }
        kinds
    }

    pub async fn usage_stats(&self) -> Vec<AccountUsage> {
        self.transfer.pool().usage_stats().await
    }
}

fn fallback<F>(keep: F) -> Vec<MediaRecord>
where
    F: Fn(&MediaRecord) -> bool,
{
    let mut records: Vec<MediaRecord> = builtin_records().into_iter().filter(|r| keep(r)).collect();
    sort_newest_first(&mut records);
    records
}
