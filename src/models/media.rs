//! Represents a media item (photo or video) in the wedding catalog.

use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

/// Whether a record is a photo or a video.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("unknown media type `{}`", other)),
        }
    }
}

/// Publication state. Records start as `Draft` and only `Published` ones are
/// shown in the public gallery.
#[derive(Serialize, Deserialize, sqlx::Type, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaStatus {
    Draft,
    Published,
}

/// The catalog's metadata entry for one uploaded file.
///
/// The bytes themselves live on a storage account; this struct only records
/// where they are (`account_id` + `remote_file_id`) and how to display them.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    /// Catalog identifier, `media-<uuid>` for uploaded items.
    pub id: String,

    /// Title shown in the gallery.
    pub name: String,

    #[serde(rename = "type")]
    pub kind: MediaKind,

    /// Free-text category label (Engagement, Ceremony, ...).
    pub category: String,

    pub description: String,

    /// Calendar date the item was uploaded.
    pub upload_date: NaiveDate,

    pub status: MediaStatus,

    /// Storage account holding the file.
    pub account_id: String,

    /// File identifier on the storage account.
    pub remote_file_id: String,

    pub url: String,
    pub thumbnail_url: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

impl MediaRecord {
    /// Public viewer URL for a Drive file.
    pub fn view_url(remote_file_id: &str) -> String {
        format!("https://drive.google.com/file/d/{}/view", remote_file_id)
    }

    /// Thumbnail URL for a Drive file.
    pub fn thumbnail_url_for(remote_file_id: &str) -> String {
        format!("https://drive.google.com/thumbnail?id={}", remote_file_id)
    }

    /// Overwrite every field the patch carries; the id never changes.
    pub fn apply(&mut self, patch: &MediaPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(category) = &patch.category {
            self.category = category.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(upload_date) = patch.upload_date {
            self.upload_date = upload_date;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(account_id) = &patch.account_id {
            self.account_id = account_id.clone();
        }
        if let Some(remote_file_id) = &patch.remote_file_id {
            self.remote_file_id = remote_file_id.clone();
        }
        if let Some(url) = &patch.url {
            self.url = url.clone();
        }
        if let Some(thumbnail_url) = &patch.thumbnail_url {
            self.thumbnail_url = thumbnail_url.clone();
        }
        if let Some(mime_type) = &patch.mime_type {
            self.mime_type = mime_type.clone();
        }
        if let Some(size_bytes) = patch.size_bytes {
            self.size_bytes = size_bytes;
        }
    }
}

/// Partial update of a [`MediaRecord`]. Absent fields are left untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MediaPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub upload_date: Option<NaiveDate>,
    pub status: Option<MediaStatus>,
    pub account_id: Option<String>,
    pub remote_file_id: Option<String>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

impl MediaPatch {
    #[cfg(test)]
    pub fn status(status: MediaStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A file handed in by the admin dashboard.
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Input of an upload: metadata typed in by the admin plus the file itself.
#[derive(Clone, Debug)]
pub struct MediaUploadData {
    pub name: String,
    pub kind: MediaKind,
    pub category: String,
    pub description: String,
    pub file: Option<UploadFile>,
}
