//! HTTP handlers for the media catalog, categories and storage usage.
//! Uploads arrive as multipart forms; everything else is JSON.

use crate::{
    errors::AppError,
    models::{
        account::AccountUsage,
        media::{MediaKind, MediaPatch, MediaRecord, MediaStatus, MediaUploadData, UploadFile},
    },
    routes::routes::AppState,
    services::transfer::{supported_image_types, supported_video_types},
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Filters accepted by `GET /api/media`.
#[derive(Debug, Deserialize)]
pub struct ListMediaQuery {
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
}

/// Body of `PATCH /api/media/{id}`. Where the file lives (account, remote
/// id, size) is fixed at upload and cannot be patched from outside.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateMediaReq {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub upload_date: Option<NaiveDate>,
    pub status: Option<MediaStatus>,
}

impl From<UpdateMediaReq> for MediaPatch {
    fn from(req: UpdateMediaReq) -> Self {
        Self {
            name: req.name,
            kind: req.kind,
            category: req.category,
            description: req.description,
            upload_date: req.upload_date,
            status: req.status,
            ..Self::default()
        }
    }
}

/// Body of `POST /api/categories`.
#[derive(Debug, Deserialize)]
pub struct NewCategoryReq {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SupportedTypes {
    pub image: Vec<&'static str>,
    pub video: Vec<&'static str>,
}

/// GET `/api/media`: list media, optionally narrowed by `?category=` and `?type=`.
pub async fn list_media(
    State(catalog): State<AppState>,
    Query(q): Query<ListMediaQuery>,
) -> Json<Vec<MediaRecord>> {
    let mut records = match (&q.category, q.kind) {
        (Some(category), _) => catalog.list_by_category(category).await,
        (None, Some(kind)) => catalog.list_by_kind(kind).await,
        (None, None) => catalog.list().await,
    };
    if let (Some(_), Some(kind)) = (&q.category, q.kind) {
        records.retain(|r| r.kind == kind);
    }
    Json(records)
}

/// POST `/api/media`: multipart upload with `name`, `type`, `category`,
/// `description` and `file` fields.
pub async fn upload_media(
    State(catalog): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut name = String::new();
    let mut kind: Option<String> = None;
    let mut category = String::new();
    let mut description = String::new();
    let mut file: Option<UploadFile> = None;

    while let Some(field) = multipart.next_field().await? {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };
        match field_name.as_str() {
            "name" => name = field.text().await?,
            "type" => kind = Some(field.text().await?),
            "category" => category = field.text().await?,
            "description" => description = field.text().await?,
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await?;
                file = Some(UploadFile::new(file_name, mime_type, data));
            }
            other => debug!(field = other, "ignoring unknown upload field"),
        }
    }

    let kind = match kind {
        Some(raw) => raw.parse::<MediaKind>().map_err(AppError::bad_request)?,
        None => infer_kind(file.as_ref()),
    };

    let record = catalog
        .upload(MediaUploadData {
            name,
            kind,
            category,
            description,
            file,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET `/api/media/{id}`
pub async fn get_media(
    State(catalog): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MediaRecord>, AppError> {
    catalog
        .get_by_id(&id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("media `{}` not found", id)))
}

/// PATCH `/api/media/{id}`: partial metadata update (publish, recategorize, ...).
pub async fn update_media(
    State(catalog): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateMediaReq>,
) -> Result<Json<MediaRecord>, AppError> {
    Ok(Json(catalog.update(&id, req.into()).await?))
}

/// DELETE `/api/media/{id}`: remove the remote file and the record.
pub async fn delete_media(
    State(catalog): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    catalog.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/api/categories`
pub async fn list_categories(State(catalog): State<AppState>) -> Json<Vec<String>> {
    Json(catalog.categories().await)
}

/// POST `/api/categories`: 201 when the label is new, 200 when it was known.
pub async fn add_category(
    State(catalog): State<AppState>,
    Json(req): Json<NewCategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let added = catalog.add_category(&req.name).await?;
    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(catalog.categories().await)))
}

/// GET `/api/media-types`
pub async fn list_types(State(catalog): State<AppState>) -> Json<Vec<MediaKind>> {
    Json(catalog.types().await)
}

/// GET `/api/storage/usage`
pub async fn storage_usage(State(catalog): State<AppState>) -> Json<Vec<AccountUsage>> {
    Json(catalog.usage_stats().await)
}

/// GET `/api/storage/supported-types`
pub async fn supported_types() -> Json<SupportedTypes> {
    Json(SupportedTypes {
        image: supported_image_types().to_vec(),
        video: supported_video_types().to_vec(),
    })
}

fn infer_kind(file: Option<&UploadFile>) -> MediaKind {
    match file {
        Some(f) if f.mime_type.starts_with("video/") => MediaKind::Video,
        _ => MediaKind::Image,
    }
}
