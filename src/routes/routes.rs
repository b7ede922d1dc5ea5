//! Defines routes for the media catalog API.
//!
//! ## Structure
//! - **Media**
//!   - `GET    /api/media`: list media (supports `?category=` and `?type=`)
//!   - `POST   /api/media`: multipart upload
//!   - `GET    /api/media/{id}`: fetch one record
//!   - `PATCH  /api/media/{id}`: partial update (publish, recategorize)
//!   - `DELETE /api/media/{id}`: delete remote file and record
//!
//! - **Catalog metadata**
//!   - `GET|POST /api/categories`, `GET /api/media-types`
//!
//! - **Storage**
//!   - `GET /api/storage/usage`, `GET /api/storage/supported-types`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        media_handlers::{
            add_category, delete_media, get_media, list_categories, list_media, list_types,
            storage_usage, supported_types, update_media, upload_media,
        },
    },
    services::catalog::MediaCatalog,
};
use axum::{Router, extract::DefaultBodyLimit, routing::get};
use std::sync::Arc;

/// Shared handler state: the process-wide catalog.
pub type AppState = Arc<MediaCatalog>;

/// Build and return the router for the catalog API.
///
/// `max_upload_bytes` caps request bodies, which bounds multipart uploads.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Media routes
        .route("/api/media", get(list_media).post(upload_media))
        .route(
            "/api/media/{id}",
            get(get_media).patch(update_media).delete(delete_media),
        )
        // Catalog metadata
        .route("/api/categories", get(list_categories).post(add_category))
        .route("/api/media-types", get(list_types))
        // Storage accounts
        .route("/api/storage/usage", get(storage_usage))
        .route("/api/storage/supported-types", get(supported_types))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            account::{AccountUsage, StorageAccount},
            media::{MediaKind, MediaRecord, MediaStatus},
        },
        services::{
            account_pool::StorageAccountPool,
            catalog::DEFAULT_UPLOAD_FOLDER,
            media_store::MemoryMediaStore,
            transfer::{FileTransferClient, testing::ScriptedTransport},
        },
    };
    use axum::http::StatusCode;
    use axum_test::{
        TestServer,
        multipart::{MultipartForm, Part},
    };
    use serde_json::json;
    use std::time::Duration;

    fn server_with(transport: Arc<ScriptedTransport>, accounts: Vec<StorageAccount>) -> TestServer {
        let client = FileTransferClient::new(
            Arc::new(StorageAccountPool::new(accounts)),
            transport,
            Duration::from_secs(5),
        );
        let catalog = Arc::new(MediaCatalog::new(
            Arc::new(MemoryMediaStore::seeded()),
            client,
            DEFAULT_UPLOAD_FOLDER,
        ));
        TestServer::new(routes(1024 * 1024).with_state(catalog)).unwrap()
    }

    fn server(transport: Arc<ScriptedTransport>) -> TestServer {
        server_with(transport, StorageAccount::defaults())
    }

    fn upload_form(mime: &str) -> MultipartForm {
        MultipartForm::new()
            .add_text("name", "Vows")
            .add_text("type", "image")
            .add_text("category", "Ceremony")
            .add_text("description", "Exchanging vows")
            .add_part(
                "file",
                Part::bytes(vec![1u8; 64]).file_name("vows.jpg").mime_type(mime),
            )
    }

    #[tokio::test]
    async fn health_and_readiness() {
        let server = server(ScriptedTransport::succeeding());

        server.get("/healthz").await.assert_status_ok();

        let ready = server.get("/readyz").await;
        ready.assert_status_ok();
        let body: serde_json::Value = ready.json();
        assert_eq!(body["backend"], "memory");
        assert_eq!(body["checks"]["store"]["ok"], true);
    }

    #[tokio::test]
    async fn readiness_fails_without_accounts() {
        let server = server_with(ScriptedTransport::succeeding(), Vec::new());
        server
            .get("/readyz")
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn upload_get_publish_delete_flow() {
        let server = server(ScriptedTransport::succeeding());

        let created = server.post("/api/media").multipart(upload_form("image/jpeg")).await;
        created.assert_status(StatusCode::CREATED);
        let record: MediaRecord = created.json();
        assert_eq!(record.status, MediaStatus::Draft);
        assert_eq!(record.kind, MediaKind::Image);
        assert_eq!(record.size_bytes, 64);

        let fetched: MediaRecord = server.get(&format!("/api/media/{}", record.id)).await.json();
        assert_eq!(fetched, record);

        let published = server
            .patch(&format!("/api/media/{}", record.id))
            .json(&json!({ "status": "Published" }))
            .await;
        published.assert_status_ok();
        assert_eq!(published.json::<MediaRecord>().status, MediaStatus::Published);

        server
            .delete(&format!("/api/media/{}", record.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/api/media/{}", record.id))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn upload_errors_map_to_statuses() {
        let transport = ScriptedTransport::succeeding();
        let server = server(transport.clone());

        server
            .post("/api/media")
            .multipart(upload_form("application/zip"))
            .await
            .assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let missing_file = MultipartForm::new()
            .add_text("name", "Vows")
            .add_text("category", "Ceremony");
        server
            .post("/api/media")
            .multipart(missing_file)
            .await
            .assert_status_bad_request();

        transport.set_upload_ok(false);
        server
            .post("/api/media")
            .multipart(upload_form("image/png"))
            .await
            .assert_status(StatusCode::BAD_GATEWAY);

        let listed: Vec<MediaRecord> = server.get("/api/media").await.json();
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn patch_cannot_move_storage_location() {
        let server = server(ScriptedTransport::succeeding());
        let before: MediaRecord = server.get("/api/media/media1").await.json();

        for body in [
            json!({ "accountId": "drive9" }),
            json!({ "remoteFileId": "file-other" }),
            json!({ "sizeBytes": 1 }),
        ] {
            server
                .patch("/api/media/media1")
                .json(&body)
                .await
                .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        }

        let renamed = server
            .patch("/api/media/media1")
            .json(&json!({ "name": "  Proposal ", "category": "Engagement" }))
            .await;
        renamed.assert_status_ok();
        let after: MediaRecord = renamed.json();
        assert_eq!(after.name, "Proposal");
        assert_eq!(after.account_id, before.account_id);
        assert_eq!(after.remote_file_id, before.remote_file_id);
        assert_eq!(after.size_bytes, before.size_bytes);
    }

    #[tokio::test]
    async fn failed_remote_delete_keeps_record() {
        let transport = ScriptedTransport::new(true, false);
        let server = server(transport);

        server
            .delete("/api/media/media1")
            .await
            .assert_status(StatusCode::BAD_GATEWAY);
        server.get("/api/media/media1").await.assert_status_ok();
        server
            .delete("/api/media/unknown")
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn list_filters_by_category_and_type() {
        let server = server(ScriptedTransport::succeeding());

        let engagement: Vec<MediaRecord> = server
            .get("/api/media")
            .add_query_param("category", "Engagement")
            .await
            .json();
        assert_eq!(engagement.len(), 2);

        let videos: Vec<MediaRecord> = server
            .get("/api/media")
            .add_query_param("type", "video")
            .await
            .json();
        assert_eq!(videos.len(), 1);

        let none: Vec<MediaRecord> = server
            .get("/api/media")
            .add_query_param("category", "Engagement")
            .add_query_param("type", "video")
            .await
            .json();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn categories_and_types_endpoints() {
        let server = server(ScriptedTransport::succeeding());

        let created = server
            .post("/api/categories")
            .json(&json!({ "name": "Mehndi" }))
            .await;
        created.assert_status(StatusCode::CREATED);
        assert!(created.json::<Vec<String>>().contains(&"Mehndi".to_string()));

        server
            .post("/api/categories")
            .json(&json!({ "name": "Mehndi" }))
            .await
            .assert_status_ok();
        server
            .post("/api/categories")
            .json(&json!({ "name": "   " }))
            .await
            .assert_status_bad_request();

        let types: Vec<MediaKind> = server.get("/api/media-types").await.json();
        assert_eq!(types.len(), 2);
    }

    #[tokio::test]
    async fn storage_endpoints_report_accounts() {
        let server = server(ScriptedTransport::succeeding());

        let usage: Vec<AccountUsage> = server.get("/api/storage/usage").await.json();
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].id, "drive1");
        assert!((usage[0].percentage_used - 48.0).abs() < 0.01);

        let supported: serde_json::Value = server.get("/api/storage/supported-types").await.json();
        assert_eq!(supported["image"].as_array().unwrap().len(), 5);
        assert_eq!(supported["video"][0], "video/mp4");
    }
}
