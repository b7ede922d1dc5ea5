//! Core data models for the wedding media catalog.
//!
//! Records map onto the `media_items` table via `sqlx::FromRow` and serialize
//! as camelCase JSON for the gallery and dashboard views.

pub mod account;
pub mod media;
