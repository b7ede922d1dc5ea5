//! Catalog services: account selection, file transfer, persistence and the
//! catalog that ties them together.

pub mod account_pool;
pub mod catalog;
pub mod media_store;
pub mod transfer;
