//! Directus client for writing migrated items and counting them back.

mod api_types;
mod client;

pub use client::{DEFAULT_BASE_URL, DirectusClient};
