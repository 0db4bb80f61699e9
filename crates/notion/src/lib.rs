//! Notion client for reading source databases page by page.

mod api_types;
mod client;

pub use client::{DEFAULT_BASE_URL, NOTION_VERSION, NotionClient};
