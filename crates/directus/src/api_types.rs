use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

/// `aggregate[count]=*` row; depending on the database driver the count is a
/// number or a numeric string.
#[derive(Deserialize)]
pub(crate) struct CountRow {
    #[serde(default)]
    pub count: Value,
}

#[derive(Deserialize)]
pub(crate) struct IdRow {
    pub id: Value,
    #[serde(default)]
    pub source_id: Option<String>,
}

#[derive(Deserialize, Default)]
pub(crate) struct ErrorsBody {
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Deserialize)]
pub(crate) struct ErrorEntry {
    #[serde(default)]
    pub message: String,
}
