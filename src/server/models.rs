use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct ComposeRequest {
    /// Canvas bytes, optionally as a `data:` URI.
    pub(crate) image_base64: String,
    pub(crate) text: String,
    pub(crate) color: Option<String>,
    pub(crate) backend: Option<String>,
    pub(crate) font_family: Option<String>,
    pub(crate) font_size: Option<f32>,
    pub(crate) outline_color: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ComposeResponse {
    pub(crate) mime: String,
    pub(crate) extension: String,
    pub(crate) data_base64: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
