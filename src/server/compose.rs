use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

use crate::backend::BackendKind;
use crate::canvas::{Canvas, Color, TextSpec};
use crate::error::OverlayError;

use super::models::{ComposeRequest, ComposeResponse};
use super::state::ServerState;

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::internal(format!("{:#}", err))
    }
}

impl From<OverlayError> for ServerError {
    fn from(err: OverlayError) -> Self {
        let status = match err {
            OverlayError::FontUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            OverlayError::InvalidCanvas(_) | OverlayError::UnsupportedBackend(_) => {
                StatusCode::BAD_REQUEST
            }
            OverlayError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

/// Runs on a blocking thread: font loading may hit the network.
pub(crate) fn compose_request(
    state: &ServerState,
    request: ComposeRequest,
) -> Result<ComposeResponse, ServerError> {
    let backend = request
        .backend
        .as_deref()
        .unwrap_or(BackendKind::RasterBuffer.as_str())
        .parse::<BackendKind>()?;

    let image = decode_image_payload(&request.image_base64)?;
    let canvas = Canvas::decode(&image)
        .map_err(|err| ServerError::bad_request(format!("{:#}", err)))?;

    let color = match request.color.as_deref().filter(|value| !value.trim().is_empty()) {
        Some(value) => parse_color("color", value)?,
        None => state.settings.text_color()?,
    };
    let mut options = state.options.clone();
    if let Some(value) = request
        .outline_color
        .as_deref()
        .filter(|value| !value.trim().is_empty())
    {
        options.outline_color = parse_color("outline_color", value)?;
    }

    let mut spec = TextSpec::new(request.text, color);
    if let Some(family) = request.font_family.filter(|family| !family.trim().is_empty()) {
        spec = spec.with_font_family(family);
    }
    if let Some(size) = request.font_size {
        if !size.is_finite() || size <= 0.0 {
            return Err(ServerError::bad_request("font_size must be positive"));
        }
        spec = spec.with_font_size(size);
    }

    debug!(
        "compose request: {}x{} canvas, {} backend",
        canvas.width(),
        canvas.height(),
        backend
    );
    let artifact = state.compositor.compose(&canvas, &spec, backend, &options)?;
    Ok(ComposeResponse {
        mime: artifact.mime().to_string(),
        extension: artifact.extension().to_string(),
        data_base64: BASE64.encode(artifact.as_bytes()),
    })
}

fn decode_image_payload(value: &str) -> Result<Vec<u8>, ServerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServerError::bad_request("image_base64 is required"));
    }
    let payload = match value.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| ServerError::bad_request("malformed data URI in image_base64"))?,
        None => value,
    };
    BASE64
        .decode(payload)
        .map_err(|err| ServerError::bad_request(format!("invalid image_base64: {}", err)))
}

fn parse_color(field: &str, value: &str) -> Result<Color, ServerError> {
    value
        .parse::<Color>()
        .map_err(|err| ServerError::bad_request(format!("invalid {}: {}", field, err)))
}
