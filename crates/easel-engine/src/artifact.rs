use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use easel_contracts::events::StreamEvent;
use image::ImageReader;
use sha2::{Digest, Sha256};

use crate::transport::ClientError;

/// Decoded payload of a `newImage` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl GeneratedImage {
    pub fn from_event(event: &StreamEvent) -> Result<Self, ClientError> {
        let data = event
            .data()
            .ok_or_else(|| ClientError::InvalidPayload("image event has no data".to_string()))?;
        Self::from_base64(data)
    }

    pub fn from_base64(data: &str) -> Result<Self, ClientError> {
        let bytes = BASE64
            .decode(data.trim())
            .map_err(|err| ClientError::InvalidPayload(format!("image data is not base64: {err}")))?;
        let (width, height) = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|err| ClientError::InvalidPayload(format!("unreadable image: {err}")))?
            .into_dimensions()
            .map_err(|err| ClientError::InvalidPayload(format!("unreadable image: {err}")))?;
        Ok(Self {
            bytes,
            width,
            height,
        })
    }

    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    pub fn file_name(&self) -> String {
        format!("generated-{}.png", &self.digest()[..12])
    }
}
