pub mod compose;

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};
use sha2::{Digest, Sha256};

use crate::error::TicketError;
use crate::sheet::is_valid_identifier;

pub use compose::TicketLayout;

/// Marks payloads produced by this system. Bump when the payload shape changes.
pub const PAYLOAD_PREFIX: &str = "TKT1";

const MODULE_PX: usize = 10;
const QUIET_ZONE_MODULES: usize = 4;

/// A rendered ticket: the QR payload and the PNG carrying it.
#[derive(Debug, Clone)]
pub struct TicketArtifact {
    pub id: String,
    pub payload: String,
    pub png: Vec<u8>,
}

impl TicketArtifact {
    pub fn file_name(&self) -> String {
        file_name(&self.id)
    }
}

/// Cache file name for a ticket. Identifiers are filename-safe, so this is collision-free.
pub fn file_name(id: &str) -> String {
    format!("{id}.png")
}

/// Encodes submission identifiers into scannable tickets and back.
#[derive(Clone, Default)]
pub struct TicketCodec {
    layout: Option<TicketLayout>,
}

impl TicketCodec {
    pub fn new() -> Self {
        Self { layout: None }
    }

    pub fn with_layout(layout: TicketLayout) -> Self {
        Self {
            layout: Some(layout),
        }
    }

    /// Codec that pastes every QR onto the background image at `template`.
    pub fn with_template(template: &Path) -> Result<Self, TicketError> {
        Ok(Self::with_layout(TicketLayout::load(template)?))
    }

    /// Render the ticket for `id`. The same identifier always yields the same image.
    pub fn encode(&self, id: &str) -> Result<TicketArtifact, TicketError> {
        if !is_valid_identifier(id) {
            return Err(TicketError::Artifact(format!(
                "identifier '{id}' cannot be encoded"
            )));
        }

        let payload = encode_payload(id);
        let qr = render_qr(&payload)?;

        let image = match &self.layout {
            Some(layout) => DynamicImage::ImageRgba8(layout.compose(&qr)),
            None => DynamicImage::ImageLuma8(qr),
        };

        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .map_err(|e| TicketError::Artifact(format!("PNG encoding failed: {e}")))?;

        Ok(TicketArtifact {
            id: id.to_string(),
            payload,
            png: png.into_inner(),
        })
    }

    /// Find a ticket QR code in an uploaded image and return its identifier.
    pub fn decode_image(&self, bytes: &[u8]) -> Result<String, TicketError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| TicketError::DecodeFailure(format!("not a readable image: {e}")))?
            .to_luma8();

        let (width, height) = image.dimensions();
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
                image.get_pixel(x as u32, y as u32).0[0]
            });

        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Err(TicketError::DecodeFailure(
                "no QR code found in image".to_string(),
            ));
        }

        let mut last_error = None;
        for grid in grids {
            match grid.decode() {
                Ok((_, content)) => match decode_payload(&content) {
                    Ok(id) => return Ok(id),
                    Err(e) => last_error = Some(e),
                },
                Err(e) => {
                    last_error = Some(TicketError::DecodeFailure(format!("damaged QR code: {e}")))
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TicketError::DecodeFailure("no QR code found in image".to_string())
        }))
    }

    /// Validate a payload already decoded by a client-side scanner.
    pub fn decode_payload(&self, payload: &str) -> Result<String, TicketError> {
        decode_payload(payload)
    }
}

pub fn encode_payload(id: &str) -> String {
    format!("{PAYLOAD_PREFIX}.{id}.{}", checksum(id))
}

pub fn decode_payload(payload: &str) -> Result<String, TicketError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(TicketError::DecodeFailure("empty QR payload".to_string()));
    }

    let mut parts = payload.split('.');
    let (Some(prefix), Some(id), Some(check), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TicketError::DecodeFailure(
            "QR code was not issued by this system".to_string(),
        ));
    };

    if prefix != PAYLOAD_PREFIX {
        return Err(TicketError::DecodeFailure(
            "QR code was not issued by this system".to_string(),
        ));
    }
    if !is_valid_identifier(id) {
        return Err(TicketError::DecodeFailure(
            "QR code carries a malformed identifier".to_string(),
        ));
    }
    if check != checksum(id) {
        return Err(TicketError::DecodeFailure(
            "QR code checksum mismatch".to_string(),
        ));
    }

    Ok(id.to_string())
}

fn checksum(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    hex::encode(&digest[..4])
}

fn render_qr(payload: &str) -> Result<GrayImage, TicketError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| TicketError::Artifact(format!("QR encoding failed: {e}")))?;

    let modules = code.width();
    let side = ((modules + 2 * QUIET_ZONE_MODULES) * MODULE_PX) as u32;
    let mut image = GrayImage::from_pixel(side, side, Luma([255]));

    for (index, color) in code.to_colors().into_iter().enumerate() {
        if color != Color::Dark {
            continue;
        }
        let left = (index % modules + QUIET_ZONE_MODULES) * MODULE_PX;
        let top = (index / modules + QUIET_ZONE_MODULES) * MODULE_PX;
        for y in top..top + MODULE_PX {
            for x in left..left + MODULE_PX {
                image.put_pixel(x as u32, y as u32, Luma([0]));
            }
        }
    }

    Ok(image)
}
