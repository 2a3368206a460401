use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbaImage};

use crate::error::TicketError;

/// Background artwork and where the QR goes on it.
///
/// The anchor is the QR centre as a fraction of the template size; the QR
/// width is a fraction of the template width.
#[derive(Clone)]
pub struct TicketLayout {
    template: RgbaImage,
    pub qr_scale: f32,
    pub anchor_x: f32,
    pub anchor_y: f32,
}

impl TicketLayout {
    pub fn new(template: RgbaImage) -> Self {
        Self {
            template,
            qr_scale: 0.30,
            anchor_x: 0.5,
            anchor_y: 0.73,
        }
    }

    pub fn load(path: &Path) -> Result<Self, TicketError> {
        let template = image::open(path)
            .map_err(|e| {
                TicketError::Artifact(format!("cannot open ticket template {}: {e}", path.display()))
            })?
            .to_rgba8();
        Ok(Self::new(template))
    }

    pub fn compose(&self, qr: &GrayImage) -> RgbaImage {
        let (tw, th) = self.template.dimensions();

        // Never shrink the QR below its native size; never grow it past the template.
        let wanted = (tw as f32 * self.qr_scale) as u32;
        let side = wanted.max(qr.width()).min(tw.min(th)).max(1);

        let qr = DynamicImage::ImageLuma8(qr.clone()).to_rgba8();
        let qr = imageops::resize(&qr, side, side, FilterType::Nearest);

        let x = clamp_offset(tw as f32 * self.anchor_x - side as f32 / 2.0, tw, side);
        let y = clamp_offset(th as f32 * self.anchor_y - side as f32 / 2.0, th, side);

        let mut composed = self.template.clone();
        imageops::overlay(&mut composed, &qr, x, y);
        composed
    }
}

fn clamp_offset(wanted: f32, outer: u32, inner: u32) -> i64 {
    let max = outer.saturating_sub(inner) as i64;
    (wanted as i64).clamp(0, max)
}
