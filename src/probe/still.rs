//! Still image header probing with the `image` crate

use super::{BitDepth, Metadata, PixelFormat};
use crate::error::{Error, Result};
use image::{ColorType, ImageDecoder, ImageReader};
use std::path::Path;
use tracing::trace;

/// Read dimensions and pixel type without decoding pixels
pub fn probe(path: &Path) -> Result<Metadata> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let Some(format) = reader.format() else {
        return Err(Error::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    };

    let decoder = reader.into_decoder()?;
    let (width, height) = decoder.dimensions();
    let color = decoder.color_type();
    let (pixel_format, bit_depth) = pixel_from_color(color);
    trace!(?path, ?format, ?color, width, height, "Read image header");

    Ok(Metadata::still(width, height, pixel_format, bit_depth))
}

/// Map the decoder's color type onto channel layout and depth
pub fn pixel_from_color(color: ColorType) -> (PixelFormat, BitDepth) {
    match color {
        ColorType::L8 => (PixelFormat::L, BitDepth::U8),
        ColorType::La8 => (PixelFormat::LA, BitDepth::U8),
        ColorType::Rgb8 => (PixelFormat::RGB, BitDepth::U8),
        ColorType::Rgba8 => (PixelFormat::RGBA, BitDepth::U8),
        ColorType::L16 => (PixelFormat::L, BitDepth::U16),
        ColorType::La16 => (PixelFormat::LA, BitDepth::U16),
        ColorType::Rgb16 => (PixelFormat::RGB, BitDepth::U16),
        ColorType::Rgba16 => (PixelFormat::RGBA, BitDepth::U16),
        ColorType::Rgb32F => (PixelFormat::RGB, BitDepth::F32),
        ColorType::Rgba32F => (PixelFormat::RGBA, BitDepth::F32),
        other => {
            let pixel = match (other.channel_count(), other.has_alpha()) {
                (1, _) => PixelFormat::L,
                (2, _) => PixelFormat::LA,
                (_, true) => PixelFormat::RGBA,
                _ => PixelFormat::RGB,
            };
            let bits = u32::from(other.bits_per_pixel()) / u32::from(other.channel_count().max(1));
            (pixel, BitDepth::from_bits(bits))
        }
    }
}
