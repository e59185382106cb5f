//! Cover art handling
//!
//! Extracts APIC frames from MP3 tags, scales images to the thumbnail
//! bounds, and embeds the displayed cover into exported files as an ID3
//! "front cover" frame.

use crate::error::{Error, Result};
use id3::frame::{Content, Picture, PictureType};
use id3::{Frame, Tag, TagLike, Version};
use image::{imageops::FilterType, DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Thumbnail bounding box, both axes
pub const THUMBNAIL_MAX_DIM: u32 = 200;

/// The displayed cover image, already scaled to fit the thumbnail bounds
/// with aspect ratio preserved.
#[derive(Debug, Clone)]
pub struct CoverImage {
    image: DynamicImage,
}

impl CoverImage {
    /// Decode image bytes (JPEG/PNG) and scale to the thumbnail bounds.
    ///
    /// Images smaller than the bounds are scaled up, matching the display
    /// behavior.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(data)
            .map_err(|e| Error::Image(format!("Failed to decode image: {}", e)))?;

        let image = decoded.resize(THUMBNAIL_MAX_DIM, THUMBNAIL_MAX_DIM, FilterType::Lanczos3);
        debug!(
            "Scaled cover from {}x{} to {}x{}",
            decoded.width(),
            decoded.height(),
            image.width(),
            image.height()
        );

        Ok(Self { image })
    }

    /// Load and scale an image file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| Error::Image(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_bytes(&data)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Encode the thumbnail as PNG (lossless, keeps alpha) for the UI.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.image
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| Error::Image(format!("Failed to encode PNG: {}", e)))?;
        Ok(out.into_inner())
    }

    /// Encode the thumbnail as JPEG for tag embedding.
    ///
    /// Alpha channels are dropped first; JPEG carries RGB only.
    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgb8(self.image.to_rgb8());
        let mut out = Cursor::new(Vec::new());
        rgb.write_to(&mut out, ImageFormat::Jpeg)
            .map_err(|e| Error::Image(format!("Failed to encode JPEG: {}", e)))?;
        Ok(out.into_inner())
    }
}

/// Extract the first attached picture from the file's ID3 tag.
///
/// # Returns
/// - `Ok(Some(cover))`: an APIC frame was found and decoded
/// - `Ok(None)`: the file has no tag or no picture frames
/// - `Err(..)`: the tag or the picture data is unreadable
pub fn extract_cover(path: &Path) -> Result<Option<CoverImage>> {
    let tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => return Ok(None),
        Err(e) => return Err(Error::Tag(format!("Failed to read tags: {}", e))),
    };

    let picture = match tag.pictures().next() {
        Some(picture) => picture,
        None => return Ok(None),
    };

    debug!(
        "Found picture frame: {} ({} bytes)",
        picture.mime_type,
        picture.data.len()
    );

    let cover = CoverImage::from_bytes(&picture.data)?;
    Ok(Some(cover))
}

/// Embed the displayed cover into the MP3 at `path` as a "front cover"
/// APIC frame.
///
/// A file without a tag container gets a fresh one; read failures fall
/// back to an empty tag rather than surfacing.
pub fn embed_cover(path: &Path, cover: &CoverImage) -> Result<()> {
    let jpeg_data = cover.to_jpeg()?;

    let mut tag = Tag::read_from_path(path).unwrap_or_else(|_| Tag::new());

    let picture = Picture {
        mime_type: "image/jpeg".to_string(),
        picture_type: PictureType::CoverFront,
        description: "Cover".to_string(),
        data: jpeg_data,
    };
    tag.add_frame(Frame::with_content("APIC", Content::Picture(picture)));

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| Error::Tag(format!("Failed to write tags: {}", e)))?;

    debug!("Embedded cover into {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_scale_landscape_within_bounds() {
        let cover = CoverImage::from_bytes(&png_bytes(400, 300)).unwrap();
        assert_eq!(cover.width(), 200);
        assert_eq!(cover.height(), 150);
    }

    #[test]
    fn test_scale_portrait_within_bounds() {
        let cover = CoverImage::from_bytes(&png_bytes(300, 400)).unwrap();
        assert_eq!(cover.width(), 150);
        assert_eq!(cover.height(), 200);
    }

    #[test]
    fn test_small_image_scaled_up() {
        let cover = CoverImage::from_bytes(&png_bytes(50, 80)).unwrap();
        assert_eq!(cover.width(), 125);
        assert_eq!(cover.height(), 200);
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        let result = CoverImage::from_bytes(b"not an image");
        assert!(matches!(result, Err(Error::Image(_))));
    }

    #[test]
    fn test_jpeg_reencode_drops_alpha() {
        let cover = CoverImage::from_bytes(&png_bytes(200, 200)).unwrap();
        let jpeg = cover.to_jpeg().unwrap();

        // JPEG SOI marker
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[test]
    fn test_png_roundtrip_keeps_dimensions() {
        let cover = CoverImage::from_bytes(&png_bytes(400, 200)).unwrap();
        let png = cover.to_png().unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), cover.width());
        assert_eq!(decoded.height(), cover.height());
    }

    #[test]
    fn test_extract_from_untagged_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.mp3");
        // Sync word followed by junk; no ID3 container
        std::fs::write(&path, [0xFFu8, 0xFB, 0x90, 0x00, 0, 0, 0, 0]).unwrap();

        let result = extract_cover(&path).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_embed_then_extract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tagged.mp3");
        std::fs::write(&path, [0xFFu8, 0xFB, 0x90, 0x00, 0, 0, 0, 0]).unwrap();

        let cover = CoverImage::from_bytes(&png_bytes(400, 300)).unwrap();
        embed_cover(&path, &cover).unwrap();

        let read_back = extract_cover(&path).unwrap().unwrap();
        assert_eq!(read_back.width(), 200);
        assert_eq!(read_back.height(), 150);

        // Exactly one picture frame
        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.pictures().count(), 1);
        let picture = tag.pictures().next().unwrap();
        assert_eq!(picture.mime_type, "image/jpeg");
        assert_eq!(picture.picture_type, PictureType::CoverFront);
    }
}
