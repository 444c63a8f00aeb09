//! EXIF tags for still images

use super::Tags;
use crate::error::{Error, Result};
use exif::{In, Reader, Tag};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// Values longer than this are binary blobs, not worth printing
const MAX_VALUE_LEN: usize = 128;

/// Tags never printed
const SKIPPED_TAGS: &[Tag] = &[Tag::MakerNote, Tag::UserComment];

/// Read the primary image's EXIF fields in file order
pub fn read_exif_tags(path: &Path) -> Result<Tags> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::Probe {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut tags = Tags::new();
    for field in exif.fields() {
        if field.ifd_num != In::PRIMARY || SKIPPED_TAGS.contains(&field.tag) {
            continue;
        }
        let value = field.display_value().with_unit(&exif).to_string();
        let value = value.trim().trim_matches('"').to_string();
        if value.is_empty() || value.len() > MAX_VALUE_LEN {
            continue;
        }
        tags.insert(field.tag.to_string(), value);
    }

    trace!(?path, count = tags.len(), "Read EXIF tags");
    Ok(tags)
}
