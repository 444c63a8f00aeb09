//! Movie metadata extraction via FFprobe

use super::{BitDepth, LayerInfo, Metadata, PixelFormat, Speed, Tags};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use tracing::{debug, trace};

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<Stream>,
    #[serde(default)]
    format: Option<Format>,
}

#[derive(Debug, Default, Deserialize)]
struct Stream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    bits_per_raw_sample: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Format {
    format_name: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, serde_json::Value>,
}

/// Check whether the ffprobe executable can be started
pub fn is_available(ffprobe: &Path) -> bool {
    Command::new(ffprobe).arg("-version").output().is_ok()
}

/// Run ffprobe on `path` and convert its JSON report
pub fn probe(ffprobe: &Path, path: &Path) -> Result<Metadata> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FfprobeNotFound,
            _ => Error::Probe {
                path: path.to_path_buf(),
                message: format!("Failed to execute ffprobe: {}", e),
            },
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => format!("ffprobe exited with {}", output.status),
            text => text.to_string(),
        };
        return Err(Error::Probe {
            path: path.to_path_buf(),
            message,
        });
    }

    let json_str = String::from_utf8_lossy(&output.stdout);
    trace!(?path, "FFprobe output: {}", json_str);
    parse_output(&json_str, path)
}

/// Convert ffprobe's `-show_format -show_streams` JSON into metadata
pub fn parse_output(json: &str, path: &Path) -> Result<Metadata> {
    let report: ProbeOutput = serde_json::from_str(json)?;
    let format = report.format.unwrap_or_default();

    let video: Vec<&Stream> = report
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
        .filter(|s| s.width.is_some() && s.height.is_some())
        .collect();

    let Some(first) = video.first() else {
        return Err(Error::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    };

    let (pixel_format, bit_depth) = pixel_from_ffmpeg(
        first.pix_fmt.as_deref().unwrap_or(""),
        first.bits_per_raw_sample.as_deref(),
    );
    let mut metadata = Metadata::still(
        first.width.unwrap_or(0),
        first.height.unwrap_or(0),
        pixel_format,
        bit_depth,
    );

    let speed = first
        .r_frame_rate
        .as_deref()
        .and_then(Speed::parse_ratio)
        .or_else(|| first.avg_frame_rate.as_deref().and_then(Speed::parse_ratio))
        .unwrap_or_default();
    metadata.frame_speed = speed;

    let format_name = format.format_name.as_deref().unwrap_or("");
    if !is_image_container(format_name) {
        let frames = first
            .nb_frames
            .as_deref()
            .and_then(|n| n.parse::<u64>().ok())
            .filter(|&n| n > 0)
            .or_else(|| {
                let seconds = first
                    .duration
                    .as_deref()
                    .or(format.duration.as_deref())?
                    .parse::<f64>()
                    .ok()?;
                Some((seconds * speed.fps()).round() as u64).filter(|&n| n > 0)
            })
            .unwrap_or(1);
        metadata.frame_count = frames;
        metadata.frame_end = frames - 1;
    }

    if video.len() > 1 {
        metadata.layers = video
            .iter()
            .enumerate()
            .map(|(index, stream)| {
                let (pixel_format, bit_depth) = pixel_from_ffmpeg(
                    stream.pix_fmt.as_deref().unwrap_or(""),
                    stream.bits_per_raw_sample.as_deref(),
                );
                LayerInfo {
                    name: layer_name(stream, index),
                    width: stream.width.unwrap_or(0),
                    height: stream.height.unwrap_or(0),
                    pixel_format,
                    bit_depth,
                }
            })
            .collect();
    }

    metadata.tags = collect_tags(&format.tags);
    debug!(
        ?path,
        format = format_name,
        frames = metadata.frame_count,
        layers = metadata.layers.len(),
        "Parsed ffprobe report"
    );
    Ok(metadata)
}

/// Demuxers that read single images rather than movies
fn is_image_container(format_name: &str) -> bool {
    format_name
        .split(',')
        .any(|name| name == "image2" || name.ends_with("_pipe"))
}

fn layer_name(stream: &Stream, index: usize) -> String {
    ["title", "handler_name"]
        .iter()
        .find_map(|key| stream.tags.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Stream {}", index))
}

fn collect_tags(source: &BTreeMap<String, serde_json::Value>) -> Tags {
    let mut tags = Tags::new();
    for (name, value) in source {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        tags.insert(name.clone(), value);
    }
    tags
}

/// Map an FFmpeg pixel format name onto channel layout and depth
pub fn pixel_from_ffmpeg(pix_fmt: &str, bits_per_raw_sample: Option<&str>) -> (PixelFormat, BitDepth) {
    let fmt = pix_fmt.to_lowercase();

    let pixel = if fmt.starts_with("ya") {
        PixelFormat::LA
    } else if fmt.starts_with("gray") {
        PixelFormat::L
    } else if ["rgba", "bgra", "argb", "abgr", "yuva", "gbrap"]
        .iter()
        .any(|p| fmt.starts_with(p))
    {
        PixelFormat::RGBA
    } else {
        PixelFormat::RGB
    };

    if fmt.contains("f32") {
        return (pixel, BitDepth::F32);
    }
    if fmt.contains("f16") {
        return (pixel, BitDepth::F16);
    }

    let bits = bits_per_raw_sample
        .and_then(|b| b.parse::<u32>().ok())
        .filter(|&b| b > 0)
        .unwrap_or_else(|| bits_from_name(&fmt));
    (pixel, BitDepth::from_bits(bits))
}

/// Channel depth encoded in names like `yuv420p10le`, `rgb48be` or `gray16le`
fn bits_from_name(fmt: &str) -> u32 {
    let stem = fmt.trim_end_matches("le").trim_end_matches("be");
    let digits: String = stem
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    match digits.parse::<u32>() {
        Ok(n @ 9..=16) => n,
        Ok(48) | Ok(64) => 16,
        _ => 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOVIE_JSON: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_type": "video",
                "width": 640,
                "height": 424,
                "pix_fmt": "yuv420p",
                "r_frame_rate": "12/1",
                "avg_frame_rate": "12/1",
                "nb_frames": "1441"
            },
            { "index": 1, "codec_type": "audio", "sample_rate": "48000" }
        ],
        "format": {
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "120.083333",
            "tags": { "major_brand": "qt  ", "creation_time": "2024-01-15T14:30:00.000000Z" }
        }
    }"#;

    #[test]
    fn test_parse_movie() {
        let metadata = parse_output(MOVIE_JSON, Path::new("yesterdayview.mov")).unwrap();
        assert_eq!((metadata.width, metadata.height), (640, 424));
        assert_eq!(metadata.pixel_format, PixelFormat::RGB);
        assert_eq!(metadata.bit_depth, BitDepth::U8);
        assert_eq!(metadata.frame_speed, Speed::new(12, 1));
        assert_eq!(metadata.frame_count, 1441);
        assert_eq!(metadata.frame_end, 1440);
        assert!(metadata.layers.is_empty());
        assert_eq!(metadata.tags.get("creation_time"), Some("2024-01-15T14:30:00.000000Z"));
    }

    #[test]
    fn test_parse_still_through_image_demuxer() {
        let json = r#"{
            "streams": [{ "codec_type": "video", "width": 2048, "height": 1556,
                          "pix_fmt": "gbrp10le", "r_frame_rate": "25/1" }],
            "format": { "format_name": "dpx_pipe" }
        }"#;
        let metadata = parse_output(json, Path::new("dlad.dpx")).unwrap();
        assert_eq!(metadata.frame_count, 1);
        assert_eq!(metadata.bit_depth, BitDepth::U10);
        assert!(!metadata.is_time_varying());
    }

    #[test]
    fn test_frame_count_from_duration() {
        let json = r#"{
            "streams": [{ "codec_type": "video", "width": 1920, "height": 1080,
                          "pix_fmt": "yuv422p10le", "r_frame_rate": "24000/1001" }],
            "format": { "format_name": "matroska,webm", "duration": "10.010000" }
        }"#;
        let metadata = parse_output(json, Path::new("clip.mkv")).unwrap();
        assert_eq!(metadata.frame_count, 240);
        assert_eq!(metadata.frame_speed, Speed::new(24000, 1001));
    }

    #[test]
    fn test_multiple_video_streams_become_layers() {
        let json = r#"{
            "streams": [
                { "codec_type": "video", "width": 720, "height": 480, "pix_fmt": "rgba",
                  "r_frame_rate": "24/1", "nb_frames": "10", "tags": { "title": "beauty" } },
                { "codec_type": "video", "width": 720, "height": 480, "pix_fmt": "gray16le",
                  "r_frame_rate": "24/1", "nb_frames": "10" }
            ],
            "format": { "format_name": "mov,mp4,m4a,3gp,3g2,mj2" }
        }"#;
        let metadata = parse_output(json, Path::new("passes.mov")).unwrap();
        assert_eq!(metadata.layers.len(), 2);
        assert_eq!(metadata.layers[0].name, "beauty");
        assert_eq!(metadata.layers[0].pixel_format, PixelFormat::RGBA);
        assert_eq!(metadata.layers[1].name, "Stream 1");
        assert_eq!(metadata.layers[1].pixel_format, PixelFormat::L);
        assert_eq!(metadata.layers[1].bit_depth, BitDepth::U16);
    }

    #[test]
    fn test_no_video_stream_is_unsupported() {
        let json = r#"{ "streams": [{ "codec_type": "audio" }], "format": {} }"#;
        assert!(matches!(
            parse_output(json, Path::new("song.wav")),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_pixel_from_ffmpeg() {
        assert_eq!(pixel_from_ffmpeg("rgb24", None), (PixelFormat::RGB, BitDepth::U8));
        assert_eq!(pixel_from_ffmpeg("rgb48le", None), (PixelFormat::RGB, BitDepth::U16));
        assert_eq!(pixel_from_ffmpeg("yuva444p12le", None), (PixelFormat::RGBA, BitDepth::U12));
        assert_eq!(pixel_from_ffmpeg("gbrapf32le", None), (PixelFormat::RGBA, BitDepth::F32));
        assert_eq!(pixel_from_ffmpeg("ya8", None), (PixelFormat::LA, BitDepth::U8));
        assert_eq!(pixel_from_ffmpeg("yuv420p", Some("10")), (PixelFormat::RGB, BitDepth::U10));
    }
}
