//! Offline analyzer: walks a music directory and writes the track table.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageFormat;
use image::imageops::FilterType;
use lofty::prelude::*;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::audio::decode::decode_file;
use crate::config::AnalyzeSettings;
use crate::error::Result;

use super::model::TrackRecord;

/// Characters at the end of a title holding the `(YYYY-MM-DD)` date.
const DATE_SUFFIX_CHARS: usize = 12;

/// Edge length of the stored cover, in pixels.
const COVER_EDGE: u32 = 460;

fn is_audio_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .any(|e| !e.is_empty() && e == ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Audio files under `dir`, skipping hidden entries.
pub fn collect_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(std::result::Result::ok)
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && is_audio_file(p, extensions))
        .collect()
}

/// Analyze every audio file under `dir`, newest file name first.
///
/// Files that fail are logged and left out.
pub fn analyze_dir(dir: &Path, settings: &AnalyzeSettings) -> Vec<TrackRecord> {
    let files = collect_files(dir, &settings.extensions);
    log::info!("analyzing {} files under {}", files.len(), dir.display());

    let mut records: Vec<TrackRecord> = files
        .par_iter()
        .filter_map(|path| match analyze_file(dir, path, settings.bins) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("skipping {}: {e}", path.display());
                None
            }
        })
        .collect();

    records.sort_by(|a, b| b.file_reference.cmp(&a.file_reference));
    records
}

pub fn analyze_file(root: &Path, path: &Path, bins: usize) -> Result<TrackRecord> {
    let fingerprint = fingerprint(path)?;
    let tags = read_tags(path);

    let decoded = decode_file(path)?;
    let mono: Vec<f32> = decoded.mono().collect();
    let amplitude = peak_summary(&mono, bins);
    let duration = if decoded.sample_rate == 0 {
        0.0
    } else {
        (mono.len() as f64 / decoded.sample_rate as f64).round()
    };

    let (title, date) = match tags.title.as_deref() {
        Some(t) => split_title_date(t),
        None => (String::new(), String::new()),
    };

    Ok(TrackRecord {
        file_reference: file_reference(root, path),
        artist: tags.artist.unwrap_or_default(),
        title,
        date,
        genre: tags.genre.unwrap_or_default(),
        nominal_duration: duration,
        details_markup: tags.comment.as_deref().and_then(wrap_paragraphs),
        cover_image: tags.cover.and_then(|bytes| match square_cover(&bytes) {
            Ok(png) => Some(STANDARD.encode(png)),
            Err(e) => {
                log::warn!("{}: unusable cover: {e}", path.display());
                None
            }
        }),
        amplitude,
        fingerprint: Some(fingerprint),
    })
}

#[derive(Debug, Default)]
struct FileTags {
    title: Option<String>,
    artist: Option<String>,
    genre: Option<String>,
    comment: Option<String>,
    cover: Option<Vec<u8>>,
}

fn read_tags(path: &Path) -> FileTags {
    let tagged = match lofty::read_from_path(path) {
        Ok(t) => t,
        Err(e) => {
            log::warn!("{}: unreadable tags: {e}", path.display());
            return FileTags::default();
        }
    };
    let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
        return FileTags::default();
    };

    let text = |v: Option<std::borrow::Cow<'_, str>>| {
        v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    };

    FileTags {
        title: text(tag.title()),
        artist: text(tag.artist()),
        genre: text(tag.genre()),
        comment: tag.comment().map(|c| c.into_owned()),
        cover: tag.pictures().first().map(|p| p.data().to_vec()),
    }
}

/// Table path of `path`: relative to the analyzed root, `/`-separated.
fn file_reference(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// SHA-256 hex digest of the file bytes.
pub fn fingerprint(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Centre-crop an embedded picture to 1:1, scale it to `COVER_EDGE` square
/// with Lanczos filtering and re-encode it as PNG.
pub fn square_cover(bytes: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)?;
    let (w, h) = (img.width(), img.height());
    let edge = w.min(h);
    let square = img.crop_imm((w - edge) / 2, (h - edge) / 2, edge, edge);
    let scaled = square.resize_exact(COVER_EDGE, COVER_EDGE, FilterType::Lanczos3);

    let mut out = Cursor::new(Vec::new());
    scaled.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

/// `bins` windows of `floor(len / bins)` samples each; peak |x| per window,
/// divided by the loudest window. Samples past the last whole window are ignored.
pub fn peak_summary(mono: &[f32], bins: usize) -> Vec<f32> {
    if bins == 0 {
        return Vec::new();
    }
    let per_bin = mono.len() / bins;
    let peaks: Vec<f32> = (0..bins)
        .map(|i| {
            if per_bin == 0 {
                return 0.0;
            }
            mono[i * per_bin..(i + 1) * per_bin]
                .iter()
                .fold(0.0f32, |peak, s| peak.max(s.abs()))
        })
        .collect();

    let max = peaks.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        peaks.into_iter().map(|p| p / max).collect()
    } else {
        peaks
    }
}

/// Titles are tagged `Name (YYYY-MM-DD)`: split off the trailing date.
///
/// Titles too short to carry the suffix come back unchanged with an empty date.
pub fn split_title_date(title: &str) -> (String, String) {
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= DATE_SUFFIX_CHARS {
        return (title.to_string(), String::new());
    }
    let date: String = chars[chars.len() - DATE_SUFFIX_CHARS..]
        .iter()
        .filter(|c| **c != '(' && **c != ')')
        .collect();
    let keep = chars.len().saturating_sub(DATE_SUFFIX_CHARS + 1);
    let name: String = chars[..keep].iter().collect();
    (name, date)
}

/// Wrap each non-blank comment line in `<p>..</p>\n`.
pub fn wrap_paragraphs(comment: &str) -> Option<String> {
    let out: String = comment
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| format!("<p>{l}</p>\n"))
        .collect();
    if out.is_empty() { None } else { Some(out) }
}

/// Table text in the script form the player and a static page both read.
pub fn render_table(records: &[TrackRecord]) -> Result<String> {
    let rows: Vec<serde_json::Value> = records.iter().map(TrackRecord::to_row).collect();
    let json = serde_json::to_string_pretty(&rows)?;
    Ok(format!("const musicData = {json};\n"))
}

pub fn write_table(records: &[TrackRecord], out: &Path) -> Result<()> {
    std::fs::write(out, render_table(records)?)?;
    log::info!("wrote {} tracks to {}", records.len(), out.display());
    Ok(())
}
