use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{GenericImageView, ImageFormat, Rgb, RgbImage};

use tempfile::tempdir;

use super::display::{format_time, slug_for, strip_markup, time_text};
use super::model::{Locator, TrackRecord};
use super::scan::{
    collect_files, fingerprint, peak_summary, render_table, split_title_date, square_cover,
    wrap_paragraphs,
};
use super::table::parse_table;

#[test]
fn format_time_matches_player_clock() {
    assert_eq!(format_time(0.0, false), "0:00");
    assert_eq!(format_time(65.0, false), "1:05");
    assert_eq!(format_time(3661.0, false), "1:01:01");
    assert_eq!(format_time(61.0, true), "0:01:01");
    assert_eq!(format_time(59.99, false), "0:59");
    assert_eq!(format_time(-3.0, false), "0:00");
    assert_eq!(format_time(f64::NAN, false), "0:00");
}

#[test]
fn time_text_uses_hours_for_both_sides_of_long_tracks() {
    assert_eq!(time_text(5.0, 100.0), "0:05 / 1:40");
    assert_eq!(time_text(5.0, 3700.0), "0:00:05 / 1:01:40");
}

#[test]
fn slug_is_lowercased_stem_with_collapsed_separators() {
    assert_eq!(slug_for("Night Drive (2024-01-02).m4a"), "night-drive-2024-01-02");
    assert_eq!(slug_for("sets/Deep__House.mp3"), "deep-house");
    assert_eq!(slug_for("plain"), "plain");
    assert_eq!(slug_for("--x--.m4a"), "x");
}

#[test]
fn strip_markup_splits_paragraphs_and_decodes_entities() {
    let lines = strip_markup("<p>01. Intro</p>\n<p>02. Rock &amp; Roll</p>\n<p> </p>");
    assert_eq!(lines, vec!["01. Intro", "02. Rock & Roll"]);
    assert_eq!(strip_markup("a<br/>b"), vec!["a", "b"]);
}

#[test]
fn strip_markup_decodes_numeric_entities_and_keeps_stray_ampersands() {
    let lines = strip_markup("<p>Caf&#233; &#x2013; Night&#39;s</p>\n<p>R&B &amp;c &bogus; &#xZZ;</p>");
    assert_eq!(lines, vec!["Café – Night's", "R&B &c &bogus; &#xZZ;"]);
    // Decoding happens once: an escaped entity stays an entity.
    assert_eq!(strip_markup("&amp;lt;"), vec!["&lt;"]);
}

#[test]
fn display_falls_back_through_fields() {
    let mut r = TrackRecord {
        file_reference: "a.m4a".into(),
        artist: "DJ".into(),
        title: "Set".into(),
        ..Default::default()
    };
    assert_eq!(r.display(), "DJ - Set");
    r.artist.clear();
    assert_eq!(r.display(), "Set");
    r.title.clear();
    assert_eq!(r.display(), "a.m4a");
}

#[test]
fn locator_resolves_against_directory_or_url() {
    let l = Locator::resolve("music", "a b.m4a").unwrap();
    assert_eq!(l, Locator::Path(Path::new("music").join("a b.m4a")));
    assert_eq!(l.extension().as_deref(), Some("m4a"));

    let l = Locator::resolve("https://cdn.example.com/music", "a b.M4A").unwrap();
    match &l {
        Locator::Url(u) => assert_eq!(u.as_str(), "https://cdn.example.com/music/a%20b.M4A"),
        other => panic!("expected url, got {other:?}"),
    }
    assert_eq!(l.extension().as_deref(), Some("m4a"));

    assert!(Locator::resolve("https://cdn.example.com/music", "//[oops").is_err());
    let unresolved = Locator::Unresolved("//[oops".into());
    assert_eq!(unresolved.extension(), None);
    assert_eq!(unresolved.to_string(), "//[oops");
}

#[test]
fn parse_table_reads_script_wrapper_and_positional_fields() {
    let text = r#"const musicData = [
  ["b.m4a", "Artist", "Title", "2024-01-02", "House", 100, "<p>x</p>\n", "QUJD", "[0.5, 1.0, 0.25]", "abc"]
];
export default musicData;
"#;
    let records = parse_table(text).unwrap();
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.file_reference, "b.m4a");
    assert_eq!(r.artist, "Artist");
    assert_eq!(r.date, "2024-01-02");
    assert_eq!(r.nominal_duration, 100.0);
    assert_eq!(r.details_markup.as_deref(), Some("<p>x</p>\n"));
    assert_eq!(r.cover_image.as_deref(), Some("QUJD"));
    assert_eq!(r.amplitude, vec![0.5, 1.0, 0.25]);
    assert_eq!(r.fingerprint.as_deref(), Some("abc"));
}

#[test]
fn malformed_rows_degrade_field_by_field() {
    let text = r#"[
  ["a.m4a", null, 7, true, {}, "12.5", null, null, "not json"],
  "not a row",
  ["c.m4a"],
  ["d.m4a", "A", "T", "", "", -4, "", "", [2.0, -1, "x"]]
]"#;
    let records = parse_table(text).unwrap();
    assert_eq!(records.len(), 3);

    let a = &records[0];
    assert_eq!(a.artist, "");
    assert_eq!(a.title, "7");
    assert_eq!(a.date, "true");
    assert_eq!(a.genre, "");
    assert_eq!(a.nominal_duration, 12.5);
    assert!(a.details_markup.is_none());
    assert!(a.amplitude.is_empty());

    let c = &records[1];
    assert_eq!(c.file_reference, "c.m4a");
    assert_eq!(c.nominal_duration, 0.0);
    assert!(c.amplitude.is_empty());
    assert!(c.fingerprint.is_none());

    let d = &records[2];
    assert_eq!(d.nominal_duration, 0.0);
    assert_eq!(d.amplitude, vec![1.0, 0.0, 0.0]);
}

#[test]
fn parse_table_rejects_non_array_documents() {
    assert!(parse_table("const musicData = {};").is_err());
    assert!(parse_table("nothing here").is_err());
}

#[test]
fn rendered_table_parses_back() {
    let record = TrackRecord {
        file_reference: "x.m4a".into(),
        artist: "A".into(),
        title: "T".into(),
        date: "2020-02-02".into(),
        genre: "G".into(),
        nominal_duration: 61.0,
        details_markup: Some("<p>one</p>\n".into()),
        cover_image: None,
        amplitude: vec![0.0, 0.5, 1.0],
        fingerprint: Some("ff".into()),
    };
    let text = render_table(std::slice::from_ref(&record)).unwrap();
    assert!(text.starts_with("const musicData = [\n"));
    assert!(text.ends_with("];\n"));
    assert!(text.contains("\"[0.0,0.5,1.0]\""));
    assert_eq!(parse_table(&text).unwrap(), vec![record]);
}

#[test]
fn peak_summary_normalises_window_peaks() {
    let mono = [0.125, -0.25, 0.5, -1.0, 0.05];
    assert_eq!(peak_summary(&mono, 2), vec![0.25, 1.0]);
    assert_eq!(peak_summary(&[0.0; 10], 5), vec![0.0; 5]);
    assert_eq!(peak_summary(&[0.5], 4), vec![0.0; 4]);
    assert!(peak_summary(&mono, 0).is_empty());
}

#[test]
fn split_title_date_takes_trailing_parenthesised_date() {
    assert_eq!(
        split_title_date("Night Drive (2024-01-02)"),
        ("Night Drive".to_string(), "2024-01-02".to_string())
    );
    assert_eq!(split_title_date("Short"), ("Short".to_string(), String::new()));
}

#[test]
fn wrap_paragraphs_drops_blank_lines() {
    assert_eq!(
        wrap_paragraphs("01. a\r\n\r\n02. b").as_deref(),
        Some("<p>01. a</p>\n<p>02. b</p>\n")
    );
    assert_eq!(wrap_paragraphs("  \r\n"), None);
}

#[test]
fn collect_files_filters_extensions_and_hidden_entries() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("b.M4A"), b"x").unwrap();
    fs::write(dir.path().join("a.mp3"), b"x").unwrap();
    fs::write(dir.path().join(".hidden.m4a"), b"x").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("c.m4a"), b"x").unwrap();

    let mut files = collect_files(dir.path(), &["m4a".to_string()]);
    files.sort();
    let names: Vec<PathBuf> = files
        .iter()
        .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
        .collect();
    assert_eq!(names, vec![PathBuf::from("b.M4A"), Path::new("sub").join("c.m4a")]);
}

#[test]
fn wide_cover_is_cropped_to_a_square_png() {
    // Left quarter red, the rest blue: the centre crop drops the red band.
    let wide = RgbImage::from_fn(80, 40, |x, _| {
        if x < 20 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
    });
    let mut encoded = Cursor::new(Vec::new());
    wide.write_to(&mut encoded, ImageFormat::Png).unwrap();

    let png = square_cover(encoded.get_ref()).unwrap();
    assert_eq!(image::guess_format(&png).unwrap(), ImageFormat::Png);
    let cover = image::load_from_memory(&png).unwrap();
    assert_eq!(cover.dimensions(), (460, 460));
    let edge = cover.get_pixel(0, 230);
    assert!(edge[2] > 200 && edge[0] < 50);
}

#[test]
fn unreadable_cover_is_an_error() {
    assert!(square_cover(b"not an image").is_err());
}

#[test]
fn fingerprint_is_sha256_of_the_bytes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.m4a");
    fs::write(&path, b"abc").unwrap();
    assert_eq!(
        fingerprint(&path).unwrap(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
