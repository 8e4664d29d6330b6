/// Format seconds as `m:ss`, or `h:mm:ss` when there are hours or `show_hours` is set.
///
/// Negative and non-finite inputs format as zero.
pub fn format_time(seconds: f64, show_hours: bool) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;

    if h > 0 || show_hours {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// `position / duration` as shown next to each track.
pub fn time_text(position: f64, duration: f64) -> String {
    let hours = duration.is_finite() && duration >= 3600.0;
    format!(
        "{} / {}",
        format_time(position, hours),
        format_time(duration, hours)
    )
}

/// Fragment slug for a file reference: the lowercased file stem with every run of
/// non-alphanumeric characters collapsed into a single `-`.
pub fn slug_for(file_reference: &str) -> String {
    let name = file_reference
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_reference);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };

    let mut slug = String::with_capacity(stem.len());
    let mut pending_dash = false;
    for c in stem.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Reduce the details markup to plain lines for the terminal.
///
/// The markup is what the analyzer writes: one `<p>..</p>` per comment line,
/// possibly with `<br>` and inline tags from a hand-edited table. Paragraph and
/// line-break tags become newlines, other tags are dropped, named entities from
/// the small set below and numeric `&#NN;` / `&#xHH;` references are decoded.
/// Anything else that looks like an entity is kept as written. Blank lines are
/// removed.
pub fn strip_markup(markup: &str) -> Vec<String> {
    let mut text = String::with_capacity(markup.len());
    let mut rest = markup;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let after = &rest[open..];
        let Some(close) = after.find('>') else {
            text.push_str(after);
            rest = "";
            break;
        };
        let tag = after[1..close].trim().to_ascii_lowercase();
        let name = tag
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("");
        if matches!(name, "p" | "br" | "div" | "li") {
            text.push('\n');
        }
        rest = &after[close + 1..];
    }
    text.push_str(rest);

    decode_entities(&text)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];
        let decoded = after
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| entity(&after[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    let code = match name {
        "amp" => return Some('&'),
        "lt" => return Some('<'),
        "gt" => return Some('>'),
        "quot" => return Some('"'),
        "apos" => return Some('\''),
        "nbsp" => return Some(' '),
        _ => name.strip_prefix('#')?,
    };
    let value = match code.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => code.parse().ok()?,
    };
    char::from_u32(value)
}
