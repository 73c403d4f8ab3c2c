use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const MAX_STEM_CHARS: usize = 180;
const FALLBACK_STEM: &str = "untitled";

/// Full-width look-alike for characters Windows refuses in file names. `*` becomes a space.
fn look_alike(c: char) -> char {
    match c {
        '<' => '＜',
        '>' => '＞',
        ':' => '꞉',
        '"' => '＂',
        '/' => '⧸',
        '\\' => '＼',
        '|' => '｜',
        '?' => '？',
        '*' => ' ',
        c if c.is_control() => ' ',
        c => c,
    }
}

/// Turns a video title into a file stem that is valid on every desktop platform.
fn title_stem(title: &str) -> String {
    let title: String = title.nfc().map(look_alike).collect();
    let title = WS_RE.replace_all(&title, " ");
    let title = title.trim().trim_end_matches([' ', '-', '.', ';']);
    let stem: String = title.chars().take(MAX_STEM_CHARS).collect();
    let stem = stem.trim_end();
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem.to_string()
    }
}

/// File name for an image saved next to a download, e.g. `My Clip.jpg`.
pub fn thumbnail_file_name(title: &str, image_url: &str) -> String {
    format!("{}.{}", title_stem(title), image_extension(image_url))
}

fn image_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let ext = path
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "png",
        "webp" => "webp",
        _ => "jpg",
    }
}
