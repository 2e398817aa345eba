use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static RANGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*-\s*(\d+)$").expect("range token regex"));
static PAGE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("page token regex"));

const MAX_DECIMALS: usize = 20;
const BYTE_UNITS: [&str; 7] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Standard page sizes in points, portrait orientation.
const STANDARD_PAGES: [(&str, f64, f64); 8] = [
    ("A3", 841.89, 1190.55),
    ("A4", 595.28, 841.89),
    ("A5", 419.53, 595.28),
    ("B5", 498.9, 708.66),
    ("Letter", 612.0, 792.0),
    ("Legal", 612.0, 1008.0),
    ("Tabloid", 792.0, 1224.0),
    ("Executive", 522.0, 756.0),
];
const PAGE_TOLERANCE: f64 = 0.5;

/// Parses a page selection like `"1,3-5,7"` into sorted, zero-based page indices.
///
/// Blank input selects every page. Tokens that are malformed or fall outside
/// `1..=total_pages` are dropped without error.
pub fn parse_page_ranges(input: &str, total_pages: u32) -> Vec<u32> {
    if input.trim().is_empty() {
        return (0..total_pages).collect();
    }

    let mut pages = BTreeSet::new();
    for token in input.split(',') {
        match parse_token(token.trim()) {
            Some(PageToken::Range(start, end)) => {
                if start >= 1 && start <= end && end <= total_pages {
                    pages.extend(start - 1..end);
                }
            }
            Some(PageToken::Page(n)) => {
                if n >= 1 && n <= total_pages {
                    pages.insert(n - 1);
                }
            }
            None => {}
        }
    }
    pages.into_iter().collect()
}

/// True when `input` is blank or has at least one syntactically valid token.
pub fn page_range_tokens_valid(input: &str) -> bool {
    input.trim().is_empty() || input.split(',').any(|t| parse_token(t.trim()).is_some())
}

enum PageToken {
    Range(u32, u32),
    Page(u32),
}

fn parse_token(token: &str) -> Option<PageToken> {
    if let Some(caps) = RANGE_TOKEN.captures(token) {
        let start = caps[1].parse().ok()?;
        let end = caps[2].parse().ok()?;
        return Some(PageToken::Range(start, end));
    }
    if PAGE_TOKEN.is_match(token) {
        return token.parse().ok().map(PageToken::Page);
    }
    None
}

pub fn format_bytes(n: u64, decimals: usize) -> String {
    if n == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let decimals = decimals.min(MAX_DECIMALS);
    let scale = 10f64.powi(decimals as i32);
    let rounded = (value * scale).round() / scale;
    let mut text = format!("{:.*}", decimals, rounded);
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{} {}", text, BYTE_UNITS[unit])
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// Converts `#rrggbb` (the `#` is optional) to unit-range channels.
/// Malformed input yields black.
pub fn hex_to_rgb(hex: &str) -> Rgb {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Rgb::default();
    }
    let channel = |i: usize| {
        u8::from_str_radix(&digits[i..i + 2], 16)
            .map(|v| v as f32 / 255.0)
            .unwrap_or(0.0)
    };
    Rgb {
        r: channel(0),
        g: channel(2),
        b: channel(4),
    }
}

pub fn standard_page_name(width: f64, height: f64) -> &'static str {
    let close = |a: f64, b: f64| (a - b).abs() <= PAGE_TOLERANCE;
    STANDARD_PAGES
        .iter()
        .find(|(_, w, h)| (close(width, *w) && close(height, *h)) || (close(width, *h) && close(height, *w)))
        .map(|(name, _, _)| *name)
        .unwrap_or("Custom")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    In,
    Mm,
    Px,
    Pt,
}

impl LengthUnit {
    /// Unknown units fall back to points.
    pub fn parse_lossy(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "in" => LengthUnit::In,
            "mm" => LengthUnit::Mm,
            "px" => LengthUnit::Px,
            _ => LengthUnit::Pt,
        }
    }

    pub fn from_points(self, points: f64) -> f64 {
        match self {
            LengthUnit::In => points / 72.0,
            LengthUnit::Mm => points / 72.0 * 25.4,
            LengthUnit::Px => points / 72.0 * 96.0,
            LengthUnit::Pt => points,
        }
    }
}

pub fn convert_points(points: f64, unit: &str) -> String {
    format!("{:.2}", LengthUnit::parse_lossy(unit).from_points(points))
}
