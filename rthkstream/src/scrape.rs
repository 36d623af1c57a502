//! Stream URL discovery in source page markup
//!
//! Each strategy is a pure function over the parsed document and the URL the
//! page was served from. Within a strategy, candidates that cannot be turned
//! into an absolute http(s) URL are skipped; strategies are tried in order and
//! the first usable URL wins:
//!
//! 1. `script`: `http(s)://….m3u8…` inside inline script content
//! 2. `audio`: `src` of `audio source` / `audio` elements mentioning `.m3u8` or `stream`
//! 3. `data-attribute`: `data-stream`, `data-url` or `data-src` with the same hints

use crate::models::MANIFEST_EXTENSION;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A scraping heuristic: parsed page and its URL to a normalized stream URL
pub type Strategy = fn(&Html, &Url) -> Option<String>;

/// Strategies in precedence order, with their names for logging
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("script", find_in_scripts),
    ("audio", find_in_audio_elements),
    ("data-attribute", find_in_data_attributes),
];

/// Attributes inspected by the third strategy, first non-empty wins
const DATA_ATTRIBUTES: &[&str] = &["data-stream", "data-url", "data-src"];

static MANIFEST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^"'\s]+\.m3u8[^"'\s]*"#).expect("valid manifest regex"));

static SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("valid selector"));

static AUDIO_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("audio source, audio").expect("valid selector"));

static DATA_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[data-stream], [data-url], [data-src]").expect("valid selector"));

/// First manifest URL appearing in an inline script
pub fn find_in_scripts(document: &Html, page_url: &Url) -> Option<String> {
    document.select(&SCRIPT_SELECTOR).find_map(|script| {
        let content: String = script.text().collect();
        let found = MANIFEST_RE
            .find_iter(&content)
            .find_map(|m| normalize_candidate(m.as_str(), page_url));
        found
    })
}

/// First `audio`/`audio source` element whose `src` looks like a stream
pub fn find_in_audio_elements(document: &Html, page_url: &Url) -> Option<String> {
    document
        .select(&AUDIO_SELECTOR)
        .filter_map(|element| element.value().attr("src"))
        .filter(|src| looks_like_stream(src))
        .find_map(|src| normalize_candidate(src, page_url))
}

/// First element whose data attribute looks like a stream
pub fn find_in_data_attributes(document: &Html, page_url: &Url) -> Option<String> {
    document
        .select(&DATA_SELECTOR)
        .filter_map(first_data_attribute)
        .filter(|value| looks_like_stream(value))
        .find_map(|value| normalize_candidate(value, page_url))
}

fn first_data_attribute<'a>(element: ElementRef<'a>) -> Option<&'a str> {
    DATA_ATTRIBUTES
        .iter()
        .filter_map(|name| element.value().attr(name))
        .find(|value| !value.is_empty())
}

fn looks_like_stream(value: &str) -> bool {
    value.contains(MANIFEST_EXTENSION) || value.contains("stream")
}

/// Makes a candidate absolute
///
/// - `http://` / `https://` URLs are kept as they are
/// - protocol-relative `//host/…` gets an `https:` prefix
/// - other references are resolved against `page_url`
///
/// Returns `None` when the result is not an http(s) URL.
pub fn normalize_candidate(candidate: &str, page_url: &Url) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }

    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        return Some(candidate.to_string());
    }

    if candidate.starts_with("//") {
        return Some(format!("https:{}", candidate));
    }

    let resolved = page_url.join(candidate).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Runs the strategies over `markup` and returns the first usable URL
///
/// `page_url` is where the markup was served from (after redirects).
/// Returns the strategy name alongside the normalized URL.
pub fn extract_stream_url(markup: &str, page_url: &Url) -> Option<(&'static str, String)> {
    let document = Html::parse_document(markup);

    STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(&document, page_url).map(|url| (*name, url)))
}
