//! Detects formula constructs that only the browser-side typesetter can draw.
//!
//! The check is a literal marker search, not a parse: a formula is routed to
//! the advanced path when it contains one of the environment openers or
//! commands in [`ADVANCED_MARKERS`]. A miss says nothing about whether the
//! raster engine will actually succeed.

use regex::Regex;
use std::sync::LazyLock;

/// Markers that force the advanced renderer. Matching is case-sensitive.
pub const ADVANCED_MARKERS: &[&str] = &[
    r"\begin{pmatrix}",
    r"\begin{bmatrix}",
    r"\begin{matrix}",
    r"\begin{cases}",
    r"\begin{align}",
    r"\begin{align*}",
    r"\begin{aligned}",
    r"\text{",
    r"\overset",
    r"\underset",
];

static ADVANCED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = ADVANCED_MARKERS
        .iter()
        .map(|marker| regex::escape(marker))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).expect("advanced marker pattern")
});

/// Returns true when `text` needs the advanced (browser) renderer.
pub fn needs_advanced(text: &str) -> bool {
    ADVANCED_PATTERN.is_match(text)
}
