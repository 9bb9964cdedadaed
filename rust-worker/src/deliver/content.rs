//! Content transforms for deliverability.
//!
//! Pure string-to-string functions: spam-trigger normalization, HTML
//! hygiene, the unsubscribe compliance floor and the view-in-browser
//! affordance. The pipeline in [`super`] fixes their order.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{Html, Selector};

/// High-risk phrases that trip content filters when shouted.
const SPAM_TRIGGERS: &[&str] = &[
    "FREE!",
    "URGENT!",
    "ACT NOW!",
    "LIMITED TIME!",
    "CLICK HERE NOW",
    "MAKE MONEY FAST",
    "GUARANTEED",
    "NO OBLIGATION",
    "RISK FREE",
    "CASH BONUS",
];

static SPAM_PATTERNS: Lazy<Vec<(Regex, String)>> = Lazy::new(|| {
    SPAM_TRIGGERS
        .iter()
        .map(|phrase| {
            let pattern = Regex::new(&format!("(?i){}", regex::escape(phrase)))
                .expect("Invalid spam trigger pattern");
            (pattern, title_case(phrase))
        })
        .collect()
});

static EXCESS_BANGS: Lazy<Regex> = Lazy::new(|| Regex::new("!{2,}").expect("Invalid pattern"));

static EXCESS_QMARKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?{2,}").expect("Invalid pattern"));

static SHOUTED_RUN: Lazy<Regex> = Lazy::new(|| Regex::new("[A-Z]{4,}").expect("Invalid pattern"));

static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new("(?i)<img\\b[^>]*>").expect("Invalid pattern"));

static ALT_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\balt\s*=").expect("Invalid pattern"));

static GENERIC_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(<a\b[^>]*>)\s*(?:click here|here|link)\s*(</a>)").expect("Invalid pattern")
});

/// Lowercase a phrase and capitalize the first letter of each word.
fn title_case(phrase: &str) -> String {
    phrase
        .split(' ')
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => lower,
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tone down common spam triggers: case-fold the known phrase list,
/// collapse runs of `!`/`?`, and soften shouted words of four or more
/// capitals.
pub fn normalize_spam_triggers(content: &str) -> String {
    let mut result = content.to_string();

    for (pattern, replacement) in SPAM_PATTERNS.iter() {
        result = pattern.replace_all(&result, replacement.as_str()).into_owned();
    }

    result = EXCESS_BANGS.replace_all(&result, "!").into_owned();
    result = EXCESS_QMARKS.replace_all(&result, "?").into_owned();

    SHOUTED_RUN
        .replace_all(&result, |caps: &Captures| {
            let word = &caps[0];
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_string() + chars.as_str().to_lowercase().as_str()
                }
                None => word.to_string(),
            }
        })
        .into_owned()
}

/// Ensure every `<img>` tag carries an `alt` attribute.
pub fn ensure_image_alts(content: &str) -> String {
    IMG_TAG
        .replace_all(content, |caps: &Captures| {
            let tag = &caps[0];
            if ALT_ATTR.is_match(tag) {
                return tag.to_string();
            }
            if let Some(stripped) = tag.strip_suffix("/>") {
                format!("{} alt=\"Newsletter image\"/>", stripped.trim_end())
            } else if let Some(stripped) = tag.strip_suffix('>') {
                format!("{} alt=\"Newsletter image\">", stripped.trim_end())
            } else {
                tag.to_string()
            }
        })
        .into_owned()
}

/// Rewrite generic anchor text ("click here", "here", "link") to a fixed
/// descriptive label, keeping the anchor's attributes.
pub fn rewrite_generic_anchors(content: &str) -> String {
    GENERIC_ANCHOR
        .replace_all(content, "${1}Read More${2}")
        .into_owned()
}

/// Whether the body already carries an unsubscribe affordance: either the
/// substitution placeholder or an anchor pointing at an unsubscribe URL.
pub fn has_unsubscribe_link(content: &str) -> bool {
    if content.contains("{unsubscribe_link}") {
        return true;
    }

    let document = Html::parse_fragment(content);
    let selector = Selector::parse("a[href]").expect("Invalid selector");

    document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .any(|href| href.to_lowercase().contains("unsubscribe"))
}

/// Append a footer unsubscribe link.
pub fn append_unsubscribe_footer(content: &str, unsubscribe_url: &str) -> String {
    format!(
        "{}<br><br><small><a href=\"{}\">Unsubscribe from this newsletter</a></small>",
        content, unsubscribe_url
    )
}

/// Prepend the view-in-browser line.
pub fn add_browser_view(content: &str, site_url: &str) -> String {
    format!(
        "<p style=\"text-align: center; font-size: 12px; color: #666;\">\
         Having trouble viewing this email? <a href=\"{}\">View it in your browser</a></p>{}",
        site_url, content
    )
}
