//! HTML metadata extraction
//!
//! Pulls a title, a description and a representative paragraph out of an
//! arbitrary HTML page.

use scraper::{Html, Selector};
use serde::Serialize;

/// Source tag for pages fetched over plain HTTP
pub const HTTP_VIA: &str = "http";

const DESCRIPTION_LIMIT: usize = 300;
const PARAGRAPH_LIMIT: usize = 400;
const MIN_PARAGRAPH_LEN: usize = 30;

/// Metadata extracted from one page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageExtract {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub first_paragraph: Option<String>,
    pub h1: Option<String>,
    /// RFC 3339 fetch time
    pub fetched_at: String,
    pub via: String,
}

impl PageExtract {
    /// Extract for a page that could not be fetched
    pub fn empty(url: &str, via: &str) -> Self {
        Self {
            url: url.to_string(),
            title: None,
            description: None,
            first_paragraph: None,
            h1: None,
            fetched_at: chrono::Utc::now().to_rfc3339(),
            via: via.to_string(),
        }
    }
}

/// Extracts generic page metadata
///
/// # Extraction Rules
///
/// - **title**: `og:title`, else `<title>`, else the first `<h1>`
/// - **description**: `meta[name=description]`, else `og:description`
/// - **first paragraph**: the first of `article p`, `main p`, `p` longer
///   than 30 characters once whitespace is collapsed
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `url` - The page URL, recorded as-is
/// * `via` - How the page was fetched
pub fn parse_generic(html: &str, url: &str, via: &str) -> PageExtract {
    let document = Html::parse_document(html);

    let h1 = first_text(&document, "h1");
    let title = meta_content(&document, "meta[property='og:title']")
        .or_else(|| first_text(&document, "title"))
        .or_else(|| h1.clone())
        .map(|t| t.trim().to_string());

    let description = meta_content(&document, "meta[name='description']")
        .or_else(|| meta_content(&document, "meta[property='og:description']"))
        .map(|d| trim_to(&d, DESCRIPTION_LIMIT));

    let first_paragraph = pick_first_paragraph(&document).map(|p| trim_to(&p, PARAGRAPH_LIMIT));

    PageExtract {
        url: url.to_string(),
        title,
        description,
        first_paragraph,
        h1,
        fetched_at: chrono::Utc::now().to_rfc3339(),
        via: via.to_string(),
    }
}

/// Collapses whitespace and cuts to `limit` characters, ending with `…`
pub fn trim_to(text: &str, limit: usize) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= limit {
        return collapsed;
    }

    let mut cut: String = collapsed.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("content"))
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn pick_first_paragraph(document: &Html) -> Option<String> {
    ["article p", "main p", "p"]
        .iter()
        .filter_map(|selector| first_text(document, selector))
        .map(|text| collapse_whitespace(&text))
        .find(|text| text.chars().count() > MIN_PARAGRAPH_LEN)
}
