//! Metadata fallbacks read from the document body.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};

use crate::templates::element_text;

static MAIN_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.eli-main-title").expect("valid title selector"));

static TITLE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s([A-Za-z]{3,9})\s(\d{4})").expect("valid date regex"));

/// Title printed in the `eli-main-title` block.
pub fn main_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&MAIN_TITLE)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// First `D Month YYYY` date in a title, e.g. `of 27 April 2016`.
pub fn date_in_title(title: &str) -> Option<NaiveDate> {
    TITLE_DATE.captures_iter(title).find_map(|c| {
        let candidate = format!("{} {} {}", &c[1], &c[2], &c[3]);
        NaiveDate::parse_from_str(&candidate, "%d %B %Y").ok()
    })
}

/// Whole visible text of a body, for citation scanning.
pub fn body_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    element_text(doc.root_element())
}
