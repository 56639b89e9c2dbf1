//! Content negotiation against the Cellar REST resource endpoint.
//!
//! A work with several manifestations answers `300 Multiple Choices` with an
//! HTML list of alternatives. [`parse_alternatives`] decodes that list and
//! [`select_alternative`] picks the stream that holds the act or its annex.

use std::sync::LazyLock;

use eulex_core::Celex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::repository::BodyStream;

pub const DEFAULT_RESOURCE_BASE: &str = "http://publications.europa.eu/resource/celex";

/// Stream order assumed when the list does not state one.
const DEFAULT_STREAM_ORDER: u32 = 999;

static ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"li[title="item"]"#).expect("valid item selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));
static STREAM_NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"li[title="stream_name"]"#).expect("valid stream name selector"));
static STREAM_ORDER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"li[title="stream_order"]"#).expect("valid stream order selector"));

/// Accept headers tried in order when fetching a body.
pub const BODY_MEDIA_TYPES: [&str; 2] = ["application/xhtml+xml", "text/html"];

/// Percent-encode the characters of a canonical CELEX that are not
/// URL-path safe.
pub fn encode_celex(celex: &Celex) -> String {
    celex
        .as_str()
        .replace('(', "%28")
        .replace(')', "%29")
}

pub fn resource_url(base: &str, celex: &Celex) -> String {
    format!("{}/{}", base.trim_end_matches('/'), encode_celex(celex))
}

/// One manifestation listed in a `300 Multiple Choices` page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    pub url: String,
    pub stream_name: String,
    pub stream_order: u32,
}

pub fn parse_alternatives(html: &str) -> Vec<Alternative> {
    let doc = Html::parse_document(html);
    doc.select(&ITEM)
        .filter_map(|item| {
            let url = item.select(&LINK).next()?.value().attr("href")?.trim().to_string();
            if url.is_empty() {
                return None;
            }
            let stream_name = item
                .select(&STREAM_NAME)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
                .unwrap_or_default();
            let stream_order = item
                .select(&STREAM_ORDER)
                .next()
                .and_then(|e| e.text().collect::<String>().trim().parse().ok())
                .unwrap_or(DEFAULT_STREAM_ORDER);
            Some(Alternative {
                url,
                stream_name,
                stream_order,
            })
        })
        .collect()
}

struct StreamKeywords {
    include: &'static [&'static str],
    exclude: &'static [&'static str],
}

fn keywords(stream: BodyStream) -> StreamKeywords {
    match stream {
        BodyStream::Main => StreamKeywords {
            include: &["act"],
            exclude: &["annexe", "annex", "cover", "erratum", "corrigendum"],
        },
        BodyStream::Annex => StreamKeywords {
            include: &["annex", "annexe"],
            exclude: &["act", "cover", "erratum", "corrigendum"],
        },
    }
}

/// Pick the alternative holding the requested stream.
///
/// Streams whose name contains an excluded keyword are dropped; among the
/// rest, a name containing an included keyword wins, then the lowest stream
/// order. When everything is excluded the main stream falls back to the
/// first listed item and the annex stream finds nothing.
pub fn select_alternative(items: &[Alternative], stream: BodyStream) -> Option<&Alternative> {
    let kw = keywords(stream);
    let lower = |a: &Alternative| a.stream_name.to_lowercase();

    let best = items
        .iter()
        .filter(|a| {
            let name = lower(a);
            !kw.exclude.iter().any(|k| name.contains(k))
        })
        .min_by_key(|a| {
            let name = lower(a);
            let preferred = kw.include.iter().any(|k| name.contains(k));
            (!preferred, a.stream_order)
        });

    match best {
        Some(a) => {
            debug!(stream = %a.stream_name, order = a.stream_order, "selected alternative");
            Some(a)
        }
        None if stream == BodyStream::Annex => {
            debug!(count = items.len(), "no annex stream among alternatives");
            None
        }
        None => {
            let first = items.first()?;
            warn!(
                stream = %first.stream_name,
                "every alternative looks supplementary, falling back to the first"
            );
            Some(first)
        }
    }
}
