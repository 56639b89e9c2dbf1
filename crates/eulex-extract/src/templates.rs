//! Structure templates for the document layouts found in EUR-Lex bodies.
//!
//! Each template extracts one segment kind from a parsed document and
//! returns an empty vector when the document does not use its layout.
//! [`Template::PRIORITY`] is the order in which they are tried.

use std::sync::LazyLock;

use eulex_core::{SegmentKind, TextUnit, normalize_text};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static RECITAL_DIV: LazyLock<Selector> = LazyLock::new(|| sel(r#"div[id^="rct_"]"#));
static ARTICLE_DIV: LazyLock<Selector> = LazyLock::new(|| sel(r#"div[id^="art_"]"#));
static ANNEX_DIV: LazyLock<Selector> = LazyLock::new(|| sel(r#"div[id^="anx_"]"#));
static ELI_TITLE: LazyLock<Selector> = LazyLock::new(|| sel("div.eli-title"));

static MANUAL_RECITAL: LazyLock<Selector> = LazyLock::new(|| sel("p.ManualConsidrant"));
static MANUAL_ARTICLE: LazyLock<Selector> = LazyLock::new(|| sel("p.Titrearticle"));
static MANUAL_ANNEX: LazyLock<Selector> = LazyLock::new(|| sel("p.Annexetitre"));
static NUM_SPAN: LazyLock<Selector> = LazyLock::new(|| sel("span.num"));
static SPAN: LazyLock<Selector> = LazyLock::new(|| sel("span"));

static TEXT_ONLY_P: LazyLock<Selector> = LazyLock::new(|| sel("div#TexteOnly p"));
static ANY_P: LazyLock<Selector> = LazyLock::new(|| sel("p"));

static ARTICLE_ID: LazyLock<Regex> = LazyLock::new(|| re(r"^art_(\d+[a-z]*)$"));
static ANNEX_ID: LazyLock<Regex> = LazyLock::new(|| re(r"^anx_([IVXLCDMivxlcdm0-9]+)$"));
static ANNEX_HEADING: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)^ANNEX\s*[IVXLCDM]*"));

static RECITAL_NUMBER: LazyLock<Regex> = LazyLock::new(|| re(r"\((\d+)\)"));
static SPLIT_DIGITS: LazyLock<Regex> = LazyLock::new(|| re(r"(\d)\s+(\d)"));
static ARTICLE_NUMBER: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)Article\s+(\d+)"));
static MANUAL_ANNEX_NUMBER: LazyLock<Regex> = LazyLock::new(|| re(r"(?i)ANNEX\s+([IVXLCDM]+)\b"));

static PARA_ARTICLE: LazyLock<Regex> = LazyLock::new(|| re(r"^Article\s+(\d+[a-z]*)$"));
static PARA_ANNEX: LazyLock<Regex> = LazyLock::new(|| re(r"^ANNEX\b\s*([IVXLCDM0-9]*)\b\s*(.*)$"));

/// Paragraph classes that end a manual-layout article or annex.
const MANUAL_STOP_CLASSES: [&str; 4] = ["Titrearticle", "Annexetitre", "Fait", "Fichefinanciretitre"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// Official Journal XHTML with `rct_`, `art_` and `anx_` ids.
    NumberedArticle,
    /// Commission proposal layout with `ManualConsidrant`, `Titrearticle`
    /// and `Annexetitre` paragraph classes.
    Manual,
    /// Legacy `TexteOnly` bodies: `Whereas`, `Article N`, `ANNEX <roman>`
    /// paragraphs.
    TextOnly,
    /// The text-only scan over every paragraph of the document.
    PlainFallback,
}

impl Template {
    pub const PRIORITY: [Template; 4] = [
        Template::NumberedArticle,
        Template::Manual,
        Template::TextOnly,
        Template::PlainFallback,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::NumberedArticle => "numbered-article",
            Self::Manual => "manual",
            Self::TextOnly => "roman-annex",
            Self::PlainFallback => "plain-fallback",
        }
    }

    pub fn extract(self, doc: &Html, kind: SegmentKind) -> Vec<TextUnit> {
        match self {
            Self::NumberedArticle => match kind {
                SegmentKind::Recital => numbered_recitals(doc),
                SegmentKind::Article => numbered_articles(doc),
                SegmentKind::Annex => numbered_annexes(doc),
            },
            Self::Manual => match kind {
                SegmentKind::Recital => manual_recitals(doc),
                SegmentKind::Article => manual_articles(doc),
                SegmentKind::Annex => manual_annexes(doc),
            },
            Self::TextOnly => scan_paragraphs(&paragraph_texts(doc, &TEXT_ONLY_P), kind),
            Self::PlainFallback => scan_paragraphs(&paragraph_texts(doc, &ANY_P), kind),
        }
    }
}

// ── Shared helpers ──

/// Text content with whitespace and punctuation normalised.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    let joined = el
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    normalize_text(&joined)
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

fn has_any_class(el: ElementRef<'_>, classes: &[&str]) -> bool {
    el.value().classes().any(|c| classes.contains(&c))
}

/// Element children, with `div.content` wrappers replaced by their own
/// children.
fn flattened_children(el: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut out = Vec::new();
    for child in el.children().filter_map(ElementRef::wrap) {
        if child.value().name() == "div" && has_class(child, "content") {
            out.extend(flattened_children(child));
        } else {
            out.push(child);
        }
    }
    out
}

fn join_parts(parts: Vec<String>) -> String {
    normalize_text(&parts.join(" "))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

fn unit(kind: SegmentKind, number: String, title: Option<String>, text: String) -> TextUnit {
    TextUnit {
        kind,
        number,
        title,
        text,
    }
}

// ── numbered-article ──

fn numbered_recitals(doc: &Html) -> Vec<TextUnit> {
    doc.select(&RECITAL_DIV)
        .filter_map(|div| {
            let id = div.value().id()?;
            let number = id.strip_prefix("rct_").unwrap_or(id).to_string();
            Some(unit(SegmentKind::Recital, number, None, element_text(div)))
        })
        .collect()
}

fn numbered_articles(doc: &Html) -> Vec<TextUnit> {
    doc.select(&ARTICLE_DIV)
        .filter_map(|div| {
            let caps = ARTICLE_ID.captures(div.value().id()?)?;
            let title = div.select(&ELI_TITLE).next().map(element_text).and_then(non_empty);
            let text = join_parts(
                flattened_children(div)
                    .into_iter()
                    .filter(|c| !has_any_class(*c, &["eli-title", "oj-ti-art"]))
                    .map(element_text)
                    .collect(),
            );
            Some(unit(SegmentKind::Article, caps[1].to_string(), title, text))
        })
        .collect()
}

fn numbered_annexes(doc: &Html) -> Vec<TextUnit> {
    doc.select(&ANNEX_DIV)
        .filter_map(|div| {
            let caps = ANNEX_ID.captures(div.value().id()?)?;
            let mut title = None;
            let mut parts = Vec::new();
            for child in flattened_children(div) {
                let text = element_text(child);
                if has_class(child, "oj-doc-ti") {
                    if title.is_none() && !ANNEX_HEADING.is_match(&text) {
                        title = non_empty(text);
                    }
                } else {
                    parts.push(text);
                }
            }
            Some(unit(SegmentKind::Annex, caps[1].to_string(), title, join_parts(parts)))
        })
        .collect()
}

// ── manual ──

fn manual_recitals(doc: &Html) -> Vec<TextUnit> {
    doc.select(&MANUAL_RECITAL)
        .enumerate()
        .map(|(i, p)| {
            let number = p
                .select(&NUM_SPAN)
                .next()
                .map(element_text)
                .and_then(|t| RECITAL_NUMBER.captures(&t).map(|c| c[1].to_string()))
                .unwrap_or_else(|| (i + 1).to_string());
            unit(SegmentKind::Recital, number, None, element_text(p))
        })
        .collect()
}

/// Text before and after the first `<br>` inside an element.
fn split_at_br(el: ElementRef<'_>) -> Option<(String, String)> {
    let mut seen_br = false;
    let mut before = Vec::new();
    let mut after = Vec::new();
    for node in el.descendants() {
        match node.value() {
            Node::Element(e) if e.name() == "br" => {
                if seen_br {
                    after.push(" ".to_string());
                }
                seen_br = true;
            }
            Node::Text(t) => {
                if seen_br {
                    after.push(t.to_string());
                } else {
                    before.push(t.to_string());
                }
            }
            _ => {}
        }
    }
    seen_br.then(|| (normalize_text(&before.join(" ")), normalize_text(&after.join(" "))))
}

fn article_number(text: &str) -> Option<String> {
    let joined = SPLIT_DIGITS.replace_all(text, "$1$2");
    ARTICLE_NUMBER.captures(&joined).map(|c| c[1].to_string())
}

/// Following element siblings up to the next heading of the manual layout.
fn manual_section_body(start: ElementRef<'_>, skip_first: bool) -> String {
    let parts: Vec<String> = start
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .skip(usize::from(skip_first))
        .take_while(|e| !has_any_class(*e, &MANUAL_STOP_CLASSES))
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();
    join_parts(parts)
}

fn next_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.next_siblings().find_map(ElementRef::wrap)
}

fn manual_articles(doc: &Html) -> Vec<TextUnit> {
    let mut units = Vec::new();
    for p in doc.select(&MANUAL_ARTICLE) {
        let (number, mut title) = match split_at_br(p) {
            Some((before, after)) => (article_number(&before), non_empty(after)),
            None => (
                p.select(&SPAN).next().map(element_text).and_then(|t| article_number(&t)),
                None,
            ),
        };
        // Title paragraphs share the heading class but carry no number.
        let Some(number) = number else { continue };

        let mut skip_first = false;
        if title.is_none()
            && let Some(next) = next_element(p)
            && has_class(next, "Titrearticle")
            && article_number(&element_text(next)).is_none()
        {
            title = non_empty(element_text(next));
            skip_first = true;
        }

        let text = manual_section_body(p, skip_first);
        units.push(unit(SegmentKind::Article, number, title, text));
    }
    units
}

fn manual_annexes(doc: &Html) -> Vec<TextUnit> {
    let mut units = Vec::new();
    for (i, p) in doc.select(&MANUAL_ANNEX).enumerate() {
        let heading = element_text(p);
        let (number, mut title) = match MANUAL_ANNEX_NUMBER.captures(&heading) {
            Some(caps) => {
                let end = caps.get(0).map_or(heading.len(), |m| m.end());
                (caps[1].to_string(), non_empty(heading[end..].trim().to_string()))
            }
            // Unnumbered annexes are labelled by position.
            None => ((i + 1).to_string(), None),
        };

        let mut skip_first = false;
        if title.is_none()
            && let Some(next) = next_element(p)
            && has_class(next, "NormalCentered")
        {
            title = non_empty(element_text(next));
            skip_first = true;
        }

        let text = manual_section_body(p, skip_first);
        units.push(unit(SegmentKind::Annex, number, title, text));
    }
    units
}

// ── paragraph scan (roman-annex, plain-fallback) ──

fn paragraph_texts(doc: &Html, selector: &Selector) -> Vec<String> {
    doc.select(selector)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_article_heading(p: &str) -> bool {
    PARA_ARTICLE.is_match(p)
}

fn is_annex_heading(p: &str) -> bool {
    PARA_ANNEX.is_match(p)
}

/// Scan a flat paragraph list for one segment kind.
///
/// Recitals are `Whereas` paragraphs numbered in order. An article runs
/// from an `Article N` paragraph to the next article or annex heading; an
/// annex runs from an `ANNEX` heading to the next annex heading.
pub(crate) fn scan_paragraphs(paragraphs: &[String], kind: SegmentKind) -> Vec<TextUnit> {
    let mut units = Vec::new();
    match kind {
        SegmentKind::Recital => {
            for p in paragraphs.iter().filter(|p| p.starts_with("Whereas")) {
                let number = (units.len() + 1).to_string();
                units.push(unit(kind, number, None, p.clone()));
            }
        }
        SegmentKind::Article => {
            let mut i = 0;
            while i < paragraphs.len() {
                let Some(caps) = PARA_ARTICLE.captures(&paragraphs[i]) else {
                    i += 1;
                    continue;
                };
                let number = caps[1].to_string();
                i += 1;
                let start = i;
                while i < paragraphs.len() && !is_article_heading(&paragraphs[i]) && !is_annex_heading(&paragraphs[i]) {
                    i += 1;
                }
                units.push(unit(kind, number, None, join_parts(paragraphs[start..i].to_vec())));
            }
        }
        SegmentKind::Annex => {
            let mut i = 0;
            while i < paragraphs.len() {
                let Some(caps) = PARA_ANNEX.captures(&paragraphs[i]) else {
                    i += 1;
                    continue;
                };
                let number = match &caps[1] {
                    "" => (units.len() + 1).to_string(),
                    n => n.to_string(),
                };
                let title = non_empty(caps[2].trim().to_string());
                i += 1;
                let start = i;
                while i < paragraphs.len() && !is_annex_heading(&paragraphs[i]) {
                    i += 1;
                }
                units.push(unit(kind, number, title, join_parts(paragraphs[start..i].to_vec())));
            }
        }
    }
    units
}
