//! Segmentation of a document body into recitals, articles and annexes.

use eulex_core::config::TextExtractionConfig;
use eulex_core::{Celex, SegmentKind, TextUnit};
use scraper::Html;
use tracing::{debug, warn};

use crate::ExtractionError;
use crate::templates::Template;

/// Which segment kinds to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub recitals: bool,
    pub articles: bool,
    pub annexes: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            recitals: true,
            articles: true,
            annexes: true,
        }
    }
}

impl From<&TextExtractionConfig> for ExtractOptions {
    fn from(c: &TextExtractionConfig) -> Self {
        Self {
            recitals: c.include_recitals,
            articles: c.include_articles,
            annexes: c.include_annexes,
        }
    }
}

impl ExtractOptions {
    pub fn enabled(&self, kind: SegmentKind) -> bool {
        match kind {
            SegmentKind::Recital => self.recitals,
            SegmentKind::Article => self.articles,
            SegmentKind::Annex => self.annexes,
        }
    }
}

/// Bodies a document's units are drawn from.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentBodies<'a> {
    pub main: &'a str,
    /// Body of the original act. Consolidated texts carry no preamble, so
    /// their recitals come from here when present.
    pub recitals: Option<&'a str>,
    /// Separately published annex stream (Commission proposals).
    pub annexes: Option<&'a str>,
}

/// Units in document order plus the kinds that could not be segmented.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub units: Vec<TextUnit>,
    pub degraded: Vec<ExtractionError>,
}

impl Extraction {
    pub fn count(&self, kind: SegmentKind) -> usize {
        self.units.iter().filter(|u| u.kind == kind).count()
    }
}

/// Split a document into text units.
///
/// Preamble, articles and annexes are emitted in that order, each in source
/// order. For every enabled kind the templates are tried in priority order
/// and the first one that yields units wins. A kind no template recognises
/// yields zero units and is reported in [`Extraction::degraded`].
pub fn extract_text_units(celex: &Celex, bodies: &DocumentBodies<'_>, options: &ExtractOptions) -> Extraction {
    let mut out = Extraction::default();
    if !options.recitals && !options.articles && !options.annexes {
        debug!(celex = %celex, "text extraction disabled");
        return out;
    }

    let main = Html::parse_document(bodies.main);
    let recital_doc = bodies.recitals.map(Html::parse_document);
    let annex_doc = bodies.annexes.map(Html::parse_document);

    for kind in SegmentKind::ALL {
        if !options.enabled(kind) {
            continue;
        }
        let alternative = match kind {
            SegmentKind::Recital => recital_doc.as_ref(),
            SegmentKind::Annex => annex_doc.as_ref(),
            SegmentKind::Article => None,
        };
        let docs = alternative.into_iter().chain(std::iter::once(&main));

        match first_match(docs, kind) {
            Some((template, units)) => {
                debug!(celex = %celex, %kind, template = template.name(), count = units.len(), "segmented");
                out.units.extend(units);
            }
            None => {
                warn!(celex = %celex, %kind, "no recognisable structure, degraded extraction");
                out.degraded.push(ExtractionError::NoStructure { kind });
            }
        }
    }
    out
}

fn first_match<'a>(
    docs: impl Iterator<Item = &'a Html>,
    kind: SegmentKind,
) -> Option<(Template, Vec<TextUnit>)> {
    for doc in docs {
        for template in Template::PRIORITY {
            let units = template.extract(doc, kind);
            if !units.is_empty() {
                return Some((template, units));
            }
        }
    }
    None
}
