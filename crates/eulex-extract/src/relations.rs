//! Typed edges between acts.

use std::collections::HashSet;

use eulex_core::config::RelationsExtractionConfig;
use eulex_core::{Celex, Relation, RelationKind};
use tracing::{debug, warn};

use crate::citations::find_citations;
use crate::RelationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationOptions {
    pub structured: bool,
    pub citations_in_text: bool,
}

impl Default for RelationOptions {
    fn default() -> Self {
        Self {
            structured: true,
            citations_in_text: true,
        }
    }
}

impl From<&RelationsExtractionConfig> for RelationOptions {
    fn from(c: &RelationsExtractionConfig) -> Self {
        Self {
            structured: c.include_relations,
            citations_in_text: c.include_relations && c.include_citations_in_text,
        }
    }
}

/// Deduplicated edges of one document and the candidates that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationSet {
    pub relations: Vec<Relation>,
    pub dropped: Vec<RelationError>,
}

/// Accumulates edges from one source, unique by (source, target, kind),
/// in first-seen order.
struct Collector<'a> {
    source: &'a Celex,
    seen: HashSet<(Celex, RelationKind)>,
    out: RelationSet,
}

impl<'a> Collector<'a> {
    fn new(source: &'a Celex) -> Self {
        Self {
            source,
            seen: HashSet::new(),
            out: RelationSet::default(),
        }
    }

    fn add(&mut self, kind: RelationKind, raw_target: &str) {
        let target = match Celex::parse(raw_target) {
            Ok(t) => t,
            Err(_) => {
                warn!(celex = %self.source, target = raw_target, %kind, "dropping unparsable relation target");
                self.out.dropped.push(RelationError::InvalidTarget {
                    raw: raw_target.to_string(),
                });
                return;
            }
        };
        if &target == self.source {
            warn!(celex = %self.source, %kind, "dropping self-reference");
            self.out.dropped.push(RelationError::SelfReference {
                raw: raw_target.to_string(),
            });
            return;
        }
        if self.seen.insert((target.clone(), kind)) {
            self.out.relations.push(Relation {
                source: self.source.clone(),
                target,
                kind,
            });
        }
    }
}

/// Build the relation set of one document.
///
/// `structured` holds repository-supplied edges with raw target ids; for a
/// consolidated text the caller appends the original act's edges here.
/// `body_text` is scanned for in-text citations, which become `cites` edges.
pub fn extract_relations(
    source: &Celex,
    structured: &[(RelationKind, String)],
    body_text: Option<&str>,
    options: &RelationOptions,
) -> RelationSet {
    let mut collector = Collector::new(source);

    if options.structured {
        for (kind, raw) in structured {
            collector.add(*kind, raw);
        }
    }

    if options.citations_in_text
        && let Some(text) = body_text
    {
        for citation in find_citations(text) {
            collector.add(RelationKind::Cites, &citation.candidate);
        }
    }

    debug!(
        celex = %source,
        count = collector.out.relations.len(),
        dropped = collector.out.dropped.len(),
        "relations extracted"
    );
    collector.out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn celex(s: &str) -> Celex {
        Celex::parse(s).unwrap()
    }

    fn structured() -> Vec<(RelationKind, String)> {
        vec![
            (RelationKind::Repeals, "31995L0046".into()),
            (RelationKind::Cites, "32001R0045".into()),
            (RelationKind::Cites, "32001r0045".into()),
            (RelationKind::Cites, "garbage".into()),
            (RelationKind::Cites, "32016R0679".into()),
        ]
    }

    #[test]
    fn deduplicates_and_drops_malformed() {
        let source = celex("32016R0679");
        let text = "as referred to in Directive 95/46/EC and Regulation (EC) No 45/2001 and Regulation (EU) 2016/679";
        let set = extract_relations(&source, &structured(), Some(text), &RelationOptions::default());

        let triples: Vec<_> = set
            .relations
            .iter()
            .map(|r| (r.target.as_str().to_string(), r.kind))
            .collect();
        assert_eq!(
            triples,
            vec![
                ("31995L0046".to_string(), RelationKind::Repeals),
                ("32001R0045".to_string(), RelationKind::Cites),
                ("31995L0046".to_string(), RelationKind::Cites),
            ]
        );
        assert!(set.relations.iter().all(|r| r.source == source));
        assert_eq!(set.dropped.len(), 3);
    }

    #[test]
    fn extraction_is_deterministic() {
        let source = celex("32016R0679");
        let a = extract_relations(&source, &structured(), Some("Directive 95/46/EC"), &RelationOptions::default());
        let b = extract_relations(&source, &structured(), Some("Directive 95/46/EC"), &RelationOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn options_switch_sources_off() {
        let source = celex("32016R0679");
        let no_text = RelationOptions {
            structured: true,
            citations_in_text: false,
        };
        let set = extract_relations(&source, &[], Some("Directive 95/46/EC"), &no_text);
        assert!(set.relations.is_empty());

        let off = RelationOptions::from(&RelationsExtractionConfig {
            include_relations: false,
            include_original_act_relations_for_consolidated_texts: false,
            include_citations_in_text: true,
        });
        let set = extract_relations(&source, &structured(), Some("Directive 95/46/EC"), &off);
        assert!(set.relations.is_empty());
    }
}
