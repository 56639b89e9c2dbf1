//! SPARQL query texts and result decoding for the Cellar endpoint.
//!
//! Query builders and binding parsers are pure so they can be tested
//! without network access; [`crate::CellarClient`] does the transport.

use std::collections::HashMap;

use chrono::NaiveDate;
use eulex_core::{Celex, DocumentType, RelationKind};
use serde::Deserialize;
use tracing::debug;

use crate::repository::{ConceptLabels, ProcedureDocuments, SearchHit, SearchQuery, WorkMetadata};

pub const DEFAULT_ENDPOINT: &str = "https://publications.europa.eu/webapi/rdf/sparql";

const PREFIXES: &str = "PREFIX cdm: <http://publications.europa.eu/ontology/cdm#>
PREFIX owl: <http://www.w3.org/2002/07/owl#>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
PREFIX skos: <http://www.w3.org/2004/02/skos/core#>
PREFIX eurovoc: <http://eurovoc.europa.eu/>
";

/// CDM properties backing each structured relation kind. `cites` is handled
/// separately because it links works, not legal resources.
const RELATION_PROPERTIES: [(RelationKind, &str); 6] = [
    (RelationKind::Amends, "resource_legal_amends_resource_legal"),
    (RelationKind::Repeals, "resource_legal_repeals_resource_legal"),
    (RelationKind::Adopts, "resource_legal_adopts_resource_legal"),
    (RelationKind::BasedOn, "resource_legal_based_on_resource_legal"),
    (RelationKind::ProposesToAmend, "resource_legal_proposes_to_amend_resource_legal"),
    (RelationKind::Consolidates, "act_consolidated_consolidates_resource_legal"),
];

// ── Result decoding ──

/// `application/sparql-results+json` body.
#[derive(Debug, Deserialize)]
pub struct SparqlResponse {
    pub results: SparqlResults,
}

#[derive(Debug, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
pub struct SparqlValue {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub datatype: Option<String>,
}

fn value<'a>(binding: &'a HashMap<String, SparqlValue>, var: &str) -> Option<&'a str> {
    binding
        .get(var)
        .map(|v| v.value.trim())
        .filter(|v| !v.is_empty())
}

/// `xsd:date` literal, tolerating a trailing timezone or time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// Escape a string for use inside a double-quoted SPARQL literal.
fn literal(s: &str) -> String {
    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

fn is_safe_iri(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '{' | '}'))
}

/// Two-letter language tag for label filters (`eng` → `en`).
fn language_tag(language: &str) -> String {
    let lang = language.to_ascii_lowercase();
    let tag = match lang.as_str() {
        "eng" => "en",
        "fra" => "fr",
        "deu" => "de",
        "ita" => "it",
        "spa" => "es",
        "nld" => "nl",
        "por" => "pt",
        "pol" => "pl",
        "swe" => "sv",
        "dan" => "da",
        "fin" => "fi",
        "ell" => "el",
        "ces" => "cs",
        "hun" => "hu",
        "ron" => "ro",
        "bul" => "bg",
        "slk" => "sk",
        "slv" => "sl",
        "est" => "et",
        "lav" => "lv",
        "lit" => "lt",
        "hrv" => "hr",
        "mlt" => "mt",
        "gle" => "ga",
        other => return other.chars().take(2).collect(),
    };
    tag.to_string()
}

// ── Work metadata ──

/// Title, document date and structured relations of one work.
pub fn metadata_query(celex: &Celex, language: &str) -> String {
    let lang = language.to_ascii_uppercase();
    let mut q = format!(
        "{PREFIXES}
SELECT DISTINCT ?data_type ?value
WHERE {{
  ?work owl:sameAs <http://publications.europa.eu/resource/celex/{id}> .
  {{
    ?expression cdm:expression_belongs_to_work ?work .
    ?expression cdm:expression_title ?value .
    FILTER EXISTS {{
      ?expression cdm:expression_uses_language ?lang .
      FILTER(STRENDS(STR(?lang), {lang}))
    }}
    BIND(\"title\" AS ?data_type)
  }}
  UNION {{
    ?work cdm:work_date_document ?value .
    BIND(\"date\" AS ?data_type)
  }}
  UNION {{
    ?work cdm:work_cites_work ?w .
    ?w cdm:resource_legal_id_celex ?value .
    BIND(\"cites\" AS ?data_type)
  }}",
        id = crate::rest::encode_celex(celex),
        lang = literal(&lang),
    );
    for (kind, property) in RELATION_PROPERTIES {
        q.push_str(&format!(
            "
  UNION {{
    ?work cdm:{property} ?w .
    ?w cdm:resource_legal_id_celex ?value .
    BIND(\"{kind}\" AS ?data_type)
  }}"
        ));
    }
    q.push_str("\n}\n");
    q
}

/// `None` when the repository knows nothing about the work.
pub fn parse_metadata(response: &SparqlResponse) -> Option<WorkMetadata> {
    let bindings = &response.results.bindings;
    if bindings.is_empty() {
        return None;
    }
    let mut meta = WorkMetadata::default();
    for b in bindings {
        let (Some(data_type), Some(v)) = (value(b, "data_type"), value(b, "value")) else {
            continue;
        };
        match data_type {
            "title" => {
                if meta.title.is_none() {
                    meta.title = Some(v.to_string());
                }
            }
            "date" => {
                if meta.date.is_none() {
                    meta.date = parse_date(v);
                }
            }
            other => match other.parse::<RelationKind>() {
                Ok(kind) => meta.relations.push((kind, v.to_string())),
                Err(_) => debug!(data_type = other, "ignoring unknown metadata binding"),
            },
        }
    }
    Some(meta)
}

// ── Procedures ──

/// Proposals of a procedure and any act adopting them.
pub fn procedure_query(procedure: &str) -> String {
    format!(
        "{PREFIXES}
SELECT DISTINCT ?proposalCelex ?workCelex
WHERE {{
  ?dossier cdm:procedure_code_interinstitutional_reference_procedure ?ref .
  ?proposal cdm:work_part_of_dossier ?dossier .
  ?proposal cdm:resource_legal_id_celex ?proposalCelex .
  OPTIONAL {{
    ?work cdm:resource_legal_adopts_resource_legal ?proposal .
    ?work cdm:resource_legal_id_celex ?workCelex .
  }}
  FILTER(CONTAINS(STR(?ref), {procedure}))
  FILTER(CONTAINS(STR(?proposalCelex), \"PC\"))
  FILTER(!CONTAINS(STR(?proposalCelex), \"(\"))
}}
",
        procedure = literal(procedure),
    )
}

pub fn parse_procedure(response: &SparqlResponse) -> ProcedureDocuments {
    let mut docs = ProcedureDocuments::default();
    for b in &response.results.bindings {
        if let Some(p) = value(b, "proposalCelex")
            && !docs.proposals.iter().any(|x| x == p)
        {
            docs.proposals.push(p.to_string());
        }
        if let Some(w) = value(b, "workCelex")
            && !docs.adopted.iter().any(|x| x == w)
        {
            docs.adopted.push(w.to_string());
        }
    }
    docs
}

// ── Descriptive search ──

/// Works in a date range with allowed types, optionally about given concepts.
/// Both date bounds are inclusive.
pub fn search_query(query: &SearchQuery) -> String {
    let concepts: Vec<String> = query
        .concepts
        .iter()
        .filter(|c| is_safe_iri(c))
        .map(|c| format!("<{c}>"))
        .collect();
    let concept_filter = if concepts.is_empty() {
        String::new()
    } else {
        format!(
            "?work cdm:work_is_about_concept_eurovoc ?eurovoc .\n  VALUES ?eurovoc {{ {} }}",
            concepts.join(" ")
        )
    };

    let type_conditions: Vec<String> = query
        .document_types
        .iter()
        .filter_map(|t| t.type_code())
        .map(|code| format!("?type = \"{code}\"^^xsd:string"))
        .collect();
    let type_filter = if type_conditions.is_empty() {
        String::new()
    } else {
        format!("FILTER({})", type_conditions.join(" || "))
    };

    let mut sectors = vec!["3"];
    if query.document_types.contains(&DocumentType::Proposal) {
        sectors.push("5");
    }
    if query.include_consolidated_texts {
        sectors.push("0");
    }
    if query.include_national_transpositions {
        sectors.push("7");
    }
    let sector_filter = sectors
        .iter()
        .map(|s| format!("?sector = \"{s}\"^^xsd:string"))
        .collect::<Vec<_>>()
        .join(" || ");

    let corrigenda_filter = if query.include_corrigenda {
        ""
    } else {
        "FILTER(!REGEX(STR(?celex), \"\\\\([0-9]{2}\\\\)$\"))"
    };

    format!(
        "{PREFIXES}
SELECT DISTINCT ?celex ?date
WHERE {{
  ?work cdm:work_date_document ?date .
  ?work cdm:resource_legal_type ?type .
  ?work cdm:resource_legal_id_celex ?celex .
  ?work cdm:resource_legal_id_sector ?sector .
  {concept_filter}
  FILTER(?date >= \"{start}\"^^xsd:date)
  FILTER(?date <= \"{end}\"^^xsd:date)
  {type_filter}
  FILTER({sector_filter})
  {corrigenda_filter}
}}
",
        start = query.start.format("%Y-%m-%d"),
        end = query.end.format("%Y-%m-%d"),
    )
}

pub fn parse_search(response: &SparqlResponse) -> Vec<SearchHit> {
    response
        .results
        .bindings
        .iter()
        .filter_map(|b| {
            Some(SearchHit {
                celex: value(b, "celex")?.to_string(),
                date: value(b, "date").and_then(parse_date),
            })
        })
        .collect()
}

// ── Concept thesaurus ──

/// EuroVoc concepts whose preferred or alternative label contains one of the
/// keywords, case-insensitively.
pub fn concepts_query(keywords: &[String], language: &str) -> String {
    let values = keywords
        .iter()
        .map(|k| literal(k.trim()))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "{PREFIXES}
SELECT DISTINCT ?concept ?label ?keyword
WHERE {{
  VALUES ?keyword {{ {values} }}
  ?concept skos:inScheme eurovoc:100141 .
  ?concept skos:prefLabel|skos:altLabel ?label .
  FILTER(
    LANGMATCHES(LANG(?label), {tag}) &&
    CONTAINS(LCASE(STR(?label)), LCASE(?keyword))
  )
}}
ORDER BY ?keyword ?label
",
        tag = literal(&language_tag(language)),
    )
}

pub fn parse_concepts(response: &SparqlResponse) -> ConceptLabels {
    let mut out = ConceptLabels::new();
    for b in &response.results.bindings {
        let (Some(keyword), Some(concept), Some(label)) =
            (value(b, "keyword"), value(b, "concept"), value(b, "label"))
        else {
            continue;
        };
        out.entry(keyword.to_string())
            .or_default()
            .entry(concept.to_string())
            .or_default()
            .insert(label.to_string());
    }
    out
}
