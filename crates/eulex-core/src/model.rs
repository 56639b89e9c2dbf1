//! Dataset records: works, text units, relations.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::celex::Celex;

/// Kind of legal act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Regulation,
    Directive,
    Decision,
    Proposal,
    Corrigendum,
    Consolidated,
    Other,
}

impl DocumentType {
    /// Map a CELEX type code to a document type.
    pub fn from_type_code(code: &str) -> Self {
        match code {
            "R" => Self::Regulation,
            "L" => Self::Directive,
            "D" => Self::Decision,
            "PC" => Self::Proposal,
            _ => Self::Other,
        }
    }

    /// CELEX type code used in remote queries. `None` for types that are
    /// not selected by type code.
    pub fn type_code(self) -> Option<&'static str> {
        match self {
            Self::Regulation => Some("R"),
            Self::Directive => Some("L"),
            Self::Decision => Some("D"),
            Self::Proposal => Some("PC"),
            Self::Corrigendum | Self::Consolidated | Self::Other => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regulation => "regulation",
            Self::Directive => "directive",
            Self::Decision => "decision",
            Self::Proposal => "proposal",
            Self::Corrigendum => "corrigendum",
            Self::Consolidated => "consolidated",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regulation" => Ok(Self::Regulation),
            "directive" => Ok(Self::Directive),
            "decision" => Ok(Self::Decision),
            "proposal" => Ok(Self::Proposal),
            "corrigendum" => Ok(Self::Corrigendum),
            "consolidated" => Ok(Self::Consolidated),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown document type: {other}")),
        }
    }
}

/// Structural segment kind of a text unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Recital,
    Article,
    Annex,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 3] = [Self::Recital, Self::Article, Self::Annex];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recital => "recital",
            Self::Article => "article",
            Self::Annex => "annex",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recital" => Ok(Self::Recital),
            "article" => Ok(Self::Article),
            "annex" => Ok(Self::Annex),
            other => Err(format!("unknown segment kind: {other}")),
        }
    }
}

/// Typed edge between two acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Cites,
    Amends,
    Repeals,
    Adopts,
    BasedOn,
    ProposesToAmend,
    Consolidates,
}

impl RelationKind {
    pub const ALL: [RelationKind; 7] = [
        Self::Cites,
        Self::Amends,
        Self::Repeals,
        Self::Adopts,
        Self::BasedOn,
        Self::ProposesToAmend,
        Self::Consolidates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cites => "cites",
            Self::Amends => "amends",
            Self::Repeals => "repeals",
            Self::Adopts => "adopts",
            Self::BasedOn => "based_on",
            Self::ProposesToAmend => "proposes_to_amend",
            Self::Consolidates => "consolidates",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown relation kind: {s}"))
    }
}

/// One legal act.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    pub celex: Celex,
    pub document_type: DocumentType,
    pub title: Option<String>,
    pub date_adopted: Option<NaiveDate>,
    /// ISO 639-2 code of the fetched expression, e.g. `eng`.
    pub language: String,
    /// Raw document body. `None` when body retrieval failed.
    pub full_text_html: Option<String>,
}

/// One structural segment of a work, before a surrogate id is assigned.
///
/// Ids are assigned by the store at commit time so that they stay
/// monotonic across workers and runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    pub kind: SegmentKind,
    /// Legal numbering as printed: `"12"`, `"2(a)"`, `"I"`.
    pub number: String,
    pub title: Option<String>,
    pub text: String,
}

/// A directed typed edge. The target need not exist in the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub source: Celex,
    pub target: Celex,
    pub kind: RelationKind,
}

/// Everything one worker produced for one identifier.
///
/// The unit of atomic commit: the work, its units and its relations are
/// written together or not at all.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentResult {
    pub work: Work,
    pub text_units: Vec<TextUnit>,
    pub relations: Vec<Relation>,
}
