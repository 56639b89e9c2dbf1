//! CELEX identifier normalisation.
//!
//! Every EU legal act in the Publications Office repository is keyed by a
//! CELEX number. The canonical form used throughout the dataset is:
//!
//! ```text
//!   3 2016 R 0679            regulation 2016/679
//!   ^ ^    ^ ^
//!   | |    | sequence number (4-6 digits)
//!   | |    type code (1-3 letters: R, L, D, PC, ...)
//!   | year
//!   sector (0-9, C, E)
//! ```
//!
//! Optional suffixes:
//! - corrigendum: `32016R0679R(02)`
//! - consolidation date (sector 0 only): `02016R0679-20160504`
//! - anything else matching `[A-Z]{0,3}_?[0-9]{0,9}` is kept verbatim.
//!
//! Input noise (whitespace, hyphens, lowercase) is stripped before
//! validation, so the consolidated form is the only one that carries a
//! hyphen after normalisation.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::model::DocumentType;

static HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9CE])([0-9]{4})([A-Z]{1,3})([0-9]+)(.*)$").expect("valid CELEX head regex")
});

static CORRIGENDUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^R?\(([0-9]{2})\)$").expect("valid corrigendum regex"));

static OTHER_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{0,3}_?[0-9]{0,9}$").expect("valid suffix regex"));

static PROCEDURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})/([0-9]{4})(?:\(([A-Z]{3})\)|/([A-Z]{3}))$")
        .expect("valid procedure regex")
});

/// A string that does not normalise to a valid CELEX number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid CELEX identifier: {input:?}")]
pub struct InvalidIdentifierError {
    pub input: String,
}

/// A string that is not an interinstitutional procedure reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid procedure number: {input:?}")]
pub struct ProcedureNumberError {
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Suffix {
    None,
    Corrigendum(String),
    Consolidated(String),
    Other(String),
}

/// A validated, canonical CELEX number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Celex {
    canonical: String,
    sector: char,
    year: u16,
    type_code: String,
    number: String,
    suffix: Suffix,
}

impl Celex {
    /// Parse and canonicalise a raw identifier string.
    pub fn parse(raw: &str) -> Result<Self, InvalidIdentifierError> {
        let invalid = || InvalidIdentifierError {
            input: raw.to_string(),
        };

        let cleaned: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect::<String>()
            .to_ascii_uppercase();

        let caps = HEAD.captures(&cleaned).ok_or_else(invalid)?;
        let sector = caps[1].chars().next().ok_or_else(invalid)?;
        let year: u16 = caps[2].parse().map_err(|_| invalid())?;
        let type_code = caps[3].to_string();
        let digits = &caps[4];
        let rest = &caps[5];

        // Sector 0 with 12 trailing digits is a consolidated version whose
        // date separator was stripped along with the rest of the noise.
        let (number, suffix) = if sector == '0' && digits.len() == 12 && rest.is_empty() {
            (digits[..4].to_string(), Suffix::Consolidated(digits[4..].to_string()))
        } else if (4..=6).contains(&digits.len()) {
            let suffix = if rest.is_empty() {
                Suffix::None
            } else if let Some(c) = CORRIGENDUM.captures(rest) {
                Suffix::Corrigendum(c[1].to_string())
            } else if OTHER_SUFFIX.is_match(rest) {
                Suffix::Other(rest.to_string())
            } else {
                return Err(invalid());
            };
            (digits.to_string(), suffix)
        } else {
            return Err(invalid());
        };

        if let Suffix::Consolidated(date) = &suffix
            && !is_plausible_date(date)
        {
            return Err(invalid());
        }

        let mut canonical = format!("{sector}{year:04}{type_code}{number}");
        match &suffix {
            Suffix::None => {}
            Suffix::Corrigendum(n) => canonical.push_str(&format!("R({n})")),
            Suffix::Consolidated(date) => canonical.push_str(&format!("-{date}")),
            Suffix::Other(s) => canonical.push_str(s),
        }

        Ok(Self {
            canonical,
            sector,
            year,
            type_code,
            number,
            suffix,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn sector(&self) -> char {
        self.sector
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn type_code(&self) -> &str {
        &self.type_code
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn is_consolidated(&self) -> bool {
        self.sector == '0'
    }

    pub fn is_corrigendum(&self) -> bool {
        matches!(self.suffix, Suffix::Corrigendum(_))
    }

    /// Sector 7 holds national measures transposing directives.
    pub fn is_national_transposition(&self) -> bool {
        self.sector == '7'
    }

    /// Consolidation date (`YYYYMMDD`) for consolidated versions.
    pub fn consolidation_date(&self) -> Option<&str> {
        match &self.suffix {
            Suffix::Consolidated(date) => Some(date),
            _ => None,
        }
    }

    /// The sector-3 act a consolidated version consolidates.
    ///
    /// `02016R0679-20160504` → `32016R0679`. `None` for anything that is
    /// not a dated consolidated version.
    pub fn original_act(&self) -> Option<Celex> {
        if !self.is_consolidated() || self.consolidation_date().is_none() {
            return None;
        }
        Celex::parse(&format!("3{:04}{}{}", self.year, self.type_code, self.number)).ok()
    }

    /// Document type as derived from the identifier structure alone.
    pub fn document_type(&self) -> DocumentType {
        if self.is_consolidated() {
            return DocumentType::Consolidated;
        }
        if self.is_corrigendum() {
            return DocumentType::Corrigendum;
        }
        DocumentType::from_type_code(&self.type_code)
    }

    /// Document type of the underlying act, ignoring consolidation and
    /// corrigendum status. Used when filtering by allowed types.
    pub fn base_document_type(&self) -> DocumentType {
        DocumentType::from_type_code(&self.type_code)
    }
}

fn is_plausible_date(yyyymmdd: &str) -> bool {
    chrono::NaiveDate::parse_from_str(yyyymmdd, "%Y%m%d").is_ok()
}

impl fmt::Display for Celex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for Celex {
    type Err = InvalidIdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Celex::parse(s)
    }
}

impl AsRef<str> for Celex {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

impl Serialize for Celex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical)
    }
}

impl<'de> Deserialize<'de> for Celex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Celex::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Normalise a raw identifier string to its canonical CELEX form.
pub fn normalize_celex(raw: &str) -> Result<String, InvalidIdentifierError> {
    Celex::parse(raw).map(|c| c.canonical)
}

/// Normalise an interinstitutional procedure reference.
///
/// `2021/0106(cod)` and `2021/0106/COD` both become `2021/0106/COD`.
pub fn normalize_procedure_number(raw: &str) -> Result<String, ProcedureNumberError> {
    let upper = raw.trim().to_ascii_uppercase();
    let caps = PROCEDURE.captures(&upper).ok_or_else(|| ProcedureNumberError {
        input: raw.to_string(),
    })?;
    let kind = caps
        .get(3)
        .or_else(|| caps.get(4))
        .map(|m| m.as_str())
        .unwrap_or_default();
    Ok(format!("{}/{}/{}", &caps[1], &caps[2], kind))
}
