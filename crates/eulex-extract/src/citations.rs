//! In-text citations of EU acts.
//!
//! Recognises the common English citation forms and turns them into
//! candidate CELEX strings:
//!
//! | citation                         | candidate    |
//! |----------------------------------|--------------|
//! | `Regulation (EU) 2016/679`       | `32016R0679` |
//! | `Regulation (EC) No 45/2001`     | `32001R0045` |
//! | `Directive 95/46/EC`             | `31995L0046` |
//! | `Directive (EU) 2016/680`        | `32016L0680` |
//! | `Decision (EU) 2019/1`           | `32019D0001` |
//! | `Decision No 1082/2013/EU`       | `32013D1082` |
//!
//! Candidates are not validated here.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static REGULATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Regulation\s+\((?:EU|EC|EEC|Euratom|EU,\s*Euratom|EC,\s*Euratom)\)\s+(No\s+)?(\d+)/(\d+)")
        .expect("valid regulation citation regex")
});

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Directive\s+(?:\((?:EU|EC|EEC|Euratom)\)\s+(\d{4})/(\d+)|(\d{2,4})/(\d+)/(?:EU|EC|EEC|Euratom)\b)")
        .expect("valid directive citation regex")
});

static DECISION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Decision\s+(?:\((?:EU|CFSP|EU,\s*Euratom)\)\s+(\d{4})/(\d+)|No\s+(\d+)/(\d{2,4})/(?:EU|EC|EEC|Euratom)\b)")
        .expect("valid decision citation regex")
});

/// A citation found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    /// The matched citation text.
    pub raw: String,
    /// Candidate sector-3 CELEX number.
    pub candidate: String,
}

/// Expand a two-digit year: acts from 1950 to 1999 or from 2000 to 2049.
fn expand_year(year: &str) -> Option<u32> {
    let y: u32 = year.parse().ok()?;
    match year.len() {
        2 if y >= 50 => Some(1900 + y),
        2 => Some(2000 + y),
        4 => Some(y),
        _ => None,
    }
}

fn candidate(type_code: &str, year: &str, number: &str) -> Option<String> {
    let year = expand_year(year)?;
    let number: u32 = number.parse().ok()?;
    Some(format!("3{year}{type_code}{number:04}"))
}

fn group<'a>(caps: &'a Captures<'_>, i: usize) -> Option<&'a str> {
    caps.get(i).map(|m| m.as_str())
}

/// Find every recognised citation in `text`, in order of appearance.
pub fn find_citations(text: &str) -> Vec<Citation> {
    let mut found: Vec<(usize, Citation)> = Vec::new();

    for caps in REGULATION.captures_iter(text) {
        let (Some(a), Some(b)) = (group(&caps, 2), group(&caps, 3)) else {
            continue;
        };
        // Pre-2015 numbering puts the number first and says "No".
        let (year, number) = if caps.get(1).is_some() { (b, a) } else { (a, b) };
        push(&mut found, &caps, candidate("R", year, number));
    }

    for caps in DIRECTIVE.captures_iter(text) {
        let (year, number) = match (group(&caps, 1), group(&caps, 2), group(&caps, 3), group(&caps, 4)) {
            (Some(y), Some(n), _, _) | (_, _, Some(y), Some(n)) => (y, n),
            _ => continue,
        };
        push(&mut found, &caps, candidate("L", year, number));
    }

    for caps in DECISION.captures_iter(text) {
        let (year, number) = match (group(&caps, 1), group(&caps, 2), group(&caps, 3), group(&caps, 4)) {
            (Some(y), Some(n), _, _) => (y, n),
            (_, _, Some(n), Some(y)) => (y, n),
            _ => continue,
        };
        push(&mut found, &caps, candidate("D", year, number));
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, c)| c).collect()
}

fn push(found: &mut Vec<(usize, Citation)>, caps: &Captures<'_>, candidate: Option<String>) {
    let (Some(whole), Some(candidate)) = (caps.get(0), candidate) else {
        return;
    };
    found.push((
        whole.start(),
        Citation {
            raw: whole.as_str().to_string(),
            candidate,
        },
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(text: &str) -> Vec<String> {
        find_citations(text).into_iter().map(|c| c.candidate).collect()
    }

    #[test]
    fn regulation_forms() {
        assert_eq!(candidates("see Regulation (EU) 2016/679 of the"), vec!["32016R0679"]);
        assert_eq!(candidates("Regulation (EC) No 45/2001 applies"), vec!["32001R0045"]);
        assert_eq!(candidates("Regulation (EU) No 1025/2012"), vec!["32012R1025"]);
        assert_eq!(candidates("Regulation (EEC) No 1408/71"), vec!["31971R1408"]);
    }

    #[test]
    fn directive_forms() {
        assert_eq!(candidates("Directive 95/46/EC is repealed"), vec!["31995L0046"]);
        assert_eq!(candidates("Directive (EU) 2016/680"), vec!["32016L0680"]);
        assert_eq!(candidates("Directive 2002/58/EC"), vec!["32002L0058"]);
    }

    #[test]
    fn decision_forms() {
        assert_eq!(candidates("Decision (EU) 2019/1"), vec!["32019D0001"]);
        assert_eq!(candidates("Decision No 1082/2013/EU"), vec!["32013D1082"]);
    }

    #[test]
    fn order_of_appearance() {
        let text = "Directive 95/46/EC and Regulation (EU) 2016/679 and Decision (EU) 2019/1";
        assert_eq!(candidates(text), vec!["31995L0046", "32016R0679", "32019D0001"]);
    }

    #[test]
    fn ignores_prose() {
        assert!(candidates("This Regulation shall enter into force. Directive text.").is_empty());
    }
}
