//! Query generalization: volatile parts of a query become placeholders so
//! "orders from 2021" and "orders from 2022" share one pattern.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::linguistic::{Analysis, EntityKind};

pub const LITERAL: &str = "<literal>";
pub const CONDITION: &str = "<condition>";
pub const DATE_RANGE: &str = "<date_range>";
pub const DATE: &str = "<date>";
pub const YEAR: &str = "<year>";
pub const NUMBER: &str = "<number>";

static CONDITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b[a-z_][a-z0-9_]*\s*(?:!=|<>|>=|<=|=|>|<)\s*(?:'[^']*'|"[^"]*"|[^\s]+)"#)
        .expect("valid condition regex")
});

static LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"'[^']*'|"[^"]*""#).expect("valid literal regex"));

static DATE_RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    let point = r"(?:\d{4}-\d{2}-\d{2}|(?:19|20)\d{2})";
    Regex::new(&format!(r"\bbetween\s+{point}\s+and\s+{point}\b")).expect("valid range regex")
});

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid date regex"));

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid year regex"));

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").expect("valid number regex"));

/// Replace volatile tokens of a normalized query with placeholders.
///
/// Order matters: conditions and literals are consumed before the date and
/// number rules can see the values inside them.
pub fn generalize(normalized: &str, analysis: Option<&Analysis>) -> String {
    let mut text = CONDITION_RE.replace_all(normalized, CONDITION).into_owned();
    text = LITERAL_RE.replace_all(&text, LITERAL).into_owned();
    text = DATE_RANGE_RE.replace_all(&text, DATE_RANGE).into_owned();
    text = ISO_DATE_RE.replace_all(&text, DATE).into_owned();
    text = YEAR_RE.replace_all(&text, YEAR).into_owned();

    if let Some(analysis) = analysis {
        for entity in &analysis.entities {
            let placeholder = match entity.kind {
                EntityKind::Date => DATE,
                EntityKind::Cardinal => NUMBER,
                EntityKind::Place => continue,
            };
            let needle = entity.text.to_lowercase();
            if needle.trim().is_empty() {
                continue;
            }
            if let Ok(re) = Regex::new(&format!(r"\b{}\b", regex::escape(&needle))) {
                text = re.replace_all(&text, placeholder).into_owned();
            }
        }
    }

    text = NUMBER_RE.replace_all(&text, NUMBER).into_owned();

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether generalization replaced anything.
pub fn has_placeholders(pattern: &str) -> bool {
    [LITERAL, CONDITION, DATE_RANGE, DATE, YEAR, NUMBER]
        .iter()
        .any(|p| pattern.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linguistic::{Analyzer, RuleAnalyzer};

    #[test]
    fn years_and_ranges() {
        assert_eq!(generalize("orders from 2021", None), "orders from <year>");
        assert_eq!(
            generalize("orders from 2021", None),
            generalize("orders from 2022", None)
        );
        assert_eq!(
            generalize("orders between 2020-01-01 and 2020-06-30", None),
            "orders <date_range>"
        );
        assert_eq!(generalize("orders on 2021-05-04", None), "orders on <date>");
    }

    #[test]
    fn conditions_literals_numbers() {
        assert_eq!(
            generalize("customers where city = 'new york'", None),
            "customers where <condition>"
        );
        assert_eq!(generalize("orders named \"big deal\"", None), "orders named <literal>");
        assert_eq!(generalize("top 10 customers", None), "top <number> customers");
        assert_eq!(generalize("amount>500 orders", None), "<condition> orders");
    }

    #[test]
    fn entities_from_analysis() {
        let query = "orders placed last year over five items";
        let analysis = RuleAnalyzer::new().analyze(query).unwrap();
        assert_eq!(
            generalize(query, Some(&analysis)),
            "orders placed <date> over <number> items"
        );
    }

    #[test]
    fn modal_may_is_not_a_date() {
        let query = "which customers may churn soon";
        let analysis = RuleAnalyzer::new().analyze(query).unwrap();
        let pattern = generalize(query, Some(&analysis));
        assert_eq!(pattern, query);
        assert!(!has_placeholders(&pattern));
    }

    #[test]
    fn plain_queries_stay_unchanged() {
        let pattern = generalize("show me all stores", None);
        assert_eq!(pattern, "show me all stores");
        assert!(!has_placeholders(&pattern));
        assert!(has_placeholders("orders from <year>"));
    }
}
