//! Linguistic port: tokens, lemmas and coarse entity tags.
//!
//! `RuleAnalyzer` is a regex and word-list implementation good enough for
//! the short questions operators type. Entity offsets are byte offsets into
//! the analyzed text.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::semantic::lexical::STOP_WORDS;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("nothing to analyze")]
    EmptyInput,

    #[error("analysis failed: {0}")]
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Date,
    Place,
    Cardinal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Number,
    Function,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub text: String,
    pub lemma: String,
    pub pos: PartOfSpeech,
    pub is_stop: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub kind: EntityKind,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Analysis {
    pub tokens: Vec<Token>,
    pub entities: Vec<Entity>,
}

impl Analysis {
    /// Lemmas of tokens that carry meaning.
    pub fn content_lemmas(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.tokens
            .iter()
            .filter(|t| !t.is_stop && t.pos != PartOfSpeech::Number && t.lemma.len() > 1)
            .map(|t| t.lemma.clone())
            .filter(|lemma| seen.insert(lemma.clone()))
            .collect()
    }

    pub fn has_entity(&self, kind: EntityKind) -> bool {
        self.entities.iter().any(|e| e.kind == kind)
    }
}

pub trait Analyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<Analysis, AnalysisError>;
}

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9_']*|\d+(?:[.,]\d+)*").expect("valid token regex"));

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("valid date regex"));

/// Month names that are also ordinary words ("may", "march") only count
/// when a day or year follows.
static MONTH_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:jan(?:uary)?|feb(?:ruary)?|apr(?:il)?|june?|july?|aug(?:ust)?|sept(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)(?:\s+\d{1,2})?(?:,?\s+(?:19|20)\d{2})?|(?:mar(?:ch)?|may|sep)(?:\s+\d{1,2}(?:,?\s+(?:19|20)\d{2})?|,?\s+(?:19|20)\d{2}))\b",
    )
    .expect("valid month regex")
});

static RELATIVE_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:last|this|next|previous|current)\s+(?:year|quarter|month|week)|yesterday|today|tomorrow|q[1-4])\b",
    )
    .expect("valid relative date regex")
});

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid year regex"));

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:\d+(?:[.,]\d+)*|one|two|three|four|five|six|seven|eight|nine|ten|hundred|thousand|million)\b")
        .expect("valid number regex")
});

const PLACES: &[&str] = &[
    "usa", "america", "canada", "mexico", "brazil", "uk", "england", "france", "germany", "spain",
    "italy", "india", "china", "japan", "australia", "europe", "asia", "africa", "california",
    "texas", "florida", "new york", "chicago", "boston", "london", "paris", "berlin", "tokyo",
    "toronto", "seattle",
];

/// Regex and word-list analyzer.
#[derive(Clone, Debug)]
pub struct RuleAnalyzer {
    places: Vec<String>,
}

impl Default for RuleAnalyzer {
    fn default() -> Self {
        Self {
            places: PLACES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl RuleAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crude suffix-stripping lemmatizer.
    pub fn lemmatize(word: &str) -> String {
        let word = word.to_lowercase();
        let len = word.len();

        if len > 4 && word.ends_with("ies") {
            format!("{}y", &word[..len - 3])
        } else if word.ends_with("sses") || word.ends_with("shes") || word.ends_with("ches") {
            word[..len - 2].to_string()
        } else if len > 3 && word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") {
            word[..len - 1].to_string()
        } else if len > 5 && word.ends_with("ing") {
            word[..len - 3].to_string()
        } else if len > 4 && word.ends_with("ed") {
            word[..len - 2].to_string()
        } else {
            word
        }
    }

    fn part_of_speech(word: &str, is_stop: bool) -> PartOfSpeech {
        if word.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            PartOfSpeech::Number
        } else if is_stop {
            PartOfSpeech::Function
        } else if word.len() > 4 && (word.ends_with("ed") || word.ends_with("ing")) {
            PartOfSpeech::Verb
        } else {
            PartOfSpeech::Noun
        }
    }

    fn entities(&self, text: &str) -> Vec<Entity> {
        let mut entities: Vec<Entity> = Vec::new();

        let overlaps = |entities: &[Entity], start: usize, end: usize| {
            entities.iter().any(|e| start < e.end && e.start < end)
        };

        let date_patterns: [&Regex; 4] = [&ISO_DATE_RE, &MONTH_DATE_RE, &RELATIVE_DATE_RE, &YEAR_RE];
        for re in date_patterns {
            for m in re.find_iter(text) {
                if !overlaps(&entities, m.start(), m.end()) {
                    entities.push(Entity {
                        text: m.as_str().to_string(),
                        start: m.start(),
                        end: m.end(),
                        kind: EntityKind::Date,
                    });
                }
            }
        }

        for m in NUMBER_RE.find_iter(text) {
            if !overlaps(&entities, m.start(), m.end()) {
                entities.push(Entity {
                    text: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                    kind: EntityKind::Cardinal,
                });
            }
        }

        let lowered = text.to_lowercase();
        for place in &self.places {
            let mut from = 0;
            while let Some(offset) = lowered[from..].find(place.as_str()) {
                let start = from + offset;
                let end = start + place.len();
                let bounded = !lowered[..start].ends_with(|c: char| c.is_alphanumeric())
                    && !lowered[end..].starts_with(|c: char| c.is_alphanumeric());
                if bounded && !overlaps(&entities, start, end) {
                    entities.push(Entity {
                        text: text.get(start..end).unwrap_or(place).to_string(),
                        start,
                        end,
                        kind: EntityKind::Place,
                    });
                }
                from = end;
            }
        }

        entities.sort_by_key(|e| e.start);
        entities
    }
}

impl Analyzer for RuleAnalyzer {
    fn analyze(&self, text: &str) -> Result<Analysis, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        let tokens = TOKEN_RE
            .find_iter(text)
            .map(|m| {
                let raw = m.as_str().to_lowercase();
                let is_stop = STOP_WORDS.contains(&raw.as_str());
                Token {
                    lemma: Self::lemmatize(&raw),
                    pos: Self::part_of_speech(&raw, is_stop),
                    is_stop,
                    text: raw,
                }
            })
            .collect();

        Ok(Analysis {
            tokens,
            entities: self.entities(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(analysis: &Analysis) -> Vec<(String, EntityKind)> {
        analysis
            .entities
            .iter()
            .map(|e| (e.text.clone(), e.kind))
            .collect()
    }

    #[test]
    fn lemmatizer_rules() {
        assert_eq!(RuleAnalyzer::lemmatize("Categories"), "category");
        assert_eq!(RuleAnalyzer::lemmatize("orders"), "order");
        assert_eq!(RuleAnalyzer::lemmatize("addresses"), "address");
        assert_eq!(RuleAnalyzer::lemmatize("status"), "status");
        assert_eq!(RuleAnalyzer::lemmatize("shipping"), "shipp");
        assert_eq!(RuleAnalyzer::lemmatize("placed"), "plac");
    }

    #[test]
    fn tags_dates_numbers_and_places() {
        let analysis = RuleAnalyzer::new()
            .analyze("Orders over 500 from Texas in 2021 and last year since 2020-01-31")
            .unwrap();

        assert_eq!(
            kinds(&analysis),
            vec![
                ("500".to_string(), EntityKind::Cardinal),
                ("Texas".to_string(), EntityKind::Place),
                ("2021".to_string(), EntityKind::Date),
                ("last year".to_string(), EntityKind::Date),
                ("2020-01-31".to_string(), EntityKind::Date),
            ]
        );
        assert!(analysis.has_entity(EntityKind::Place));
    }

    #[test]
    fn content_lemmas_skip_stop_words_and_numbers() {
        let analysis = RuleAnalyzer::new()
            .analyze("show me all stores with store names in 2021")
            .unwrap();
        assert_eq!(analysis.content_lemmas(), vec!["store", "name"]);
    }

    #[test]
    fn ambiguous_month_words_need_a_day_or_year() {
        let analyzer = RuleAnalyzer::new();

        let modal = analyzer.analyze("which customers may churn soon").unwrap();
        assert!(!modal.has_entity(EntityKind::Date));
        let verb = analyzer.analyze("orders that march through review").unwrap();
        assert!(!verb.has_entity(EntityKind::Date));

        let dated = analyzer.analyze("orders from May 2021 and march 3").unwrap();
        assert_eq!(
            kinds(&dated),
            vec![
                ("May 2021".to_string(), EntityKind::Date),
                ("march 3".to_string(), EntityKind::Date),
            ]
        );

        let plain = analyzer.analyze("orders in january").unwrap();
        assert_eq!(kinds(&plain), vec![("january".to_string(), EntityKind::Date)]);
    }

    #[test]
    fn place_must_be_a_whole_word() {
        let analysis = RuleAnalyzer::new().analyze("ukulele sales").unwrap();
        assert!(!analysis.has_entity(EntityKind::Place));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            RuleAnalyzer::new().analyze("  "),
            Err(AnalysisError::EmptyInput)
        ));
    }
}
