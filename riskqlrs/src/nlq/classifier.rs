use std::collections::{BTreeSet, HashMap};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Closed vocabulary of domain concepts a question can mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Concept {
    Highest,
    Lowest,
    Counterparty,
    Sector,
    Rating,
    Trade,
    Exposure,
    Notional,
    Mpe,
    Breach,
    Count,
    Distribution,
    Average,
}

impl Concept {
    pub fn as_str(&self) -> &'static str {
        match self {
            Concept::Highest => "highest",
            Concept::Lowest => "lowest",
            Concept::Counterparty => "counterparty",
            Concept::Sector => "sector",
            Concept::Rating => "rating",
            Concept::Trade => "trade",
            Concept::Exposure => "exposure",
            Concept::Notional => "notional",
            Concept::Mpe => "mpe",
            Concept::Breach => "breach",
            Concept::Count => "count",
            Concept::Distribution => "distribution",
            Concept::Average => "average",
        }
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SYNONYMS: &[(Concept, &[&str])] = &[
    (
        Concept::Highest,
        &["highest", "maximum", "max", "largest", "biggest", "most", "top", "greatest"],
    ),
    (
        Concept::Lowest,
        &["lowest", "minimum", "min", "smallest", "least", "bottom", "lower", "fewer"],
    ),
    (
        Concept::Counterparty,
        &["counterparty", "counterparties", "client", "clients", "customer", "customers"],
    ),
    (
        Concept::Sector,
        &["sector", "sectors", "industry", "industries", "segment", "segments"],
    ),
    (
        Concept::Trade,
        &["trade", "trades", "transaction", "transactions", "deal", "deals"],
    ),
    (
        Concept::Rating,
        &["rating", "ratings", "grade", "grades", "score", "scores"],
    ),
    (
        Concept::Exposure,
        &["exposure", "exposures", "risk", "amount", "value", "position"],
    ),
    (Concept::Notional, &["notional", "nominal", "principal"]),
    (Concept::Mpe, &["mpe"]),
    (
        Concept::Breach,
        &[
            "breach", "breached", "breaches", "exceed", "exceeded", "exceeding", "exceeds",
            "violate", "violated",
        ],
    ),
    (Concept::Count, &["count", "number", "quantity"]),
    (
        Concept::Distribution,
        &["distribution", "breakdown", "split", "allocation", "spread"],
    ),
    (Concept::Average, &["average", "avg", "mean", "typical"]),
];

/// Multi-word phrases, matched against contiguous tokens.
const PHRASES: &[(&[&str], Concept)] = &[
    (&["how", "many"], Concept::Count),
    (&["maximum", "potential", "exposure"], Concept::Mpe),
    (&["potential", "exposure"], Concept::Mpe),
    (&["max", "exposure"], Concept::Mpe),
];

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("static regex"));

static WORD_TO_CONCEPT: Lazy<HashMap<&'static str, Concept>> = Lazy::new(|| {
    SYNONYMS
        .iter()
        .flat_map(|(concept, words)| words.iter().map(move |w| (*w, *concept)))
        .collect()
});

/// Deduplicated set of concepts found in one question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Concepts(BTreeSet<Concept>);

impl Concepts {
    pub fn contains(&self, concept: Concept) -> bool {
        self.0.contains(&concept)
    }

    pub fn contains_any(&self, concepts: &[Concept]) -> bool {
        concepts.iter().any(|c| self.0.contains(c))
    }

    pub fn insert(&mut self, concept: Concept) {
        self.0.insert(concept);
    }

    pub fn iter(&self) -> impl Iterator<Item = Concept> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Concept> for Concepts {
    fn from_iter<I: IntoIterator<Item = Concept>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Lowercased word tokens of a question.
pub fn tokenize(question: &str) -> Vec<String> {
    let lowered = question.to_lowercase();
    WORD.find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Map a question to the domain concepts it mentions. Words outside the
/// vocabulary are dropped.
pub fn classify(question: &str) -> Concepts {
    let tokens = tokenize(question);
    let mut concepts: Concepts = tokens
        .iter()
        .filter_map(|t| WORD_TO_CONCEPT.get(t.as_str()).copied())
        .collect();

    for (phrase, concept) in PHRASES {
        let hit = tokens
            .windows(phrase.len())
            .any(|window| window.iter().zip(phrase.iter()).all(|(t, p)| t == p));
        if hit {
            concepts.insert(*concept);
        }
    }

    concepts
}
