//! Classifies free-text motifs into the canonical categories of a source.
//!
//! Each source has an ordered list of rules. The first rule with a matching pattern wins and
//! anything unmatched lands in the source's fallback category. Order matters: compound labels
//! such as `UPR NOK` must be tried before the rules that would match their parts (`NOK`), and
//! `NOK`/`NON OK` before `OK`.

use crate::model::{Category, Source};
use tracing::trace;

/// A test against normalized text.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Pattern {
    /// The whole normalized text equals this value.
    Exact(&'static str),
    /// One word equals this value.
    Word(&'static str),
    /// These space-separated words appear consecutively.
    Phrase(&'static str),
    /// One word starts with this value.
    Prefix(&'static str),
}

impl Pattern {
    fn matches(&self, text: &NormalizedText) -> bool {
        match self {
            Pattern::Exact(s) => text.joined == *s,
            Pattern::Word(s) => text.words.iter().any(|w| w == s),
            Pattern::Phrase(s) => {
                let wanted: Vec<&str> = s.split_whitespace().collect();
                !wanted.is_empty()
                    && text.words.windows(wanted.len()).any(|window| {
                        window
                            .iter()
                            .zip(wanted.iter())
                            .all(|(have, want)| have == want)
                    })
            }
            Pattern::Prefix(s) => text.words.iter().any(|w| w.starts_with(s)),
        }
    }
}

/// Routes text matching any of `patterns` to the category keyed `category`.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    category: &'static str,
    patterns: &'static [Pattern],
}

impl Rule {
    const fn new(category: &'static str, patterns: &'static [Pattern]) -> Self {
        Self { category, patterns }
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    pub fn patterns(&self) -> &'static [Pattern] {
        self.patterns
    }

    fn matches(&self, text: &NormalizedText) -> bool {
        self.patterns.iter().any(|p| p.matches(text))
    }
}

use Pattern::{Exact, Phrase, Prefix, Word};

const CM_RULES: &[Rule] = &[
    Rule::new("RAF", &[Exact("RAF"), Phrase("RIEN A FAIRE")]),
    Rule::new("MODIF", &[Prefix("MODIF")]),
    Rule::new("CREA", &[Prefix("CREA")]),
];

const PA_RULES: &[Rule] = &[
    // Split into sans/avec temps by the extractor, based on the row's duration.
    Rule::new("AD_RAS_SANS_TEMPS", &[Phrase("AD RAS"), Word("RAS")]),
    Rule::new("AD_CREA", &[Prefix("CREA"), Prefix("CREE")]),
    Rule::new("AD_MODIF", &[Prefix("MODIF")]),
];

const COMMUNES_RULES: &[Rule] = &[
    Rule::new(
        "NON_TRAITEE",
        &[
            Phrase("NON TRAITEE"),
            Phrase("NON TRAITE"),
            Phrase("A TRAITER"),
        ],
    ),
    Rule::new("PARTIELLE", &[Prefix("PARTIEL")]),
    Rule::new("TRAITEE", &[Word("TRAITEE"), Word("TRAITE")]),
];

const UPR_RULES: &[Rule] = &[
    Rule::new("UPR_NOK", &[Phrase("UPR NOK"), Phrase("UPR KO")]),
    Rule::new("UPR_OK", &[Phrase("UPR OK")]),
    Rule::new("NOK", &[Word("NOK"), Word("KO"), Phrase("NON OK")]),
    Rule::new("OK", &[Word("OK")]),
];

const TICKETS_RULES: &[Rule] = &[
    Rule::new("SANS_SUITE", &[Phrase("SANS SUITE")]),
    Rule::new("REJETE", &[Prefix("REJET"), Prefix("REFUS")]),
    Rule::new("TRAITE", &[Word("TRAITE"), Word("RESOLU"), Word("CLOS")]),
];

const RIP_RULES: &[Rule] = &[
    Rule::new(
        "HORS_PERIMETRE",
        &[Phrase("HORS PERIMETRE"), Phrase("HORS ZONE")],
    ),
    Rule::new(
        "ADRESSE_ABSENTE",
        &[Word("ABSENTE"), Word("MANQUANTE"), Word("INEXISTANTE")],
    ),
    Rule::new(
        "ADRESSE_ERRONEE",
        &[Word("ERRONEE"), Prefix("ERREUR"), Word("INCORRECTE")],
    ),
    Rule::new("DOUBLON", &[Prefix("DOUBLON")]),
];

/// The ordered rules of a source plus its fallback category.
#[derive(Debug, Clone, Copy)]
pub struct RuleSet {
    source: Source,
    rules: &'static [Rule],
}

impl RuleSet {
    pub fn for_source(source: Source) -> Self {
        let rules = match source {
            Source::Cm => CM_RULES,
            Source::Pa => PA_RULES,
            Source::Communes => COMMUNES_RULES,
            Source::Upr => UPR_RULES,
            Source::Tickets => TICKETS_RULES,
            Source::Rip => RIP_RULES,
        };
        Self { source, rules }
    }

    pub fn rules(&self) -> &'static [Rule] {
        self.rules
    }

    pub fn fallback(&self) -> Category {
        self.source.fallback()
    }

    /// Returns the first matching category, or the fallback.
    pub fn classify(&self, raw: &str) -> Category {
        let text = NormalizedText::new(raw);
        let category = self
            .rules
            .iter()
            .find(|rule| rule.matches(&text))
            .and_then(|rule| self.source.category(rule.category))
            .unwrap_or_else(|| self.fallback());
        trace!("{}: '{}' -> {}", self.source, text.as_str(), category.key());
        category
    }
}

/// Maps a raw motif to the canonical category of `source`. Never fails: unrecognized text is
/// classified as the fallback category.
pub fn normalize(raw: &str, source: Source) -> Category {
    RuleSet::for_source(source).classify(raw)
}

/// Upper-cased, accent-folded text split into words. Every character that is not a letter or a
/// digit separates words, so `UPR-NOK`, `upr_nok` and `Upr  Nok` compare equal.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct NormalizedText {
    words: Vec<String>,
    joined: String,
}

impl NormalizedText {
    pub(crate) fn new(raw: &str) -> Self {
        let mut folded = String::with_capacity(raw.len());
        for c in raw.chars().flat_map(char::to_uppercase) {
            match fold_accent(c) {
                Some(s) => folded.push_str(s),
                None => folded.push(c),
            }
        }
        let words: Vec<String> = folded
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        let joined = words.join(" ");
        Self { words, joined }
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.joined
    }
}

fn fold_accent(c: char) -> Option<&'static str> {
    Some(match c {
        'À' | 'Â' | 'Ä' | 'Á' => "A",
        'Ç' => "C",
        'É' | 'È' | 'Ê' | 'Ë' => "E",
        'Î' | 'Ï' | 'Í' => "I",
        'Ô' | 'Ö' | 'Ó' => "O",
        'Ù' | 'Û' | 'Ü' | 'Ú' => "U",
        'Ÿ' => "Y",
        'Œ' => "OE",
        'Æ' => "AE",
        _ => return None,
    })
}
