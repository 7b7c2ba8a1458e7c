//! Rota classifier: decide which parsing strategy applies to a PDF text
//! stream (oral-only, injectable-only, or mixed).
//!
//! Pure scoring function, no side effects. Parsers degrade gracefully on a
//! wrong call, so the default on no signal is ORAL.

use std::sync::LazyLock;

use regex::Regex;

use crate::injectable::IV_DRUG_NAMES;

/// Parsing strategy for a rota document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotaKind {
    Iv,
    Oral,
    Mixed,
}

static CARRIER_FLUID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"n/saline|0\.9%\s*nacl|dextrose|glucose\s*5%").unwrap());
static VOLUME_ML: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d+\s*ml\b").unwrap());
static INFUSION_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\s*(?:hour|hr|min)s?\s+infusion").unwrap());
static FLUID_ADMIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"flow\s*rate|iv\s*fluid|drug.*electrolyte|electrolyte.*drug").unwrap()
});
static SC_ROUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"subcutaneous|s/c\b|\bsc\s+inj").unwrap());

static STARTING_DOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"starting\s+dose|please\s+supply").unwrap());
static TABLET_NOUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\btablets?\b|\bcapsules?\b").unwrap());
static WITH_FOOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"take\s+with\s+food|orally\s+days").unwrap());

/// True if a known injectable drug name appears on a line with table
/// delimiters; a bare mention in interaction text does not count.
fn iv_drug_in_table_context(text_lower: &str) -> bool {
    text_lower.lines().any(|line| {
        line.contains('|') && IV_DRUG_NAMES.iter().any(|d| line.contains(&d.to_lowercase()))
    })
}

/// Score injectable and oral indicators and pick the parsing strategy.
///
/// Injectable-score >= 2 with no oral signal is IV; with any oral signal it is
/// MIXED (injectable extraction is strictly additive there). Any oral signal
/// alone is ORAL, and ORAL is the fallback.
pub fn classify(text: &str) -> RotaKind {
    let tl = text.to_lowercase();

    let iv_signals = [
        CARRIER_FLUID.is_match(&tl),
        VOLUME_ML.is_match(&tl),
        INFUSION_PHRASE.is_match(&tl),
        FLUID_ADMIN.is_match(&tl),
        iv_drug_in_table_context(&tl),
        SC_ROUTE.is_match(&tl),
    ];
    let oral_signals = [
        STARTING_DOSE.is_match(&tl),
        TABLET_NOUN.is_match(&tl),
        WITH_FOOD.is_match(&tl),
    ];

    let iv_score = iv_signals.iter().filter(|s| **s).count();
    let oral_score = oral_signals.iter().filter(|s| **s).count();

    if iv_score >= 2 && oral_score == 0 {
        RotaKind::Iv
    } else if iv_score >= 2 {
        RotaKind::Mixed
    } else {
        RotaKind::Oral
    }
}
