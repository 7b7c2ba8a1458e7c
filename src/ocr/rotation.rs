//! Orientation voting for OCR of scanned rota pages.
//!
//! Scanned rotas are frequently photographed sideways. Rather than trusting
//! per-page orientation metadata, the OCR step runs each page at several
//! rotations and we keep the candidate whose text reads most like a rota.

/// Clinical vocabulary expected in a correctly oriented rota page.
const ROTA_KEYWORDS: &[&str] = &[
    "dose",
    "mg",
    "prescriber",
    "blood",
    "oral",
    "patient",
    "cancer",
    "tablets",
    "cycle",
    "rota",
    "frequency",
    "saline",
    "infusion",
    "document",
    "fluid",
];

/// Number of distinct keywords present, case-insensitive. Presence rather
/// than occurrence: a page repeating one word must not outvote a page that
/// reads like a rota.
fn keyword_score(text: &str) -> usize {
    let lower = text.to_lowercase();
    ROTA_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count()
}

/// Pick the text candidate with the highest keyword density.
///
/// Candidates are expected in rotation order (0, 90, 270 degrees); a tie
/// keeps the earlier one, so an unrotated page wins over a rotated page
/// that scores the same.
pub fn pick_best_rotation<'a>(candidates: &[&'a str]) -> &'a str {
    let mut best = "";
    let mut best_score = 0usize;
    for (i, candidate) in candidates.iter().enumerate() {
        let score = keyword_score(candidate);
        if i == 0 || score > best_score {
            best = candidate;
            best_score = score;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upright_text_outscores_garbage() {
        let upright = "Starting dose 100mg oral tablets, contact prescriber if blood counts low";
        let sideways = "S t a r t i n g  d o s e  q q q";
        assert_eq!(pick_best_rotation(&[upright, sideways]), upright);
        assert_eq!(pick_best_rotation(&[sideways, upright]), upright);
    }

    #[test]
    fn ties_keep_the_earlier_candidate() {
        let a = "dose mg";
        let b = "mg dose";
        assert_eq!(pick_best_rotation(&[a, b]), a);
    }

    #[test]
    fn repeated_keyword_does_not_outvote_varied_text() {
        let garbled = "mg mg mg mg";
        let varied = "dose blood oral tablets";
        assert_eq!(pick_best_rotation(&[garbled, varied]), varied);
    }

    #[test]
    fn scoring_is_case_insensitive() {
        assert_eq!(keyword_score("DOSE Mg PRESCRIBER"), 3);
    }

    #[test]
    fn empty_candidate_list_yields_empty() {
        assert_eq!(pick_best_rotation(&[]), "");
    }
}
