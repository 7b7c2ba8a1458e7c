//! Field extractors for the PDF text path.
//!
//! Each extractor is a pure function over the normalized text stream. A field
//! that cannot be parsed falls back to a sentinel ("UNKNOWN", empty list,
//! default value); extraction failures are local, never fatal.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{BloodTest, DrugTemplate, Mode, Route, TestCode, ThresholdFn};

// ---------------------------------------------------------------------------
// Document code
// ---------------------------------------------------------------------------

static DOC_CODE_LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Document\s*Code\s*[:\-]\s*(H-?ROTA\s*\d+[a-z]?|[A-Za-z][A-Za-z0-9\-]+)")
        .unwrap()
});
static DOC_CODE_BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(H-?ROTA\s*\d+[a-z]?|[A-Za-z]rota\s*\d+[a-z]?)\b").unwrap()
});

/// Extract the document code, e.g. "H-ROTA49", "HROTA448", "Drota930".
///
/// Prefers an explicit "Document Code:" label; falls back to a bare rota-code
/// pattern anywhere in the text. Internal spaces are stripped (OCR inserts
/// them, e.g. "HROTA 10b").
pub fn parse_document_code(text: &str) -> String {
    if let Some(cap) = DOC_CODE_LABELLED.captures(text) {
        return cap[1]
            .trim()
            .replace(' ', "")
            .trim_end_matches('_')
            .to_string();
    }
    if let Some(cap) = DOC_CODE_BARE.captures(text) {
        return cap[1].replace(' ', "");
    }
    "UNKNOWN".to_string()
}

// ---------------------------------------------------------------------------
// Drug name and indication (oral rotas)
// ---------------------------------------------------------------------------

/// Generic words that must never be treated as drug names.
static NOT_DRUG_NAMES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "maintenance",
        "treatment",
        "therapy",
        "regimen",
        "protocol",
        "induction",
        "consolidation",
        "information",
        "further",
        "patient",
        "please",
        "refer",
        "supply",
        "cycle",
        "stage",
        "course",
        "this",
    ]
    .into_iter()
    .collect()
});

static DRUG_FOR_STRICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"([A-Z][a-z]{3,}(?:amide|inib|umab|izumab|cillin|mycin|ide|ine|ole|ib|ab)?)\s+for\s*\n?\s*(?s)(.+?)(?:\n\n|\()",
    )
    .unwrap()
});
static DRUG_FOR_LOOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)([A-Z][a-z]{4,})\s+for\s+(.+?)$").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Extract drug name and indication from an oral rota title line
/// "{Drug} for {indication}". Returns ("UNKNOWN", "UNKNOWN") on no match.
pub fn parse_drug_name_and_indication(text: &str) -> (String, String) {
    if let Some(cap) = DRUG_FOR_STRICT.captures(text) {
        let drug = cap[1].trim().to_string();
        if drug.len() >= 5 && !NOT_DRUG_NAMES.contains(drug.to_lowercase().as_str()) {
            let indication = WHITESPACE.replace_all(cap[2].trim(), " ").to_string();
            return (drug, indication);
        }
    }
    if let Some(cap) = DRUG_FOR_LOOSE.captures(text) {
        let drug = cap[1].trim().to_string();
        if !NOT_DRUG_NAMES.contains(drug.to_lowercase().as_str()) {
            return (drug, cap[2].trim().to_string());
        }
    }
    ("UNKNOWN".to_string(), "UNKNOWN".to_string())
}

// ---------------------------------------------------------------------------
// Oral dose / frequency
// ---------------------------------------------------------------------------

static STARTING_DOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[Ss]tarting\s+dose\s+(?:usually\s+)?(\d+)\s*mg\s+(BD|OD|TDS)").unwrap()
});
static REDUCED_DOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Dd]ose\s+reduced?\s+to\s+(\d+)\s*mg\s*(BD|OD|TDS)?").unwrap());
static TABLETS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)tablets?").unwrap());
static CAPSULES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)capsules?").unwrap());
static WITH_FOOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Tt]aken?\s+(?:continuously\s+)?with\s+food").unwrap());

fn oral_template(
    dose: i64,
    frequency: &str,
    mode: Mode,
    form: &str,
    timing: String,
    group: &str,
) -> DrugTemplate {
    DrugTemplate {
        drug_name: String::new(), // filled in by the assembler
        dose,
        units: "mg".to_string(),
        mode,
        frequency: frequency.to_string(),
        route: Route::Oral,
        form: form.to_string(),
        timing_constraints: timing,
        first_dose_day: 1,
        final_dose_day: "U".to_string(),
        group: group.to_string(),
        fluid_type: String::new(),
        volume_ml: String::new(),
        infusion_duration: String::new(),
    }
}

/// Extract the starting dose, optional dose-reduction, and frequency from an
/// oral rota. Emits a primary TTO template, an optional reduced-dose TTO
/// alternate, and a REG inpatient mirror of the primary. No parsable starting
/// dose yields an empty list (the caller flags the record for review).
pub fn parse_dose_info(text: &str) -> Vec<DrugTemplate> {
    let (primary_dose, freq) = match STARTING_DOSE.captures(text) {
        Some(cap) => (cap[1].parse::<i64>().unwrap_or(0), cap[2].to_string()),
        None => (0, "BD".to_string()),
    };
    if primary_dose == 0 {
        return Vec::new();
    }

    let reduced_dose = REDUCED_DOSE
        .captures(text)
        .and_then(|cap| cap[1].parse::<i64>().ok());

    let form = if TABLETS.is_match(text) {
        "TAB"
    } else if CAPSULES.is_match(text) {
        "CAP"
    } else {
        "TAB"
    };

    let timing = if WITH_FOOD.is_match(text) {
        "Take with food".to_string()
    } else {
        String::new()
    };

    let mut templates = vec![oral_template(
        primary_dose,
        &freq,
        Mode::Tto,
        form,
        timing.clone(),
        "1A",
    )];
    if let Some(reduced) = reduced_dose {
        let red_timing = if timing.is_empty() {
            "Dose reduction".to_string()
        } else {
            format!("Dose reduction  {timing}")
        };
        templates.push(oral_template(reduced, &freq, Mode::Tto, form, red_timing, "1"));
    }
    let ip_timing = if timing.is_empty() {
        "Inpatient prescribing".to_string()
    } else {
        format!("Inpatient prescribing {timing}")
    };
    templates.push(oral_template(
        primary_dose,
        &freq,
        Mode::Reg,
        form,
        ip_timing,
        "1",
    ));

    templates
}

// ---------------------------------------------------------------------------
// Blood test thresholds
// ---------------------------------------------------------------------------

static PLATS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Pp][li]a?ts?\s*<\s*([\d.]+)").unwrap());
static NEUTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Nn]euts?\s*<\s*([\d.]+)").unwrap());
static GFR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:GFR|[Rr]enal\s*(?:function)?)\s*[:<]?\s*<?\.?\s*(\d+)\s*m[lL]/min").unwrap()
});
static BILI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Bb]ilirubin\s*>\s*(\d+)").unwrap());
static ALT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ALT\s*>\s*(\d+)").unwrap());

fn numeric(raw: &str) -> i64 {
    raw.trim_end_matches('.').parse::<f64>().unwrap_or(0.0) as i64
}

/// Extract blood test thresholds. Each test is matched independently; one
/// not found is simply omitted. Message lines follow the fixed EPMA templates.
pub fn parse_blood_tests(text: &str) -> Vec<BloodTest> {
    let mut tests = Vec::new();

    if let Some(cap) = PLATS_RE.captures(text) {
        tests.push(BloodTest {
            test_code: TestCode::Plats,
            threshold_value: numeric(&cap[1]),
            threshold_function: ThresholdFn::Lt,
            message_line1: format!("Plts < {} x 10^9/L", &cap[1]),
            message_line3: "Contact prescriber.".to_string(),
        });
    }
    if let Some(cap) = NEUTS_RE.captures(text) {
        tests.push(BloodTest {
            test_code: TestCode::Neuts,
            threshold_value: numeric(&cap[1]),
            threshold_function: ThresholdFn::Lt,
            message_line1: format!("Neuts < {} x 10 9/L", &cap[1]),
            message_line3: "Contact prescriber. Reduced neutrophils common with longer treatment"
                .to_string(),
        });
    }
    if let Some(cap) = GFR_RE.captures(text) {
        tests.push(BloodTest {
            test_code: TestCode::Gfr,
            threshold_value: numeric(&cap[1]),
            threshold_function: ThresholdFn::Lt,
            message_line1: format!("GFR < {}mL/min", &cap[1]),
            message_line3: "Contact prescriber.".to_string(),
        });
    }
    if let Some(cap) = BILI_RE.captures(text) {
        tests.push(BloodTest {
            test_code: TestCode::Bili,
            threshold_value: numeric(&cap[1]),
            threshold_function: ThresholdFn::Gt,
            message_line1: format!("Bilirubin > {} umol/L", &cap[1]),
            message_line3: "Contact prescriber.".to_string(),
        });
    }
    if let Some(cap) = ALT_RE.captures(text) {
        tests.push(BloodTest {
            test_code: TestCode::Alt,
            threshold_value: numeric(&cap[1]),
            threshold_function: ThresholdFn::Gt,
            message_line1: format!("ALT  > {} U/L", &cap[1]),
            message_line3: "Contact prescriber.".to_string(),
        });
    }

    // Canonical ordering across the record
    tests.sort_by_key(|t| t.test_code);
    tests
}

// ---------------------------------------------------------------------------
// Validity window, cycle interval, free-text info
// ---------------------------------------------------------------------------

static VALIDITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Vv]alidity.*?(\d+)\s*days").unwrap());

/// Blood result validity window in days (default 7).
pub fn parse_validity_days(text: &str) -> i64 {
    VALIDITY_RE
        .captures(text)
        .and_then(|cap| cap[1].parse().ok())
        .unwrap_or(7)
}

static NAME_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+(\d+)$").unwrap());
static CYCLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*day\s*cycle|every\s+(\d+)\s*days?").unwrap());

/// Cycle interval as a weeks string, e.g. "3w".
///
/// A numeric suffix on the rota name (e.g. "R-CHOP 21") wins when it is a
/// plausible cycle length; an explicit "N day cycle" phrase is next; 4 weeks
/// is the default.
pub fn parse_cycle_interval(text: &str, drug_name: &str) -> String {
    if let Some(cap) = NAME_SUFFIX_RE.captures(drug_name.trim()) {
        if let Ok(days) = cap[1].parse::<i64>() {
            if (7..=56).contains(&days) {
                return format!("{}w", days / 7);
            }
        }
    }
    if let Some(cap) = CYCLE_RE.captures(text) {
        let days: i64 = cap
            .get(1)
            .or_else(|| cap.get(2))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(28);
        return format!("{}w", days / 7);
    }
    "4w".to_string()
}

static INFO_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:Further Information|BLOOD TESTS|Please supply)").unwrap());

/// Collect free-text information lines that follow the known section markers.
pub fn parse_rota_info(text: &str) -> Vec<String> {
    let sections: Vec<&str> = INFO_SPLIT_RE.split(text).collect();
    let mut paragraphs = Vec::new();
    if sections.len() > 1 {
        for section in &sections[1..] {
            for line in section.trim().lines() {
                let line = line.trim();
                if line.len() > 20 {
                    paragraphs.push(line.to_string());
                }
            }
        }
    }
    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_code_labelled_wins() {
        let text = "See Drota111 elsewhere.\nDocument Code: HROTA 10b\n";
        assert_eq!(parse_document_code(text), "HROTA10b");
    }

    #[test]
    fn document_code_bare_fallback() {
        assert_eq!(parse_document_code("header\nH-ROTA49 rev 2\n"), "H-ROTA49");
        assert_eq!(parse_document_code("Drota930 Darolutamide"), "Drota930");
    }

    #[test]
    fn document_code_unknown_on_no_match() {
        assert_eq!(parse_document_code("nothing here"), "UNKNOWN");
    }

    #[test]
    fn drug_name_with_suffix_and_indication() {
        let text = "Darolutamide for\nnon-metastatic castration resistant prostate cancer (nmCRPC)\n";
        let (drug, indication) = parse_drug_name_and_indication(text);
        assert_eq!(drug, "Darolutamide");
        assert_eq!(
            indication,
            "non-metastatic castration resistant prostate cancer"
        );
    }

    #[test]
    fn generic_nouns_are_not_drug_names() {
        let (drug, _) = parse_drug_name_and_indication("Maintenance for two years (see below)");
        assert_eq!(drug, "UNKNOWN");
    }

    #[test]
    fn dose_info_emits_tto_alternate_and_reg() {
        let text = "Starting dose 600 mg BD with tablets.\nDose reduced to 300 mg BD if toxicity.\nTake with food.";
        let templates = parse_dose_info(text);
        assert_eq!(templates.len(), 3);

        assert_eq!(templates[0].dose, 600);
        assert_eq!(templates[0].mode, Mode::Tto);
        assert_eq!(templates[0].group, "1A");
        assert_eq!(templates[0].timing_constraints, "Take with food");

        assert_eq!(templates[1].dose, 300);
        assert_eq!(templates[1].group, "1");
        assert!(templates[1].timing_constraints.starts_with("Dose reduction"));

        assert_eq!(templates[2].dose, 600);
        assert_eq!(templates[2].mode, Mode::Reg);
        assert!(templates[2]
            .timing_constraints
            .starts_with("Inpatient prescribing"));
    }

    #[test]
    fn no_starting_dose_yields_no_templates() {
        assert!(parse_dose_info("no dosing information at all").is_empty());
    }

    #[test]
    fn blood_tests_in_canonical_order() {
        let text = "BLOOD TESTS\nPlts < 100\nBilirubin > 20\nNeuts < 1.0\nALT > 100\nGFR < 30 mL/min";
        let tests = parse_blood_tests(text);
        let codes: Vec<&str> = tests.iter().map(|t| t.test_code.as_str()).collect();
        assert_eq!(codes, vec!["NEUTS", "PLATS", "GFR", "BILI", "ALT"]);
        assert_eq!(tests[0].threshold_value, 1);
        assert_eq!(tests[0].threshold_function, ThresholdFn::Lt);
        assert_eq!(tests[3].threshold_function, ThresholdFn::Gt);
        assert_eq!(tests[1].message_line1, "Plts < 100 x 10^9/L");
    }

    #[test]
    fn unmatched_threshold_is_omitted() {
        let tests = parse_blood_tests("Neuts < 1.5 only");
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].test_code, TestCode::Neuts);
    }

    #[test]
    fn validity_days_with_default() {
        assert_eq!(parse_validity_days("Validity of FBC 14 days"), 14);
        assert_eq!(parse_validity_days("no mention"), 7);
    }

    #[test]
    fn cycle_interval_from_name_suffix() {
        assert_eq!(parse_cycle_interval("", "R-CHOP 21"), "3w");
        // Out-of-range suffix is ignored
        assert_eq!(parse_cycle_interval("", "STUDY 100"), "4w");
    }

    #[test]
    fn cycle_interval_from_text_phrase() {
        assert_eq!(parse_cycle_interval("repeat every 28 days", "FLAG"), "4w");
        assert_eq!(parse_cycle_interval("21 day cycle", "FLAG"), "3w");
    }

    #[test]
    fn rota_info_collects_long_lines_after_markers() {
        let text = "title\nFurther Information\nshort\nPatients should be counselled on food timing.\n";
        let info = parse_rota_info(text);
        assert_eq!(info, vec!["Patients should be counselled on food timing."]);
    }
}
