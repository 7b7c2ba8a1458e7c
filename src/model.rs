//! Canonical rota configuration model.
//!
//! One `RotaConfig` per conversion job. Extractors build it, a human edits the
//! persisted YAML, and both generators consume it read-only. Derivation helpers
//! (codes, descriptions, sequence numbers) live here so the TXT and DOCX
//! generators agree on every derived value.

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// Sentinel for fields that require mandatory human input before generation.
pub const CHANGE_ME: &str = "CHANGE_ME";

/// Blood test codes, declared in canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestCode {
    Neuts,
    Plats,
    Gfr,
    Bili,
    Alt,
}

impl TestCode {
    /// Uppercase wire form, e.g. "NEUTS".
    pub fn as_str(&self) -> &'static str {
        match self {
            TestCode::Neuts => "NEUTS",
            TestCode::Plats => "PLATS",
            TestCode::Gfr => "GFR",
            TestCode::Bili => "BILI",
            TestCode::Alt => "ALT",
        }
    }
}

/// Threshold comparison direction. NEUTS/PLATS/GFR use LT, BILI/ALT use GT by
/// clinical convention; the model does not enforce this structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThresholdFn {
    Lt,
    Gt,
}

impl ThresholdFn {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdFn::Lt => "LT",
            ThresholdFn::Gt => "GT",
        }
    }
}

/// A single proceed-rule: compare a blood result against a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodTest {
    pub test_code: TestCode,
    pub threshold_value: i64,
    pub threshold_function: ThresholdFn,
    /// e.g. "Plts < 100 x 10^9/L"
    pub message_line1: String,
    /// e.g. "Contact prescriber."
    pub message_line3: String,
}

/// Prescription mode: take-home supply vs inpatient administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Tto,
    Reg,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Tto => "TTO",
            Mode::Reg => "REG",
        }
    }
}

/// Administration route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Route {
    Oral,
    Iv,
    Sc,
    Im,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Oral => "ORAL",
            Route::Iv => "IV",
            Route::Sc => "SC",
            Route::Im => "IM",
        }
    }

    /// Injectable routes populate the chemotherapy schedule table.
    pub fn is_injectable(&self) -> bool {
        matches!(self, Route::Iv | Route::Sc)
    }
}

/// One prescribable drug template within a rota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugTemplate {
    /// Normalized upper-case name, e.g. "DAROLUTAMIDE".
    pub drug_name: String,
    /// Unit-normalized dose (grams already converted to milligrams).
    pub dose: i64,
    pub units: String,
    pub mode: Mode,
    /// Coded frequency, e.g. "OD", "BD", "TDS".
    pub frequency: String,
    pub route: Route,
    /// Free text, e.g. "Tab" / "Inj".
    pub form: String,
    /// Free text; may carry infusion duration, BSA caveats, or a dose-unknown flag.
    #[serde(default)]
    pub timing_constraints: String,
    pub first_dose_day: i64,
    /// Integer-as-string, or "U" for "until stopped".
    pub final_dose_day: String,
    /// Trailing letter = primary template, trailing digit = alternate.
    pub group: String,
    // IV-only fields (empty for oral templates)
    #[serde(default)]
    pub fluid_type: String,
    #[serde(default)]
    pub volume_ml: String,
    #[serde(default)]
    pub infusion_duration: String,
}

impl DrugTemplate {
    /// Primary templates carry a letter suffix in the group label (e.g. "1A").
    pub fn is_primary(&self) -> bool {
        self.group
            .chars()
            .last()
            .map(|c| c.is_alphabetic())
            .unwrap_or(false)
    }
}

/// The canonical record produced by extraction, edited by a human, and
/// consumed by both generators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotaConfig {
    // Extracted identity
    pub document_code: String,
    pub drug_full_name: String,
    pub indication: String,
    pub reference: String,

    // Human input required (seeded with CHANGE_ME)
    pub drug_prefix: String,
    pub ticket_number: String,
    pub specialty_class: String,

    // Scheduling / classification
    pub default_cycles: i64,
    /// e.g. "3w"
    pub cycle_delay: String,
    pub directorate: String,
    /// "I" or "O"
    pub inpatient_or_outpatient: String,

    #[serde(default)]
    pub templates: Vec<DrugTemplate>,

    #[serde(default = "default_validity_days")]
    pub blood_test_validity_days: i64,
    #[serde(default)]
    pub blood_tests: Vec<BloodTest>,

    #[serde(default)]
    pub rota_info_paragraphs: Vec<String>,
    #[serde(default)]
    pub warnings_paragraphs: Vec<String>,
}

fn default_validity_days() -> i64 {
    7
}

impl RotaConfig {
    /// E.g. prefix "DARO" -> "Daro".
    pub fn drug_title_case(&self) -> String {
        let mut chars = self.drug_prefix.chars();
        match chars.next() {
            Some(first) => {
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
            }
            None => String::new(),
        }
    }

    pub fn doc_code_upper(&self) -> String {
        self.document_code.to_uppercase()
    }

    /// Validity window as a weeks string, e.g. 7 days -> "1w".
    pub fn max_result_age(&self) -> String {
        format!("{}w", self.blood_test_validity_days / 7)
    }

    /// Template code, e.g. "DARO_Daro600BD_TTO".
    pub fn template_code(&self, t: &DrugTemplate) -> String {
        format!(
            "{}_{}{}{}_{}",
            self.drug_prefix,
            self.drug_title_case(),
            t.dose,
            t.frequency,
            t.mode.as_str()
        )
    }

    /// Template description, e.g. "Darolutamide 600mg BD TTO".
    pub fn template_description(&self, t: &DrugTemplate) -> String {
        format!(
            "{} {}{} {} {}",
            self.drug_full_name,
            t.dose,
            t.units,
            t.frequency,
            t.mode.as_str()
        )
    }

    /// Message code for a blood test, e.g. "DAROneuts".
    pub fn message_code(&self, bt: &BloodTest) -> String {
        format!("{}{}", self.drug_prefix, bt.test_code.as_str().to_lowercase())
    }

    /// Stage code, e.g. "DARO_Stage1".
    pub fn stage_code(&self, n: u32) -> String {
        format!("{}_Stage{}", self.drug_prefix, n)
    }

    /// Map template mode to the EPMA prescription mode.
    pub fn prescription_mode(&self, t: &DrugTemplate) -> &'static str {
        match t.mode {
            Mode::Tto => "REG_T",
            Mode::Reg => "REG",
        }
    }

    /// Assign sequence numbers: the single primary gets 0, alternates get
    /// 1..N in their original order.
    pub fn seq_assignments(&self) -> Vec<(u32, &DrugTemplate)> {
        let mut primary = None;
        let mut alternates = Vec::new();
        for t in &self.templates {
            if t.is_primary() && primary.is_none() {
                primary = Some(t);
            } else {
                alternates.push(t);
            }
        }
        let mut result = Vec::new();
        if let Some(p) = primary {
            result.push((0, p));
        }
        for (i, alt) in alternates.into_iter().enumerate() {
            result.push((i as u32 + 1, alt));
        }
        result
    }

    /// Hard generation gate: the three mandatory human-input fields must be
    /// filled in. Returns every missing field in one error.
    pub fn validate(&self) -> Result<(), ConvertError> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("drug_prefix", &self.drug_prefix),
            ("ticket_number", &self.ticket_number),
            ("specialty_class", &self.specialty_class),
        ] {
            if value.is_empty() || value == CHANGE_ME {
                missing.push(name.to_string());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConvertError::MissingFields { fields: missing })
        }
    }

    /// Serialize to the persisted human-editable YAML form.
    pub fn to_yaml(&self) -> Result<String, ConvertError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Load a (possibly human-edited) YAML config.
    pub fn from_yaml(s: &str) -> Result<Self, ConvertError> {
        Ok(serde_yaml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(group: &str) -> DrugTemplate {
        DrugTemplate {
            drug_name: "DAROLUTAMIDE".to_string(),
            dose: 600,
            units: "mg".to_string(),
            mode: Mode::Tto,
            frequency: "BD".to_string(),
            route: Route::Oral,
            form: "TAB".to_string(),
            timing_constraints: "Take with food".to_string(),
            first_dose_day: 1,
            final_dose_day: "U".to_string(),
            group: group.to_string(),
            fluid_type: String::new(),
            volume_ml: String::new(),
            infusion_duration: String::new(),
        }
    }

    fn config() -> RotaConfig {
        RotaConfig {
            document_code: "Drota930".to_string(),
            drug_full_name: "Darolutamide".to_string(),
            indication: "nmCRPC".to_string(),
            reference: "SmPC for Darolutamide".to_string(),
            drug_prefix: "DARO".to_string(),
            ticket_number: "10350".to_string(),
            specialty_class: "UROLOGY".to_string(),
            default_cycles: 12,
            cycle_delay: "4w".to_string(),
            directorate: "ONC".to_string(),
            inpatient_or_outpatient: "O".to_string(),
            templates: vec![template("1A")],
            blood_test_validity_days: 7,
            blood_tests: vec![BloodTest {
                test_code: TestCode::Neuts,
                threshold_value: 1,
                threshold_function: ThresholdFn::Lt,
                message_line1: "Neuts < 1 x 10 9/L".to_string(),
                message_line3: "Contact prescriber.".to_string(),
            }],
            rota_info_paragraphs: vec!["Take with food".to_string()],
            warnings_paragraphs: vec!["Validity of FBC 7 days".to_string()],
        }
    }

    #[test]
    fn template_code_format() {
        let cfg = config();
        assert_eq!(cfg.template_code(&cfg.templates[0]), "DARO_Daro600BD_TTO");
    }

    #[test]
    fn template_description_format() {
        let cfg = config();
        assert_eq!(
            cfg.template_description(&cfg.templates[0]),
            "Darolutamide 600mg BD TTO"
        );
    }

    #[test]
    fn message_and_stage_codes() {
        let cfg = config();
        assert_eq!(cfg.message_code(&cfg.blood_tests[0]), "DAROneuts");
        assert_eq!(cfg.stage_code(1), "DARO_Stage1");
    }

    #[test]
    fn max_result_age_converts_days_to_weeks() {
        let mut cfg = config();
        assert_eq!(cfg.max_result_age(), "1w");
        cfg.blood_test_validity_days = 14;
        assert_eq!(cfg.max_result_age(), "2w");
    }

    #[test]
    fn primary_detection_by_group_suffix() {
        assert!(template("1A").is_primary());
        assert!(!template("1").is_primary());
        assert!(template("2B").is_primary());
    }

    #[test]
    fn seq_assignment_primary_zero_alternates_ascending() {
        let mut cfg = config();
        cfg.templates = vec![template("1"), template("1A"), template("2")];
        let seqs: Vec<(u32, &str)> = cfg
            .seq_assignments()
            .into_iter()
            .map(|(n, t)| (n, t.group.as_str()))
            .collect();
        assert_eq!(seqs, vec![(0, "1A"), (1, "1"), (2, "2")]);
    }

    #[test]
    fn seq_assignment_without_primary() {
        let mut cfg = config();
        cfg.templates = vec![template("1"), template("2")];
        let seqs: Vec<u32> = cfg.seq_assignments().iter().map(|(n, _)| *n).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn validate_reports_all_sentinel_fields() {
        let mut cfg = config();
        cfg.ticket_number = CHANGE_ME.to_string();
        cfg.specialty_class = String::new();
        let err = cfg.validate().unwrap_err();
        match err {
            ConvertError::MissingFields { fields } => {
                assert_eq!(fields, vec!["ticket_number", "specialty_class"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_passes_complete_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn yaml_round_trip_preserves_every_field() {
        let cfg = config();
        let yaml = cfg.to_yaml().unwrap();
        let reloaded = RotaConfig::from_yaml(&yaml).unwrap();
        assert_eq!(cfg, reloaded);
    }

    #[test]
    fn yaml_uses_stable_field_names() {
        let yaml = config().to_yaml().unwrap();
        for key in [
            "document_code",
            "drug_prefix",
            "ticket_number",
            "templates",
            "blood_tests",
            "test_code: NEUTS",
            "threshold_function: LT",
        ] {
            assert!(yaml.contains(key), "missing key in YAML: {key}");
        }
    }
}
