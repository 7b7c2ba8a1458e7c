//! Builds the canonical [`RotaConfig`] record from extracted parts.
//!
//! One entry point per input path: free text recovered from a PDF, or the
//! structured HTML info page. Fields a human must supply are seeded with the
//! `CHANGE_ME` sentinel and caught later by validation.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::classify::{classify, RotaKind};
use crate::fields;
use crate::html::{parse_html_rota, HtmlRota};
use crate::injectable;
use crate::model::{RotaConfig, CHANGE_ME};

static HAEM_DOC_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^H-?ROTA").unwrap());

/// Haematology rotas carry an H-ROTA document code; everything else is
/// filed under oncology.
fn directorate_for(doc_code: &str) -> String {
    if HAEM_DOC_CODE.is_match(doc_code) {
        "HAE".to_string()
    } else {
        "ONC".to_string()
    }
}

/// Assemble a config from rota free text (the PDF path).
pub fn assemble_pdf(text: &str) -> RotaConfig {
    let kind = classify(text);
    info!(?kind, "rota classified");

    let document_code = fields::parse_document_code(text);
    let blood_tests = fields::parse_blood_tests(text);
    let validity_days = fields::parse_validity_days(text);
    let rota_info = fields::parse_rota_info(text);

    let (drug_name, indication, templates, inpatient_or_outpatient) = match kind {
        RotaKind::Oral => {
            let (drug_name, indication) = fields::parse_drug_name_and_indication(text);
            let mut templates = fields::parse_dose_info(text);
            for t in &mut templates {
                t.drug_name = drug_name.to_uppercase();
            }
            (drug_name, indication, templates, "O")
        }
        RotaKind::Iv | RotaKind::Mixed => {
            let mut templates = injectable::parse_injectable_table(text);
            let drug_name = injectable::infer_rota_name(text);

            let support = injectable::parse_support_therapy(text, templates.len() + 1);
            templates.extend(support);

            if kind == RotaKind::Mixed {
                // Oral starting-dose templates live alongside the IV table in
                // mixed rotas; renumber their groups past the IV ones.
                let oral = fields::parse_dose_info(text);
                let n_iv = templates.len();
                for (j, mut t) in oral.into_iter().enumerate() {
                    if t.drug_name.is_empty() {
                        t.drug_name = "UNKNOWN".to_string();
                    }
                    let keep_letter = t
                        .group
                        .chars()
                        .last()
                        .map(|c| c.is_alphabetic())
                        .unwrap_or(false);
                    t.group = if keep_letter {
                        format!("{}A", n_iv + j + 1)
                    } else {
                        (n_iv + j + 1).to_string()
                    };
                    templates.push(t);
                }
            }
            (drug_name, CHANGE_ME.to_string(), templates, "I")
        }
    };

    let cycle_delay = fields::parse_cycle_interval(text, &drug_name);

    RotaConfig {
        document_code: document_code.clone(),
        drug_full_name: drug_name.clone(),
        indication,
        reference: format!("SmPC for {drug_name}"),
        drug_prefix: CHANGE_ME.to_string(),
        ticket_number: CHANGE_ME.to_string(),
        default_cycles: 12,
        cycle_delay,
        directorate: directorate_for(&document_code),
        specialty_class: CHANGE_ME.to_string(),
        inpatient_or_outpatient: inpatient_or_outpatient.to_string(),
        templates,
        blood_test_validity_days: validity_days,
        blood_tests,
        rota_info_paragraphs: rota_info,
        warnings_paragraphs: vec![
            format!("Validity of FBC {validity_days}   days"),
            format!("Validity of U&E, LFTs, {validity_days} days"),
        ],
    }
}

/// Assemble a config from an EPMA info page (the HTML path).
pub fn assemble_html(html: &str) -> RotaConfig {
    let HtmlRota {
        rota_name,
        document_code,
        blood_tests,
        validity_days,
        iv_templates,
        oral_templates,
        rota_info,
    } = parse_html_rota(html);
    info!(
        iv = iv_templates.len(),
        oral = oral_templates.len(),
        "parsed info page"
    );

    let inpatient_or_outpatient = if iv_templates.is_empty() { "O" } else { "I" };
    let mut templates = iv_templates;
    templates.extend(oral_templates);

    RotaConfig {
        document_code: document_code.clone(),
        drug_full_name: rota_name.clone(),
        indication: CHANGE_ME.to_string(),
        reference: format!("SmPC for {rota_name}"),
        drug_prefix: CHANGE_ME.to_string(),
        ticket_number: CHANGE_ME.to_string(),
        default_cycles: 6,
        cycle_delay: "3w".to_string(),
        directorate: directorate_for(&document_code),
        specialty_class: CHANGE_ME.to_string(),
        inpatient_or_outpatient: inpatient_or_outpatient.to_string(),
        templates,
        blood_test_validity_days: validity_days,
        blood_tests,
        rota_info_paragraphs: rota_info,
        warnings_paragraphs: vec![
            format!("Validity of FBC {validity_days} days"),
            format!("Validity of LFTs {validity_days} days"),
        ],
    }
}
