//! Four-table DOCX template generator.
//!
//! Renders a `RotaConfig` into the fixed-shape review document: injectable
//! schedule, fluids, drug templates, and proceed rules, followed by the
//! free-text warnings and rota information sections. Row contents are built
//! by pure helpers so the cell-level conventions (trailing spaces, hepatic
//! aggregation) are testable without unpacking the archive.

use std::io::Cursor;

use docx_rs::{Docx, PageMargin, Paragraph, Run, Table, TableCell, TableRow};

use crate::error::ConvertError;
use crate::model::{RotaConfig, TestCode};

const CHEMO_HEADER_TOP: [&str; 12] = [
    "DUE",
    "DUE",
    "DRUG/DILUENT",
    "DOSE CALCULATION/\nVOLUME",
    "RATE",
    "ROUTE",
    "Special directions/ PiP(prepared in pharmacy for any MRAPU drugs)",
    "Critical timings",
    "Critical timings",
    "Critical timings",
    "Line",
    "Seq. label",
];
const CHEMO_HEADER_BOTTOM: [&str; 12] = [
    "Stage day",
    "Time",
    "DRUG/DILUENT",
    "DOSE CALCULATION/\nVOLUME",
    "RATE",
    "ROUTE",
    "Special directions/ PiP(prepared in pharmacy for any MRAPU drugs)",
    "Target interval",
    "Margin",
    "Follows  seq. label",
    "Line",
    "Seq. label",
];
const FLUIDS_HEADER_TOP: [&str; 12] = [
    "DUE",
    "DUE",
    "DRUG/DILUENT",
    "UNIT/\nVOLUME",
    "RATE",
    "ROUTE",
    "Special directions",
    "Critical timings",
    "Critical timings",
    "Critical timings",
    "Line",
    "Seq. label",
];
const FLUIDS_HEADER_BOTTOM: [&str; 12] = [
    "Stage day",
    "Time",
    "DRUG/DILUENT",
    "UNIT/\nVOLUME",
    "RATE",
    "ROUTE",
    "Special directions",
    "Target interval",
    "Margin",
    "Follows  seq. label",
    "Line",
    "Seq. label",
];
const TEMPLATE_HEADER_TOP: [&str; 13] = [
    "Drug",
    "Dose/ Calculation",
    "Mode",
    "Freq",
    "Any timing constraints",
    "Route",
    "Form",
    "Start with OOF?",
    "First dose",
    "First dose",
    "Final dose",
    "Final dose",
    "Group",
];
const TEMPLATE_HEADER_BOTTOM: [&str; 13] = [
    "Drug",
    "Dose/ Calculation",
    "Mode",
    "Freq",
    "Any timing constraints",
    "Route",
    "Form",
    "Start with OOF?",
    "Stage day",
    "Time",
    "Stage day",
    "Time",
    "Group",
];
const PROCEED_HEADER: [&str; 5] = [
    "Drug",
    "Neutrophils",
    "Platelets",
    "Renal (estimated by Cockroft Gault)",
    "Hepatic",
];

/// Rows for the injectable schedule table (templates with route IV or SC).
/// With no injectable templates, ten placeholder rows carry a stage-day "1".
pub fn chemo_rows(config: &RotaConfig) -> Vec<Vec<String>> {
    let iv: Vec<_> = config
        .templates
        .iter()
        .filter(|t| t.route.is_injectable())
        .collect();
    if iv.is_empty() {
        return (0..10)
            .map(|_| {
                let mut row = vec!["1".to_string()];
                row.extend(std::iter::repeat(String::new()).take(11));
                row
            })
            .collect();
    }
    iv.into_iter()
        .map(|t| {
            vec![
                t.first_dose_day.to_string(),
                String::new(),
                t.drug_name.clone(),
                format!("{}{}", t.dose, t.units),
                t.infusion_duration.clone(),
                t.route.as_str().to_string(),
                t.timing_constraints.clone(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ]
        })
        .collect()
}

/// Rows for the drug-template table (all non-injectable templates).
/// Mode, route, and final-day cells keep the trailing space the consuming
/// system expects; two empty padding rows follow.
pub fn template_rows(config: &RotaConfig) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = config
        .templates
        .iter()
        .filter(|t| !t.route.is_injectable())
        .map(|t| {
            vec![
                t.drug_name.clone(),
                format!("{}{}", t.dose, t.units),
                format!("{} ", t.mode.as_str()),
                t.frequency.clone(),
                t.timing_constraints.clone(),
                format!("{} ", t.route.as_str()),
                t.form.clone(),
                "-".to_string(),
                t.first_dose_day.to_string(),
                String::new(),
                format!("{} ", t.final_dose_day),
                String::new(),
                t.group.clone(),
            ]
        })
        .collect();
    for _ in 0..2 {
        rows.push(vec![String::new(); 13]);
    }
    rows
}

/// The single proceed-rules row: each blood test's two message lines land in
/// the column matching its clinical category. Bilirubin and ALT share the
/// hepatic column, joined with a line break.
pub fn proceed_row(config: &RotaConfig) -> Vec<String> {
    let mut neuts = String::new();
    let mut plats = String::new();
    let mut renal = String::new();
    let mut hepatic = String::new();

    for bt in &config.blood_tests {
        let entry = format!("{}\n{}", bt.message_line1, bt.message_line3);
        match bt.test_code {
            TestCode::Neuts => neuts = entry,
            TestCode::Plats => plats = entry,
            TestCode::Gfr => renal = entry,
            TestCode::Bili | TestCode::Alt => {
                if hepatic.is_empty() {
                    hepatic = entry;
                } else {
                    hepatic.push('\n');
                    hepatic.push_str(&entry);
                }
            }
        }
    }

    vec![
        format!("{}  ", config.drug_full_name),
        neuts,
        plats,
        renal,
        hepatic,
    ]
}

fn cell(text: &str) -> TableCell {
    let mut cell = TableCell::new();
    // One paragraph per embedded line break
    for line in text.split('\n') {
        cell = cell.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
    }
    cell
}

fn row(values: &[String]) -> TableRow {
    TableRow::new(values.iter().map(|v| cell(v)).collect())
}

fn header_row(values: &[&str]) -> TableRow {
    TableRow::new(values.iter().map(|v| cell(v)).collect())
}

fn paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text))
}

fn bold_paragraph(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text).bold())
}

/// Build the complete four-table document.
pub fn generate_docx(config: &RotaConfig) -> Docx {
    // 0.5in margins in twips
    let mut doc = Docx::new().page_margin(
        PageMargin::new().left(720).right(720).top(720).bottom(720),
    );

    doc = doc.add_paragraph(paragraph("CHEMOTHERAPY"));
    let mut chemo_table_rows = vec![
        header_row(&CHEMO_HEADER_TOP),
        header_row(&CHEMO_HEADER_BOTTOM),
    ];
    chemo_table_rows.extend(chemo_rows(config).iter().map(|r| row(r)));
    doc = doc.add_table(Table::new(chemo_table_rows));

    doc = doc.add_paragraph(paragraph("")).add_paragraph(paragraph("FLUIDS"));
    let mut fluids_rows = vec![
        header_row(&FLUIDS_HEADER_TOP),
        header_row(&FLUIDS_HEADER_BOTTOM),
    ];
    // Always empty placeholder rows
    for _ in 0..10 {
        fluids_rows.push(row(&vec![String::new(); 12]));
    }
    doc = doc.add_table(Table::new(fluids_rows));

    doc = doc
        .add_paragraph(paragraph(""))
        .add_paragraph(paragraph("NON-SEQUENCED"));
    let mut template_table_rows = vec![
        header_row(&TEMPLATE_HEADER_TOP),
        header_row(&TEMPLATE_HEADER_BOTTOM),
    ];
    template_table_rows.extend(template_rows(config).iter().map(|r| row(r)));
    doc = doc.add_table(Table::new(template_table_rows));

    doc = doc
        .add_paragraph(paragraph(""))
        .add_paragraph(paragraph(" PROCEED RULES"));
    let proceed_rows = vec![header_row(&PROCEED_HEADER), row(&proceed_row(config))];
    doc = doc.add_table(Table::new(proceed_rows));

    doc = doc.add_paragraph(paragraph(""));
    doc = doc.add_paragraph(bold_paragraph("Warnings"));
    for warning in &config.warnings_paragraphs {
        doc = doc.add_paragraph(paragraph(warning));
    }
    doc = doc.add_paragraph(paragraph(""));
    doc = doc.add_paragraph(bold_paragraph("Rota Information"));
    for info in &config.rota_info_paragraphs {
        doc = doc.add_paragraph(paragraph(info));
    }

    doc
}

/// Pack the document into DOCX bytes.
pub fn docx_bytes(config: &RotaConfig) -> Result<Vec<u8>, ConvertError> {
    let mut cursor = Cursor::new(Vec::new());
    generate_docx(config)
        .build()
        .pack(&mut cursor)
        .map_err(|e| ConvertError::Docx(e.to_string()))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BloodTest, DrugTemplate, Mode, Route, TestCode, ThresholdFn};

    fn iv_template(name: &str) -> DrugTemplate {
        DrugTemplate {
            drug_name: name.to_string(),
            dose: 375,
            units: "mg".to_string(),
            mode: Mode::Reg,
            frequency: "OD".to_string(),
            route: Route::Iv,
            form: "INJ".to_string(),
            timing_constraints: "4 hours infusion".to_string(),
            first_dose_day: 1,
            final_dose_day: "1".to_string(),
            group: "1A".to_string(),
            fluid_type: "N/Saline".to_string(),
            volume_ml: "500".to_string(),
            infusion_duration: "4 hours".to_string(),
        }
    }

    fn oral_template() -> DrugTemplate {
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
            group: "1A".to_string(),
            fluid_type: String::new(),
            volume_ml: String::new(),
            infusion_duration: String::new(),
        }
    }

    fn config() -> RotaConfig {
        RotaConfig {
            document_code: "HROTA448".to_string(),
            drug_full_name: "R-CHOP".to_string(),
            indication: "DLBCL".to_string(),
            reference: "SmPC for R-CHOP".to_string(),
            drug_prefix: "RCHOP".to_string(),
            ticket_number: "10100".to_string(),
            specialty_class: "LYMPHOMA".to_string(),
            default_cycles: 6,
            cycle_delay: "3w".to_string(),
            directorate: "HAE".to_string(),
            inpatient_or_outpatient: "I".to_string(),
            templates: vec![iv_template("RITUXIMAB"), oral_template()],
            blood_test_validity_days: 7,
            blood_tests: vec![
                BloodTest {
                    test_code: TestCode::Neuts,
                    threshold_value: 1,
                    threshold_function: ThresholdFn::Lt,
                    message_line1: "Neuts < 1.0 x 10 9/L".to_string(),
                    message_line3: "Contact prescriber.".to_string(),
                },
                BloodTest {
                    test_code: TestCode::Bili,
                    threshold_value: 20,
                    threshold_function: ThresholdFn::Gt,
                    message_line1: "Bilirubin > 20 umol/L".to_string(),
                    message_line3: "Contact prescriber.".to_string(),
                },
                BloodTest {
                    test_code: TestCode::Alt,
                    threshold_value: 100,
                    threshold_function: ThresholdFn::Gt,
                    message_line1: "ALT > 100 U/L".to_string(),
                    message_line3: "Contact prescriber.".to_string(),
                },
            ],
            rota_info_paragraphs: vec!["Pre-hydration required.".to_string()],
            warnings_paragraphs: vec!["Validity of FBC 7 days".to_string()],
        }
    }

    #[test]
    fn chemo_rows_take_injectable_templates_only() {
        let rows = chemo_rows(&config());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][2], "RITUXIMAB");
        assert_eq!(rows[0][3], "375mg");
        assert_eq!(rows[0][4], "4 hours");
        assert_eq!(rows[0][5], "IV");
    }

    #[test]
    fn chemo_rows_placeholder_when_no_injectables() {
        let mut cfg = config();
        cfg.templates = vec![oral_template()];
        let rows = chemo_rows(&cfg);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0][0], "1");
        assert!(rows[0][1..].iter().all(String::is_empty));
    }

    #[test]
    fn template_rows_keep_trailing_space_convention() {
        let rows = template_rows(&config());
        // One oral row plus two padding rows
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "DAROLUTAMIDE");
        assert_eq!(rows[0][2], "TTO ");
        assert_eq!(rows[0][5], "ORAL ");
        assert_eq!(rows[0][10], "U ");
        assert!(rows[1].iter().all(String::is_empty));
    }

    #[test]
    fn proceed_row_aggregates_hepatic_tests() {
        let row = proceed_row(&config());
        assert_eq!(row[0], "R-CHOP  ");
        assert!(row[1].starts_with("Neuts < 1.0"));
        assert!(row[2].is_empty());
        assert_eq!(
            row[4],
            "Bilirubin > 20 umol/L\nContact prescriber.\nALT > 100 U/L\nContact prescriber."
        );
    }

    #[test]
    fn document_builds_and_packs() {
        let bytes = docx_bytes(&config()).unwrap();
        // DOCX is a ZIP archive: PK magic
        assert_eq!(&bytes[..2], b"PK");
    }
}
