//! EPMA TXT upload generator.
//!
//! Renders a `RotaConfig` into the line-oriented hierarchical upload format.
//! Indentation is two columns per level; data lines replace the first indent
//! column with '+', navigation/structural lines carry no marker. Every named
//! record is CUT before it is re-CREATEd so re-importing the same file is
//! idempotent on the server. All line endings are CRLF; the consuming system
//! requires them regardless of platform.

use crate::model::RotaConfig;

/// Line buffer for the hierarchical format.
struct TxtWriter {
    lines: Vec<String>,
}

impl TxtWriter {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Navigation or structural line: indent only, no marker.
    fn add(&mut self, level: usize, text: &str) {
        self.lines.push(format!("{}{}", " ".repeat(2 * level), text));
    }

    /// Data line: '+' replaces the first indent column. Level 0 data lines
    /// do not exist in the format.
    fn add_plus(&mut self, level: usize, text: &str) {
        debug_assert!(level > 0, "level 0 lines cannot carry a + marker");
        self.lines
            .push(format!("+{}{}", " ".repeat(2 * level - 1), text));
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn finish(self) -> String {
        self.lines.join("\r\n")
    }
}

/// Generate the complete TXT upload content with CRLF line endings.
/// Pure function of the config: identical input gives byte-identical output.
pub fn generate_txt(config: &RotaConfig) -> String {
    let mut w = TxtWriter::new();

    // Header comments
    w.add(
        0,
        &format!(
            ";d L^P025ZA(\"\\\\uhb\\wcl\\PICS\\Live Development\\#{} {} {}\\#{}{}.txt\")",
            config.ticket_number,
            config.doc_code_upper(),
            config.drug_full_name,
            config.ticket_number,
            config.drug_prefix
        ),
    );
    w.blank();
    w.add(0, ";d BuildSet^P040EA,OverInd^P040EC,BuildR^P040EF");
    w.blank();
    w.blank();

    // Drug Messages: CUT then CREATE
    w.add(0, "Drug Messages");
    for bt in &config.blood_tests {
        w.add(1, &format!("Code: {}", config.message_code(bt)));
        w.add(2, "CUT");
    }
    w.add(0, "END");
    w.blank();

    w.add(0, "Drug Messages");
    for bt in &config.blood_tests {
        // Navigation key, no marker
        w.add(1, &format!("Code: {}", config.message_code(bt)));
        w.add_plus(2, "Message target: sysACTION");
        w.add_plus(2, &format!("Text line 1: {}", bt.message_line1));
        w.add_plus(2, "Text line 2: {{{RESULT}}} at {{{RESTIME}}}.");
        w.add_plus(2, &format!("Text line 3: {}", bt.message_line3));
    }
    w.add(0, "END");
    w.blank();

    // Drug Templates: CUT then CREATE
    w.add(0, ";;UHB only ;;;");
    w.add(0, "Drug Template");
    for t in &config.templates {
        w.add(1, &format!("Template Code: {}", config.template_code(t)));
        w.add(2, "CUT");
    }
    w.add(0, "END");
    w.blank();

    w.add(0, "Drug Template");
    for t in &config.templates {
        w.add_plus(1, &format!("Template Code: {}", config.template_code(t)));
        w.add_plus(2, &format!("Description: {}", config.template_description(t)));
        w.add_plus(2, &format!("Prescription mode: {}", config.prescription_mode(t)));
        w.add_plus(2, &format!("Drug: {}", config.drug_prefix));
        w.add_plus(2, &format!("Form: {}", t.form));
        w.add(2, "Main Form");
        w.add_plus(3, &format!("Route: {}", t.route.as_str()));
        w.add_plus(3, &format!("Dose: {}", t.dose));
        w.add_plus(3, &format!("Units: {}", t.units));
        w.add_plus(2, &format!("Frequency: {}", t.frequency));
    }
    w.add(0, "END");
    w.blank();

    // Rota Stage: CUT then CREATE
    w.add(0, "Rota Stage");
    w.add_plus(1, &format!("Stage Code: {}", config.stage_code(1)));
    w.add(2, "CUT");
    w.add(0, "END");

    let seq_list = config.seq_assignments();
    w.add(0, "Rota Stage");
    w.add(1, &format!("Stage Code: {}", config.stage_code(1)));
    w.add(2, "Non-Sequenced Templates");
    // Descending Seq order; alternates are excluded by default and point
    // back at the primary (Seq 0).
    let mut descending = seq_list.clone();
    descending.sort_by(|a, b| b.0.cmp(&a.0));
    for (seq, t) in &descending {
        w.add_plus(3, &format!("Seq: {seq}"));
        w.add_plus(4, &format!("Template: {}", config.template_code(t)));
        if *seq != 0 {
            w.add_plus(4, "Excluded by default: Y");
            w.add_plus(4, "Alternate to: 0");
        }
    }
    w.add_plus(
        2,
        &format!("In or Outpatient? (I/O): {}", config.inpatient_or_outpatient),
    );
    w.add(0, "END");
    w.blank();

    // Rota: CUT then CREATE
    w.add(0, "Rota");
    w.add(1, &format!("Rota Code: {}", config.drug_prefix));
    w.add(2, "CUT");
    w.add(0, "END");

    w.add(0, "Rota");
    w.add_plus(1, &format!("Rota Code: {}", config.drug_prefix));
    w.add_plus(2, &format!("Description: {}", config.drug_full_name));
    w.add(2, "Approval");
    w.add_plus(3, "Available: N");
    w.add_plus(3, "Default stage start time: 09:00");
    w.add_plus(3, &format!("Default cycles: {}", config.default_cycles));
    w.add_plus(3, &format!("Cycle delay: {}", config.cycle_delay));
    w.add_plus(3, &format!("Rota code: {}", config.document_code));
    w.add(2, "Stages");
    w.add_plus(3, "Seq: 0");
    w.add_plus(4, &format!("Description: {} stage 1", config.drug_full_name));
    w.add_plus(4, &format!("Rota stage: {}", config.stage_code(1)));
    w.add_plus(
        2,
        &format!(
            "Info URL: http://pics-client-web/static/PICS/Specialties/Oncology/{}.htm",
            config.doc_code_upper()
        ),
    );
    w.add(2, "Directorate overrides");
    w.add_plus(3, &format!("Directorate: {}", config.directorate));
    w.add_plus(4, "Available: Y");
    w.add(2, "Privilege required");
    w.add_plus(3, "Privilege to final authorise: CHDPRES!CHNURSE!PHARMFA");
    w.add_plus(2, "Authorise multiple stages?: Y");
    w.add(2, "Configuration notes");
    w.add_plus(3, &format!("Notes: Ticket number #{}", config.ticket_number));
    w.add(0, "END");
    w.blank();

    // Third Rota block: activation result warnings + result warnings
    w.add(0, "Rota");
    w.add(1, &format!("Rota Code: {}", config.drug_prefix));
    w.add(2, "Stages");
    w.add(3, "Seq: 0");

    w.add(4, "Activation Result warnings");
    w.add(5, "Investigations");
    let max_age = config.max_result_age();
    for bt in &config.blood_tests {
        w.add_plus(6, &format!("Investigation Code: {}", bt.test_code.as_str()));
        w.add_plus(6, &format!("Test: {}", bt.test_code.as_str()));
        w.add_plus(7, &format!("Maximum result age: {max_age}"));
        w.add(7, "No result warnings");
        w.add_plus(8, "Message code: ROTANORES");
        w.add_plus(9, "Severity: sysPassword");
    }
    w.add(5, "Conditions");
    write_conditions(&mut w, config);

    w.add(2, "Result warnings");
    w.add(3, "Investigations");
    w.add(4, "REORDER");
    for bt in &config.blood_tests {
        w.add_plus(4, &format!("Investigation Code: {}", bt.test_code.as_str()));
        w.add_plus(4, &format!("Test: {}", bt.test_code.as_str()));
        w.add_plus(5, &format!("Maximum result age: {max_age}"));
        w.add(5, "No result warnings");
        w.add_plus(6, "Message code: ROTANORES");
        w.add_plus(7, "Severity: sysPassword");
    }
    w.add(5, "Conditions");
    write_conditions(&mut w, config);
    w.add(0, "END");
    w.blank();

    // Rota Class
    w.add(0, "Rota Class");
    w.add(1, &format!("Class Code: {}", config.specialty_class));
    w.add(2, "Items");
    w.add_plus(3, &format!("Code: {}", config.drug_prefix));
    w.add_plus(4, &format!("Description: {}", config.drug_full_name));
    w.add_plus(4, "Rota/Rota group/Rota class: R");
    w.add_plus(4, &format!("Rota: {}", config.drug_prefix));
    w.add(0, "END");
    w.blank();

    w.finish()
}

/// Safety-result conditions, numbered in descending index order over the
/// canonical blood-test list.
fn write_conditions(w: &mut TxtWriter, config: &RotaConfig) {
    for i in (0..config.blood_tests.len()).rev() {
        let bt = &config.blood_tests[i];
        w.add_plus(6, &format!("Condition No: {i}"));
        w.add(7, "Levels");
        w.add_plus(8, &format!("Investigation Code: {}", bt.test_code.as_str()));
        w.add_plus(8, &format!("Test: {}", bt.test_code.as_str()));
        w.add_plus(9, &format!("Value: {}", bt.threshold_value));
        w.add_plus(9, &format!("Function: {}", bt.threshold_function.as_str()));
        w.add(7, "Messages");
        w.add_plus(8, &format!("Message code: {}", config.message_code(bt)));
        w.add_plus(9, "Severity: sysPassword");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BloodTest, DrugTemplate, Mode, Route, TestCode, ThresholdFn};

    fn template(dose: i64, mode: Mode, group: &str) -> DrugTemplate {
        DrugTemplate {
            drug_name: "DAROLUTAMIDE".to_string(),
            dose,
            units: "mg".to_string(),
            mode,
            frequency: "BD".to_string(),
            route: Route::Oral,
            form: "TAB".to_string(),
            timing_constraints: String::new(),
            first_dose_day: 1,
            final_dose_day: "U".to_string(),
            group: group.to_string(),
            fluid_type: String::new(),
            volume_ml: String::new(),
            infusion_duration: String::new(),
        }
    }

    fn blood_test(code: TestCode, value: i64, function: ThresholdFn) -> BloodTest {
        BloodTest {
            test_code: code,
            threshold_value: value,
            threshold_function: function,
            message_line1: format!("{} limit", code.as_str()),
            message_line3: "Contact prescriber.".to_string(),
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
            templates: vec![
                template(600, Mode::Tto, "1A"),
                template(300, Mode::Tto, "1"),
                template(600, Mode::Reg, "2"),
            ],
            blood_test_validity_days: 7,
            blood_tests: vec![
                blood_test(TestCode::Neuts, 1, ThresholdFn::Lt),
                blood_test(TestCode::Plats, 100, ThresholdFn::Lt),
                blood_test(TestCode::Bili, 20, ThresholdFn::Gt),
            ],
            rota_info_paragraphs: Vec::new(),
            warnings_paragraphs: Vec::new(),
        }
    }

    #[test]
    fn output_uses_crlf_only() {
        let out = generate_txt(&config());
        assert!(out.contains("\r\n"));
        assert!(!out.replace("\r\n", "").contains('\n'));
    }

    #[test]
    fn generation_is_idempotent() {
        let cfg = config();
        assert_eq!(generate_txt(&cfg), generate_txt(&cfg));
    }

    #[test]
    fn template_code_appears_in_cut_and_create() {
        let out = generate_txt(&config());
        let occurrences = out.matches("Template Code: DARO_Daro600BD_TTO").count();
        // Once in the CUT block, once in the CREATE block
        assert_eq!(occurrences, 2);
    }

    #[test]
    fn cut_block_precedes_create_block() {
        let out = generate_txt(&config());
        let cut = out.find("  CUT").unwrap();
        let create = out.find("Message target: sysACTION").unwrap();
        assert!(cut < create);
    }

    #[test]
    fn stage_sequences_descend_with_alternate_markers() {
        let out = generate_txt(&config());
        let seq2 = out.find("+     Seq: 2").unwrap();
        let seq1 = out.find("+     Seq: 1").unwrap();
        let seq0 = out.find("+     Seq: 0").unwrap();
        assert!(seq2 < seq1 && seq1 < seq0);
        assert_eq!(out.matches("Excluded by default: Y").count(), 2);
        assert_eq!(out.matches("Alternate to: 0").count(), 2);
    }

    #[test]
    fn conditions_listed_in_descending_order() {
        let out = generate_txt(&config());
        let c2 = out.find("Condition No: 2").unwrap();
        let c1 = out.find("Condition No: 1").unwrap();
        let c0 = out.find("Condition No: 0").unwrap();
        assert!(c2 < c1 && c1 < c0);
    }

    #[test]
    fn plus_marker_replaces_first_indent_column() {
        let out = generate_txt(&config());
        // Level 3 data line: '+' then 5 spaces = 6 columns total
        assert!(out.contains("+     Seq: 0"));
        // Level 2 structural line: plain 4-space indent
        assert!(out.contains("\r\n    Main Form\r\n"));
    }

    #[test]
    fn header_names_upload_path_and_ticket() {
        let out = generate_txt(&config());
        assert!(out.starts_with(";d L^P025ZA"));
        assert!(out.contains("#10350DARO.txt"));
        assert!(out.contains("Notes: Ticket number #10350"));
    }

    #[test]
    fn every_block_is_terminated() {
        let out = generate_txt(&config());
        assert_eq!(out.matches("\r\nEND").count(), 10);
    }
}
