//! Structured extraction from EPMA clinical info pages (HROTA*.htm).
//!
//! These Word-exported HTML pages carry named anchor sections and fixed-shape
//! tables, so extraction reads explicit boundaries instead of inferring them
//! from free text. Preferred over the PDF path when a page is available.
//!
//! Struck-through rows denote inactive/alternate entries and are skipped.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use crate::model::{BloodTest, DrugTemplate, Mode, Route, TestCode, ThresholdFn};

/// Everything extracted from one info page.
#[derive(Debug, Default)]
pub struct HtmlRota {
    pub rota_name: String,
    pub document_code: String,
    pub blood_tests: Vec<BloodTest>,
    pub validity_days: i64,
    pub iv_templates: Vec<DrugTemplate>,
    pub oral_templates: Vec<DrugTemplate>,
    pub rota_info: Vec<String>,
}

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SECTION_TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".msosectiontitle").unwrap());
static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static STRIKE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("s").unwrap());

static DOC_CODE_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:H-?ROTA\d+|[A-Z]ROTA\d+)").unwrap());
static DOSE_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\d.]+)\s*(mg|g|mcg|microgram|unit)").unwrap());
static VOLUME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*ml").unwrap());
static BSA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/m\s*[²2]|per\s*m\s*sq").unwrap());
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+(?:\.\d+)?\s*(?:hours?|hrs?|minutes?|mins?)").unwrap()
});
static PARENS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\(.*?\)").unwrap());
static NONSEQ_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)non.?sequenced").unwrap());

static VALIDITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[Vv]alidity of (?:platelets and neutrophils|FBC).*?=?\s*(\d+)\s*days?").unwrap()
});
static NEUTS_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^neutrophils?$").unwrap());
static PLATS_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^platelets?$").unwrap());
static LT_THRESHOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[≤<]\s*([\d.]+)").unwrap());
static UNITS_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[x×]\s*10|^/L|^\d+\s*$").unwrap());
static GFR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"GFR\s*[<≤]\s*(\d+)").unwrap());
static BILI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Bb]ilirubin\s*[>≥]\s*(\d+)").unwrap());
static ALT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"ALT\s*[>≥]\s*(\d+)").unwrap());

// ---------------------------------------------------------------------------
// Tree helpers
// ---------------------------------------------------------------------------

/// All elements of the document in document order.
fn all_elements(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

/// Index of an element within the document-order list.
fn position_of(elements: &[ElementRef<'_>], target: ElementRef<'_>) -> Option<usize> {
    elements.iter().position(|e| e.id() == target.id())
}

/// The `<a name=...>` anchor introducing a named section.
fn find_anchor<'a>(elements: &[ElementRef<'a>], name: &str) -> Option<ElementRef<'a>> {
    elements
        .iter()
        .find(|e| e.value().name() == "a" && e.value().attr("name") == Some(name))
        .copied()
}

fn is_named_anchor(e: ElementRef<'_>) -> bool {
    e.value().name() == "a" && e.value().attr("name").is_some()
}

/// Clean text from a table cell, dropping struck-through (`<s>`) content.
fn cell_text(td: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in td.descendants() {
        if let Node::Text(t) = node.value() {
            let struck = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map(|e| e.name() == "s")
                    .unwrap_or(false)
            });
            if !struck {
                out.push(' ');
                out.push_str(t);
            }
        }
    }
    let text = WHITESPACE.replace_all(out.trim(), " ").trim().to_string();
    match text.as_str() {
        "" | "-" | "\u{2013}" | "\u{2014}" => String::new(),
        _ => text,
    }
}

/// True if the majority of this row's cells are struck through.
fn row_is_strikethrough(tr: ElementRef<'_>) -> bool {
    let tds: Vec<_> = tr.select(&TD_SEL).collect();
    if tds.is_empty() {
        return false;
    }
    let struck = tds
        .iter()
        .filter(|td| td.select(&STRIKE_SEL).next().is_some())
        .count();
    struck * 2 >= tds.len()
}

/// Flattened text of all nodes between a named anchor and the next one,
/// one line per text node.
fn section_text(elements: &[ElementRef<'_>], anchor_name: &str) -> String {
    let Some(anchor) = find_anchor(elements, anchor_name) else {
        return String::new();
    };
    let start = position_of(elements, anchor).unwrap_or(0);
    let mut out = String::new();
    for e in &elements[start + 1..] {
        if is_named_anchor(*e) && e.value().attr("name") != Some(anchor_name) {
            break;
        }
        for child in e.children() {
            if let Node::Text(t) = child.value() {
                let line = t.trim();
                if !line.is_empty() {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Cell-value parsers
// ---------------------------------------------------------------------------

/// Parse a dose cell like "375mg/m²/500ml" or "1g": value in mg plus units.
/// The volume component is extracted separately.
fn parse_dose_cell(raw: &str) -> (i64, String) {
    let part = raw.split('/').next().unwrap_or("").trim();
    if let Some(cap) = DOSE_PART.captures(part) {
        let val: f64 = cap[1].parse().unwrap_or(0.0);
        let unit = cap[2].to_lowercase().replace("microgram", "mcg");
        if unit == "g" {
            return ((val * 1000.0) as i64, "mg".to_string());
        }
        return (val as i64, unit);
    }
    (0, "mg".to_string())
}

fn parse_day_cell(raw: &str) -> i64 {
    DIGITS_RE
        .find(raw)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1)
}

fn parse_final_day_cell(raw: &str) -> String {
    if raw.is_empty() || raw.eq_ignore_ascii_case("u") || raw.eq_ignore_ascii_case("until") {
        return "U".to_string();
    }
    DIGITS_RE
        .find(raw)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "U".to_string())
}

fn normalize_route(raw: &str) -> Route {
    match raw {
        "PO" | "ORAL" => Route::Oral,
        "SC" | "S/C" | "SUBCUT" => Route::Sc,
        "IM" => Route::Im,
        // IVB / IV BOLUS and anything unrecognized in an infusion column
        _ => Route::Iv,
    }
}

// ---------------------------------------------------------------------------
// Section extractors
// ---------------------------------------------------------------------------

/// Rota name and document code from the title area.
fn parse_header(doc: &Html) -> (String, String) {
    let mut rota_name = "UNKNOWN".to_string();
    let mut doc_code = "UNKNOWN".to_string();
    for title in doc.select(&SECTION_TITLE_SEL) {
        let text = WHITESPACE
            .replace_all(title.text().collect::<String>().trim(), " ")
            .to_string();
        if DOC_CODE_TITLE.is_match(&text) {
            doc_code = text;
        } else if !text.is_empty() && rota_name == "UNKNOWN" {
            rota_name = text;
        }
    }
    (rota_name, doc_code)
}

/// Scan keyword lines in the tests section: keyword line, then a threshold
/// within a short lookahead, then an action sentence that is not a units
/// fragment.
fn find_threshold_and_action(
    lines: &[&str],
    keyword: &Regex,
) -> Option<(String, String)> {
    for (i, line) in lines.iter().enumerate() {
        if !keyword.is_match(line) {
            continue;
        }
        for j in (i + 1)..(i + 5).min(lines.len()) {
            if let Some(cap) = LT_THRESHOLD.captures(lines[j]) {
                let mut action = "Contact prescriber.".to_string();
                for k in (j + 1)..(j + 4).min(lines.len()) {
                    let candidate = lines[k];
                    if !candidate.is_empty() && !UNITS_FRAGMENT.is_match(candidate) {
                        action = format!("{}.", candidate.trim_end_matches('.'));
                        break;
                    }
                }
                return Some((cap[1].to_string(), action));
            }
        }
    }
    None
}

/// Blood test proceed rules plus the validity window from the tests section.
fn parse_blood_tests(elements: &[ElementRef<'_>]) -> (Vec<BloodTest>, i64) {
    let text = section_text(elements, "tests");
    if text.is_empty() {
        return (Vec::new(), 7);
    }

    let validity_days = VALIDITY_RE
        .captures(&text)
        .and_then(|cap| cap[1].parse().ok())
        .unwrap_or(7);

    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let mut tests = Vec::new();

    if let Some((raw, action)) = find_threshold_and_action(&lines, &NEUTS_LINE) {
        let val: f64 = raw.parse().unwrap_or(0.0);
        tests.push(BloodTest {
            test_code: TestCode::Neuts,
            threshold_value: val as i64,
            threshold_function: ThresholdFn::Lt,
            message_line1: format!("Neuts < {raw} x 10 9/L"),
            message_line3: action,
        });
    }
    if let Some((raw, action)) = find_threshold_and_action(&lines, &PLATS_LINE) {
        let val = raw.parse::<f64>().unwrap_or(0.0) as i64;
        tests.push(BloodTest {
            test_code: TestCode::Plats,
            threshold_value: val,
            threshold_function: ThresholdFn::Lt,
            message_line1: format!("Plts < {val} x 10^9/L"),
            message_line3: action,
        });
    }
    if let Some(cap) = GFR_RE.captures(&text) {
        let val: i64 = cap[1].parse().unwrap_or(0);
        tests.push(BloodTest {
            test_code: TestCode::Gfr,
            threshold_value: val,
            threshold_function: ThresholdFn::Lt,
            message_line1: format!("GFR < {val}mL/min"),
            message_line3: "Contact prescriber.".to_string(),
        });
    }
    if let Some(cap) = BILI_RE.captures(&text) {
        let val: i64 = cap[1].parse().unwrap_or(0);
        tests.push(BloodTest {
            test_code: TestCode::Bili,
            threshold_value: val,
            threshold_function: ThresholdFn::Gt,
            message_line1: format!("Bilirubin > {val} umol/L"),
            message_line3: "Contact prescriber.".to_string(),
        });
    }
    if let Some(cap) = ALT_RE.captures(&text) {
        let val: i64 = cap[1].parse().unwrap_or(0);
        tests.push(BloodTest {
            test_code: TestCode::Alt,
            threshold_value: val,
            threshold_function: ThresholdFn::Gt,
            message_line1: format!("ALT > {val} U/L"),
            message_line3: "Contact prescriber.".to_string(),
        });
    }

    tests.sort_by_key(|t| t.test_code);
    (tests, validity_days)
}

/// First table after `start` whose third row has at least `min_cols` cells.
fn find_table<'a>(
    elements: &[ElementRef<'a>],
    start: usize,
    min_cols: usize,
) -> Option<ElementRef<'a>> {
    elements[start + 1..]
        .iter()
        .filter(|e| e.value().name() == "table")
        .take(3)
        .find(|t| {
            let rows: Vec<_> = t.select(&TR_SEL).collect();
            rows.len() > 2 && rows[2].select(&TD_SEL).count() >= min_cols
        })
        .copied()
}

/// The chemotherapy treatment table: injectable IV/SC schedule rows.
fn parse_chemo_table(elements: &[ElementRef<'_>]) -> Vec<DrugTemplate> {
    let Some(anchor) = find_anchor(elements, "treatment") else {
        return Vec::new();
    };
    let start = position_of(elements, anchor).unwrap_or(0);

    // Bold CHEMOTHERAPY heading within the treatment section
    let mut heading_pos = None;
    for (offset, e) in elements[start + 1..].iter().enumerate() {
        if is_named_anchor(*e) && e.value().attr("name") != Some("treatment") {
            break;
        }
        let name = e.value().name();
        if matches!(name, "b" | "strong" | "p")
            && e.text().collect::<String>().trim().to_uppercase() == "CHEMOTHERAPY"
        {
            heading_pos = Some(start + 1 + offset);
            break;
        }
    }
    let Some(heading_pos) = heading_pos else {
        return Vec::new();
    };
    let Some(table) = find_table(elements, heading_pos, 8) else {
        return Vec::new();
    };

    let mut templates = Vec::new();
    let rows: Vec<_> = table.select(&TR_SEL).collect();
    // First two rows are headers
    for tr in rows.iter().skip(2) {
        if row_is_strikethrough(*tr) {
            continue;
        }
        let tds: Vec<_> = tr.select(&TD_SEL).collect();
        if tds.len() < 7 {
            continue;
        }

        // Columns: 0=Stage day, 2=Drug/Diluent, 4=Dose/Vol, 5=Rate,
        // 6=Route, 7=Special directions, last=Seq label
        let day_raw = cell_text(tds[0]);
        let drug_raw = cell_text(tds[2]);
        let dose_raw = tds.get(4).map(|td| cell_text(*td)).unwrap_or_default();
        let rate_raw = tds.get(5).map(|td| cell_text(*td)).unwrap_or_default();
        let route_raw = tds.get(6).map(|td| cell_text(*td)).unwrap_or_default();
        let special_raw = tds.get(7).map(|td| cell_text(*td)).unwrap_or_default();
        let seq_label = tds.last().map(|td| cell_text(*td)).unwrap_or_default();

        if drug_raw.is_empty() || seq_label.is_empty() {
            continue;
        }

        // Drug name precedes the diluent after '/'; brand names in
        // parentheses are dropped, e.g. "Rituximab (RIXATHON)"
        let drug_name = PARENS_RE
            .replace_all(drug_raw.split('/').next().unwrap_or("").trim(), "")
            .trim()
            .to_uppercase();

        let (dose, units) = parse_dose_cell(&dose_raw);
        let volume = VOLUME_RE
            .captures(&dose_raw)
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let bsa = BSA_RE.is_match(&dose_raw);
        let route = normalize_route(&route_raw.to_uppercase());

        let duration = DURATION_RE
            .find(&rate_raw)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let mut timing_parts: Vec<String> = Vec::new();
        if !duration.is_empty() {
            timing_parts.push(format!("{duration} infusion"));
        }
        if !special_raw.is_empty() {
            timing_parts.push(special_raw);
        }
        if bsa {
            timing_parts.push("dose per m² - confirm BSA calculation".to_string());
        }

        let first_day = parse_day_cell(&day_raw);
        templates.push(DrugTemplate {
            drug_name,
            dose,
            units,
            mode: Mode::Reg,
            frequency: "OD".to_string(),
            route,
            form: "INJ".to_string(),
            timing_constraints: timing_parts.join(", "),
            first_dose_day: first_day,
            final_dose_day: first_day.to_string(),
            group: seq_label,
            fluid_type: String::new(),
            volume_ml: volume,
            infusion_duration: duration,
        });
    }
    templates
}

/// The NON-SEQUENCED table: oral/other drug templates with TTO/REG modes.
fn parse_nonseq_table(elements: &[ElementRef<'_>]) -> Vec<DrugTemplate> {
    let heading_pos = elements.iter().position(|e| {
        matches!(e.value().name(), "b" | "strong" | "p")
            && NONSEQ_HEADING_RE.is_match(e.text().collect::<String>().trim())
    });
    let Some(heading_pos) = heading_pos else {
        return Vec::new();
    };
    let Some(table) = find_table(elements, heading_pos, 10) else {
        return Vec::new();
    };

    let mut templates = Vec::new();
    let rows: Vec<_> = table.select(&TR_SEL).collect();
    for tr in rows.iter().skip(2) {
        if row_is_strikethrough(*tr) {
            continue;
        }
        let tds: Vec<_> = tr.select(&TD_SEL).collect();
        if tds.len() < 10 {
            continue;
        }

        // Columns: 0=Drug, 1=Dose, 2=Mode, 3=Freq, 4=Constraints, 5=Route,
        // 6=Form, 8=First day, 10=Final day, 12=Group
        let drug_raw = cell_text(tds[0]).to_uppercase();
        let dose_raw = cell_text(tds[1]);
        let mode_raw = cell_text(tds[2]).to_uppercase();
        let freq_raw = cell_text(tds[3]).to_uppercase();
        let constraints_raw = cell_text(tds[4]);
        let route_raw = cell_text(tds[5]).to_uppercase();
        let form_raw = cell_text(tds[6]);
        let first_day_raw = tds.get(8).map(|td| cell_text(*td)).unwrap_or_default();
        let final_day_raw = tds.get(10).map(|td| cell_text(*td)).unwrap_or_default();
        let group_raw = tds.get(12).map(|td| cell_text(*td)).unwrap_or_default();

        if drug_raw.is_empty() || mode_raw.is_empty() {
            continue;
        }

        let (dose, units) = parse_dose_cell(&dose_raw);
        let route = match route_raw.as_str() {
            "PO" | "ORAL" | "" => Route::Oral,
            "SC" | "S/C" => Route::Sc,
            "IV" | "IVB" => Route::Iv,
            "IM" => Route::Im,
            _ => Route::Oral,
        };
        let mode = match mode_raw.as_str() {
            "TTO" | "T" | "OUT" => Mode::Tto,
            _ => Mode::Reg,
        };
        let form = if form_raw.is_empty() {
            if route == Route::Oral { "Tab" } else { "Inj" }.to_string()
        } else {
            title_case(&form_raw)
        };

        templates.push(DrugTemplate {
            drug_name: drug_raw,
            dose,
            units,
            mode,
            frequency: if freq_raw.is_empty() {
                "OD".to_string()
            } else {
                freq_raw
            },
            route,
            form,
            timing_constraints: constraints_raw,
            first_dose_day: parse_day_cell(&first_day_raw),
            final_dose_day: parse_final_day_cell(&final_day_raw),
            group: group_raw,
            fluid_type: String::new(),
            volume_ml: String::new(),
            infusion_duration: String::new(),
        });
    }
    templates
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Free-text paragraphs from the precautions/continue/support sections,
/// skipping navigation bars and boilerplate.
fn parse_rota_info(elements: &[ElementRef<'_>]) -> Vec<String> {
    let mut paragraphs = Vec::new();
    for anchor_name in ["precautions", "continue", "support"] {
        let Some(anchor) = find_anchor(elements, anchor_name) else {
            continue;
        };
        let start = position_of(elements, anchor).unwrap_or(0);
        for e in &elements[start + 1..] {
            if is_named_anchor(*e) && e.value().attr("name") != Some(anchor_name) {
                break;
            }
            if e.value().name() != "p" {
                continue;
            }
            let text = WHITESPACE
                .replace_all(e.text().collect::<String>().trim(), " ")
                .trim()
                .to_string();
            let lower = text.to_lowercase();
            if !text.is_empty()
                && lower != "nothing entered"
                && lower != "top"
                && text.matches('|').count() < 3
            {
                paragraphs.push(text);
            }
        }
    }
    paragraphs
}

/// Parse a full info page into its structured parts.
pub fn parse_html_rota(html: &str) -> HtmlRota {
    let doc = Html::parse_document(html);
    let elements = all_elements(&doc);

    let (rota_name, document_code) = parse_header(&doc);
    let (blood_tests, validity_days) = parse_blood_tests(&elements);
    let iv_templates = parse_chemo_table(&elements);
    let oral_templates = parse_nonseq_table(&elements);
    let rota_info = parse_rota_info(&elements);

    HtmlRota {
        rota_name,
        document_code,
        blood_tests,
        validity_days,
        iv_templates,
        oral_templates,
        rota_info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chemo_page() -> String {
        let mut rows = String::new();
        rows.push_str(
            "<tr><td>Stage day</td><td>Time</td><td>Drug</td><td>Round</td><td>Dose</td>\
             <td>Rate</td><td>Route</td><td>Special</td><td>Seq</td></tr>",
        );
        rows.push_str(
            "<tr><td>Stage day</td><td>Time</td><td>Drug</td><td>Round</td><td>Dose</td>\
             <td>Rate</td><td>Route</td><td>Special</td><td>Seq</td></tr>",
        );
        rows.push_str(
            "<tr><td>1</td><td></td><td>Rituximab (RIXATHON) / N Saline</td><td>380mg</td>\
             <td>375mg/m2/500ml</td><td>4 hours</td><td>IV</td><td>Give first</td><td>1A</td></tr>",
        );
        rows.push_str(
            "<tr><td><s>1</s></td><td><s></s></td><td><s>Rituximab</s></td><td><s>100mg</s></td>\
             <td><s>100mg</s></td><td><s>1 hr</s></td><td><s>IV</s></td><td><s>x</s></td><td><s>1</s></td></tr>",
        );
        format!(
            "<html><body>\
             <p class=\"msosectiontitle\">R-CHOP 21</p>\
             <p class=\"msosectiontitle\">HROTA448</p>\
             <a name=\"treatment\"></a><p><b>CHEMOTHERAPY</b></p>\
             <table>{rows}</table>\
             <a name=\"tests\"></a>\
             <p>Validity of FBC = 7 days</p>\
             <p>Neutrophils</p><p>&lt; 1.0</p><p>x 10</p><p>Contact prescriber</p>\
             <p>Platelets</p><p>&lt; 100</p><p>Discuss with consultant.</p>\
             <p>Bilirubin &gt; 20</p>\
             <a name=\"precautions\"></a>\
             <p>Top</p><p>Pre-hydration is required before each cycle.</p>\
             </body></html>"
        )
    }

    #[test]
    fn header_separates_name_and_code() {
        let rota = parse_html_rota(&chemo_page());
        assert_eq!(rota.rota_name, "R-CHOP 21");
        assert_eq!(rota.document_code, "HROTA448");
    }

    #[test]
    fn chemo_table_row_parsed_with_brand_stripped() {
        let rota = parse_html_rota(&chemo_page());
        assert_eq!(rota.iv_templates.len(), 1);
        let t = &rota.iv_templates[0];
        assert_eq!(t.drug_name, "RITUXIMAB");
        assert_eq!(t.dose, 375);
        assert_eq!(t.volume_ml, "500");
        assert_eq!(t.route, Route::Iv);
        assert_eq!(t.infusion_duration, "4 hours");
        assert_eq!(t.group, "1A");
        assert!(t.timing_constraints.contains("Give first"));
        assert!(t.timing_constraints.contains("confirm BSA"));
    }

    #[test]
    fn strikethrough_rows_are_skipped() {
        let rota = parse_html_rota(&chemo_page());
        // The struck-through alternate row is not extracted
        assert_eq!(rota.iv_templates.len(), 1);
    }

    #[test]
    fn tests_section_thresholds_with_actions() {
        let rota = parse_html_rota(&chemo_page());
        let codes: Vec<&str> = rota
            .blood_tests
            .iter()
            .map(|t| t.test_code.as_str())
            .collect();
        assert_eq!(codes, vec!["NEUTS", "PLATS", "BILI"]);
        assert_eq!(rota.blood_tests[0].threshold_value, 1);
        assert_eq!(rota.blood_tests[0].message_line3, "Contact prescriber.");
        assert_eq!(rota.blood_tests[1].message_line3, "Discuss with consultant.");
        assert_eq!(rota.blood_tests[2].threshold_function, ThresholdFn::Gt);
        assert_eq!(rota.validity_days, 7);
    }

    #[test]
    fn rota_info_skips_boilerplate() {
        let rota = parse_html_rota(&chemo_page());
        assert_eq!(
            rota.rota_info,
            vec!["Pre-hydration is required before each cycle."]
        );
    }

    fn nonseq_page() -> String {
        let header = "<tr>".to_string()
            + &"<td>h</td>".repeat(13)
            + "</tr>";
        format!(
            "<html><body><p><b>NON-SEQUENCED</b></p>\
             <table>{header}{header}\
             <tr><td>Allopurinol</td><td>300mg</td><td>TTO</td><td>OD</td><td></td>\
             <td>PO</td><td>tab</td><td>-</td><td>1</td><td></td><td>14</td><td></td><td>2A</td></tr>\
             <tr><td>Dexamethasone</td><td>1g</td><td>REG</td><td>BD</td><td>With food</td>\
             <td>PO</td><td></td><td>-</td><td>2</td><td></td><td>U</td><td></td><td>3</td></tr>\
             </table></body></html>",
            header = header
        )
    }

    #[test]
    fn nonseq_table_rows_parsed() {
        let rota = parse_html_rota(&nonseq_page());
        assert_eq!(rota.oral_templates.len(), 2);

        let a = &rota.oral_templates[0];
        assert_eq!(a.drug_name, "ALLOPURINOL");
        assert_eq!(a.dose, 300);
        assert_eq!(a.mode, Mode::Tto);
        assert_eq!(a.route, Route::Oral);
        assert_eq!(a.form, "Tab");
        assert_eq!(a.first_dose_day, 1);
        assert_eq!(a.final_dose_day, "14");
        assert_eq!(a.group, "2A");

        let b = &rota.oral_templates[1];
        assert_eq!(b.dose, 1000, "grams normalize to milligrams");
        assert_eq!(b.mode, Mode::Reg);
        assert_eq!(b.final_dose_day, "U");
        assert_eq!(b.form, "Tab", "empty form defaults by route");
    }

    #[test]
    fn missing_sections_yield_empty_parts() {
        let rota = parse_html_rota("<html><body><p>nothing</p></body></html>");
        assert!(rota.iv_templates.is_empty());
        assert!(rota.oral_templates.is_empty());
        assert!(rota.blood_tests.is_empty());
        assert_eq!(rota.validity_days, 7);
        assert_eq!(rota.rota_name, "UNKNOWN");
    }
}
