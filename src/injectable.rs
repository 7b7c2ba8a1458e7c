//! Injectable-table parsing for IV/MIXED rotas.
//!
//! Scanned IV tables arrive as noisy OCR text, so these parsers are
//! deliberately conservative: a dose is read from the drug's own row only, and
//! a value that cannot be read is kept as 0 with an explicit review flag
//! rather than guessed from a neighbouring row.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{DrugTemplate, Mode, Route};

/// Known injectable chemotherapy drug names, as printed on rotas.
/// ACALABRUTINIB is an oral capsule and intentionally absent.
pub const IV_DRUG_NAMES: &[&str] = &[
    "FLUDARABINE",
    "CYTARABINE",
    "GEMCITABINE",
    "OXALIPLATIN",
    "BENDAMUSTINE",
    "RITUXIMAB",
    "CYCLOPHOSPHAMIDE",
    "IFOSFAMIDE",
    "DOXORUBICIN",
    "EPIRUBICIN",
    "BLEOMYCIN",
    "VINCRISTINE",
    "VINBLASTINE",
    "ETOPOSIDE",
    "CARBOPLATIN",
    "CISPLATIN",
    "PACLITAXEL",
    "DOCETAXEL",
    "IDARUBICIN",
    "DAUNORUBICIN",
    "MITOXANTRONE",
    "CARFILZOMIB",
    "BORTEZOMIB",
    "METHOTREXATE",
    "MESNA",
    "OFATUMUMAB",
    "OBINUTUZUMAB",
    "ARSENIC TRIOXIDE",
    "ARSENIC",
    "INOTUZUMAB",
    "AMSACRINE",
    "CLOFARABINE",
    "NELARABINE",
    "ATG",
    "ANTITHYMOCYTE",
    "METHYLPREDNISOLONE",
    "HYDROCORTISONE",
    "DARATUMUMAB",
    "ISATUXIMAB",
    "VENETOCLAX",
    "IBRUTINIB",
];

/// Longest-first ordering so "ARSENIC TRIOXIDE" matches before "ARSENIC".
static IV_DRUG_NAMES_SORTED: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let mut names = IV_DRUG_NAMES.to_vec();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    names
});

/// Narrative phrases that mention a drug without prescribing it, e.g.
/// "Two cycles alternating R-CODOX-M and R-IVAC followed by Rituximab".
static NARRATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:alternating|followed\s+by|further\s+doses?\s+of|prior\s+to|instead\s+of|pre[- ](?:medication|treatment)|two\s+cycles|subsequent\s+doses?|is\s+given\s+(?:on|as|with)|are\s+given\s+(?:on|as|with))\b",
    )
    .unwrap()
});

static DOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // OCR renders m² as m?, m", m2, /m sq and similar
    Regex::new(
        r#"(?i)(\d+(?:\.\d+)?)\s*(mg|g|mcg|microgram)s?(?:\s*/\s*m\s*[²2?"']|\s*/m(?:sq|2)|\s*/m\b)?"#,
    )
    .unwrap()
});
static BSA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)/m\s*[²2?"']|/m(?:sq|2)|/m\b"#).unwrap());
static SC_ROUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsubcutaneous\b|\bs/c\b|\bsc\s+inj\b|\bsc\s+injection\b").unwrap()
});
static FLUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"N/[Ss]aline|0\.9%\s*(?:NaCl|Sodium\s*Chloride)|[Dd]extrose\s*5%|D5W|Glucose\s*5%|Hartmann'?s?",
    )
    .unwrap()
});
static SALINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bSALINE\b").unwrap());
static VOLUME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{2,4})\s*ml\b").unwrap());
static HOURS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+(?:\.\d+)?\s*(?:hours?|hrs?)").unwrap());
static MINUTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+\s*(?:minutes?|mins?)").unwrap());
static DAY_RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Dd]ays?\s*(\d+)(?:\s*[-–]\s*(\d+))?").unwrap());
static HOURS_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d+(?:\.\d+)?\s*(?:hours?|hrs?)\s+after\s+(?:start\s+of\s+)?\w+").unwrap()
});

/// Clamp a byte index down to the nearest char boundary.
fn floor_boundary(s: &str, mut i: usize) -> usize {
    i = i.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Find a known injectable drug name in a line, rejecting names embedded in
/// an unrelated word (e.g. "pre-rituximab" must not match RITUXIMAB).
fn match_drug(line_upper: &str) -> Option<&'static str> {
    for drug in IV_DRUG_NAMES_SORTED.iter() {
        for (pos, _) in line_upper.match_indices(drug) {
            let preceded = line_upper[..pos]
                .chars()
                .last()
                .map(|c| c.is_ascii_alphabetic() || c == '-')
                .unwrap_or(false);
            if !preceded {
                return Some(drug);
            }
        }
    }
    None
}

/// Parse a dose string fragment: value, unit-normalized (g converted to mg),
/// and whether the dose is BSA-based (per m²).
fn parse_dose(context: &str) -> (i64, String, bool) {
    let Some(m) = DOSE_RE.captures(context) else {
        return (0, "mg".to_string(), false);
    };
    let raw: f64 = m[1].trim_end_matches('.').parse().unwrap_or(0.0);
    let mut units = m[2].to_lowercase().replace("microgram", "mcg");
    let dose = if units == "g" {
        units = "mg".to_string();
        (raw * 1000.0) as i64
    } else {
        raw as i64
    };
    let whole = m.get(0).unwrap();
    let start = floor_boundary(context, whole.start().saturating_sub(5));
    let end = floor_boundary(context, whole.end() + 15);
    let bsa = BSA_RE.is_match(&context[start..end]);
    (dose, units, bsa)
}

/// Extract injectable drug templates from a rota drug table.
///
/// Scans line-by-line for known drug names (longest-first), deduplicates by
/// drug (first table occurrence wins), and reads dose/route/fluid/volume/
/// duration/day-range from tightly scoped context windows. Drugs whose dose
/// cannot be read are kept with dose 0 and a review flag in the timing
/// constraints. Groups are assigned "1A", "2A", ... in encounter order.
pub fn parse_injectable_table(text: &str) -> Vec<DrugTemplate> {
    let lines: Vec<&str> = text.lines().collect();
    let mut found: Vec<DrugTemplate> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let line_upper = line.to_uppercase();
        let Some(drug) = match_drug(&line_upper) else {
            continue;
        };
        if found.iter().any(|t| t.drug_name == drug) {
            continue;
        }
        if NARRATIVE.is_match(line) {
            continue;
        }

        // Fluid/volume may sit on the diluent row next to the drug row.
        let ctx_start = i.saturating_sub(1);
        let ctx_end = (i + 3).min(lines.len());
        let context = lines[ctx_start..ctx_end].join(" ");

        // Dose, route and duration come from the drug's own row only: the
        // next line is the NEXT drug's row in sequential tables, and a
        // missing value is safer than a neighbour's value.
        let curr_line = lines[i];
        let day_ctx = lines[i..(i + 2).min(lines.len())].join(" ");

        let (dose, units, bsa) = parse_dose(curr_line);

        let route = if SC_ROUTE_RE.is_match(curr_line) {
            Route::Sc
        } else {
            Route::Iv
        };

        let mut fluid = String::new();
        if route == Route::Iv {
            if let Some(m) = FLUID_RE.find(&context) {
                fluid = m.as_str().to_string();
            } else if SALINE_RE.is_match(&context) {
                fluid = "N/Saline".to_string();
            }
        }

        let volume = if route == Route::Iv {
            VOLUME_RE
                .captures(&context)
                .map(|c| c[1].to_string())
                .unwrap_or_default()
        } else {
            String::new()
        };

        let duration = HOURS_RE
            .find(curr_line)
            .or_else(|| MINUTES_RE.find(curr_line))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let (first_day, last_day) = match DAY_RANGE_RE.captures(&day_ctx) {
            Some(cap) => {
                let first: i64 = cap[1].parse().unwrap_or(1);
                let last = cap
                    .get(2)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| first.to_string());
                (first, last)
            }
            None => (1, "1".to_string()),
        };

        let mut timing_parts: Vec<String> = Vec::new();
        if dose == 0 {
            timing_parts
                .push("DOSE UNKNOWN - could not read dose, check original rota".to_string());
        }
        if !duration.is_empty() {
            timing_parts.push(format!("{duration} infusion"));
        }
        if let Some(m) = HOURS_AFTER_RE.find(&context) {
            timing_parts.push(m.as_str().trim().to_string());
        }
        if bsa {
            timing_parts.push("dose per m² - confirm BSA calculation".to_string());
        }

        let group = format!("{}A", found.len() + 1);
        found.push(DrugTemplate {
            drug_name: drug.to_string(),
            dose,
            units,
            mode: Mode::Reg,
            frequency: "OD".to_string(),
            route,
            form: "INJ".to_string(),
            timing_constraints: timing_parts.join(", "),
            first_dose_day: first_day,
            final_dose_day: last_day,
            group,
            fluid_type: fluid,
            volume_ml: volume,
            infusion_duration: duration,
        });
    }

    found
}

// ---------------------------------------------------------------------------
// Support therapy ("Additional Therapy" section)
// ---------------------------------------------------------------------------

static ADDITIONAL_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Additional\s+[Tt]herap(?:y|ies)").unwrap());
static SECTION_STOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\n(?:Blood\s*[Tt]ests|BLOOD\s*TESTS|Further\s*[Ii]nformation|Administration|Monitoring|Special\s*[Pp]recautions|Warnings?)",
    )
    .unwrap()
});
static SUPPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^([A-Za-z][\w\-]+)\s+(?:po\s+)*(\d+(?:\.\d+)?)\s*(mg|g|mcg)\s+(daily|od|bd|tds|qds|once\s+daily|twice\s+daily|three\s+times\s+daily|four\s+times\s+daily)\s*(?:for\s+[\d/]+\w*\s*(?:then\s+\w+)?\s*)?,?\s*(?:days?\s*(\d+)(?:\s*[-–]\s*(\d+))?)?",
    )
    .unwrap()
});

const FREQ_MAP: &[(&str, &str)] = &[
    ("daily", "OD"),
    ("od", "OD"),
    ("once daily", "OD"),
    ("bd", "BD"),
    ("twice daily", "BD"),
    ("tds", "TDS"),
    ("three times", "TDS"),
    ("qds", "QDS"),
    ("four times", "QDS"),
];

/// Parse oral support medications from the bounded "Additional Therapy"
/// section, e.g. "Prednisolone po 100mg daily days 2-5". Emits TTO oral
/// templates group-numbered from `group_start` so they continue the sequence
/// started by the injectable table.
pub fn parse_support_therapy(text: &str, group_start: usize) -> Vec<DrugTemplate> {
    let Some(m) = ADDITIONAL_HEADING.find(text) else {
        return Vec::new();
    };
    let mut section = &text[m.end()..];
    if let Some(stop) = SECTION_STOP.find(section) {
        section = &section[..stop.start()];
    }

    let mut templates = Vec::new();
    let mut group_n = group_start;

    for line in section.lines() {
        let line = line.trim().trim_start_matches('/').trim();
        if line.len() < 8 {
            continue;
        }
        let Some(cap) = SUPPORT_LINE.captures(line) else {
            continue;
        };

        let drug = cap[1].to_uppercase();
        let dose_raw: f64 = cap[2].parse().unwrap_or(0.0);
        let mut units = cap[3].to_lowercase();
        let dose = if units == "g" {
            units = "mg".to_string();
            (dose_raw * 1000.0) as i64
        } else {
            dose_raw as i64
        };

        let freq_raw = cap[4].to_lowercase();
        let freq = FREQ_MAP
            .iter()
            .find(|(k, _)| freq_raw.contains(k))
            .map(|(_, v)| *v)
            .unwrap_or("OD");

        let first_day: i64 = cap
            .get(5)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(1);
        let last_day = cap
            .get(6)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| first_day.to_string());

        templates.push(DrugTemplate {
            drug_name: drug,
            dose,
            units,
            mode: Mode::Tto,
            frequency: freq.to_string(),
            route: Route::Oral,
            form: "Tab".to_string(),
            timing_constraints: String::new(),
            first_dose_day: first_day,
            final_dose_day: last_day,
            group: format!("{group_n}A"),
            fluid_type: String::new(),
            volume_ml: String::new(),
            infusion_duration: String::new(),
        });
        group_n += 1;
    }

    templates
}

// ---------------------------------------------------------------------------
// Rota name inference
// ---------------------------------------------------------------------------

/// Curated rota abbreviations. Longer compound names precede the shorter
/// prefixes they contain so nesting can be detected.
const ROTA_ABBREVIATIONS: &[&str] = &[
    "FLAG",
    "BEACOPP",
    "BEACOP",
    "R-CHOP",
    "RCHOP",
    "R-CHOEP",
    "CHOEP",
    "R-CODOX-M",
    "R-CODOX",
    "CODOX-M",
    "CODOX",
    "R-IVAC",
    "IVAC",
    "ABVD",
    "GemOx",
    "GEMOX",
    "D-VTD",
    "VTD",
    "CarLenDex",
    "CARLENDEX",
    "DHAP",
    "FLAMSA",
    "BuCy",
    "BEAM",
    "ESHAP",
];

static ABBR_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    ROTA_ABBREVIATIONS
        .iter()
        .map(|abbr| {
            let pattern = format!(r"(?i)\b{}(?:\s+(\d+))?\b", regex::escape(abbr));
            (*abbr, Regex::new(&pattern).unwrap())
        })
        .collect()
});

static COMPARISON_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bvs\b|\bversus\b|\bv\b|\btrial\b|\bstudy\b|\bve\b").unwrap()
});
static PATIENT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[Pp]atient\s+label\s*[:\-]\s*([A-Z][A-Za-z0-9\- ]+)").unwrap());

struct AbbrSpan {
    abbr: &'static str,
    start: usize,
    end: usize,
    suffix: String,
}

/// Collect all valid abbreviation spans in a text region. A match followed
/// within a short window by a comparison word ("vs", "trial", ...) names a
/// study arm, not this rota, and is rejected.
fn collect_spans(search_text: &str) -> Vec<AbbrSpan> {
    let mut spans = Vec::new();
    for (abbr, re) in ABBR_PATTERNS.iter() {
        for cap in re.captures_iter(search_text) {
            let whole = cap.get(0).unwrap();
            let window_end = floor_boundary(search_text, whole.end() + 40);
            if COMPARISON_WORDS.is_match(&search_text[whole.end()..window_end]) {
                continue;
            }
            spans.push(AbbrSpan {
                abbr,
                start: whole.start(),
                end: whole.end(),
                suffix: cap.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
            });
        }
    }
    spans
}

/// Pick the abbreviation with the most non-nested matches. A span strictly
/// contained in a longer span (e.g. "IVAC" inside "R-IVAC") does not count.
fn best_abbreviation(spans: &[AbbrSpan]) -> Option<(String, String)> {
    let is_nested = |s: &AbbrSpan| {
        spans.iter().any(|other| {
            other.start <= s.start && other.end >= s.end && (other.end - other.start) > (s.end - s.start)
        })
    };

    let mut best: Option<(&str, usize, String)> = None;
    for abbr in ROTA_ABBREVIATIONS {
        let mut count = 0;
        let mut last_suffix = String::new();
        for s in spans.iter().filter(|s| s.abbr == *abbr) {
            if !is_nested(s) {
                count += 1;
                if !s.suffix.is_empty() {
                    last_suffix = s.suffix.clone();
                }
            }
        }
        if count > best.as_ref().map(|(_, c, _)| *c).unwrap_or(0) {
            best = Some((abbr, count, last_suffix));
        }
    }
    best.map(|(abbr, _, suffix)| (abbr.to_string(), suffix))
}

/// Infer the rota name for an injectable rota from known abbreviations.
///
/// The title region (first 800 chars) is tried first, then whole-document
/// frequency, then an explicit "Patient label:" line.
pub fn infer_rota_name(text: &str) -> String {
    let title_area = &text[..floor_boundary(text, 800)];
    for region in [title_area, text] {
        let spans = collect_spans(region);
        if let Some((abbr, suffix)) = best_abbreviation(&spans) {
            return if suffix.is_empty() {
                abbr
            } else {
                format!("{abbr} {suffix}")
            };
        }
    }

    if let Some(cap) = PATIENT_LABEL.captures(text) {
        let name = cap[1].trim().to_string();
        if name.len() <= 30 {
            return name;
        }
    }

    "UNKNOWN".to_string()
}
