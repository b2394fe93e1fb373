//! # Medication Field Parser
//!
//! Turns one block of recognized label text into a [`MedicationRecord`].
//!
//! ## Features
//!
//! - Ordered rule tables per field; the first rule whose extractor accepts a
//!   match wins, later rules are never consulted
//! - Frequency and instructions matched on whitespace-collapsed text, since
//!   those phrases often wrap across label lines
//! - Four-step medication name search with false-positive suppression
//!
//! Parsing never fails. A field the rules cannot find is `None` and the
//! record's confidence reflects how complete it is.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::confidence::calculate_confidence;

/// One parsed medication, every field independently optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationRecord {
    pub name: Option<String>,
    /// Normalized as `<amount> <unit>`, e.g. "10 mg"
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub route: Option<String>,
    pub prescriber: Option<String>,
    pub quantity: Option<String>,
    pub refills: Option<String>,
    pub instructions: Option<String>,
    /// Weighted completeness, 0-100
    pub confidence: u8,
    /// Reference to the image this record was read from
    pub source_image: Option<String>,
}

impl MedicationRecord {
    /// Attaches a source image reference (path, upload id, ...)
    pub fn with_source_image(mut self, reference: impl Into<String>) -> Self {
        self.source_image = Some(reference.into());
        self
    }

    /// True when a name, dosage or frequency was found
    pub fn has_core_field(&self) -> bool {
        self.name.is_some() || self.dosage.is_some() || self.frequency.is_some()
    }

    /// True when nothing at all was found
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.dosage.is_none()
            && self.frequency.is_none()
            && self.route.is_none()
            && self.prescriber.is_none()
            && self.quantity.is_none()
            && self.refills.is_none()
            && self.instructions.is_none()
    }
}

/// Ordered medication records, in the order they appear in the text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedBatch {
    records: Vec<MedicationRecord>,
}

impl ParsedBatch {
    pub fn new(records: Vec<MedicationRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MedicationRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[MedicationRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<MedicationRecord> {
        self.records
    }

    /// Tags every record with the same source image reference
    pub fn with_source_image(self, reference: &str) -> Self {
        Self {
            records: self
                .records
                .into_iter()
                .map(|record| record.with_source_image(reference))
                .collect(),
        }
    }

    /// Serialize for the chart-creation collaborator
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl IntoIterator for ParsedBatch {
    type Item = MedicationRecord;
    type IntoIter = std::vec::IntoIter<MedicationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ParsedBatch {
    type Item = &'a MedicationRecord;
    type IntoIter = std::slice::Iter<'a, MedicationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// One candidate pattern for a field
pub struct FieldRule {
    /// Rule name for trace output
    pub label: &'static str,
    pub pattern: Regex,
    /// Turns a match into a field value; `None` rejects the match
    pub extract: fn(&Captures<'_>) -> Option<String>,
}

impl FieldRule {
    fn new(
        label: &'static str,
        pattern: &str,
        extract: fn(&Captures<'_>) -> Option<String>,
    ) -> Self {
        Self {
            label,
            pattern: Regex::new(pattern).expect("Field rule pattern should be valid"),
            extract,
        }
    }
}

/// Common drug-name endings
pub const DRUG_SUFFIXES: [&str; 10] = [
    "ine", "ide", "zol", "pam", "in", "vir", "mycin", "cillin", "statin", "zil",
];

/// Pharmacy branding and other text that is never a drug name
const NOISE_TOKENS: [&str; 2] = ["cvshealth", "pharmacy"];

/// Unit spellings that look like brand-style names ("mL", "mEq")
const UNIT_TOKENS: [&str; 6] = ["ml", "meq", "mg", "mcg", "iu", "units"];

fn whole_match(caps: &Captures<'_>) -> Option<String> {
    caps.get(0).map(|m| collapse_whitespace(m.as_str()))
}

fn first_group(caps: &Captures<'_>) -> Option<String> {
    caps.get(1).map(|m| m.as_str().trim().to_string())
}

fn lowercase_match(caps: &Captures<'_>) -> Option<String> {
    caps.get(0).map(|m| m.as_str().to_lowercase())
}

fn refill_count(caps: &Captures<'_>) -> Option<String> {
    let value = caps.get(1)?.as_str().to_lowercase();
    Some(if value == "none" { "0".to_string() } else { value })
}

fn no_refills(_caps: &Captures<'_>) -> Option<String> {
    Some("0".to_string())
}

fn is_prescriber_noise(candidate: &str) -> bool {
    let upper = candidate.to_uppercase();
    upper.contains("AUTH REQUIRED") || upper.contains("REFILLS")
}

fn prescriber_match(caps: &Captures<'_>) -> Option<String> {
    whole_match(caps).filter(|candidate| !is_prescriber_noise(candidate))
}

fn prescriber_label(caps: &Captures<'_>) -> Option<String> {
    first_group(caps).filter(|candidate| !candidate.is_empty() && !is_prescriber_noise(candidate))
}

lazy_static! {
    static ref DOSAGE_PATTERN: Regex =
        Regex::new(r"(?i)\(?\b(\d+(?:\.\d+)?)[ \t]*(mcg|mg|ml|units?|g)\b\)?")
            .expect("Dosage pattern should be valid");

    static ref FREQUENCY_RULES: Vec<FieldRule> = vec![
        FieldRule::new(
            "times_per_period",
            r"(?i)\b(?:once|twice|three times|four times)\s+(?:a\s+|per\s+)?(?:daily|day|weekly|week)\b",
            whole_match,
        ),
        FieldRule::new("abbreviation", r"\b(?:QD|BID|TID|QID|Q\d{1,2}H)\b", whole_match),
        FieldRule::new(
            "time_of_day",
            r"(?i)\bin the (?:morning|evening|afternoon|night)\b",
            whole_match,
        ),
        FieldRule::new(
            "hourly_interval",
            r"(?i)\bevery\s+\d+(?:\s*(?:-|to)\s*\d+)?\s+hours?\b",
            whole_match,
        ),
        FieldRule::new("bedtime", r"(?i)\bat bedtime\b", whole_match),
        FieldRule::new("bare_daily", r"(?i)\b(?:daily|nightly)\b", whole_match),
    ];

    static ref ROUTE_RULES: Vec<FieldRule> = vec![
        FieldRule::new("by_route", r"(?i)\bby\s+(?:mouth|injection|inhalation)\b", whole_match),
        FieldRule::new(
            "route_token",
            r"(?i)\b(?:oral|topical|sublingual|transdermal|inhalation|ophthalmic|otic)\b",
            lowercase_match,
        ),
        FieldRule::new("parenteral", r"\b(?:IV|IM)\b", whole_match),
    ];

    static ref PRESCRIBER_RULES: Vec<FieldRule> = vec![
        FieldRule::new(
            "dr_first_last",
            r"\bDr\.?[ \t]+[A-Z][a-z]+[ \t]+[A-Z][a-z]+(?:-[A-Z][a-z]+)?",
            prescriber_match,
        ),
        FieldRule::new(
            "dr_all_caps",
            r"\b(?:DR|Dr)\.?[ \t]+[A-Z][A-Z'\-]+(?:[ \t]+[A-Z][A-Z'\-]+)*",
            prescriber_match,
        ),
        FieldRule::new(
            "name_md",
            r"\b[A-Z][a-z]+[ \t]+(?:[A-Z]\.?[ \t]+)?[A-Z][a-z]+,?[ \t]+M\.?D\b\.?",
            prescriber_match,
        ),
        FieldRule::new(
            "prescriber_label",
            r"(?i)\bprescriber[ \t]*:[ \t]*([^\n]+)",
            prescriber_label,
        ),
    ];

    static ref QUANTITY_RULES: Vec<FieldRule> = vec![
        FieldRule::new("qty_label", r"(?i)\b(?:qty|quantity)\s*[:#]?\s*(\d+)", first_group),
        FieldRule::new(
            "count_line",
            r"(?im)^\s*(\d+)\s+(?:tablets?|capsules?|pills?)\b",
            first_group,
        ),
    ];

    static ref REFILL_RULES: Vec<FieldRule> = vec![
        FieldRule::new(
            "refills_label",
            r"(?i)\brefills?(?:\s+remaining)?\s*:\s*(\d+|none|remaining)\b",
            refill_count,
        ),
        FieldRule::new("no_refills", r"(?i)\bno\s+refills\b", no_refills),
    ];

    static ref INSTRUCTION_RULES: Vec<FieldRule> = vec![FieldRule::new(
        "take_use",
        r"(?i)\b(?:take|use)\s+(?:\d+(?:[./]\d+)?|one|two|three|four|half|a|an)\s+(?:tablet|capsule|pill|application)s?\b[^.]*",
        whole_match,
    )];

    static ref MIXED_CASE_TOKEN: Regex = Regex::new(r"\b[A-Za-z]*[a-z]+[A-Z][A-Za-z]+\b")
        .expect("Mixed case pattern should be valid");
    static ref COMMONLY_KNOWN_AS: Regex =
        Regex::new(r"(?i)\bcommonly\s+known\s+as\s+([A-Za-z][A-Za-z\-]*)")
            .expect("Commonly known as pattern should be valid");
    static ref LEADING_MARKER: Regex = Regex::new(r"^\s*(?:[*•\-]+|\d+[.)])\s*")
        .expect("Leading marker pattern should be valid");
    static ref RX_NUMBER: Regex = Regex::new(r"(?i)\bRx\s*[:#]?\s*\d+")
        .expect("Rx number pattern should be valid");
    static ref TRAILING_DOSAGE_FORM: Regex =
        Regex::new(r"(?i)[\s,]+(?:tablets?|capsules?|caps|tabs?|pills?)[.,]?$")
            .expect("Dosage form pattern should be valid");
}

/// Collapses every whitespace run (including newlines) into one space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Evaluates rules top to bottom; the first accepted match wins.
fn apply_rules(rules: &[FieldRule], text: &str) -> Option<String> {
    for rule in rules {
        for caps in rule.pattern.captures_iter(text) {
            if let Some(value) = (rule.extract)(&caps) {
                trace!(rule = rule.label, value = %value, "Field rule matched");
                return Some(value);
            }
        }
    }
    None
}

/// A dosage found in the text, with the byte offset where its amount starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DosageMatch {
    /// Normalized value, e.g. "10 mg"
    pub value: String,
    pub start: usize,
}

/// Finds the first dosage: a number directly followed by a unit, optionally
/// parenthesized.
///
/// # Examples
///
/// ```rust
/// use medication_label_ocr::medication_parser::find_dosage;
///
/// let dosage = find_dosage("Lisinopril 10mg").unwrap();
/// assert_eq!(dosage.value, "10 mg");
/// assert_eq!(dosage.start, 11);
/// ```
pub fn find_dosage(text: &str) -> Option<DosageMatch> {
    let caps = DOSAGE_PATTERN.captures(text)?;
    let amount = caps.get(1)?;
    let unit = caps.get(2)?.as_str().to_lowercase();
    Some(DosageMatch {
        value: format!("{} {}", amount.as_str(), unit),
        start: amount.start(),
    })
}

pub fn extract_frequency(text: &str) -> Option<String> {
    apply_rules(&FREQUENCY_RULES, &collapse_whitespace(text))
}

pub fn extract_route(text: &str) -> Option<String> {
    apply_rules(&ROUTE_RULES, text)
}

/// Prescriber cascade; candidates mentioning "AUTH REQUIRED" or "REFILLS" are skipped.
pub fn extract_prescriber(text: &str) -> Option<String> {
    apply_rules(&PRESCRIBER_RULES, text)
}

pub fn extract_quantity(text: &str) -> Option<String> {
    apply_rules(&QUANTITY_RULES, text)
}

pub fn extract_refills(text: &str) -> Option<String> {
    apply_rules(&REFILL_RULES, text)
}

/// "Take/Use <count> <form> ..." up to the next period, on collapsed text
pub fn extract_instructions(text: &str) -> Option<String> {
    apply_rules(&INSTRUCTION_RULES, &collapse_whitespace(text)).map(|s| s.trim().to_string())
}

/// True when `candidate` ends in a common drug-name suffix (trailing punctuation ignored)
pub fn ends_with_drug_suffix(candidate: &str) -> bool {
    let lower = candidate
        .trim()
        .trim_end_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    DRUG_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// Rejects name candidates that are known noise.
///
/// A candidate is rejected when it contains a pharmacy noise token, is exactly
/// "tablets"/"tablets," or a unit such as "mL", or is already contained in one
/// of the `claimed` field values. A candidate ending in a drug-name suffix is always accepted, even
/// if it also appears in a claimed field.
///
/// # Examples
///
/// ```rust
/// use medication_label_ocr::medication_parser::is_common_false_positive;
///
/// assert!(is_common_false_positive("CVSHealth", &[]));
/// assert!(is_common_false_positive("TABLETS,", &[]));
/// assert!(!is_common_false_positive("Amoxicillin", &["Take 1 capsule of Amoxicillin"]));
/// ```
pub fn is_common_false_positive(candidate: &str, claimed: &[&str]) -> bool {
    let lower = candidate.trim().to_lowercase();
    if lower.is_empty() {
        return true;
    }
    if ends_with_drug_suffix(&lower) {
        return false;
    }
    if NOISE_TOKENS.iter().any(|token| lower.contains(token)) {
        return true;
    }
    if lower == "tablets" || lower == "tablets," || UNIT_TOKENS.contains(&lower.as_str()) {
        return true;
    }
    claimed
        .iter()
        .any(|value| value.to_lowercase().contains(&lower))
}

/// Strips list markers, Rx numbers and surrounding punctuation from a name candidate.
pub fn clean_name_candidate(raw: &str) -> String {
    let without_marker = LEADING_MARKER.replace(raw, "");
    let without_rx = RX_NUMBER.replace_all(&without_marker, " ");
    collapse_whitespace(&without_rx)
        .trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '-' | '(' | ')' | '.' | '•' | '*'))
        .trim()
        .to_string()
}

fn strip_dosage_form(candidate: &str) -> String {
    TRAILING_DOSAGE_FORM.replace(candidate, "").trim().to_string()
}

fn accept_name(candidate: String, claimed: &[&str]) -> Option<String> {
    let has_letter = candidate.chars().any(char::is_alphabetic);
    if has_letter && !is_common_false_positive(&candidate, claimed) {
        Some(candidate)
    } else {
        None
    }
}

/// (a) brand-style mixed-case token such as "NovoLog"
fn name_from_mixed_case(text: &str, claimed: &[&str]) -> Option<String> {
    MIXED_CASE_TOKEN
        .find_iter(text)
        .map(|m| m.as_str())
        .find(|token| !is_common_false_positive(token, claimed))
        .map(str::to_string)
}

/// (b) text before the dosage on its line, else the previous non-empty line
fn name_near_dosage(text: &str, dosage: &DosageMatch, claimed: &[&str]) -> Option<String> {
    let line_start = text[..dosage.start].rfind('\n').map_or(0, |idx| idx + 1);
    let prefix = text[line_start..dosage.start]
        .trim_end_matches(|c: char| c.is_whitespace() || c == '(');

    let raw = if prefix.trim().is_empty() {
        text[..line_start]
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())?
    } else {
        prefix
    };

    accept_name(clean_name_candidate(raw), claimed)
}

fn line_score(line: &str, candidate: &str) -> i32 {
    let lower = line.to_lowercase();
    let upper = line.to_uppercase();
    let mut score = 0;

    if ends_with_drug_suffix(candidate) {
        score += 5;
    }
    if line.chars().any(char::is_alphabetic) && line == upper {
        score += 2;
    }
    if upper.contains("TABLET") || upper.contains("CAPSULE") {
        score += 1;
    }
    if line.contains(' ') {
        score -= 1;
    }
    if lower == "tablets" || lower == "capsules" {
        score -= 10;
    }
    if lower.starts_with("tablets") {
        score -= 5;
    }
    score
}

/// (c) best-scoring line, dosage-form word stripped; needs a positive score
fn name_from_line_scan(text: &str, claimed: &[&str]) -> Option<String> {
    let mut best: Option<(i32, String)> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut candidate = strip_dosage_form(&clean_name_candidate(line));
        if let Some(dosage) = find_dosage(&candidate) {
            let prefix = candidate[..dosage.start]
                .trim_end_matches(|c: char| c.is_whitespace() || c == '(');
            if !prefix.is_empty() {
                candidate = prefix.to_string();
            }
        }
        let candidate = match accept_name(candidate, claimed) {
            Some(candidate) => candidate,
            None => continue,
        };

        let score = line_score(line, &candidate);
        trace!(line = %line, score, "Scored name candidate line");
        if score > 0 && best.as_ref().map_or(true, |(top, _)| score > *top) {
            best = Some((score, candidate));
        }
    }

    best.map(|(_, candidate)| candidate)
}

/// (d) "commonly known as <Name>"
fn name_from_known_as(text: &str) -> Option<String> {
    COMMONLY_KNOWN_AS
        .captures(text)
        .and_then(|caps| first_group(&caps))
}

/// Runs the name strategies in order until one succeeds.
pub fn extract_name(text: &str, dosage: Option<&DosageMatch>, claimed: &[&str]) -> Option<String> {
    if let Some(name) = name_from_mixed_case(text, claimed) {
        debug!(strategy = "mixed_case", name = %name, "Medication name found");
        return Some(name);
    }
    if let Some(name) = dosage.and_then(|d| name_near_dosage(text, d, claimed)) {
        debug!(strategy = "near_dosage", name = %name, "Medication name found");
        return Some(name);
    }
    if let Some(name) = name_from_line_scan(text, claimed) {
        debug!(strategy = "line_scan", name = %name, "Medication name found");
        return Some(name);
    }
    let name = name_from_known_as(text);
    if let Some(name) = &name {
        debug!(strategy = "commonly_known_as", name = %name, "Medication name found");
    }
    name
}

/// Parses one block of label text into a single record.
///
/// # Examples
///
/// ```rust
/// use medication_label_ocr::medication_parser::parse_medication_from_text;
///
/// let record = parse_medication_from_text("Lisinopril 10mg\nTake 1 tablet by mouth once daily");
/// assert_eq!(record.dosage.as_deref(), Some("10 mg"));
/// assert_eq!(record.route.as_deref(), Some("by mouth"));
/// assert_eq!(record.name.as_deref(), Some("Lisinopril"));
/// ```
pub fn parse_medication_from_text(text: &str) -> MedicationRecord {
    let dosage = find_dosage(text);
    let frequency = extract_frequency(text);
    let route = extract_route(text);
    let instructions = extract_instructions(text);

    let claimed: Vec<&str> = [&frequency, &route, &instructions]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .collect();
    let name = extract_name(text, dosage.as_ref(), &claimed);

    let mut record = MedicationRecord {
        name,
        dosage: dosage.map(|d| d.value),
        frequency,
        route,
        prescriber: extract_prescriber(text),
        quantity: extract_quantity(text),
        refills: extract_refills(text),
        instructions,
        confidence: 0,
        source_image: None,
    };
    record.confidence = calculate_confidence(&record);
    record
}
