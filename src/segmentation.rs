//! # Multi-Medication Segmenter
//!
//! Decides whether recognized text is one label or a list of several
//! medications, splits lists into sections and parses each section.
//!
//! ## Layout detection (first match wins)
//!
//! 1. Two or more distinct prescription numbers (`Rx` + at least 5 digits)
//! 2. A line starting with a bullet (`*` or `•`)
//! 3. A numbered line (`<digits>. <Capital>...`)
//! 4. Otherwise a single label

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::medication_parser::{parse_medication_from_text, MedicationRecord, ParsedBatch};

/// Sections shorter than this (in characters) are discarded
pub const MIN_SECTION_CHARS: usize = 20;

lazy_static! {
    static ref RX_NUMBER: Regex = Regex::new(r"(?i)\bRx\s*[:#]?\s*(\d{5,})")
        .expect("Rx number pattern should be valid");
    static ref BULLET_LINE: Regex = Regex::new(r"^\s*[*•]\s*")
        .expect("Bullet pattern should be valid");
    static ref NUMBERED_LINE: Regex = Regex::new(r"^\s*\d+\.\s+[A-Z]")
        .expect("Numbered line pattern should be valid");
    static ref NUMBERED_MARKER: Regex = Regex::new(r"^\s*\d+\.\s+")
        .expect("Numbered marker pattern should be valid");
}

/// How the recognized text is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextLayout {
    /// Several distinct prescription numbers
    MultiplePrescriptions,
    /// Bulleted list
    Bulleted,
    /// Numbered list
    Numbered,
    /// One label
    SingleLabel,
}

impl TextLayout {
    pub fn is_list(&self) -> bool {
        !matches!(self, TextLayout::SingleLabel)
    }
}

/// Number of distinct prescription numbers in the text
pub fn count_distinct_rx_numbers(text: &str) -> usize {
    RX_NUMBER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect::<HashSet<_>>()
        .len()
}

/// Classifies the text layout
///
/// # Examples
///
/// ```rust
/// use medication_label_ocr::segmentation::{detect_layout, TextLayout};
///
/// assert_eq!(detect_layout("Rx: 123456\nA\n\nRx: 654321\nB"), TextLayout::MultiplePrescriptions);
/// assert_eq!(detect_layout("1. Metformin 500mg"), TextLayout::Numbered);
/// assert_eq!(detect_layout("Rx: 123456\nLisinopril 10mg"), TextLayout::SingleLabel);
/// ```
pub fn detect_layout(text: &str) -> TextLayout {
    if count_distinct_rx_numbers(text) >= 2 {
        TextLayout::MultiplePrescriptions
    } else if text.lines().any(|line| BULLET_LINE.is_match(line)) {
        TextLayout::Bulleted
    } else if text.lines().any(|line| NUMBERED_LINE.is_match(line)) {
        TextLayout::Numbered
    } else {
        TextLayout::SingleLabel
    }
}

/// Blank lines in a row that end a list section
pub const SECTION_BREAK_BLANK_LINES: usize = 2;

/// Splits list text into candidate sections.
///
/// A new section starts after a run of [`SECTION_BREAK_BLANK_LINES`] or more
/// blank lines, at every numbered marker and bullet line, and at an Rx number
/// once the current section already carries one. A single blank line stays
/// inside its section. Markers are stripped and sections under
/// [`MIN_SECTION_CHARS`] are dropped.
pub fn split_sections(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut blank_run = 0;

    let mut flush = |current: &mut Vec<String>| {
        if current.is_empty() {
            return;
        }
        let section = current.join("\n").trim().to_string();
        current.clear();
        if section.chars().count() >= MIN_SECTION_CHARS {
            sections.push(section);
        } else {
            debug!(section = %section, "Discarding short list fragment");
        }
    };

    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == SECTION_BREAK_BLANK_LINES {
                flush(&mut current);
            }
            continue;
        }
        blank_run = 0;

        if NUMBERED_MARKER.is_match(line) {
            flush(&mut current);
            current.push(NUMBERED_MARKER.replace(line, "").trim().to_string());
        } else if BULLET_LINE.is_match(line) {
            flush(&mut current);
            current.push(BULLET_LINE.replace(line, "").trim().to_string());
        } else {
            if RX_NUMBER.is_match(line) && current.iter().any(|l| RX_NUMBER.is_match(l)) {
                flush(&mut current);
            }
            current.push(line.trim().to_string());
        }
    }
    flush(&mut current);

    sections
}

/// A list section is kept only with a name and one of dosage, frequency or route
fn is_usable_list_record(record: &MedicationRecord) -> bool {
    record.name.is_some()
        && (record.dosage.is_some() || record.frequency.is_some() || record.route.is_some())
}

/// Parses the whole text as one label; empty batch when no name, dosage or
/// frequency was found.
pub fn parse_single_label(text: &str) -> ParsedBatch {
    let record = parse_medication_from_text(text);
    if record.has_core_field() {
        ParsedBatch::new(vec![record])
    } else {
        debug!("No medication fields found in label text");
        ParsedBatch::default()
    }
}

/// Parses text that may describe one or several medications.
///
/// Lists are split into sections and each section parsed independently. When
/// no section yields a usable record, the whole text is parsed as a single
/// label instead.
pub fn parse_multiple_medications(text: &str) -> ParsedBatch {
    let layout = detect_layout(text);
    debug!(layout = ?layout, "Detected text layout");

    if !layout.is_list() {
        return parse_single_label(text);
    }

    let records: Vec<MedicationRecord> = split_sections(text)
        .iter()
        .map(|section| parse_medication_from_text(section))
        .filter(is_usable_list_record)
        .collect();

    if records.is_empty() {
        debug!(layout = ?layout, "List split produced no usable records, parsing as single label");
        return parse_single_label(text);
    }

    debug!(records = records.len(), "Parsed medication list");
    ParsedBatch::new(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rx_numbers_must_be_distinct() {
        assert_eq!(count_distinct_rx_numbers("Rx: 123456\nRX# 123456"), 1);
        assert_eq!(count_distinct_rx_numbers("Rx 123456 Rx 654321"), 2);
        assert_eq!(count_distinct_rx_numbers("Rx: 1234"), 0);
    }

    #[test]
    fn test_layout_precedence() {
        assert_eq!(
            detect_layout("* Aspirin\nRx: 111111\nRx: 222222"),
            TextLayout::MultiplePrescriptions
        );
        assert_eq!(detect_layout("• Aspirin\n1. Metformin"), TextLayout::Bulleted);
        assert_eq!(detect_layout("1. metformin"), TextLayout::SingleLabel);
        assert!(!TextLayout::SingleLabel.is_list());
    }

    #[test]
    fn test_split_sections_on_markers_and_blank_lines() {
        let text = "1. Metformin 500mg twice daily\n2. Lisinopril 10mg once daily\n\n\nshort";
        assert_eq!(
            split_sections(text),
            vec![
                "Metformin 500mg twice daily".to_string(),
                "Lisinopril 10mg once daily".to_string()
            ]
        );
    }

    #[test]
    fn test_split_sections_keeps_continuation_lines() {
        let text = "* Metformin 500mg\n  Take 1 tablet twice daily\n* Aspirin";
        assert_eq!(
            split_sections(text),
            vec!["Metformin 500mg\nTake 1 tablet twice daily".to_string()]
        );
    }

    #[test]
    fn test_single_blank_line_stays_in_section() {
        let text = "* Metformin 500mg\n\nTake 1 tablet by mouth twice daily\n* Lisinopril 10mg once daily";
        assert_eq!(
            split_sections(text),
            vec![
                "Metformin 500mg\nTake 1 tablet by mouth twice daily".to_string(),
                "Lisinopril 10mg once daily".to_string()
            ]
        );
    }

    #[test]
    fn test_double_blank_line_ends_section() {
        let text = "Rx: 123456 Metformin 500mg\nTake twice daily\n\n\nNote: Keep refrigerated below 8C";
        assert_eq!(split_sections(text).len(), 2);
    }

    #[test]
    fn test_second_rx_number_starts_section() {
        let text = "Rx: 123456\nMetformin 500mg\nRx: 654321\nLisinopril 10mg";
        assert_eq!(
            split_sections(text),
            vec![
                "Rx: 123456\nMetformin 500mg".to_string(),
                "Rx: 654321\nLisinopril 10mg".to_string()
            ]
        );
    }

    #[test]
    fn test_two_prescription_blocks() {
        let text = "Rx: 123456\nMetformin 500mg\nTake 1 tablet by mouth twice daily\n\nRx: 654321\nLisinopril 10mg\nTake 1 tablet by mouth once daily";
        let batch = parse_multiple_medications(text);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records()[0].name.as_deref(), Some("Metformin"));
        assert_eq!(batch.records()[1].name.as_deref(), Some("Lisinopril"));
    }

    #[test]
    fn test_single_label_yields_at_most_one_record() {
        let text = "CVS pharmacy\nRx: 7654321\nAtorvastatin 20mg\nTake 1 tablet by mouth at bedtime\nQty: 90";
        let batch = parse_multiple_medications(text);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records()[0].frequency.as_deref(), Some("at bedtime"));
    }

    #[test]
    fn test_text_without_fields_yields_empty_batch() {
        assert!(parse_multiple_medications("Keep out of reach of children").is_empty());
        assert!(parse_multiple_medications("").is_empty());
    }

    #[test]
    fn test_unusable_list_falls_back_to_single_label() {
        // Sections are too short, so the whole text is parsed once
        let text = "1. Aspirin 81mg\n2. Daily";
        let batch = parse_multiple_medications(text);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.records()[0].dosage.as_deref(), Some("81 mg"));
    }
}
