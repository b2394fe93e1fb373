//! # Confidence Scorer
//!
//! Record-level completeness score: the percentage of total field weight
//! captured. Refills and prescriber are informational and carry no weight.

use crate::medication_parser::MedicationRecord;

pub const NAME_WEIGHT: u8 = 30;
pub const DOSAGE_WEIGHT: u8 = 25;
pub const FREQUENCY_WEIGHT: u8 = 20;
pub const ROUTE_WEIGHT: u8 = 10;
pub const QUANTITY_WEIGHT: u8 = 10;
pub const INSTRUCTIONS_WEIGHT: u8 = 5;

const TOTAL_WEIGHT: u32 = 100;

/// Weighted-presence score, 0-100
///
/// # Examples
///
/// ```rust
/// use medication_label_ocr::confidence::calculate_confidence;
/// use medication_label_ocr::medication_parser::MedicationRecord;
///
/// let record = MedicationRecord {
///     name: Some("Lisinopril".to_string()),
///     dosage: Some("10 mg".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(calculate_confidence(&record), 55);
/// ```
pub fn calculate_confidence(record: &MedicationRecord) -> u8 {
    let weighted = [
        (record.name.is_some(), NAME_WEIGHT),
        (record.dosage.is_some(), DOSAGE_WEIGHT),
        (record.frequency.is_some(), FREQUENCY_WEIGHT),
        (record.route.is_some(), ROUTE_WEIGHT),
        (record.quantity.is_some(), QUANTITY_WEIGHT),
        (record.instructions.is_some(), INSTRUCTIONS_WEIGHT),
    ];

    let captured: u32 = weighted
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, weight)| u32::from(*weight))
        .sum();

    (captured * 100 / TOTAL_WEIGHT) as u8
}
