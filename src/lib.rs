//! # Medication Label OCR
//!
//! Turns a photograph of a prescription label, pill bottle or medication list
//! into structured medication records: adaptive preprocessing, text
//! recognition through a pooled engine, multi-medication segmentation, field
//! extraction and a per-record confidence score.

pub mod confidence;
pub mod config;
pub mod errors;
pub mod input;
pub mod instance_manager;
pub mod medication_parser;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod pipeline;
pub mod preprocessing;
pub mod segmentation;
#[cfg(feature = "tesseract")]
pub mod tesseract;

// Re-export types for easier access
pub use config::PipelineConfig;
pub use errors::{PipelineError, PipelineResult};
pub use input::ImageSource;
pub use medication_parser::{parse_medication_from_text, MedicationRecord, ParsedBatch};
pub use pipeline::{process_medication_image, PipelineOutput};
pub use segmentation::parse_multiple_medications;
