//! Evaluation of machine-extracted document data against ground truth.
//!
//! A document-class configuration describes the attributes of each section. Actual and expected
//! value trees are flattened into leaf comparisons, scored by per-attribute comparators, and
//! aggregated into precision/recall style metrics. [`doc_split`] scores page grouping and
//! classification separately.

pub mod compare;
pub mod config;
pub mod doc_split;
pub mod error;
pub mod evaluate;
pub mod flatten;
pub mod metrics;
pub mod model;
pub mod semantic;
pub mod service;

pub use config::{ExtractionConfig, load_config};
pub use doc_split::{DocSplitResult, SectionSplitRecord, evaluate_doc_split};
pub use error::{EvalError, ServiceError};
pub use evaluate::Evaluator;
pub use model::{DocumentEvaluationResult, DocumentInput};
