//! Schema inference and alignment
//!
//! This module infers flat column sets from hierarchical records and
//! reconciles live tables against them, strictly additively.

pub mod align;
pub mod extract;
pub mod infer;

pub use align::{AlignmentResult, SchemaAligner};
pub use extract::{extract_elements, extract_schema, Extraction, SchemaBuilder};
pub use infer::infer_type;
