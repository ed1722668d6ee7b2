pub mod constraints;
pub mod content_type;
pub mod formats;
mod report;

pub use constraints::{ConstraintValidator, check_default, check_presence, validate_value};
pub use content_type::{DEFAULT_CONTENT_TYPE, check_content_type, merge_consumes};
pub use report::{Code, EntityKind, Finding, Findings, ValidationReport};
