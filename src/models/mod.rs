pub mod audit;
pub mod cdt;
pub mod confirmation;
pub mod enums;
pub mod insurance;
pub mod treatment;

pub use audit::*;
pub use cdt::*;
pub use confirmation::*;
pub use enums::*;
pub use insurance::*;
pub use treatment::*;

/// A request field that failed boundary validation. Carried up to the API
/// layer, which renders it as a 422 with the field path.
#[derive(Debug, Clone)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for FieldViolation {}
