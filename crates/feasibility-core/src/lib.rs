pub mod error;
pub mod time_value;
pub mod timeline;
pub mod types;

pub mod accounting;
pub mod credit;
pub mod equity;
pub mod financing;
pub mod revenue;
pub mod schedule;
pub mod tax;

pub mod pipeline;
pub mod project;
pub mod validation;

pub use error::{FeasibilityError, ValidationIssue};
pub use pipeline::{run_feasibility, run_feasibility_json, FeasibilityKpis, FeasibilityOutput};
pub use project::ProjectInput;
pub use types::*;
pub use validation::validate_project;

/// Standard result type for all feasibility operations
pub type FeasibilityResult<T> = Result<T, FeasibilityError>;
