pub mod costs;
pub mod escalation;
