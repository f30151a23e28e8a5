pub mod debt;
pub mod dsra;
pub mod tranche;
