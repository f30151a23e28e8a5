pub mod irr;
pub mod run;
