pub mod metrics;
pub mod waterfall;
