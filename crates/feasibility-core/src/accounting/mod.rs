pub mod balance_sheet;
pub mod cash_flow;
pub mod depreciation;
pub mod profit_loss;
