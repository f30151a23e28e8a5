pub mod cam;
pub mod escrow;
pub mod sales;
