pub mod product;
pub mod trade;
