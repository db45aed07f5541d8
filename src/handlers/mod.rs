pub mod health;
pub mod products;
pub mod purchase;
pub mod root;
