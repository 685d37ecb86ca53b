pub mod auth;
pub mod factory;
pub mod traits;
pub mod types;

pub mod coinbase;
