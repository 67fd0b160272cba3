pub mod crypto;
pub mod health;
