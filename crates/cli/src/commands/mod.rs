//! Command implementations.

pub mod browse;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod session;
