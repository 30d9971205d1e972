//! Command implementations.

pub mod cart;
pub mod refund;
pub mod session;
