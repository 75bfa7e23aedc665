//! Request/Response data transfer objects

pub mod audit;
pub mod gateway;
pub mod visits;
pub mod wallets;
