//! Request handlers for each domain

pub mod audit;
pub mod gateway;
pub mod health;
pub mod visits;
pub mod wallets;
