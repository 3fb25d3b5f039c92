#![forbid(unsafe_code)]

pub mod auth;
pub mod health;
pub mod hub;
pub mod notify;
pub mod routes;
pub mod session;
pub mod state;

#[cfg(test)]
mod hub_tests;
