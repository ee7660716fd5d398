//! Agent-based model of supermarkets competing for customers.
//!
//! Supermarkets set prices under a fixed [`model::Strategy`]; customers either
//! stay bound to one supermarket or pick, every step, the one with the lowest
//! cost given distance, price, experience and loyalty. A [`engine::World`]
//! activates all agents once per step in random order and records the state of
//! every supermarket afterwards.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod manager;
pub mod model;
pub mod scheduler;
pub mod space;
pub mod stats;
