// src/lib.rs

pub mod agents;
pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
