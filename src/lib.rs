// src/lib.rs

pub mod browser;
pub mod cleanup;
pub mod config;
pub mod constants;
pub mod errors;
pub mod export;
pub mod hardware;
pub mod orchestrator;
pub mod services;
pub mod startup;
pub mod utils;
pub mod versions;
