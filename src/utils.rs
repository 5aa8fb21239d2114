// src/utils.rs

pub mod command;
pub mod cpu;
pub mod fs;
pub mod powershell;
pub mod registry;
pub mod windows;
