// src/hardware.rs

pub mod codes;
pub mod collector;
pub mod report;

pub use collector::HardwareCollector;
pub use report::{
    BatterySection, CpuSection, DriveInfo, GpuSection, HardwareExport, HardwareReport,
    MemorySection, StorageSection, SystemSection,
};
