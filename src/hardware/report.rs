// src/hardware/report.rs

use std::{fmt::Display, fmt::Write as _, io, path::Path};

use serde::{Deserialize, Serialize};

use crate::export::{readable_now, write_json, write_text, ExportFormat, ExportInfo};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSection {
    pub computer_name: String,
    pub operating_system: String,
    pub os_version: String,
    pub architecture: String,
    pub manufacturer: String,
    pub model: String,
    pub system_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_detailed_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuSection {
    pub name: String,
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub architecture: String,
    /// Percent over a short sampling window.
    pub current_usage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_clock_speed_ghz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_frequency_ghz: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySection {
    pub total_gb: f64,
    pub used_gb: f64,
    pub available_gb: f64,
    pub used_percentage: f64,
    pub available_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mhz: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuSection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vram_gb: Option<f64>,
    pub driver_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_rate_hz: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveInfo {
    pub device: String,
    pub mountpoint: String,
    pub filesystem: String,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub used_percentage: f64,
    pub removable: bool,
    /// Category from the WMI media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_type: Option<String>,
    /// `SSD` or `HDD` when the OS reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageSection {
    pub drives: Vec<DriveInfo>,
    pub total_capacity_gb: f64,
    pub total_used_gb: f64,
    pub total_free_gb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_used_percentage: Option<f64>,
}

impl StorageSection {
    /// Builds the section and its totals from individual drives.
    pub fn from_drives(drives: Vec<DriveInfo>) -> Self {
        let total_capacity: f64 = drives.iter().map(|d| d.total_gb).sum();
        let total_used: f64 = drives.iter().map(|d| d.used_gb).sum();
        let total_free: f64 = drives.iter().map(|d| d.free_gb).sum();
        Self {
            drives,
            total_capacity_gb: round2(total_capacity),
            total_used_gb: round2(total_used),
            total_free_gb: round2(total_free),
            total_used_percentage: (total_capacity > 0.0)
                .then(|| round1(total_used / total_capacity * 100.0)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatterySection {
    pub present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_plugged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatterySection {
    pub fn absent() -> Self {
        Self {
            present: false,
            message: Some("No battery detected (Desktop system)".to_string()),
            ..Self::default()
        }
    }
}

/// Everything the collector gathers, one section per hardware area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareReport {
    pub system: SystemSection,
    pub cpu: CpuSection,
    pub memory: MemorySection,
    pub gpu: GpuSection,
    pub storage: StorageSection,
    pub battery: BatterySection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HardwareExport {
    pub export_info: ExportInfo,
    pub hardware_information: HardwareReport,
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / (1024.0 * 1024.0 * 1024.0))
}

fn or_unknown<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| "Unknown".to_string(), |v| v.to_string())
}

const RULE: &str = "==================================================";
const SECTION_RULE: &str = "------------------------------";

impl HardwareReport {
    /// Human-readable report, one block per section.
    pub fn text_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "HARDWARE INFORMATION REPORT\n{}", RULE);
        let _ = writeln!(out, "Generated: {}\n", readable_now());

        let system = &self.system;
        let _ = writeln!(out, "SYSTEM INFORMATION\n{}", SECTION_RULE);
        let _ = writeln!(out, "Computer Name: {}", system.computer_name);
        let _ = writeln!(out, "Manufacturer: {}", system.manufacturer);
        let _ = writeln!(out, "Model: {}", system.model);
        let _ = writeln!(out, "System Type: {}", system.system_type);
        let _ = writeln!(out, "Operating System: {}", system.operating_system);
        let _ = writeln!(out, "OS Version: {}", system.os_version);
        let _ = writeln!(out, "Architecture: {}\n", system.architecture);

        let cpu = &self.cpu;
        let _ = writeln!(out, "CPU INFORMATION\n{}", SECTION_RULE);
        let _ = writeln!(out, "Processor: {}", cpu.name);
        let _ = writeln!(out, "Physical Cores: {}", cpu.physical_cores);
        let _ = writeln!(out, "Logical Cores: {}", cpu.logical_cores);
        let _ = writeln!(out, "Architecture: {}", cpu.architecture);
        let _ = writeln!(out, "Current Usage: {}%", cpu.current_usage);
        if let Some(speed) = cpu.max_clock_speed_ghz {
            let _ = writeln!(out, "Max Clock Speed: {} GHz", speed);
        }
        if let Some(frequency) = cpu.current_frequency_ghz {
            let _ = writeln!(out, "Current Frequency: {} GHz", frequency);
        }
        out.push('\n');

        let memory = &self.memory;
        let _ = writeln!(out, "MEMORY INFORMATION\n{}", SECTION_RULE);
        let _ = writeln!(out, "Total RAM: {} GB", memory.total_gb);
        let _ = writeln!(
            out,
            "Used RAM: {} GB ({}%)",
            memory.used_gb, memory.used_percentage
        );
        let _ = writeln!(
            out,
            "Available RAM: {} GB ({}%)",
            memory.available_gb, memory.available_percentage
        );
        let _ = writeln!(out, "Memory Type: {}", or_unknown(&memory.memory_type));
        if let Some(speed) = memory.speed_mhz {
            let _ = writeln!(out, "Memory Speed: {} MHz", speed);
        }
        out.push('\n');

        let gpu = &self.gpu;
        let _ = writeln!(out, "GPU INFORMATION\n{}", SECTION_RULE);
        let _ = writeln!(out, "Graphics Card: {}", gpu.name);
        let _ = writeln!(out, "Video Memory: {} GB", or_unknown(&gpu.vram_gb));
        let _ = writeln!(out, "Driver Version: {}", gpu.driver_version);
        if let Some(resolution) = &gpu.display_resolution {
            let _ = writeln!(out, "Display Resolution: {}", resolution);
        }
        if let Some(refresh) = gpu.refresh_rate_hz {
            let _ = writeln!(out, "Refresh Rate: {} Hz", refresh);
        }
        out.push('\n');

        let storage = &self.storage;
        let _ = writeln!(out, "STORAGE INFORMATION\n{}", SECTION_RULE);
        let _ = writeln!(out, "Total Storage: {} GB", storage.total_capacity_gb);
        let _ = writeln!(
            out,
            "Used Storage: {} GB ({}%)",
            storage.total_used_gb,
            or_unknown(&storage.total_used_percentage)
        );
        let _ = writeln!(out, "Free Storage: {} GB\n", storage.total_free_gb);
        if !storage.drives.is_empty() {
            out.push_str("INDIVIDUAL DRIVES:\n");
            for (i, drive) in storage.drives.iter().enumerate() {
                let kind = drive.drive_type.as_ref().or(drive.physical_type.as_ref());
                let _ = writeln!(out, "  Drive {}: {}", i + 1, drive.device);
                let _ = writeln!(out, "    Type: {}", or_unknown(&kind));
                let _ = writeln!(out, "    Filesystem: {}", drive.filesystem);
                let _ = writeln!(out, "    Total: {} GB", drive.total_gb);
                let _ = writeln!(
                    out,
                    "    Used: {} GB ({}%)",
                    drive.used_gb, drive.used_percentage
                );
                let _ = writeln!(out, "    Free: {} GB\n", drive.free_gb);
            }
        }

        let battery = &self.battery;
        let _ = writeln!(out, "BATTERY INFORMATION\n{}", SECTION_RULE);
        if battery.present {
            out.push_str("Battery Present: Yes\n");
            let _ = writeln!(
                out,
                "Charge Level: {}%",
                or_unknown(&battery.charge_percentage)
            );
            let adapter = if battery.power_plugged.unwrap_or(false) {
                "Connected"
            } else {
                "Disconnected"
            };
            let _ = writeln!(out, "Power Adapter: {}", adapter);
            let _ = writeln!(
                out,
                "Time Remaining: {}",
                or_unknown(&battery.time_remaining)
            );
            if let Some(health) = battery.health_percentage {
                let _ = writeln!(out, "Battery Health: {}%", health);
            }
            if let Some(cycles) = battery.cycle_count {
                let _ = writeln!(out, "Cycle Count: {}", cycles);
            }
        } else {
            out.push_str("Battery Present: No (Desktop system)\n");
        }
        out.push('\n');

        let _ = writeln!(out, "{}\nEnd of Hardware Information Report", RULE);
        out
    }

    /// Writes the report as JSON (wrapped with `export_info`) or text.
    pub fn export(&self, path: &Path, format: ExportFormat) -> io::Result<()> {
        match format {
            ExportFormat::Json => write_json(
                path,
                &HardwareExport {
                    export_info: ExportInfo::now(None),
                    hardware_information: self.clone(),
                },
            ),
            ExportFormat::Text => write_text(path, &self.text_report()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn drive(device: &str, total: f64, used: f64) -> DriveInfo {
        DriveInfo {
            device: device.to_string(),
            total_gb: total,
            used_gb: used,
            free_gb: total - used,
            ..DriveInfo::default()
        }
    }

    #[test]
    fn test_storage_totals() {
        let storage = StorageSection::from_drives(vec![
            drive("C:\\", 100.0, 25.5),
            drive("D:\\", 400.0, 100.0),
        ]);
        assert_eq!(storage.total_capacity_gb, 500.0);
        assert_eq!(storage.total_used_gb, 125.5);
        assert_eq!(storage.total_free_gb, 374.5);
        assert_eq!(storage.total_used_percentage, Some(25.1));

        let empty = StorageSection::from_drives(Vec::new());
        assert_eq!(empty.total_used_percentage, None);
    }

    #[test]
    fn test_rounding_helpers() {
        assert_eq!(bytes_to_gb(16 * 1024 * 1024 * 1024), 16.0);
        assert_eq!(bytes_to_gb(1536 * 1024 * 1024), 1.5);
        assert_eq!(round1(33.333), 33.3);
        assert_eq!(round2(2.345_67), 2.35);
    }

    #[test]
    fn test_text_report_sections() {
        let report = HardwareReport {
            system: SystemSection {
                computer_name: "WORKSTATION".into(),
                ..SystemSection::default()
            },
            gpu: GpuSection {
                name: "GeForce RTX 3070".into(),
                display_resolution: Some("2560x1440".into()),
                ..GpuSection::default()
            },
            storage: StorageSection::from_drives(vec![drive("C:\\", 100.0, 50.0)]),
            battery: BatterySection::absent(),
            ..HardwareReport::default()
        };
        let text = report.text_report();
        assert!(text.starts_with("HARDWARE INFORMATION REPORT\n"));
        assert!(text.contains("Computer Name: WORKSTATION\n"));
        assert!(text.contains("Video Memory: Unknown GB\n"));
        assert!(text.contains("Display Resolution: 2560x1440\n"));
        assert!(!text.contains("Refresh Rate"));
        assert!(text.contains("  Drive 1: C:\\\n    Type: Unknown\n"));
        assert!(text.contains("Battery Present: No (Desktop system)\n"));
        assert!(text.ends_with("End of Hardware Information Report\n"));
    }

    #[test]
    fn test_json_export_wraps_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hardware.json");
        let report = HardwareReport {
            battery: BatterySection::absent(),
            ..HardwareReport::default()
        };
        report.export(&path, ExportFormat::Json).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["export_info"]["format_version"], "1.0");
        assert!(value["export_info"].get("total_items").is_none());
        assert_eq!(value["hardware_information"]["battery"]["present"], false);
        assert!(value["hardware_information"]["gpu"].get("vram_gb").is_none());

        let parsed: HardwareExport = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.hardware_information, report);
    }
}
