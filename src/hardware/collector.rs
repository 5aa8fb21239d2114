// src/hardware/collector.rs

use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use serde_json::Value;
use sysinfo::{DiskKind, Disks, System};
use tracing::{debug, info, warn};

use super::{
    codes::{chassis_type, cpu_architecture, drive_type, memory_type},
    report::{
        bytes_to_gb, round1, round2, BatterySection, CpuSection, DriveInfo, GpuSection,
        HardwareReport, MemorySection, StorageSection, SystemSection,
    },
};
use crate::{
    orchestrator::ProgressCallback,
    utils::{
        command::CommandRunner,
        cpu::CPU_INFO,
        powershell::{json_str, json_u64, query_json_rows},
    },
};

const UNKNOWN: &str = "Unknown";
const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

// Adapters skipped when picking the primary GPU
const BASIC_DISPLAY_ADAPTERS: &[&str] = &["microsoft basic display adapter", "generic pnp monitor"];

// Win32_Battery.EstimatedRunTime when the value is not known
const RUNTIME_UNKNOWN: u64 = 71_582_788;

/// Gathers a [`HardwareReport`] from `sysinfo` and, on Windows, WMI.
///
/// WMI failures are logged and leave the affected fields `Unknown`; a
/// collection never fails as a whole.
pub struct HardwareCollector<'a> {
    runner: &'a dyn CommandRunner,
    timeout: Duration,
    wmi: bool,
    sample_cpu: bool,
    power_supply_root: PathBuf,
}

impl<'a> HardwareCollector<'a> {
    pub fn new(runner: &'a dyn CommandRunner, timeout: Duration) -> Self {
        Self {
            runner,
            timeout,
            wmi: cfg!(windows),
            sample_cpu: true,
            power_supply_root: PathBuf::from(POWER_SUPPLY_ROOT),
        }
    }

    /// Enables or disables the WMI queries.
    pub fn with_wmi(mut self, enabled: bool) -> Self {
        self.wmi = enabled;
        self
    }

    /// Skips the short sleep needed to measure CPU usage.
    pub fn without_cpu_sampling(mut self) -> Self {
        self.sample_cpu = false;
        self
    }

    /// Directory holding `BAT*` entries on Linux.
    pub fn with_power_supply_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.power_supply_root = root.into();
        self
    }

    pub fn collect(&self, progress: Option<ProgressCallback<'_>>) -> HardwareReport {
        let report = |message: &str, percent: u8| {
            debug!("Hardware: {} ({}%)", message, percent);
            if let Some(callback) = progress {
                callback(message, percent);
            }
        };

        let mut system = System::new();

        report("Collecting system information...", 10);
        let system_section = self.system();
        report("Collecting CPU information...", 25);
        let cpu = self.cpu(&mut system);
        report("Collecting memory information...", 40);
        let memory = self.memory(&mut system);
        report("Collecting GPU information...", 55);
        let gpu = self.gpu();
        report("Collecting storage information...", 70);
        let storage = self.storage();
        report("Collecting battery information...", 85);
        let battery = self.battery();
        report("Finalizing hardware information...", 100);

        info!("Hardware information collected");
        HardwareReport {
            system: system_section,
            cpu,
            memory,
            gpu,
            storage,
            battery,
        }
    }

    fn wmi_rows(&self, class: &str, properties: &[&str]) -> Vec<Value> {
        if !self.wmi {
            return Vec::new();
        }
        let script = format!(
            "Get-CimInstance -ClassName {} | Select-Object {} | ConvertTo-Json -Depth 2",
            class,
            properties.join(",")
        );
        match query_json_rows(self.runner, &script, self.timeout) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("{} -> WMI query failed: {:#}", class, e);
                Vec::new()
            }
        }
    }

    fn wmi_first(&self, class: &str, properties: &[&str]) -> Option<Value> {
        self.wmi_rows(class, properties).into_iter().next()
    }

    pub fn system(&self) -> SystemSection {
        let mut section = SystemSection {
            computer_name: System::host_name().unwrap_or_else(|| UNKNOWN.to_string()),
            operating_system: System::long_os_version()
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            os_version: System::os_version().unwrap_or_else(|| UNKNOWN.to_string()),
            architecture: std::env::consts::ARCH.to_string(),
            manufacturer: UNKNOWN.to_string(),
            model: UNKNOWN.to_string(),
            system_type: UNKNOWN.to_string(),
            build_number: None,
            os_detailed_version: None,
        };

        if let Some(row) = self.wmi_first("Win32_ComputerSystem", &["Manufacturer", "Model"]) {
            if let Some(manufacturer) = json_str(&row, "Manufacturer") {
                section.manufacturer = manufacturer.to_string();
            }
            if let Some(model) = json_str(&row, "Model") {
                section.model = model.to_string();
            }
        }
        if let Some(row) = self.wmi_first("Win32_SystemEnclosure", &["ChassisTypes"]) {
            if let Some(code) = first_u64(&row, "ChassisTypes") {
                section.system_type = chassis_type(code).to_string();
            }
        }
        if let Some(row) = self.wmi_first("Win32_OperatingSystem", &["BuildNumber", "Version"]) {
            section.build_number = json_str(&row, "BuildNumber").map(str::to_string);
            section.os_detailed_version = json_str(&row, "Version").map(str::to_string);
        }
        section
    }

    fn cpu(&self, system: &mut System) -> CpuSection {
        system.refresh_cpu_all();
        if self.sample_cpu {
            thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            system.refresh_cpu_usage();
        }

        let first = system.cpus().first();
        let mut section = CpuSection {
            name: CPU_INFO
                .brand
                .clone()
                .or_else(|| first.map(|c| c.brand().trim().to_string()))
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            physical_cores: CPU_INFO.physical_cores,
            logical_cores: CPU_INFO.logical_processors,
            architecture: std::env::consts::ARCH.to_string(),
            current_usage: round1(f64::from(system.global_cpu_usage())),
            vendor: CPU_INFO
                .vendor
                .clone()
                .or_else(|| first.map(|c| c.vendor_id().to_string()))
                .filter(|vendor| !vendor.is_empty()),
            max_clock_speed_ghz: None,
            current_frequency_ghz: first
                .map(|c| c.frequency())
                .filter(|mhz| *mhz > 0)
                .map(|mhz| round2(mhz as f64 / 1000.0)),
        };

        if let Some(row) = self.wmi_first(
            "Win32_Processor",
            &["Name", "MaxClockSpeed", "Architecture"],
        ) {
            apply_processor(&mut section, &row);
        }
        section
    }

    fn memory(&self, system: &mut System) -> MemorySection {
        system.refresh_memory();
        let mut section = memory_section(
            system.total_memory(),
            system.used_memory(),
            system.available_memory(),
        );
        if let Some(row) = self.wmi_first(
            "Win32_PhysicalMemory",
            &["Speed", "MemoryType", "SMBIOSMemoryType"],
        ) {
            section.speed_mhz = json_u64(&row, "Speed").filter(|speed| *speed > 0);
            let code = json_u64(&row, "MemoryType")
                .filter(|code| *code != 0)
                .or_else(|| json_u64(&row, "SMBIOSMemoryType"))
                .unwrap_or(0);
            section.memory_type = Some(memory_type(code).to_string());
        }
        section
    }

    fn gpu(&self) -> GpuSection {
        let rows = self.wmi_rows(
            "Win32_VideoController",
            &[
                "Name",
                "AdapterRAM",
                "DriverVersion",
                "CurrentHorizontalResolution",
                "CurrentVerticalResolution",
                "CurrentRefreshRate",
            ],
        );
        gpu_section(&rows)
    }

    fn storage(&self) -> StorageSection {
        let disks = Disks::new_with_refreshed_list();
        let mut drives: Vec<DriveInfo> = disks
            .list()
            .iter()
            .filter(|disk| disk.total_space() > 0)
            .map(|disk| {
                drive_info(
                    &disk.mount_point().to_string_lossy(),
                    &disk.name().to_string_lossy(),
                    &disk.file_system().to_string_lossy(),
                    disk.total_space(),
                    disk.available_space(),
                    disk.is_removable(),
                    match disk.kind() {
                        DiskKind::SSD => Some("SSD"),
                        DiskKind::HDD => Some("HDD"),
                        DiskKind::Unknown(_) => None,
                    },
                )
            })
            .collect();

        let media = self.wmi_rows("Win32_LogicalDisk", &["DeviceID", "MediaType"]);
        apply_media_types(&mut drives, &media);
        StorageSection::from_drives(drives)
    }

    fn battery(&self) -> BatterySection {
        if self.wmi {
            return self
                .wmi_first(
                    "Win32_Battery",
                    &[
                        "EstimatedChargeRemaining",
                        "BatteryStatus",
                        "EstimatedRunTime",
                        "DesignCapacity",
                        "FullChargeCapacity",
                        "CycleCount",
                    ],
                )
                .map(|row| battery_from_wmi(&row))
                .unwrap_or_else(BatterySection::absent);
        }
        battery_from_sysfs(&self.power_supply_root).unwrap_or_else(BatterySection::absent)
    }
}

/// Reads a number that may be wrapped in an array, e.g. `ChassisTypes`.
fn first_u64(row: &Value, field: &str) -> Option<u64> {
    match row.get(field)? {
        Value::Array(values) => values.first().and_then(Value::as_u64),
        _ => json_u64(row, field),
    }
}

fn apply_processor(section: &mut CpuSection, row: &Value) {
    if let Some(name) = json_str(row, "Name") {
        section.name = name.to_string();
    }
    if let Some(mhz) = json_u64(row, "MaxClockSpeed").filter(|mhz| *mhz > 0) {
        section.max_clock_speed_ghz = Some(round2(mhz as f64 / 1000.0));
    }
    if let Some(code) = json_u64(row, "Architecture") {
        section.architecture = cpu_architecture(code).to_string();
    }
}

pub fn memory_section(total: u64, used: u64, available: u64) -> MemorySection {
    let used_percentage = if total > 0 {
        round1(used as f64 / total as f64 * 100.0)
    } else {
        0.0
    };
    MemorySection {
        total_gb: bytes_to_gb(total),
        used_gb: bytes_to_gb(used),
        available_gb: bytes_to_gb(available),
        used_percentage,
        available_percentage: round1(100.0 - used_percentage),
        memory_type: None,
        speed_mhz: None,
    }
}

/// Picks the first adapter that is not a fallback display driver.
pub fn gpu_section(rows: &[Value]) -> GpuSection {
    let primary = rows
        .iter()
        .find(|row| {
            json_str(row, "Name")
                .map(|name| !BASIC_DISPLAY_ADAPTERS.contains(&name.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .or_else(|| rows.first());

    let Some(primary) = primary else {
        return GpuSection {
            name: UNKNOWN.to_string(),
            driver_version: UNKNOWN.to_string(),
            ..GpuSection::default()
        };
    };

    let width = json_u64(primary, "CurrentHorizontalResolution").unwrap_or(0);
    let height = json_u64(primary, "CurrentVerticalResolution").unwrap_or(0);
    let has_display = width > 0 && height > 0;
    GpuSection {
        name: json_str(primary, "Name").unwrap_or(UNKNOWN).to_string(),
        vram_gb: json_u64(primary, "AdapterRAM")
            .filter(|bytes| *bytes > 0)
            .map(bytes_to_gb),
        driver_version: json_str(primary, "DriverVersion")
            .unwrap_or(UNKNOWN)
            .to_string(),
        display_resolution: has_display.then(|| format!("{}x{}", width, height)),
        refresh_rate_hz: json_u64(primary, "CurrentRefreshRate")
            .filter(|hz| has_display && *hz > 0),
    }
}

fn drive_info(
    mountpoint: &str,
    name: &str,
    filesystem: &str,
    total: u64,
    available: u64,
    removable: bool,
    physical_type: Option<&str>,
) -> DriveInfo {
    let used = total.saturating_sub(available);
    let device = if cfg!(windows) || name.is_empty() {
        mountpoint.to_string()
    } else {
        name.to_string()
    };
    DriveInfo {
        device,
        mountpoint: mountpoint.to_string(),
        filesystem: filesystem.to_string(),
        total_gb: bytes_to_gb(total),
        used_gb: bytes_to_gb(used),
        free_gb: bytes_to_gb(available),
        used_percentage: round1(used as f64 / total as f64 * 100.0),
        removable,
        drive_type: None,
        physical_type: physical_type.map(str::to_string),
    }
}

/// Matches `Win32_LogicalDisk` rows to drives by letter.
pub fn apply_media_types(drives: &mut [DriveInfo], rows: &[Value]) {
    for row in rows {
        let (Some(device_id), Some(code)) = (json_str(row, "DeviceID"), json_u64(row, "MediaType"))
        else {
            continue;
        };
        let letter = device_id.trim_end_matches(':').to_uppercase();
        for drive in drives.iter_mut() {
            let mount = drive
                .mountpoint
                .trim_end_matches(['\\', '/'])
                .trim_end_matches(':')
                .to_uppercase();
            if mount == letter {
                drive.drive_type = Some(drive_type(code).to_string());
            }
        }
    }
}

fn format_runtime(minutes: u64) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

pub fn battery_from_wmi(row: &Value) -> BatterySection {
    // 2 = on AC power, 3 = fully charged, 6..=9 = charging
    let status = json_u64(row, "BatteryStatus").unwrap_or(0);
    let plugged = matches!(status, 2 | 3 | 6..=9);
    let runtime = json_u64(row, "EstimatedRunTime").filter(|m| *m != RUNTIME_UNKNOWN);
    let time_remaining = match (plugged, runtime) {
        (true, _) => "Charging".to_string(),
        (false, Some(minutes)) => format_runtime(minutes),
        (false, None) => UNKNOWN.to_string(),
    };
    let health = match (
        json_u64(row, "DesignCapacity"),
        json_u64(row, "FullChargeCapacity"),
    ) {
        (Some(design), Some(full)) if design > 0 && full > 0 => {
            Some(round1(full as f64 / design as f64 * 100.0))
        }
        _ => None,
    };

    BatterySection {
        present: true,
        charge_percentage: json_u64(row, "EstimatedChargeRemaining").map(|p| p as f64),
        power_plugged: Some(plugged),
        time_remaining: Some(time_remaining),
        health_percentage: health,
        cycle_count: json_u64(row, "CycleCount").filter(|c| *c > 0),
        message: None,
    }
}

fn read_number(dir: &Path, file: &str) -> Option<u64> {
    fs::read_to_string(dir.join(file)).ok()?.trim().parse().ok()
}

/// Reads the first `BAT*` entry under a Linux `power_supply` directory.
pub fn battery_from_sysfs(root: &Path) -> Option<BatterySection> {
    let mut batteries: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("BAT"))
        .map(|e| e.path())
        .collect();
    batteries.sort();
    let dir = batteries.into_iter().next()?;

    let status = fs::read_to_string(dir.join("status")).unwrap_or_default();
    let status = status.trim();
    let plugged = !status.eq_ignore_ascii_case("Discharging");

    let (now, full, design, rate) = match read_number(&dir, "energy_full") {
        Some(full) => (
            read_number(&dir, "energy_now"),
            Some(full),
            read_number(&dir, "energy_full_design"),
            read_number(&dir, "power_now"),
        ),
        None => (
            read_number(&dir, "charge_now"),
            read_number(&dir, "charge_full"),
            read_number(&dir, "charge_full_design"),
            read_number(&dir, "current_now"),
        ),
    };

    let time_remaining = if plugged {
        "Charging".to_string()
    } else {
        match (now, rate) {
            (Some(now), Some(rate)) if rate > 0 => format_runtime(now * 60 / rate),
            _ => UNKNOWN.to_string(),
        }
    };
    let health = match (full, design) {
        (Some(full), Some(design)) if design > 0 => Some(round1(full as f64 / design as f64 * 100.0)),
        _ => None,
    };

    Some(BatterySection {
        present: true,
        charge_percentage: read_number(&dir, "capacity").map(|p| p as f64),
        power_plugged: Some(plugged),
        time_remaining: Some(time_remaining),
        health_percentage: health,
        cycle_count: read_number(&dir, "cycle_count").filter(|c| *c > 0),
        message: None,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::utils::command::testing::ScriptedRunner;

    fn wmi(class: &str) -> String {
        format!(
            "powershell -NoProfile -NonInteractive -ExecutionPolicy Bypass -Command Get-CimInstance -ClassName {} ",
            class
        )
    }

    #[test]
    fn test_system_section_from_wmi() {
        let runner = ScriptedRunner::new()
            .on(
                &wmi("Win32_ComputerSystem"),
                r#"{"Manufacturer":"Dell Inc.","Model":"XPS 15 9520"}"#,
            )
            .on(&wmi("Win32_SystemEnclosure"), r#"{"ChassisTypes":[10]}"#)
            .on(
                &wmi("Win32_OperatingSystem"),
                r#"{"BuildNumber":"22631","Version":"10.0.22631"}"#,
            );
        let collector =
            HardwareCollector::new(&runner, Duration::from_secs(1)).with_wmi(true);
        let system = collector.system();
        assert_eq!(system.manufacturer, "Dell Inc.");
        assert_eq!(system.model, "XPS 15 9520");
        assert_eq!(system.system_type, "Notebook");
        assert_eq!(system.build_number.as_deref(), Some("22631"));
        assert_eq!(system.os_detailed_version.as_deref(), Some("10.0.22631"));
    }

    #[test]
    fn test_failed_queries_leave_unknown() {
        let runner = ScriptedRunner::new().on_timeout("powershell");
        let collector =
            HardwareCollector::new(&runner, Duration::from_secs(1)).with_wmi(true);
        let system = collector.system();
        assert_eq!(system.manufacturer, "Unknown");
        assert_eq!(system.system_type, "Unknown");
        assert_eq!(system.build_number, None);
    }

    #[test]
    fn test_collect_without_wmi_reports_progress() {
        let runner = ScriptedRunner::new();
        let power = tempfile::tempdir().unwrap();
        let collector = HardwareCollector::new(&runner, Duration::from_secs(1))
            .with_wmi(false)
            .without_cpu_sampling()
            .with_power_supply_root(power.path());

        let seen = RefCell::new(Vec::new());
        let progress = |_: &str, percent: u8| seen.borrow_mut().push(percent);
        let report = collector.collect(Some(&progress));

        assert_eq!(seen.into_inner(), vec![10, 25, 40, 55, 70, 85, 100]);
        assert!(runner.calls().is_empty());
        assert_eq!(report.gpu.name, "Unknown");
        assert!(!report.battery.present);
        assert!(report.cpu.logical_cores >= report.cpu.physical_cores);
        assert!(report.memory.total_gb > 0.0);
    }

    #[test]
    fn test_processor_and_memory_values() {
        let mut cpu = CpuSection::default();
        apply_processor(
            &mut cpu,
            &json!({"Name": "AMD Ryzen 7 5800X 8-Core Processor", "MaxClockSpeed": 3801, "Architecture": 9}),
        );
        assert_eq!(cpu.name, "AMD Ryzen 7 5800X 8-Core Processor");
        assert_eq!(cpu.max_clock_speed_ghz, Some(3.8));
        assert_eq!(cpu.architecture, "x64");

        let gb = 1024 * 1024 * 1024;
        let memory = memory_section(16 * gb, 4 * gb, 12 * gb);
        assert_eq!(memory.total_gb, 16.0);
        assert_eq!(memory.used_percentage, 25.0);
        assert_eq!(memory.available_percentage, 75.0);
    }

    #[test]
    fn test_gpu_skips_basic_display_adapter() {
        let rows = vec![
            json!({"Name": "Microsoft Basic Display Adapter", "AdapterRAM": 0}),
            json!({
                "Name": "NVIDIA GeForce RTX 3070",
                "AdapterRAM": 4293918720u64,
                "DriverVersion": "31.0.15.3623",
                "CurrentHorizontalResolution": 2560,
                "CurrentVerticalResolution": 1440,
                "CurrentRefreshRate": 144
            }),
        ];
        let gpu = gpu_section(&rows);
        assert_eq!(gpu.name, "NVIDIA GeForce RTX 3070");
        assert_eq!(gpu.vram_gb, Some(4.0));
        assert_eq!(gpu.driver_version, "31.0.15.3623");
        assert_eq!(gpu.display_resolution.as_deref(), Some("2560x1440"));
        assert_eq!(gpu.refresh_rate_hz, Some(144));

        let basic_only = gpu_section(&rows[..1]);
        assert_eq!(basic_only.name, "Microsoft Basic Display Adapter");
        assert_eq!(basic_only.vram_gb, None);
        assert_eq!(basic_only.display_resolution, None);
    }

    #[test]
    fn test_media_types_match_drive_letters() {
        let gb = 1024 * 1024 * 1024;
        let mut drives = vec![
            drive_info("C:\\", "", "NTFS", 100 * gb, 40 * gb, false, Some("SSD")),
            drive_info("E:\\", "", "CDFS", 4 * gb, 0, true, None),
        ];
        assert_eq!(drives[0].used_gb, 60.0);
        assert_eq!(drives[0].used_percentage, 60.0);

        apply_media_types(
            &mut drives,
            &[
                json!({"DeviceID": "C:", "MediaType": 12}),
                json!({"DeviceID": "E:", "MediaType": 15}),
                json!({"DeviceID": "Z:", "MediaType": null}),
            ],
        );
        assert_eq!(drives[0].drive_type.as_deref(), Some("HDD"));
        assert_eq!(drives[0].physical_type.as_deref(), Some("SSD"));
        assert_eq!(drives[1].drive_type.as_deref(), Some("Optical"));
    }

    #[test]
    fn test_battery_from_wmi() {
        let discharging = battery_from_wmi(&json!({
            "EstimatedChargeRemaining": 64,
            "BatteryStatus": 1,
            "EstimatedRunTime": 135,
            "DesignCapacity": 50000,
            "FullChargeCapacity": 45000
        }));
        assert!(discharging.present);
        assert_eq!(discharging.charge_percentage, Some(64.0));
        assert_eq!(discharging.power_plugged, Some(false));
        assert_eq!(discharging.time_remaining.as_deref(), Some("2h 15m"));
        assert_eq!(discharging.health_percentage, Some(90.0));

        let charging = battery_from_wmi(&json!({
            "EstimatedChargeRemaining": 80,
            "BatteryStatus": 6,
            "EstimatedRunTime": RUNTIME_UNKNOWN
        }));
        assert_eq!(charging.time_remaining.as_deref(), Some("Charging"));
        assert_eq!(charging.health_percentage, None);
    }

    #[test]
    fn test_battery_from_sysfs() {
        let root = tempfile::tempdir().unwrap();
        assert!(battery_from_sysfs(root.path()).is_none());

        let bat = root.path().join("BAT0");
        fs::create_dir_all(&bat).unwrap();
        fs::create_dir_all(root.path().join("AC")).unwrap();
        for (file, value) in [
            ("status", "Discharging\n"),
            ("capacity", "57\n"),
            ("energy_now", "30000000\n"),
            ("energy_full", "48000000\n"),
            ("energy_full_design", "60000000\n"),
            ("power_now", "12000000\n"),
            ("cycle_count", "212\n"),
        ] {
            fs::write(bat.join(file), value).unwrap();
        }

        let battery = battery_from_sysfs(root.path()).unwrap();
        assert_eq!(battery.charge_percentage, Some(57.0));
        assert_eq!(battery.power_plugged, Some(false));
        assert_eq!(battery.time_remaining.as_deref(), Some("2h 30m"));
        assert_eq!(battery.health_percentage, Some(80.0));
        assert_eq!(battery.cycle_count, Some(212));
    }
}
