// src/hardware/codes.rs

//! Lookup tables for the numeric codes WMI reports.

const UNKNOWN: &str = "Unknown";

/// `Win32_SystemEnclosure.ChassisTypes`
pub fn chassis_type(code: u64) -> &'static str {
    match code {
        1 => "Other",
        2 => "Unknown",
        3 => "Desktop",
        4 => "Low Profile Desktop",
        5 => "Pizza Box",
        6 => "Mini Tower",
        7 => "Tower",
        8 => "Portable",
        9 => "Laptop",
        10 => "Notebook",
        11 => "Hand Held",
        12 => "Docking Station",
        13 => "All in One",
        14 => "Sub Notebook",
        15 => "Space-saving",
        16 => "Lunch Box",
        17 => "Main Server Chassis",
        18 => "Expansion Chassis",
        19 => "SubChassis",
        20 => "Bus Expansion Chassis",
        21 => "Peripheral Chassis",
        22 => "RAID Chassis",
        23 => "Rack Mount Chassis",
        24 => "Sealed-case PC",
        30 => "Tablet",
        31 => "Convertible",
        32 => "Detachable",
        _ => UNKNOWN,
    }
}

/// `Win32_Processor.Architecture`
pub fn cpu_architecture(code: u64) -> &'static str {
    match code {
        0 => "x86",
        1 => "MIPS",
        2 => "Alpha",
        3 => "PowerPC",
        5 => "ARM",
        6 => "ia64",
        9 => "x64",
        12 => "ARM64",
        _ => UNKNOWN,
    }
}

/// `Win32_PhysicalMemory.MemoryType` (and `SMBIOSMemoryType`, which agrees
/// for the DDR generations).
pub fn memory_type(code: u64) -> &'static str {
    match code {
        0 => "Unknown",
        1 => "Other",
        2 => "DRAM",
        3 => "Synchronous DRAM",
        4 => "Cache DRAM",
        5 => "EDO",
        6 => "EDRAM",
        7 => "VRAM",
        8 => "SRAM",
        9 => "RAM",
        10 => "ROM",
        11 => "Flash",
        12 => "EEPROM",
        13 => "FEPROM",
        14 => "EPROM",
        15 => "CDRAM",
        16 => "3DRAM",
        17 => "SDRAM",
        18 => "SGRAM",
        19 => "RDRAM",
        20 => "DDR",
        21 => "DDR2",
        22 => "DDR2 FB-DIMM",
        24 => "DDR3",
        25 => "FBD2",
        26 => "DDR4",
        27 => "LPDDR",
        28 => "LPDDR2",
        29 => "LPDDR3",
        30 => "LPDDR4",
        34 => "DDR5",
        35 => "LPDDR5",
        _ => UNKNOWN,
    }
}

/// `Win32_LogicalDisk.MediaType`, collapsed into broad categories.
pub fn drive_type(code: u64) -> &'static str {
    match code {
        1..=9 | 19 => "Floppy",
        11 | 12 | 21 => "HDD",
        13..=18 | 22 => "Optical",
        10 | 20 => "Removable media other than floppy",
        _ => UNKNOWN,
    }
}
