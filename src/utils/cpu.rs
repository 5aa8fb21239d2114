// src/utils/cpu.rs

use once_cell::sync::Lazy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuInfo {
    pub physical_cores: usize,
    pub logical_processors: usize,
    pub vendor: Option<String>,
    pub brand: Option<String>,
}

impl Default for CpuInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuInfo {
    pub fn new() -> Self {
        let (vendor, brand) = cpuid_strings();
        CpuInfo {
            physical_cores: num_cpus::get_physical(),
            logical_processors: num_cpus::get(),
            vendor,
            brand,
        }
    }

    pub fn hyperthreading(&self) -> bool {
        self.logical_processors > self.physical_cores
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn cpuid_strings() -> (Option<String>, Option<String>) {
    let cpuid = raw_cpuid::CpuId::new();
    let vendor = cpuid.get_vendor_info().map(|v| v.as_str().to_string());
    let brand = cpuid
        .get_processor_brand_string()
        .map(|b| b.as_str().trim().to_string())
        .filter(|b| !b.is_empty());
    (vendor, brand)
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn cpuid_strings() -> (Option<String>, Option<String>) {
    (None, None)
}

pub static CPU_INFO: Lazy<CpuInfo> = Lazy::new(CpuInfo::new);
