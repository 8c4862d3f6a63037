// Diagnostic Facts
// Rebuilt on every request, never persisted.

use serde::{Deserialize, Serialize};

/// One loaded section of a host report.
///
/// `output` is kept even when parsing fails: it is the audit trail and the
/// fallback display value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic<T> {
    pub output: String,
    pub value: Option<T>,
    pub failure: Option<String>,
}

impl<T> Diagnostic<T> {
    pub fn loaded(output: impl Into<String>, value: T) -> Self {
        Self {
            output: output.into(),
            value: Some(value),
            failure: None,
        }
    }

    pub fn failed(output: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            value: None,
            failure: Some(cause.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// `lscpu` fields; a field is `None` when its line was absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuHardware {
    pub architecture: Option<String>,
    pub cores: Option<u32>,
    pub threads_per_core: Option<u32>,
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuHardware {
    pub product: String,
}

impl GpuHardware {
    pub fn is_nvidia(&self) -> bool {
        self.product.contains("NVIDIA")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryHardware {
    /// As printed by the host, e.g. `16305564 kB`
    pub total: String,
}

/// Hardware sections load independently; one failing leaves the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub cpu: Diagnostic<CpuHardware>,
    pub gpus: Diagnostic<Vec<GpuHardware>>,
    pub memory: Diagnostic<MemoryHardware>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMemUsage {
    /// Total user CPU percentage from the `top` header
    pub user_cpu_usage: Option<f64>,
    /// Memory usage percentage, two decimals
    pub mem_usage: Option<f64>,
    /// Total memory, `<n>MB`
    pub mem_total: Option<String>,
}

/// One `top` process row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub owner: String,
    pub cpu_usage: f64,
    pub mem_usage: f64,
    pub command: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuMemProcessesUsage {
    pub usage: CpuMemUsage,
    pub processes: Vec<ProcessInfo>,
}

/// One connected session on the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub account: String,
    pub what: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nvidia_predicate() {
        let gpu = GpuHardware {
            product: "NVIDIA Corporation GV102 (rev a1)".into(),
        };
        assert!(gpu.is_nvidia());

        let gpu = GpuHardware {
            product: "Matrox Electronics Systems Ltd. G200eR2".into(),
        };
        assert!(!gpu.is_nvidia());
    }

    #[test]
    fn test_failed_section_keeps_output() {
        let section: Diagnostic<CpuHardware> = Diagnostic::failed("lscpu: not found", "exit 127");
        assert!(section.is_failed());
        assert_eq!(section.output, "lscpu: not found");
        assert!(section.value.is_none());
    }
}
