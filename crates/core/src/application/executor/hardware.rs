// Hardware driver
// lscpu, lspci and meminfo parsed line by line; the first match per field wins.

use super::{output_lines, Executor};
use crate::domain::{CpuHardware, GpuHardware, MemoryHardware};
use crate::port::{ExecResult, Reply, Verb};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

struct CpuPatterns {
    architecture: Regex,
    cores: Regex,
    threads_per_core: Regex,
    model_name: Regex,
}

fn cpu_patterns() -> &'static CpuPatterns {
    static RE: OnceLock<CpuPatterns> = OnceLock::new();
    RE.get_or_init(|| CpuPatterns {
        architecture: Regex::new(r"^Architecture:\s+([^\s]+)$").expect("static regex"),
        cores: Regex::new(r"^CPU\(s\):\s+([^\s]+)$").expect("static regex"),
        threads_per_core: Regex::new(r"^Thread\(s\) per core:\s+([^\s]+)$").expect("static regex"),
        model_name: Regex::new(r"^Model name:\s+(.*)$").expect("static regex"),
    })
}

fn vga_controller() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^.*VGA.*controller: (.*)$").expect("static regex"))
}

fn mem_total() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^MemTotal:\s+(.*)$").expect("static regex"))
}

fn capture(re: &Regex, line: &str) -> Option<String> {
    re.captures(line).map(|caps| caps[1].to_string())
}

pub(crate) fn parse_lscpu(output: &str) -> CpuHardware {
    let re = cpu_patterns();
    let mut cpu = CpuHardware::default();
    for line in output_lines(output).map(str::trim) {
        if cpu.architecture.is_none() {
            cpu.architecture = capture(&re.architecture, line);
        }
        if cpu.cores.is_none() {
            cpu.cores = capture(&re.cores, line).and_then(|v| v.parse().ok());
        }
        if cpu.threads_per_core.is_none() {
            cpu.threads_per_core = capture(&re.threads_per_core, line).and_then(|v| v.parse().ok());
        }
        if cpu.model_name.is_none() {
            cpu.model_name = capture(&re.model_name, line);
        }
    }
    cpu
}

pub(crate) fn parse_lsgpu(output: &str) -> Vec<GpuHardware> {
    output_lines(output)
        .filter_map(|line| capture(vga_controller(), line.trim()))
        .map(|product| GpuHardware { product })
        .collect()
}

pub(crate) fn parse_mem_total(output: &str) -> MemoryHardware {
    let total = output_lines(output)
        .find_map(|line| capture(mem_total(), line.trim()))
        .unwrap_or_default();
    MemoryHardware { total }
}

impl Executor {
    pub async fn cpu_hardware(&self) -> ExecResult<CpuHardware> {
        let output = self.run(Verb::Lscpu, &[]).await?;
        let cpu = parse_lscpu(&output);
        debug!(host = %self.addr, cores = ?cpu.cores, "cpu hardware parsed");
        Ok(Reply::new(output, cpu))
    }

    /// Every VGA controller reported by the host, in listing order
    pub async fn gpu_hardware(&self) -> ExecResult<Vec<GpuHardware>> {
        let output = self.run(Verb::Lsgpu, &[]).await?;
        let gpus = parse_lsgpu(&output);
        Ok(Reply::new(output, gpus))
    }

    pub async fn memory_hardware(&self) -> ExecResult<MemoryHardware> {
        let output = self.run(Verb::MemInfo, &[]).await?;
        let memory = parse_mem_total(&output);
        Ok(Reply::new(output, memory))
    }
}
