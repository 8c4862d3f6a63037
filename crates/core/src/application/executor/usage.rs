// Usage driver
//
// One `top` snapshot gives the CPU/memory header and process rows. Newer
// `top` builds print memory in MiB with decimals, which the header pattern
// does not match; memory then comes from meminfo instead.

use super::{output_lines, Executor};
use crate::application::constants::{MEMINFO_SEPARATOR, TOP_PROCESS_FIELDS};
use crate::domain::{CpuMemProcessesUsage, CpuMemUsage, ProcessInfo};
use crate::error::AppError;
use crate::port::{ExecFailure, ExecResult, Reply, Verb};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn top_cpu() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^.*Cpu\(s\):\s+([0-9.]+) us.*$").expect("static regex"))
}

fn top_mem() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^.*Mem.*:.*,\s+([0-9]+) free,\s+([0-9]+) used,\s+([0-9]+) buff/cache.*$")
            .expect("static regex")
    })
}

fn meminfo_total() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^MemTotal:\s*([0-9]+)\s+kB$").expect("static regex"))
}

fn meminfo_free() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^MemFree:\s*([0-9]+)\s+kB$").expect("static regex"))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Memory figures in KiB, turned into a percentage and an `<n>MB` total
fn memory_usage(used: u64, total: u64) -> (f64, String) {
    let usage = round2(100.0 * used as f64 / total as f64);
    (usage, format!("{}MB", total / 1024))
}

/// A process row must split into exactly the expected number of fields.
/// Wrapped or truncated rows are dropped, never partially read.
pub(crate) fn parse_process_row(line: &str) -> Option<ProcessInfo> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != TOP_PROCESS_FIELDS {
        return None;
    }
    Some(ProcessInfo {
        pid: fields[0].parse().ok()?,
        owner: fields[1].to_string(),
        cpu_usage: fields[8].parse().ok()?,
        mem_usage: fields[9].parse().ok()?,
        command: fields[11].to_string(),
    })
}

/// Parse a `top -b -n 1` snapshot.
pub(crate) fn parse_top(output: &str) -> CpuMemProcessesUsage {
    let mut parsed = CpuMemProcessesUsage::default();
    let usage = &mut parsed.usage;

    for line in output_lines(output) {
        if usage.user_cpu_usage.is_none() {
            usage.user_cpu_usage = top_cpu()
                .captures(line)
                .and_then(|caps| caps[1].parse().ok());
        }
        if usage.mem_usage.is_none() {
            if let Some(caps) = top_mem().captures(line) {
                let free: u64 = caps[1].parse().unwrap_or(0);
                let used: u64 = caps[2].parse().unwrap_or(0);
                let buff: u64 = caps[3].parse().unwrap_or(0);
                if free != 0 && used != 0 && buff != 0 {
                    let (mem_usage, mem_total) = memory_usage(used, free + used + buff);
                    usage.mem_usage = Some(mem_usage);
                    usage.mem_total = Some(mem_total);
                }
            }
        }
        if let Some(process) = parse_process_row(line.trim()) {
            parsed.processes.push(process);
        }
    }
    parsed
}

/// Usage and `<n>MB` total from `/proc/meminfo`. `None` if either figure
/// is missing or zero.
pub(crate) fn parse_meminfo_usage(output: &str) -> Option<(f64, String)> {
    let mut total = 0u64;
    let mut free = 0u64;
    for line in output_lines(output).map(str::trim) {
        if let Some(caps) = meminfo_total().captures(line) {
            total = caps[1].parse().unwrap_or(0);
        }
        if let Some(caps) = meminfo_free().captures(line) {
            free = caps[1].parse().unwrap_or(0);
        }
    }
    if total == 0 || free == 0 {
        return None;
    }
    Some(memory_usage(total.saturating_sub(free), total))
}

impl Executor {
    /// CPU and memory usage plus the process table.
    ///
    /// Falls back to meminfo when the snapshot has no usable memory header;
    /// the meminfo output is appended after a separator line.
    pub async fn cpu_mem_processes_usage(&self) -> ExecResult<CpuMemProcessesUsage> {
        let mut output = self.run(Verb::Top, &[]).await?;
        let mut parsed = parse_top(&output);
        debug!(host = %self.addr, processes = parsed.processes.len(), "top snapshot parsed");

        if parsed.usage.mem_usage.is_none() {
            debug!(host = %self.addr, "memory header missing, reading meminfo");
            output.push_str(MEMINFO_SEPARATOR);
            match self.run(Verb::MemInfo, &[]).await {
                Ok(meminfo) => {
                    if let Some((mem_usage, mem_total)) = parse_meminfo_usage(&meminfo) {
                        parsed.usage = CpuMemUsage {
                            mem_usage: Some(mem_usage),
                            mem_total: Some(mem_total),
                            ..parsed.usage
                        };
                    }
                    output.push_str(&meminfo);
                }
                Err(failure) => {
                    output.push_str(&failure.output);
                    return Err(ExecFailure::new(output, failure.error));
                }
            }
        }

        Ok(Reply::new(output, parsed))
    }

    /// Raw output of the NVIDIA name and usage queries. A failing name query
    /// is tolerated; its output still leads the result.
    pub async fn gpu_usages(&self) -> ExecResult<()> {
        let names = match self.run(Verb::NvidiaGpuName, &[]).await {
            Ok(output) => output,
            Err(failure) => {
                // Config errors are installation faults, not missing GPUs.
                if matches!(failure.error, AppError::Config(_)) {
                    return Err(failure);
                }
                failure.output
            }
        };
        match self.run(Verb::NvidiaGpuUsage, &[]).await {
            Ok(usage) => Ok(Reply::new(format!("{}\n{}", names, usage), ())),
            Err(failure) => Err(ExecFailure::new(
                format!("{}\n{}", names, failure.output),
                failure.error,
            )),
        }
    }
}
