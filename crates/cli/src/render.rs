//! Table and status-line rendering

use colored::Colorize;
use hostward_core::application::HostInfo;
use hostward_core::domain::{
    AccountRecord, CpuMemProcessesUsage, Diagnostic, HardwareInfo, RemoteSession,
};
use tabled::{Table, Tabled};

/// Processes shown under the usage section
const TOP_PROCESSES: usize = 10;

#[derive(Tabled)]
struct HostRow {
    name: String,
    address: String,
    port: u16,
    os: String,
    description: String,
    status: String,
}

pub fn hosts_table(hosts: &[HostInfo]) -> String {
    let rows: Vec<HostRow> = hosts
        .iter()
        .map(|info| HostRow {
            name: info.host.name.clone(),
            address: info.host.addr.address.clone(),
            port: info.host.addr.port,
            os: info.host.os_type.to_string(),
            description: info.host.description.clone(),
            status: match &info.access_failure {
                Some(cause) => format!("unreachable: {}", cause),
                None => "ok".to_string(),
            },
        })
        .collect();
    Table::new(rows).to_string()
}

#[derive(Tabled)]
struct AccountRow {
    name: String,
    uid: u32,
    gid: u32,
    state: String,
    backup: String,
}

fn backup_cell(account: &AccountRecord) -> String {
    match &account.backup_dir {
        None => "-".to_string(),
        Some(section) => match (&section.value, &section.failure) {
            (Some(info), _) if info.dir_exists => info.backup_dir.clone(),
            (Some(info), _) if info.path_exists => format!("{} (not a dir)", info.backup_dir),
            (Some(_), _) => "none".to_string(),
            (None, Some(cause)) => format!("lookup failed: {}", cause),
            (None, None) => "-".to_string(),
        },
    }
}

pub fn accounts_table(accounts: &[AccountRecord]) -> String {
    let rows: Vec<AccountRow> = accounts
        .iter()
        .map(|account| AccountRow {
            name: account.name.clone(),
            uid: account.uid,
            gid: account.gid,
            state: if account.not_found_on_remote {
                "missing on host".to_string()
            } else {
                "present".to_string()
            },
            backup: backup_cell(account),
        })
        .collect();
    Table::new(rows).to_string()
}

#[derive(Tabled)]
struct ProcessRow {
    pid: u32,
    owner: String,
    #[tabled(rename = "cpu %")]
    cpu: f64,
    #[tabled(rename = "mem %")]
    mem: f64,
    command: String,
}

#[derive(Tabled)]
struct SessionRow {
    account: String,
    what: String,
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Print a failed section with whatever the host printed
fn print_failure<T>(title: &str, section: &Diagnostic<T>) -> bool {
    match &section.failure {
        Some(cause) => {
            println!("  {} {}: {}", "✗".red(), title.bold(), cause);
            if !section.output.trim().is_empty() {
                println!("{}", section.output.trim_end().dimmed());
            }
            true
        }
        None => false,
    }
}

fn print_hardware(hardware: &HardwareInfo) {
    println!("{}", "Hardware".cyan().bold());
    if !print_failure("CPU", &hardware.cpu) {
        if let Some(cpu) = &hardware.cpu.value {
            println!(
                "  {} {} ({} cores x {} threads, {})",
                "CPU:".bold(),
                opt(&cpu.model_name),
                opt(&cpu.cores),
                opt(&cpu.threads_per_core),
                opt(&cpu.architecture)
            );
        }
    }
    if !print_failure("Memory", &hardware.memory) {
        if let Some(memory) = &hardware.memory.value {
            println!("  {} {}", "Memory:".bold(), memory.total);
        }
    }
    if !print_failure("GPU", &hardware.gpus) {
        match hardware.gpus.value.as_deref() {
            Some([]) | None => println!("  {} none", "GPU:".bold()),
            Some(gpus) => {
                for gpu in gpus {
                    println!("  {} {}", "GPU:".bold(), gpu.product);
                }
            }
        }
    }
}

fn print_usage(section: &Diagnostic<CpuMemProcessesUsage>) {
    println!("{}", "Usage".cyan().bold());
    if print_failure("CPU/memory", section) {
        return;
    }
    let Some(usage) = &section.value else {
        return;
    };
    println!(
        "  {} {}%  {} {}% of {}",
        "CPU:".bold(),
        opt(&usage.usage.user_cpu_usage),
        "Memory:".bold(),
        opt(&usage.usage.mem_usage),
        opt(&usage.usage.mem_total)
    );
    let rows: Vec<ProcessRow> = usage
        .processes
        .iter()
        .take(TOP_PROCESSES)
        .map(|p| ProcessRow {
            pid: p.pid,
            owner: p.owner.clone(),
            cpu: p.cpu_usage,
            mem: p.mem_usage,
            command: p.command.clone(),
        })
        .collect();
    if !rows.is_empty() {
        println!("{}", Table::new(rows));
    }
}

fn print_sessions(section: &Diagnostic<Vec<RemoteSession>>) {
    println!("{}", "Sessions".cyan().bold());
    if print_failure("Sessions", section) {
        return;
    }
    match section.value.as_deref() {
        Some([]) | None => println!("  none"),
        Some(sessions) => {
            let rows: Vec<SessionRow> = sessions
                .iter()
                .map(|s| SessionRow {
                    account: s.account.clone(),
                    what: s.what.clone(),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }
}

pub fn print_host_info(info: &HostInfo) {
    println!(
        "{} {} ({})",
        "Host".cyan().bold(),
        info.host.name.bold(),
        info.host.addr
    );
    if let Some(cause) = &info.access_failure {
        println!("  {} {}", "✗ unreachable:".red().bold(), cause);
        return;
    }
    println!();

    if let Some(accounts) = &info.accounts {
        println!("{}", "Accounts".cyan().bold());
        if !print_failure("Accounts", accounts) {
            if let Some(list) = &accounts.value {
                println!("{}", accounts_table(list));
            }
        }
        println!();
    }
    if let Some(hardware) = &info.hardware {
        print_hardware(hardware);
        println!();
    }
    if let Some(usage) = &info.cpu_mem_processes {
        print_usage(usage);
        println!();
    }
    if let Some(sessions) = &info.remote_access {
        print_sessions(sessions);
        println!();
    }
    if let Some(gpu) = &info.gpu_usages {
        println!("{}", "GPU usage".cyan().bold());
        if !print_failure("GPU usage", gpu) {
            println!("{}", gpu.output.trim_end());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostward_core::domain::{BackupDirInfo, HostAddr, HostRecord};

    fn account(name: &str, backup: Option<Diagnostic<BackupDirInfo>>) -> AccountRecord {
        let mut record = AccountRecord::new(HostAddr::new("h", 22), name, "");
        record.uid = 1001;
        record.gid = 1001;
        record.backup_dir = backup;
        record
    }

    #[test]
    fn test_hosts_table_shows_unreachable() {
        let host = HostRecord::new(HostAddr::new("10.0.0.7", 22), "gpu-7", "ops", "");
        let table = hosts_table(&[
            HostInfo::new(&host),
            HostInfo::access_failed(&host, "connection refused"),
        ]);
        assert!(table.contains("gpu-7"));
        assert!(table.contains("ok"));
        assert!(table.contains("unreachable: connection refused"));
    }

    #[test]
    fn test_backup_cells() {
        let found = BackupDirInfo {
            backup_dir: "/backup/amy.backup".into(),
            path_exists: true,
            dir_exists: true,
        };
        let absent = BackupDirInfo {
            backup_dir: "/backup/bob.backup".into(),
            path_exists: false,
            dir_exists: false,
        };
        assert_eq!(backup_cell(&account("zed", None)), "-");
        assert_eq!(
            backup_cell(&account("amy", Some(Diagnostic::loaded("", found)))),
            "/backup/amy.backup"
        );
        assert_eq!(backup_cell(&account("bob", Some(Diagnostic::loaded("", absent)))), "none");
        assert_eq!(
            backup_cell(&account("cy", Some(Diagnostic::failed("", "timeout")))),
            "lookup failed: timeout"
        );
    }

    #[test]
    fn test_accounts_table_marks_missing() {
        let mut gone = account("old", None);
        gone.not_found_on_remote = true;
        let table = accounts_table(&[account("amy", None), gone]);
        assert!(table.contains("present"));
        assert!(table.contains("missing on host"));
    }
}
