//! Hostward CLI - Command-line interface for the Hostward daemon

mod render;
mod rpc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use hostward_core::application::{HostInfo, LoadOptions};
use hostward_core::domain::{BackupDirInfo, HostRecord};
use rpc::RpcClient;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9631";

#[derive(Parser)]
#[command(name = "hostward")]
#[command(about = "Administer accounts and inspect remote Linux hosts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "HOSTWARD_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Args)]
struct Target {
    /// Host address
    address: String,
    /// SSH port
    #[arg(default_value = "22")]
    port: u16,
}

#[derive(Args)]
struct HostFields {
    #[arg(long)]
    address: String,
    #[arg(long, default_value = "22")]
    port: u16,
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    /// Account used to log in; must be allowed to sudo
    #[arg(long)]
    admin_account: String,
    #[arg(long, env = "HOSTWARD_ADMIN_SECRET", hide_env_values = true)]
    admin_secret: String,
    /// linux or windows_server
    #[arg(long, default_value = "linux")]
    os_type: String,
}

#[derive(Args, Default)]
struct Sections {
    /// Reconciled account list
    #[arg(long)]
    accounts: bool,
    /// Look up each account's backup directory (implies --accounts)
    #[arg(long)]
    backup_dirs: bool,
    /// CPU, memory and GPU hardware
    #[arg(long)]
    hardware: bool,
    /// CPU/memory usage and top processes
    #[arg(long)]
    usage: bool,
    /// Connected sessions
    #[arg(long)]
    sessions: bool,
    /// GPU usage query
    #[arg(long)]
    gpu: bool,
    /// Every section
    #[arg(long)]
    all: bool,
}

impl Sections {
    fn options(&self) -> LoadOptions {
        if self.all {
            return LoadOptions::all();
        }
        LoadOptions {
            with_accounts: self.accounts || self.backup_dirs,
            with_accounts_ignore_stored: false,
            with_backup_dir_info: self.backup_dirs,
            with_hardware: self.hardware,
            with_remote_access: self.sessions,
            with_cpu_mem_processes: self.usage,
            with_gpu_usages: self.gpu,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List registered hosts
    Hosts {
        /// Substring of address, name or description
        #[arg(short, long)]
        keyword: Option<String>,
        #[arg(long, default_value = "0")]
        from: u32,
        #[arg(long, default_value = "20")]
        size: u32,
    },

    /// Show a host report
    Info {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        sections: Sections,
    },

    /// Register a host (tests the connection first)
    Register(HostFields),

    /// Update a registered host (tests the connection first)
    Update(HostFields),

    /// Forget a host and its stored accounts
    Delete(Target),

    /// Open a session and report the detected OS family
    Test(Target),

    /// Manage accounts on a host
    #[command(subcommand)]
    Account(AccountCommand),
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Create an account
    Add {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        name: String,
        #[arg(long, env = "HOSTWARD_ACCOUNT_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Delete an account
    Delete {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        name: String,
        /// Move the home directory to the backup root first
        #[arg(long)]
        backup: bool,
    },
    /// Re-create a deleted account
    Recover {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        name: String,
        #[arg(long, env = "HOSTWARD_ACCOUNT_SECRET", hide_env_values = true)]
        secret: String,
        /// Restore the home directory from the backup root
        #[arg(long)]
        restore_home: bool,
    },
    /// Store a new secret for an account
    Update {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        name: String,
        #[arg(long, env = "HOSTWARD_ACCOUNT_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Show where an account's home would be backed up
    BackupDir {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        name: String,
    },
}

#[derive(Deserialize)]
struct HostList {
    hosts: Vec<HostInfo>,
    total: u64,
}

#[derive(Deserialize)]
struct ConnectionTest {
    family: String,
}

#[derive(Deserialize)]
struct AccountView {
    name: String,
    uid: u32,
    gid: u32,
}

#[derive(Deserialize)]
struct AccountDeleted {
    name: String,
    backup_dir: Option<String>,
}

fn host_params(fields: &HostFields) -> serde_json::Value {
    json!({
        "address": fields.address,
        "port": fields.port,
        "name": fields.name,
        "description": fields.description,
        "admin_account": fields.admin_account,
        "admin_secret": fields.admin_secret,
        "os_type": fields.os_type,
    })
}

fn target_params(target: &Target) -> serde_json::Value {
    json!({ "address": target.address, "port": target.port })
}

fn account_params(target: &Target, name: &str) -> serde_json::Value {
    let mut params = target_params(target);
    params["name"] = json!(name);
    params
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = RpcClient::new(cli.rpc_url);

    match cli.command {
        Commands::Hosts {
            keyword,
            from,
            size,
        } => {
            let params = json!({ "from": from, "size": size, "keyword": keyword });
            let list: HostList = client.call("host.list.v1", params).await?;

            println!(
                "{}",
                format!("{} of {} hosts", list.hosts.len(), list.total)
                    .cyan()
                    .bold()
            );
            if !list.hosts.is_empty() {
                println!("{}", render::hosts_table(&list.hosts));
            }
        }

        Commands::Info { target, sections } => {
            let mut params = target_params(&target);
            params["options"] = serde_json::to_value(sections.options())?;
            let info: HostInfo = client.call("host.info.v1", params).await?;
            render::print_host_info(&info);
        }

        Commands::Register(fields) => {
            let host: HostRecord = client.call("host.register.v1", host_params(&fields)).await?;
            println!(
                "{}",
                format!("✓ Host {} registered as {}", host.addr, host.name)
                    .green()
                    .bold()
            );
        }

        Commands::Update(fields) => {
            let host: HostRecord = client.call("host.update.v1", host_params(&fields)).await?;
            println!("{}", format!("✓ Host {} updated", host.addr).green().bold());
        }

        Commands::Delete(target) => {
            let _: serde_json::Value = client.call("host.delete.v1", target_params(&target)).await?;
            println!(
                "{}",
                format!("✓ Host {}:{} deleted", target.address, target.port)
                    .green()
                    .bold()
            );
        }

        Commands::Test(target) => {
            match client
                .call::<ConnectionTest>("host.test.v1", target_params(&target))
                .await
            {
                Ok(result) => {
                    println!("  {} {}", "RPC URL:".bold(), client.url());
                    println!("  {} {}", "Status:".bold(), "REACHABLE".green());
                    println!("  {} {}", "OS family:".bold(), result.family);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "UNREACHABLE".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Account(command) => run_account(&client, command).await?,
    }

    Ok(())
}

async fn run_account(client: &RpcClient, command: AccountCommand) -> Result<()> {
    match command {
        AccountCommand::Add {
            target,
            name,
            secret,
        } => {
            let mut params = account_params(&target, &name);
            params["secret"] = json!(secret);
            let view: AccountView = client.call("account.add.v1", params).await?;
            println!(
                "{}",
                format!("✓ Account {} created (uid {}, gid {})", view.name, view.uid, view.gid)
                    .green()
                    .bold()
            );
        }

        AccountCommand::Delete {
            target,
            name,
            backup,
        } => {
            let mut params = account_params(&target, &name);
            params["backup"] = json!(backup);
            let deleted: AccountDeleted = client.call("account.delete.v1", params).await?;
            println!(
                "{}",
                format!("✓ Account {} deleted", deleted.name).green().bold()
            );
            if let Some(dir) = deleted.backup_dir {
                println!("  {} {}", "Home backed up to:".bold(), dir);
            }
        }

        AccountCommand::Recover {
            target,
            name,
            secret,
            restore_home,
        } => {
            let mut params = account_params(&target, &name);
            params["secret"] = json!(secret);
            params["recover_backup"] = json!(restore_home);
            let view: AccountView = client.call("account.recover.v1", params).await?;
            println!(
                "{}",
                format!("✓ Account {} recovered (uid {})", view.name, view.uid)
                    .green()
                    .bold()
            );
        }

        AccountCommand::Update {
            target,
            name,
            secret,
        } => {
            let mut params = account_params(&target, &name);
            params["secret"] = json!(secret);
            let view: AccountView = client.call("account.update.v1", params).await?;
            println!(
                "{}",
                format!("✓ Secret stored for {}", view.name).green().bold()
            );
        }

        AccountCommand::BackupDir { target, name } => {
            let info: BackupDirInfo = client
                .call("account.backup_dir.v1", account_params(&target, &name))
                .await?;
            let state = if info.dir_exists {
                "present".green()
            } else if info.path_exists {
                "occupied by a file".yellow()
            } else {
                "absent".normal()
            };
            println!("  {} {} ({})", "Backup dir:".bold(), info.backup_dir, state);
        }
    }

    Ok(())
}
