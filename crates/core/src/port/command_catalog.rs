// Command Catalog Port
// Command text is authored only in catalog templates, never in driver code.

use crate::domain::OsFamily;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::fmt;

/// Every command the executor knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Move,
    MoveForce,
    PathExists,
    IsFile,
    IsDir,
    Mkdir,
    SudoPrivilege,
    OsInfo,
    Top,
    MemInfo,
    Lscpu,
    Lsgpu,
    Who,
    NvidiaGpuName,
    NvidiaGpuUsage,
    CatSudoers,
    AddSudoers,
    PasswordDigest,
    UserAdd,
    UserDel,
    AccountList,
    UserHomeDir,
}

impl Verb {
    pub const ALL: [Verb; 22] = [
        Verb::Move,
        Verb::MoveForce,
        Verb::PathExists,
        Verb::IsFile,
        Verb::IsDir,
        Verb::Mkdir,
        Verb::SudoPrivilege,
        Verb::OsInfo,
        Verb::Top,
        Verb::MemInfo,
        Verb::Lscpu,
        Verb::Lsgpu,
        Verb::Who,
        Verb::NvidiaGpuName,
        Verb::NvidiaGpuUsage,
        Verb::CatSudoers,
        Verb::AddSudoers,
        Verb::PasswordDigest,
        Verb::UserAdd,
        Verb::UserDel,
        Verb::AccountList,
        Verb::UserHomeDir,
    ];

    /// File name of the template under its catalog directory
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Move => "mv",
            Verb::MoveForce => "mv_force",
            Verb::PathExists => "path_exists",
            Verb::IsFile => "is_file",
            Verb::IsDir => "is_dir",
            Verb::Mkdir => "mkdir",
            Verb::SudoPrivilege => "sudo_privilege",
            Verb::OsInfo => "os_info",
            Verb::Top => "top",
            Verb::MemInfo => "meminfo",
            Verb::Lscpu => "lscpu",
            Verb::Lsgpu => "lsgpu",
            Verb::Who => "w",
            Verb::NvidiaGpuName => "nvidia_gpu_name",
            Verb::NvidiaGpuUsage => "nvidia_gpu_usage",
            Verb::CatSudoers => "cat_sudoers",
            Verb::AddSudoers => "add_sudoers",
            Verb::PasswordDigest => "pwd_digest",
            Verb::UserAdd => "user_add",
            Verb::UserDel => "user_del",
            Verb::AccountList => "get_account_list",
            Verb::UserHomeDir => "get_user_home_dir",
        }
    }

    /// Verbs whose command differs between OS families
    pub fn is_family_specific(&self) -> bool {
        matches!(self, Verb::UserAdd | Verb::AccountList | Verb::UserHomeDir)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory a template is loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogScope {
    Common,
    Family(OsFamily),
}

impl CatalogScope {
    /// Scope holding `verb` for hosts of `family`
    pub fn for_verb(verb: Verb, family: OsFamily) -> Self {
        if verb.is_family_specific() {
            CatalogScope::Family(family)
        } else {
            CatalogScope::Common
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            CatalogScope::Common => "common",
            CatalogScope::Family(family) => family.dir_name(),
        }
    }
}

impl fmt::Display for CatalogScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Source of command templates
#[async_trait]
pub trait CommandCatalog: Send + Sync {
    /// Load the template for `verb` from `scope`.
    ///
    /// # Errors
    /// - `AppError::Config` if the template does not exist. A missing
    ///   template is an installation fault, not a runtime condition.
    async fn template(&self, scope: CatalogScope, verb: Verb) -> Result<String>;
}

/// Fill `%s` placeholders in order. `%%` is a literal percent sign.
///
/// The template is trimmed of trailing newlines first, since catalog files
/// usually end with one.
///
/// # Errors
/// - `AppError::Config` if the placeholder count differs from `args.len()`
///
/// # Example
/// ```text
/// render("sudo mv %s %s", &["/home/a", "/backup/a.backup"])
///   => "sudo mv /home/a /backup/a.backup"
/// ```
pub fn render(template: &str, args: &[&str]) -> Result<String> {
    let template = template.trim_end_matches(['\n', '\r']);
    let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut args_iter = args.iter();
    let mut used = 0usize;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                let arg = args_iter.next().ok_or_else(|| {
                    AppError::Config(format!(
                        "template expects more than {} argument(s): {}",
                        args.len(),
                        template
                    ))
                })?;
                out.push_str(arg);
                used += 1;
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }

    if used != args.len() {
        return Err(AppError::Config(format!(
            "template takes {} argument(s), {} given: {}",
            used,
            args.len(),
            template
        )));
    }
    Ok(out)
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;

    /// In-memory catalog with the stock Linux templates
    pub struct StaticCatalog {
        templates: HashMap<(String, &'static str), String>,
    }

    impl StaticCatalog {
        pub fn empty() -> Self {
            Self {
                templates: HashMap::new(),
            }
        }

        /// Stock templates, mirroring the shipped `commands/` tree
        pub fn linux() -> Self {
            let common = [
                (Verb::Move, "sudo mv %s %s"),
                (Verb::MoveForce, "sudo rm -rf %s && sudo mv %s %s"),
                (Verb::PathExists, "(sudo [ -f \"%s\" ] || sudo [ -d \"%s\" ]) && echo 1 || echo 0"),
                (Verb::IsFile, "sudo [ -f \"%s\" ] && echo 1 || echo 0"),
                (Verb::IsDir, "sudo [ -d \"%s\" ] && echo 1 || echo 0"),
                (Verb::Mkdir, "sudo mkdir -p %s"),
                (Verb::SudoPrivilege, "sudo id -u"),
                (Verb::OsInfo, "cat /etc/os-release"),
                (Verb::Top, "top -b -n 1"),
                (Verb::MemInfo, "cat /proc/meminfo"),
                (Verb::Lscpu, "lscpu"),
                (Verb::Lsgpu, "lspci | grep VGA"),
                (Verb::Who, "sudo w -s -h"),
                (Verb::NvidiaGpuName, "nvidia-smi -L"),
                (Verb::NvidiaGpuUsage, "nvidia-smi"),
                (Verb::CatSudoers, "sudo cat /etc/sudoers"),
                (Verb::AddSudoers, "echo '%s ALL=(ALL:ALL) ALL' | sudo tee -a /etc/sudoers"),
                (Verb::PasswordDigest, "openssl passwd -6 '%s'"),
                (Verb::UserDel, "sudo userdel %s"),
            ];
            let family = [
                (Verb::UserAdd, "sudo useradd -s /bin/bash -m -p '%s' %s"),
                (
                    Verb::AccountList,
                    "awk -F: '$3 >= 1000 && $3 < 65534 {print $1\"|\"$3\"|\"$4}' /etc/passwd",
                ),
                (Verb::UserHomeDir, "getent passwd \"%s\" | cut -d: -f6"),
            ];

            let mut catalog = Self::empty();
            for (verb, text) in common {
                catalog = catalog.with(CatalogScope::Common, verb, text);
            }
            for os in [OsFamily::Ubuntu, OsFamily::CentOS] {
                for (verb, text) in family {
                    catalog = catalog.with(CatalogScope::Family(os), verb, text);
                }
            }
            catalog
        }

        pub fn with(mut self, scope: CatalogScope, verb: Verb, text: impl Into<String>) -> Self {
            self.templates
                .insert((scope.dir_name().to_string(), verb.as_str()), text.into());
            self
        }
    }

    #[async_trait]
    impl CommandCatalog for StaticCatalog {
        async fn template(&self, scope: CatalogScope, verb: Verb) -> Result<String> {
            self.templates
                .get(&(scope.dir_name().to_string(), verb.as_str()))
                .cloned()
                .ok_or_else(|| {
                    AppError::Config(format!("missing command template {}/{}", scope, verb))
                })
        }
    }
}
