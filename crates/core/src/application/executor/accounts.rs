// Account driver
//
// Listing, creation and home-dir lookup resolve to the family catalog;
// everything else is shared.

use super::{last_line, output_lines, Executor};
use crate::application::constants::{BACKUP_DIR_SUFFIX, BACKUP_ROOT};
use crate::domain::{BackupDirInfo, LiveAccountFact};
use crate::error::{AppError, StateError};
use crate::port::{ExecFailure, ExecResult, Reply, Verb};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

fn account_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+?)\|([0-9]+?)\|([0-9]+?)$").expect("static regex"))
}

fn sudoers_grant() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\S+)\s+ALL\s*=\s*\(\s*ALL\s*:\s*ALL\s*\)\s*ALL$").expect("static regex")
    })
}

/// Parse `name|uid|gid` lines. Lines that do not fit are skipped.
pub(crate) fn parse_account_list(output: &str) -> Vec<LiveAccountFact> {
    output_lines(output)
        .filter_map(|line| {
            let caps = account_line().captures(line.trim())?;
            let uid = caps[2].parse().ok()?;
            let gid = caps[3].parse().ok()?;
            Some(LiveAccountFact {
                name: caps[1].to_string(),
                uid,
                gid,
                secret: String::new(),
            })
        })
        .collect()
}

/// Whether an uncommented sudoers line already grants `name` full privilege
pub(crate) fn sudoers_grants(sudoers: &str, name: &str) -> bool {
    output_lines(sudoers)
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| sudoers_grant().captures(line))
        .any(|caps| caps.get(1).map(|m| m.as_str()) == Some(name))
}

/// Deterministic backup location of an account's home directory
pub fn backup_dir_for(name: &str) -> String {
    format!("{}/{}{}", BACKUP_ROOT, name, BACKUP_DIR_SUFFIX)
}

impl Executor {
    pub async fn list_accounts(&self) -> ExecResult<Vec<LiveAccountFact>> {
        let output = self.run(Verb::AccountList, &[]).await?;
        let accounts = parse_account_list(&output);
        debug!(host = %self.addr, count = accounts.len(), "accounts listed");
        Ok(Reply::new(output, accounts))
    }

    /// Create `name` with a home directory and make sure it may sudo.
    ///
    /// The secret is digested on the host before `useradd` sees it.
    pub async fn add_account(&self, name: &str, secret: &str) -> ExecResult<()> {
        if name.is_empty() || secret.is_empty() {
            return Err(ExecFailure::local(AppError::Validation(
                "account name and secret are required".to_string(),
            )));
        }

        let digest_output = self.run(Verb::PasswordDigest, &[secret]).await?;
        let digest = last_line(&digest_output);
        if digest.is_empty() {
            return Err(ExecFailure::local(AppError::Internal(format!(
                "password digest for {} on {} was empty",
                name, self.addr
            ))));
        }

        let mut output = self.run(Verb::UserAdd, &[digest, name]).await?;
        info!(host = %self.addr, account = %name, "account created");

        match self.ensure_sudoer(name).await {
            Ok(reply) => {
                output.push_str(&reply.output);
                Ok(Reply::new(output, ()))
            }
            Err(failure) => {
                output.push_str(&failure.output);
                Err(ExecFailure::new(output, failure.error))
            }
        }
    }

    /// Append a sudoers grant for `name` unless one exists.
    /// Returns whether a line was appended.
    pub async fn ensure_sudoer(&self, name: &str) -> ExecResult<bool> {
        let sudoers = self.run(Verb::CatSudoers, &[]).await?;
        if sudoers_grants(&sudoers, name) {
            debug!(host = %self.addr, account = %name, "sudoers already grants account");
            return Ok(Reply::new(String::new(), false));
        }
        let output = self.run(Verb::AddSudoers, &[name]).await?;
        Ok(Reply::new(output, true))
    }

    /// Remove `name`. Back up the home directory first if it matters: it
    /// cannot be resolved by name afterwards.
    pub async fn delete_account(&self, name: &str) -> ExecResult<()> {
        let output = self.run(Verb::UserDel, &[name]).await?;
        info!(host = %self.addr, account = %name, "account deleted");
        Ok(Reply::new(output, ()))
    }

    /// Home directory path from the system account database
    ///
    /// # Errors
    /// - `AppError::NotFound` if the account database has no entry
    pub async fn home_dir(&self, name: &str) -> ExecResult<String> {
        let output = self.run(Verb::UserHomeDir, &[name]).await?;
        let home = last_line(&output).to_string();
        if home.is_empty() {
            return Err(ExecFailure::new(
                output,
                AppError::NotFound(format!("no home directory for {} on {}", name, self.addr)),
            ));
        }
        Ok(Reply::new(output, home))
    }

    /// Home directory of `name` as the source or target of a backup.
    /// A missing passwd entry counts as a missing home directory.
    async fn backup_home_of(&self, name: &str) -> ExecResult<String> {
        self.home_dir(name).await.map_err(|failure| {
            if matches!(failure.error, AppError::NotFound(_)) {
                ExecFailure::new(
                    failure.output,
                    StateError::BackupDirNotExists(format!("home directory of {}", name)).into(),
                )
            } else {
                failure
            }
        })
    }

    /// Backup location for `name` and what currently occupies it.
    /// Creates the backup root if absent.
    pub async fn backup_dir_info(&self, name: &str) -> ExecResult<BackupDirInfo> {
        let mut output = self.mkdir_if_not_exists(BACKUP_ROOT).await?.output;
        let backup_dir = backup_dir_for(name);

        let dir = self.dir_exists(&backup_dir).await?;
        output.push_str(&dir.output);
        let path = self.path_exists(&backup_dir).await?;
        output.push_str(&path.output);

        Ok(Reply::new(
            output,
            BackupDirInfo {
                backup_dir,
                path_exists: path.value,
                dir_exists: dir.value,
            },
        ))
    }

    /// Move the home directory of `name` to its backup location.
    /// Returns the backup path.
    ///
    /// # Errors
    /// - `StateError::BackupDirNotExists` if the home directory is missing
    /// - `StateError::BackupTargetDirAlreadyExists` if the backup path is
    ///   occupied; it is never overwritten
    pub async fn backup_home_dir(&self, name: &str) -> ExecResult<String> {
        let home = self.backup_home_of(name).await?.value;

        let exists = self.dir_exists(&home).await?;
        if !exists.value {
            return Err(ExecFailure::new(
                exists.output,
                StateError::BackupDirNotExists(format!("home directory {} of {}", home, name)).into(),
            ));
        }

        let info = self.backup_dir_info(name).await?;
        if info.value.path_exists {
            return Err(ExecFailure::new(
                info.output,
                StateError::BackupTargetDirAlreadyExists(info.value.backup_dir).into(),
            ));
        }

        let moved = self.move_path(&home, &info.value.backup_dir, false).await?;
        info!(host = %self.addr, account = %name, target = %info.value.backup_dir, "home directory backed up");
        Ok(Reply::new(moved.output, info.value.backup_dir))
    }

    /// Move the backup of `name` back to its home directory.
    /// Returns the home path.
    ///
    /// # Errors
    /// - `StateError::BackupTargetDirAlreadyExists` if the home path exists
    ///   and `force` is false
    /// - `StateError::BackupDirNotExists` if there is no backup
    pub async fn recover_home_dir(&self, name: &str, force: bool) -> ExecResult<String> {
        let home = self.backup_home_of(name).await?.value;

        let occupied = self.path_exists(&home).await?;
        if occupied.value && !force {
            return Err(ExecFailure::new(
                occupied.output,
                StateError::BackupTargetDirAlreadyExists(format!(
                    "home directory {} of {}",
                    home, name
                ))
                .into(),
            ));
        }

        let info = self.backup_dir_info(name).await?;
        if !info.value.dir_exists {
            return Err(ExecFailure::new(
                info.output,
                StateError::BackupDirNotExists(info.value.backup_dir).into(),
            ));
        }

        let moved = self.move_path(&info.value.backup_dir, &home, force).await?;
        info!(host = %self.addr, account = %name, home = %home, "home directory recovered");
        Ok(Reply::new(moved.output, home))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::executor_with;
    use super::*;
    use crate::port::simulated_host::SimulatedHost;
    use crate::port::transport::mocks::ScriptedTransport;
    use crate::port::Transport;
    use std::sync::Arc;

    const SUDOERS: &str = "#\r\n\
        # This file MUST be edited with the 'visudo' command as root.\r\n\
        Defaults\tenv_reset\r\n\
        root\tALL=(ALL:ALL) ALL\r\n\
        %sudo\tALL=(ALL:ALL) ALL\r\n\
        # carol ALL=(ALL:ALL) ALL\r\n\
        dave ALL = ( ALL : ALL ) ALL\r\n\
        erin    ALL=(ALL:ALL) ALL\r\n\
        frank\t\tALL=(ALL:ALL) ALL\r\n";

    #[test]
    fn test_parse_account_list_skips_garbage() {
        let output = "alice|1000|1000\r\nbob|1001|100\r\nnot a line\r\n|12|12\r\neve|x|1\r\n";
        let facts = parse_account_list(output);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].name, "alice");
        assert_eq!((facts[1].uid, facts[1].gid), (1001, 100));
    }

    #[test]
    fn test_sudoers_grants() {
        assert!(sudoers_grants(SUDOERS, "root"));
        assert!(sudoers_grants(SUDOERS, "dave"));
        assert!(sudoers_grants(SUDOERS, "%sudo"));
        assert!(sudoers_grants(SUDOERS, "erin")); // padded with spaces
        assert!(sudoers_grants(SUDOERS, "frank")); // padded with tabs
        assert!(!sudoers_grants(SUDOERS, "carol")); // commented out
        assert!(!sudoers_grants(SUDOERS, "alice"));
    }

    #[test]
    fn test_backup_dir_for() {
        assert_eq!(backup_dir_for("alice"), "/backup/alice.backup");
    }

    #[tokio::test]
    async fn test_add_account_digests_then_creates_then_grants() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("openssl passwd", "$6$salt$digest\r\n")
                .on("sudo cat /etc/sudoers", SUDOERS),
        );
        let executor = executor_with(transport.clone());

        executor.add_account("alice", "abc123").await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0], "openssl passwd -6 'abc123'");
        assert_eq!(sent[1], "sudo useradd -s /bin/bash -m -p '$6$salt$digest' alice");
        assert_eq!(sent[2], "sudo cat /etc/sudoers");
        assert_eq!(
            sent[3],
            "echo 'alice ALL=(ALL:ALL) ALL' | sudo tee -a /etc/sudoers"
        );
        executor.close().await;
    }

    #[tokio::test]
    async fn test_ensure_sudoer_is_idempotent() {
        let transport = Arc::new(ScriptedTransport::new().on("sudo cat /etc/sudoers", SUDOERS));
        let executor = executor_with(transport.clone());

        for name in ["dave", "erin", "frank"] {
            let reply = executor.ensure_sudoer(name).await.unwrap();
            assert!(!reply.value, "{}", name);
        }
        assert!(transport.sent_matching("echo").is_empty());
        executor.close().await;
    }

    #[tokio::test]
    async fn test_add_account_rejects_empty_secret() {
        let transport = Arc::new(ScriptedTransport::new());
        let executor = executor_with(transport.clone());

        let failure = executor.add_account("alice", "").await.unwrap_err();
        assert!(matches!(failure.error, AppError::Validation(_)));
        assert!(transport.sent().is_empty());
        executor.close().await;
    }

    #[tokio::test]
    async fn test_backup_missing_home_issues_no_move() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("getent passwd", "/home/ghost\r\n")
                .on("(sudo [ -f", "0"),
        );
        let executor = executor_with(transport.clone());

        let failure = executor.backup_home_dir("ghost").await.unwrap_err();
        assert!(matches!(
            failure.error,
            AppError::State(StateError::BackupDirNotExists(_))
        ));
        assert!(transport.sent_matching("sudo mv").is_empty());
        executor.close().await;
    }

    #[tokio::test]
    async fn test_backup_and_recover_without_home_entry() {
        let transport = Arc::new(ScriptedTransport::new().on("getent passwd", "\r\n"));
        let executor = executor_with(transport.clone());

        let failure = executor.backup_home_dir("ghost").await.unwrap_err();
        assert!(matches!(
            failure.error,
            AppError::State(StateError::BackupDirNotExists(_))
        ));
        assert_eq!(failure.output, "\r\n");

        let failure = executor.recover_home_dir("ghost", true).await.unwrap_err();
        assert!(matches!(
            failure.error,
            AppError::State(StateError::BackupDirNotExists(_))
        ));
        assert!(transport.sent_matching("sudo mv").is_empty());
        executor.close().await;
    }

    #[tokio::test]
    async fn test_backup_never_overwrites_target() {
        // Home and /backup/alice.backup both exist.
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("getent passwd", "/home/alice")
                .on("(sudo [ -f", "1")
                .on("sudo [ -d", "1"),
        );
        let executor = executor_with(transport.clone());

        let failure = executor.backup_home_dir("alice").await.unwrap_err();
        assert!(matches!(
            failure.error,
            AppError::State(StateError::BackupTargetDirAlreadyExists(_))
        ));
        assert!(transport.sent_matching("sudo mv").is_empty());
        executor.close().await;
    }

    #[tokio::test]
    async fn test_recover_refuses_occupied_home_without_force() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("getent passwd", "/home/alice")
                .on("(sudo [ -f", "1"),
        );
        let executor = executor_with(transport.clone());

        let failure = executor.recover_home_dir("alice", false).await.unwrap_err();
        assert!(matches!(
            failure.error,
            AppError::State(StateError::BackupTargetDirAlreadyExists(_))
        ));
        assert!(transport.sent_matching("sudo mv").is_empty());
        executor.close().await;
    }

    #[tokio::test]
    async fn test_backup_then_recover_round_trip() {
        let host = Arc::new(SimulatedHost::ubuntu().with_user("alice"));
        let executor = executor_with(host.clone());

        let backup = executor.backup_home_dir("alice").await.unwrap().value;
        assert_eq!(backup, "/backup/alice.backup");
        assert!(!host.has_path("/home/alice"));
        assert!(host.has_path("/backup/alice.backup/.bashrc"));

        let home = executor.recover_home_dir("alice", false).await.unwrap().value;
        assert_eq!(home, "/home/alice");
        assert!(host.has_path("/home/alice/.bashrc"));
        assert!(!host.has_path("/backup/alice.backup"));
        executor.close().await;
    }

    #[tokio::test]
    async fn test_forced_recover_replaces_fresh_home() {
        let host = Arc::new(SimulatedHost::ubuntu().with_user("bob"));
        let executor = executor_with(host.clone());

        executor.backup_home_dir("bob").await.unwrap();
        // A fresh home, as useradd would create on re-adding the account
        host.send(&["sudo mkdir -p /home/bob/fresh".to_string()])
            .await
            .unwrap();

        executor.recover_home_dir("bob", true).await.unwrap();
        assert!(host.has_path("/home/bob/.bashrc"));
        assert!(!host.has_path("/home/bob/fresh"));
        assert!(!host.has_path("/home/bob/bob.backup"));
        executor.close().await;
    }

    #[tokio::test]
    async fn test_home_dir_unknown_account() {
        let transport = Arc::new(ScriptedTransport::new().on("getent passwd", "\r\n"));
        let executor = executor_with(transport);

        let failure = executor.home_dir("nobody").await.unwrap_err();
        assert!(matches!(failure.error, AppError::NotFound(_)));
        executor.close().await;
    }
}
