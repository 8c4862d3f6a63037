// Simulated Host - stateful Transport fake for the stock Linux templates
//
// Understands the command lines rendered from `StaticCatalog::linux()` and
// the shipped `commands/` tree: path probes, mkdir, mv, rm, user and
// sudoers management. Anything else is answered from canned output or
// fails like a missing binary.

use super::transport::{ConnectParams, Connector, ExecFailure, Transport};
use crate::domain::HostAddr;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct User {
    uid: u32,
    gid: u32,
    home: String,
}

#[derive(Debug, Default)]
struct HostState {
    dirs: BTreeSet<String>,
    files: BTreeSet<String>,
    users: BTreeMap<String, User>,
    sudoers: Vec<String>,
    next_uid: u32,
}

impl HostState {
    fn exists(&self, path: &str) -> bool {
        self.dirs.contains(path) || self.files.contains(path)
    }

    fn mkdir_p(&mut self, path: &str) {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
    }

    fn remove_tree(&mut self, path: &str) {
        let nested = format!("{}/", path);
        self.dirs.retain(|p| p != path && !p.starts_with(&nested));
        self.files.retain(|p| p != path && !p.starts_with(&nested));
    }

    fn rename_tree(&mut self, src: &str, dst: &str) {
        let nested = format!("{}/", src);
        let rename = |set: &BTreeSet<String>| -> BTreeSet<String> {
            set.iter()
                .map(|p| {
                    if p == src {
                        dst.to_string()
                    } else if let Some(rest) = p.strip_prefix(&nested) {
                        format!("{}/{}", dst, rest)
                    } else {
                        p.clone()
                    }
                })
                .collect()
        };
        self.dirs = rename(&self.dirs);
        self.files = rename(&self.files);
    }

    /// `mv` semantics: an existing destination directory receives the source.
    fn mv(&mut self, src: &str, dst: &str) -> std::result::Result<(), String> {
        if !self.exists(src) {
            return Err(format!("mv: cannot stat '{}': No such file or directory", src));
        }
        let target = if self.dirs.contains(dst) {
            let base = src.rsplit('/').next().unwrap_or(src);
            format!("{}/{}", dst, base)
        } else {
            dst.to_string()
        };
        if self.exists(&target) {
            return Err(format!("mv: cannot move '{}' to '{}': Directory not empty", src, target));
        }
        self.rename_tree(src, &target);
        Ok(())
    }
}

/// Stateful fake host
pub struct SimulatedHost {
    state: Mutex<HostState>,
    os_release: String,
    privileged: bool,
    canned: Mutex<HashMap<String, String>>,
    sent: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl SimulatedHost {
    /// Ubuntu host where the admin account may sudo
    pub fn ubuntu() -> Self {
        Self::with_os_release("NAME=\"Ubuntu\"\nVERSION=\"22.04.3 LTS (Jammy Jellyfish)\"\nID=ubuntu\n")
    }

    pub fn with_os_release(os_release: impl Into<String>) -> Self {
        let mut state = HostState {
            next_uid: 1000,
            ..Default::default()
        };
        state.mkdir_p("/home");
        state.files.insert("/etc/sudoers".to_string());
        state.sudoers = vec![
            "# User privilege specification".to_string(),
            "root\tALL=(ALL:ALL) ALL".to_string(),
            "%sudo\tALL=(ALL:ALL) ALL".to_string(),
        ];
        Self {
            state: Mutex::new(state),
            os_release: os_release.into(),
            privileged: true,
            canned: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Admin account without sudo rights
    pub fn unprivileged(mut self) -> Self {
        self.privileged = false;
        self
    }

    /// Pre-existing account with a home directory
    pub fn with_user(self, name: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let uid = state.next_uid;
            state.next_uid += 1;
            let home = format!("/home/{}", name);
            state.mkdir_p(&home);
            state.files.insert(format!("{}/.bashrc", home));
            state.users.insert(
                name.to_string(),
                User {
                    uid,
                    gid: uid,
                    home,
                },
            );
        }
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.state.lock().unwrap().mkdir_p(path);
        self
    }

    /// Fixed output for a command line starting with `prefix`
    pub fn with_output(self, prefix: &str, output: &str) -> Self {
        self.canned
            .lock()
            .unwrap()
            .insert(prefix.to_string(), output.to_string());
        self
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.state.lock().unwrap().exists(path)
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.state.lock().unwrap().users.contains_key(name)
    }

    pub fn sudoers(&self) -> Vec<String> {
        self.state.lock().unwrap().sudoers.clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_matching(&self, prefix: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|line| line.starts_with(prefix))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn execute(&self, line: &str) -> std::result::Result<String, String> {
        if let Some(path) = probe_path(line, "(sudo [ -f \"", "\" ] || sudo [ -d \"") {
            return Ok(flag(self.state.lock().unwrap().exists(path)));
        }
        if let Some(path) = probe_path(line, "sudo [ -f \"", "\" ]") {
            return Ok(flag(self.state.lock().unwrap().files.contains(path)));
        }
        if let Some(path) = probe_path(line, "sudo [ -d \"", "\" ]") {
            return Ok(flag(self.state.lock().unwrap().dirs.contains(path)));
        }

        // awk programs carry their own `&&`
        if line.starts_with("awk ") {
            return self.step(line);
        }

        // `a && b` runs b only if a succeeded
        let mut output = String::new();
        for step in line.split(" && ") {
            output.push_str(&self.step(step.trim())?);
        }
        Ok(output)
    }

    fn step(&self, cmd: &str) -> std::result::Result<String, String> {
        let mut state = self.state.lock().unwrap();
        let words: Vec<&str> = cmd.split_whitespace().collect();

        match words.as_slice() {
            ["sudo", "id", "-u"] => Ok(if self.privileged { "0\n" } else { "1000\n" }.to_string()),
            ["cat", "/etc/os-release"] => Ok(self.os_release.clone()),
            ["sudo", "mkdir", "-p", path] => {
                state.mkdir_p(path);
                Ok(String::new())
            }
            ["sudo", "rm", "-rf", path] => {
                state.remove_tree(path);
                Ok(String::new())
            }
            ["sudo", "mv", src, dst] => state.mv(src, dst).map(|_| String::new()),
            ["sudo", "cat", "/etc/sudoers"] => Ok(state.sudoers.join("\n") + "\n"),
            ["openssl", "passwd", "-6", secret] => {
                Ok(format!("$6$sim${}\n", secret.trim_matches('\'').len()))
            }
            ["sudo", "useradd", "-s", _, "-m", "-p", _, name] => {
                if state.users.contains_key(*name) {
                    return Err(format!("useradd: user '{}' already exists", name));
                }
                let uid = state.next_uid;
                state.next_uid += 1;
                let home = format!("/home/{}", name);
                state.mkdir_p(&home);
                state.files.insert(format!("{}/.bashrc", home));
                state.users.insert(
                    name.to_string(),
                    User {
                        uid,
                        gid: uid,
                        home,
                    },
                );
                Ok(String::new())
            }
            ["sudo", "userdel", name] => match state.users.remove(*name) {
                Some(_) => Ok(String::new()),
                None => Err(format!("userdel: user '{}' does not exist", name)),
            },
            ["getent", "passwd", quoted, "|", "cut", "-d:", "-f6"] => {
                let name = quoted.trim_matches('"');
                Ok(state
                    .users
                    .get(name)
                    .map(|u| format!("{}\n", u.home))
                    .unwrap_or_default())
            }
            ["awk", ..] if cmd.contains("/etc/passwd") => Ok(state
                .users
                .iter()
                .map(|(name, u)| format!("{}|{}|{}\n", name, u.uid, u.gid))
                .collect()),
            ["echo", ..] if cmd.ends_with("| sudo tee -a /etc/sudoers") => {
                let grant = cmd
                    .trim_start_matches("echo '")
                    .trim_end_matches("' | sudo tee -a /etc/sudoers");
                state.sudoers.push(grant.to_string());
                Ok(format!("{}\n", grant))
            }
            _ => {
                let canned = self.canned.lock().unwrap();
                canned
                    .iter()
                    .filter(|(prefix, _)| cmd.starts_with(prefix.as_str()))
                    .max_by_key(|(prefix, _)| prefix.len())
                    .map(|(_, output)| output.clone())
                    .ok_or_else(|| format!("bash: {}: command not found", words.first().unwrap_or(&"")))
            }
        }
    }
}

fn flag(value: bool) -> String {
    let flag = if value { "1\n" } else { "0\n" };
    flag.to_string()
}

/// Path inside a rendered probe template
fn probe_path<'a>(line: &'a str, head: &str, tail: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(head)?;
    let end = rest.find(tail)?;
    line.ends_with("&& echo 1 || echo 0").then(|| &rest[..end])
}

#[async_trait]
impl Transport for SimulatedHost {
    async fn send(&self, commands: &[String]) -> std::result::Result<String, ExecFailure> {
        let line = commands.join("; ");
        self.sent.lock().unwrap().push(line.clone());
        if self.is_closed() {
            return Err(ExecFailure::local(AppError::Connection(
                "session already closed".to_string(),
            )));
        }
        self.execute(&line).map_err(|output| {
            ExecFailure::new(
                output,
                AppError::Connection("command exited with status 1".to_string()),
            )
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector handing out simulated hosts. A host can be opened many times;
/// every session sees the same state.
#[derive(Default)]
pub struct SimulatedConnector {
    hosts: Mutex<HashMap<HostAddr, Arc<SimulatedHost>>>,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, addr: HostAddr, host: Arc<SimulatedHost>) -> Self {
        self.hosts.lock().unwrap().insert(addr, host);
        self
    }
}

/// Session over a shared simulated host; closing it does not close the host.
struct SimulatedSession {
    host: Arc<SimulatedHost>,
    closed: AtomicBool,
}

#[async_trait]
impl Transport for SimulatedSession {
    async fn send(&self, commands: &[String]) -> std::result::Result<String, ExecFailure> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExecFailure::local(AppError::Connection(
                "session already closed".to_string(),
            )));
        }
        self.host.send(commands).await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn connect(&self, params: &ConnectParams) -> Result<Arc<dyn Transport>> {
        let host = self.hosts.lock().unwrap().get(&params.addr).cloned();
        match host {
            Some(host) => Ok(Arc::new(SimulatedSession {
                host,
                closed: AtomicBool::new(false),
            })),
            None => Err(AppError::Connection(format!(
                "connection refused by {}",
                params.addr
            ))),
        }
    }
}
