// Remote access driver

use super::{output_lines, Executor};
use crate::domain::RemoteSession;
use crate::port::{ExecResult, Reply, Verb};
use regex::Regex;
use std::sync::OnceLock;

/// `w -s -h` row: user, tty, from, idle, what
fn session_row() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\w+)\s+[^\s]+\s+[^\s]+\s+[^\s]+\s+(.*)$").expect("static regex")
    })
}

pub(crate) fn parse_sessions(output: &str) -> Vec<RemoteSession> {
    output_lines(output)
        .filter_map(|line| {
            let caps = session_row().captures(line.trim())?;
            Some(RemoteSession {
                account: caps[1].to_string(),
                what: caps[2].to_string(),
            })
        })
        .collect()
}

impl Executor {
    /// One entry per connected session, including the one running the query
    pub async fn remote_access_usages(&self) -> ExecResult<Vec<RemoteSession>> {
        let output = self.run(Verb::Who, &[]).await?;
        let sessions = parse_sessions(&output);
        Ok(Reply::new(output, sessions))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::executor_with;
    use super::*;
    use crate::port::transport::mocks::ScriptedTransport;
    use std::sync::Arc;

    const W: &str = "root     pts/0    114.254.1.92      6.00s sudo w -s -h\r\n\
        alice    pts/3    10.0.0.15        12:41m -bash\r\n\
        bob      tty1     -                 2days python train.py --epochs 10\r\n";

    #[test]
    fn test_parse_sessions() {
        let sessions = parse_sessions(W);
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].account, "root");
        assert_eq!(sessions[0].what, "sudo w -s -h");
        assert_eq!(sessions[2].what, "python train.py --epochs 10");
    }

    #[test]
    fn test_parse_sessions_skips_short_rows() {
        assert!(parse_sessions("alice pts/3\n\n").is_empty());
    }

    #[tokio::test]
    async fn test_remote_access_usages() {
        let transport = Arc::new(ScriptedTransport::new().on("sudo w", W));
        let executor = executor_with(transport);

        let reply = executor.remote_access_usages().await.unwrap();
        assert_eq!(reply.value[1].account, "alice");
        assert_eq!(reply.output, W);
        executor.close().await;
    }
}
