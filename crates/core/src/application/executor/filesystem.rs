// Filesystem driver

use super::{last_line, Executor};
use crate::port::{ExecResult, Reply, Verb};

/// Existence probes print a single `1` or `0`.
fn parse_flag(output: &str) -> bool {
    last_line(output) == "1"
}

impl Executor {
    pub async fn path_exists(&self, path: &str) -> ExecResult<bool> {
        let output = self.run(Verb::PathExists, &[path, path]).await?;
        let exists = parse_flag(&output);
        Ok(Reply::new(output, exists))
    }

    /// `path_exists` first, then the file type test
    pub async fn file_exists(&self, path: &str) -> ExecResult<bool> {
        let probe = self.path_exists(path).await?;
        if !probe.value {
            return Ok(probe);
        }
        let output = self.run(Verb::IsFile, &[path]).await?;
        let is_file = parse_flag(&output);
        Ok(Reply::new(output, is_file))
    }

    /// `path_exists` first, then the directory type test
    pub async fn dir_exists(&self, path: &str) -> ExecResult<bool> {
        let probe = self.path_exists(path).await?;
        if !probe.value {
            return Ok(probe);
        }
        let output = self.run(Verb::IsDir, &[path]).await?;
        let is_dir = parse_flag(&output);
        Ok(Reply::new(output, is_dir))
    }

    /// Create a directory without checking whether it exists
    pub async fn mkdir(&self, path: &str) -> ExecResult<()> {
        let output = self.run(Verb::Mkdir, &[path]).await?;
        Ok(Reply::new(output, ()))
    }

    pub async fn mkdir_if_not_exists(&self, path: &str) -> ExecResult<()> {
        let probe = self.path_exists(path).await?;
        if probe.value {
            return Ok(probe.map(|_| ()));
        }
        self.mkdir(path).await
    }

    /// Move `src` to `dst`.
    ///
    /// With `force`, whatever occupies `dst` is removed first so `src` takes
    /// its place instead of landing inside it. The forced template receives
    /// `dst, src, dst`.
    pub async fn move_path(&self, src: &str, dst: &str, force: bool) -> ExecResult<()> {
        let output = if force {
            self.run(Verb::MoveForce, &[dst, src, dst]).await?
        } else {
            self.run(Verb::Move, &[src, dst]).await?
        };
        Ok(Reply::new(output, ()))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::executor_with;
    use crate::port::transport::mocks::ScriptedTransport;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_path_exists_passes_path_twice() {
        let transport = Arc::new(ScriptedTransport::new().on("(sudo [ -f", "1\r\n"));
        let executor = executor_with(transport.clone());

        let reply = executor.path_exists("/home/alice").await.unwrap();
        assert!(reply.value);
        assert_eq!(
            transport.sent(),
            vec!["(sudo [ -f \"/home/alice\" ] || sudo [ -d \"/home/alice\" ]) && echo 1 || echo 0"]
        );
        executor.close().await;
    }

    #[tokio::test]
    async fn test_dir_exists_short_circuits_on_missing_path() {
        let transport = Arc::new(ScriptedTransport::new().on("(sudo [ -f", "0"));
        let executor = executor_with(transport.clone());

        let reply = executor.dir_exists("/nope").await.unwrap();
        assert!(!reply.value);
        assert!(transport.sent_matching("sudo [ -d").is_empty());
        executor.close().await;
    }

    #[tokio::test]
    async fn test_file_exists_rejects_directory() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .on("(sudo [ -f", "1")
                .on("sudo [ -f", "0"),
        );
        let executor = executor_with(transport);

        assert!(!executor.file_exists("/etc").await.unwrap().value);
        executor.close().await;
    }

    #[tokio::test]
    async fn test_mkdir_if_not_exists_skips_existing() {
        let transport = Arc::new(ScriptedTransport::new().on("(sudo [ -f", "1"));
        let executor = executor_with(transport.clone());

        executor.mkdir_if_not_exists("/backup").await.unwrap();
        assert!(transport.sent_matching("sudo mkdir").is_empty());

        let transport = Arc::new(ScriptedTransport::new().on("(sudo [ -f", "0"));
        let executor2 = executor_with(transport.clone());
        executor2.mkdir_if_not_exists("/backup").await.unwrap();
        assert_eq!(transport.sent_matching("sudo mkdir"), vec!["sudo mkdir -p /backup"]);

        executor.close().await;
        executor2.close().await;
    }

    #[tokio::test]
    async fn test_move_force_uses_force_template() {
        let transport = Arc::new(ScriptedTransport::new());
        let executor = executor_with(transport.clone());

        executor.move_path("/a", "/b", true).await.unwrap();
        executor.move_path("/a", "/b", false).await.unwrap();
        assert_eq!(
            transport.sent(),
            vec!["sudo rm -rf /b && sudo mv /a /b", "sudo mv /a /b"]
        );
        executor.close().await;
    }
}
