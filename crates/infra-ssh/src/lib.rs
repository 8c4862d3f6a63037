// Hostward Infrastructure - SSH Adapter
// Implements: Connector, Transport, CommandCatalog

mod catalog;
mod prompt;
mod transport;

pub use catalog::FsCommandCatalog;
pub use prompt::{strip_prompt_lines, PromptScanner, SUDO_PROMPT_PREFIX};
pub use transport::{SshConnector, SshTransport};
