// Sudo prompt scanner
// Accumulate the current line, match it against the prompt, react.

/// Start of the line `sudo` prints when it wants the account's password
pub const SUDO_PROMPT_PREFIX: &str = "[sudo] password for ";
const SUDO_PROMPT_SUFFIX: &str = ": ";

/// Longest line worth remembering; prompts are short
const MAX_LINE_BYTES: usize = 512;

/// Watches a PTY byte stream for the sudo password prompt.
///
/// The stream arrives in arbitrary chunks, so the scanner keeps the current
/// unterminated line across calls. A prompt is reported once, at the byte
/// that completes it.
#[derive(Debug, Default)]
pub struct PromptScanner {
    line: Vec<u8>,
    answered: bool,
}

impl PromptScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk. Returns how many prompts it completed; each one
    /// should be answered with the secret and a newline.
    pub fn feed(&mut self, chunk: &[u8]) -> usize {
        let mut prompts = 0;
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                self.line.clear();
                self.answered = false;
                continue;
            }
            if self.line.len() < MAX_LINE_BYTES {
                self.line.push(byte);
            }
            if !self.answered && self.is_prompt() {
                self.answered = true;
                prompts += 1;
            }
        }
        prompts
    }

    fn is_prompt(&self) -> bool {
        self.line.starts_with(SUDO_PROMPT_PREFIX.as_bytes())
            && self.line.ends_with(SUDO_PROMPT_SUFFIX.as_bytes())
    }
}

/// Drop every line that starts with the sudo prompt.
pub fn strip_prompt_lines(output: &str) -> String {
    output
        .split_inclusive('\n')
        .filter(|line| !line.trim_start_matches('\r').starts_with(SUDO_PROMPT_PREFIX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_in_one_chunk() {
        let mut scanner = PromptScanner::new();
        assert_eq!(scanner.feed(b"[sudo] password for ops: "), 1);
    }

    #[test]
    fn test_prompt_split_across_chunks() {
        let mut scanner = PromptScanner::new();
        assert_eq!(scanner.feed(b"[sudo] pass"), 0);
        assert_eq!(scanner.feed(b"word for o"), 0);
        assert_eq!(scanner.feed(b"ps:"), 0);
        assert_eq!(scanner.feed(b" "), 1);
    }

    #[test]
    fn test_prompt_answered_once_per_line() {
        let mut scanner = PromptScanner::new();
        assert_eq!(scanner.feed(b"[sudo] password for ops: "), 1);
        assert_eq!(scanner.feed(b"x: "), 0);
        assert_eq!(scanner.feed(b"\r\n[sudo] password for ops: "), 1);
    }

    #[test]
    fn test_ordinary_output_is_ignored() {
        let mut scanner = PromptScanner::new();
        let out = b"password for ops: \nSorry, try again.\nroot:x:0:0: \n";
        assert_eq!(scanner.feed(out), 0);
    }

    #[test]
    fn test_long_lines_do_not_grow_without_bound() {
        let mut scanner = PromptScanner::new();
        scanner.feed(&vec![b'a'; 10_000]);
        assert!(scanner.line.len() <= MAX_LINE_BYTES);
    }

    #[test]
    fn test_strip_prompt_lines() {
        let raw = "[sudo] password for ops: \r\n0\r\n";
        let stripped = strip_prompt_lines(raw);
        assert_eq!(stripped, "0\r\n");
        assert!(!stripped.contains("[sudo] password for ops: "));
    }

    #[test]
    fn test_strip_keeps_unrelated_lines() {
        let raw = "a\n[sudo] password for ops: \nb\nsee [sudo] password for x\n";
        assert_eq!(strip_prompt_lines(raw), "a\nb\nsee [sudo] password for x\n");
    }

    #[test]
    fn test_strip_trailing_prompt_without_newline() {
        assert_eq!(strip_prompt_lines("out\n[sudo] password for ops: "), "out\n");
    }
}
