// OS Family detected at bootstrap

use serde::{Deserialize, Serialize};
use std::fmt;

/// Linux distribution family, probed live and never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Ubuntu,
    CentOS,
}

impl OsFamily {
    /// Classify `os_info` output by substring. `ubuntu` is checked before
    /// `centos`, whatever their position in the text.
    pub fn detect(os_info: &str) -> Option<OsFamily> {
        let lower = os_info.to_lowercase();
        if lower.contains("ubuntu") {
            Some(OsFamily::Ubuntu)
        } else if lower.contains("centos") {
            Some(OsFamily::CentOS)
        } else {
            None
        }
    }

    /// Directory name of this family's templates in the command catalog
    pub fn dir_name(&self) -> &'static str {
        match self {
            OsFamily::Ubuntu => "ubuntu",
            OsFamily::CentOS => "centos",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
