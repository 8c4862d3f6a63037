// Application constants (no magic values)

/// Root directory holding account home-directory backups
pub const BACKUP_ROOT: &str = "/backup";

/// Suffix of a backup directory: `/backup/<name>.backup`
pub const BACKUP_DIR_SUFFIX: &str = ".backup";

/// Concurrent backup-dir lookups issued against one host at a time
pub const BACKUP_LOOKUP_BATCH_SIZE: usize = 5;

/// Whitespace-separated fields of a `top -b` process row
pub const TOP_PROCESS_FIELDS: usize = 12;

/// Separates the `top` snapshot from the meminfo fallback in usage output
pub const MEMINFO_SEPARATOR: &str = "--- meminfo ---\n";

/// Default page size for host listings
pub const DEFAULT_PAGE_SIZE: u32 = 20;
