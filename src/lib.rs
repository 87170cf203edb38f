pub mod catalog;
pub mod cleanup;
pub mod commands;
pub mod config;
pub mod database;
pub mod depmap;
pub mod error;
pub mod orchestrator;
pub mod package;
pub mod plugin;
pub mod resolver;
pub mod runtime;

/// Test utilities for cross-platform path handling.
#[cfg(test)]
pub mod test_utils {
    use std::path::PathBuf;

    /// Returns a test home directory path based on the platform.
    /// - Unix: `/home/user`
    /// - Windows: `C:\Users\user`
    pub fn test_home() -> PathBuf {
        #[cfg(not(windows))]
        {
            PathBuf::from("/home/user")
        }
        #[cfg(windows)]
        {
            PathBuf::from(r"C:\Users\user")
        }
    }

    /// Returns the default install root for an unprivileged test user.
    pub fn test_root() -> PathBuf {
        test_home().join(".kiln")
    }
}
