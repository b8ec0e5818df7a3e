//! Named endpoint naming

use std::fmt;

/// Local-machine endpoint a worker listens on.
///
/// On Windows this is a named pipe (`\\.\pipe\<prefix>-<uuid>`), elsewhere a
/// Unix domain socket path in the temp directory. A fresh name is generated
/// for every worker start so a still-unreaped endpoint from a previous
/// instance can never be reused by accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipeEndpoint {
    name: String,
}

impl PipeEndpoint {
    /// Generate a new unique endpoint
    pub fn fresh(prefix: &str) -> Self {
        let token = format!("{}-{}", prefix, uuid::Uuid::new_v4());

        #[cfg(windows)]
        {
            Self::new(format!(r"\\.\pipe\{}", token))
        }
        #[cfg(not(windows))]
        {
            let path = std::env::temp_dir().join(format!("{}.sock", token));
            Self::new(path.to_string_lossy().into_owned())
        }
    }

    /// Wrap an existing endpoint name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Endpoint name as passed to the worker
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Remove a leftover socket file.
    ///
    /// Named pipes vanish with their last handle, so this only does work on
    /// Unix. Missing files are not an error.
    pub fn cleanup(&self) {
        #[cfg(unix)]
        {
            match std::fs::remove_file(&self.name) {
                Ok(()) => log::debug!("Removed socket file {}", self.name),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove socket file {}: {}", self.name, e),
            }
        }
    }
}

impl fmt::Display for PipeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
