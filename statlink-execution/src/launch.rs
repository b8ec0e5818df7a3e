//! Worker command line construction

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use statlink_config::WorkerConfig;
use statlink_ipc::PipeEndpoint;

const LOG_FILE_FLAG: &str = "--log-file";

/// Everything needed to launch one worker instance, minus the endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLaunch {
    pub executable: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub args: Vec<String>,
    pub default_log_file: Option<PathBuf>,
    pub pipe_prefix: String,
}

impl WorkerLaunch {
    /// Launch description for a bare executable with no extra arguments
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: None,
            args: Vec::new(),
            default_log_file: None,
            pipe_prefix: "statlink".to_string(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            executable: config.executable_path(),
            working_dir: config.working_dir().map(Path::to_path_buf),
            args: config.args.clone(),
            default_log_file: config.default_log_file.clone(),
            pipe_prefix: config.pipe_prefix.clone(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_default_log_file(mut self, log_file: Option<PathBuf>) -> Self {
        self.default_log_file = log_file;
        self
    }

    pub fn with_pipe_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.pipe_prefix = prefix.into();
        self
    }

    /// Arguments following the executable: `listen <endpoint> [args] [--log-file <default>]`
    pub fn command_args(&self, endpoint: &PipeEndpoint) -> Vec<OsString> {
        let mut argv: Vec<OsString> = Vec::with_capacity(self.args.len() + 4);
        argv.push("listen".into());
        argv.push(endpoint.as_str().into());
        argv.extend(self.args.iter().map(OsString::from));

        if let Some(log_file) = &self.default_log_file {
            if !self.names_log_file() {
                argv.push(LOG_FILE_FLAG.into());
                argv.push(resolve_from_cwd(log_file).into_os_string());
            }
        }

        argv
    }

    /// Whether the user arguments already choose a log file
    pub fn names_log_file(&self) -> bool {
        self.args.iter().enumerate().any(|(i, arg)| {
            if arg == LOG_FILE_FLAG {
                return i + 1 < self.args.len();
            }
            arg.strip_prefix(LOG_FILE_FLAG)
                .and_then(|rest| rest.strip_prefix('='))
                .is_some()
        })
    }

    /// Name shown in errors and logs
    pub fn display_name(&self) -> String {
        self.executable.display().to_string()
    }
}

// The worker runs in its install directory, so a relative log file is
// anchored to the directory the client was started from.
fn resolve_from_cwd(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> PipeEndpoint {
        PipeEndpoint::new("/tmp/statlink-test.sock")
    }

    fn strings(argv: Vec<OsString>) -> Vec<String> {
        argv.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_listen_comes_first() {
        let launch = WorkerLaunch::new("stat").with_args(["--quiet"]);
        let argv = strings(launch.command_args(&endpoint()));
        assert_eq!(argv, vec!["listen", "/tmp/statlink-test.sock", "--quiet"]);
    }

    #[test]
    fn test_default_log_file_appended() {
        let launch =
            WorkerLaunch::new("stat").with_default_log_file(Some(PathBuf::from("stat.log")));
        let argv = strings(launch.command_args(&endpoint()));

        assert_eq!(argv.len(), 4);
        assert_eq!(argv[2], "--log-file");
        let expected = std::env::current_dir().unwrap().join("stat.log");
        assert_eq!(PathBuf::from(&argv[3]), expected);
    }

    #[test]
    fn test_user_log_file_suppresses_default() {
        let separate = WorkerLaunch::new("stat")
            .with_args(["--log-file", "mine.log"])
            .with_default_log_file(Some(PathBuf::from("stat.log")));
        assert!(separate.names_log_file());
        assert_eq!(
            strings(separate.command_args(&endpoint())),
            vec!["listen", "/tmp/statlink-test.sock", "--log-file", "mine.log"]
        );

        let joined = WorkerLaunch::new("stat")
            .with_args(["--log-file=mine.log"])
            .with_default_log_file(Some(PathBuf::from("stat.log")));
        assert!(joined.names_log_file());
        assert_eq!(joined.command_args(&endpoint()).len(), 3);
    }

    #[test]
    fn test_dangling_log_file_flag_does_not_count() {
        let launch = WorkerLaunch::new("stat").with_args(["--log-file"]);
        assert!(!launch.names_log_file());

        let other = WorkerLaunch::new("stat").with_args(["--log-filename=x"]);
        assert!(!other.names_log_file());
    }

    #[test]
    fn test_from_config() {
        let config = WorkerConfig {
            install_dir: Some(PathBuf::from("/opt/stat")),
            executable: "stat".to_string(),
            args: vec!["--fast".to_string()],
            default_log_file: None,
            pipe_prefix: "nightly".to_string(),
        };
        let launch = WorkerLaunch::from_config(&config);

        assert_eq!(launch.executable, PathBuf::from("/opt/stat").join("stat"));
        assert_eq!(launch.working_dir, Some(PathBuf::from("/opt/stat")));
        assert_eq!(launch.pipe_prefix, "nightly");
        assert_eq!(launch.command_args(&endpoint()).len(), 3);
    }
}
