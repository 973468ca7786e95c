/// Error types for debug sessions
use std::path::PathBuf;
use std::time::Duration;

use kube::config::KubeconfigError;
use thiserror::Error;

/// Exit status used when the session is interrupted (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Everything that can stop a debug session
#[derive(Debug, Error)]
pub enum Error {
    /// The kubeconfig could not be located, read or parsed, or names no usable context
    #[error("failed to load kubeconfig from {}: {}", describe_path(.path), .source)]
    Kubeconfig {
        path: Option<PathBuf>,
        #[source]
        source: KubeconfigError,
    },

    /// The API client could not be built from the resolved configuration
    #[error("failed to build Kubernetes client: {0}")]
    Client(#[source] kube::Error),

    /// The existence check could not tell whether the pod exists
    #[error("failed to look up pod {namespace}/{name}: {source}")]
    Lookup {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// The control plane rejected the pod
    #[error("failed to create pod {namespace}/{name}: {source}")]
    Create {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// A status fetch failed while waiting for the pod
    #[error("error while retrieving state of pod {namespace}/{name}: {source}")]
    Poll {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error(
        "timeout after {} seconds: {} (last phase: {})",
        .timeout.as_secs(),
        .description,
        .last_phase
    )]
    Timeout {
        description: String,
        timeout: Duration,
        last_phase: String,
    },

    #[error("interrupted while {0}")]
    Interrupted(String),

    /// The exec channel could not be opened
    #[error("error while configuring command execution in pod {name}: {source}")]
    ExecSetup {
        name: String,
        #[source]
        source: kube::Error,
    },

    /// The exec channel broke while the command was running
    #[error("error while running command in pod {name}: {message}")]
    ExecStream { name: String, message: String },

    /// The remote command finished with a non-zero exit code
    #[error("command in pod {name} exited with code {code}")]
    RemoteExit { name: String, code: i32 },

    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}

impl Error {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::RemoteExit { code, .. } => u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1),
            Error::Interrupted(_) => INTERRUPTED_EXIT_CODE,
            _ => 1,
        }
    }
}

fn describe_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "the default location".to_string(),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
