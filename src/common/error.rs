use std::{fmt, path::PathBuf};

/// Every failure mode the engine can report, per the error-kind catalog
/// (policy file trust, parse errors, unknown identities, command
/// resolution, Defaults validation, and usage/plugin-loading problems).
///
/// Denials are not represented here: a well-formed request that the policy
/// rejects returns the facade's normal "deny" outcome with its own
/// user-visible message, distinct from an internal error.
#[derive(Debug)]
pub enum Error {
    PolicyFileUntrusted,
    PolicyParseError {
        file: PathBuf,
        line: usize,
        message: String,
    },
    DefaultsError {
        key: String,
        reason: String,
    },
    UnknownUser(String),
    UnknownGroup(String),
    UnknownHost(String),
    CommandNotFound(PathBuf),
    CommandNotFoundInDot(PathBuf),
    NotPermitted {
        user: String,
        command: String,
        host: String,
        other_user: Option<String>,
    },
    NoTty,
    RootSudoDisabled,
    UsageError(String),
    PluginLoadError(String),
    Internal(String),
    StringValidation(String),
    PathValidation(PathBuf),
    IoError(Option<PathBuf>, std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PolicyFileUntrusted => write!(
                f,
                "policy source must be owned by the configured uid and not be group- or world-writable"
            ),
            Error::PolicyParseError {
                file,
                line,
                message,
            } => write!(f, "{}:{line}: {message}", file.display()),
            Error::DefaultsError { key, reason } => {
                write!(f, "invalid value for Defaults \"{key}\": {reason}")
            }
            Error::UnknownUser(u) => write!(f, "unknown user {u}"),
            Error::UnknownGroup(g) => write!(f, "unknown group {g}"),
            Error::UnknownHost(h) => write!(f, "unknown host {h}"),
            Error::CommandNotFound(p) => write!(f, "'{}': command not found", p.display()),
            Error::CommandNotFoundInDot(p) => write!(
                f,
                "ignoring '{}' found in '.'\nuse './{}' if this is the command you meant to run",
                p.display(),
                p.display()
            ),
            Error::NotPermitted {
                user,
                command,
                host,
                other_user,
            } => {
                if let Some(other_user) = other_user {
                    write!(
                        f,
                        "Sorry, user {user} is not allowed to execute '{command}' as {other_user} on {host}.",
                    )
                } else {
                    write!(f, "Sorry, user {user} may not run {command} on {host}.",)
                }
            }
            Error::NoTty => write!(f, "no tty present and no askpass program specified"),
            Error::RootSudoDisabled => write!(f, "root is not allowed to run this on this host"),
            Error::UsageError(e) => write!(f, "{e}"),
            Error::PluginLoadError(e) => write!(f, "unable to load plugin: {e}"),
            Error::Internal(e) => write!(f, "internal error: {e}"),
            Error::StringValidation(e) => write!(f, "invalid string: {e}"),
            Error::PathValidation(p) => write!(f, "invalid path: {}", p.display()),
            Error::IoError(location, e) => {
                if let Some(path) = location {
                    write!(f, "cannot access '{}': {e}", path.display())
                } else {
                    write!(f, "IO error: {e}")
                }
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(None, err)
    }
}
