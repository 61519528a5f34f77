//! The `/etc/sudo.conf`-equivalent plugin configuration file (spec.md §6): a small
//! line-oriented format, `Path <name> <path>` and `Plugin <symbol> <path>`, one directive
//! per line, blank lines and `#`-comments ignored. Parsed by hand the way the teacher's
//! own sudoers line parser is hand-rolled rather than reaching for a config-file crate;
//! this crate doesn't carry `serde`/`toml` and isn't about to start for its own config.
//!
//! A missing file is not an error: it just means the bundled-plugin defaults apply,
//! matching the legacy loader's behavior when `fopen(conf_file)` fails.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default sudo.conf location.
pub const DEFAULT_PATH: &str = "/etc/sudo.conf";

const DEFAULT_POLICY_PLUGIN_PATH: &str = "/usr/libexec/sudo/sudoers.so";

/// One `Plugin <symbol> <path>` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConf {
    pub symbol_name: String,
    pub path: PathBuf,
}

/// Parsed `/etc/sudo.conf` contents, or the bundled defaults if the file is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct SudoConf {
    pub askpass_path: Option<PathBuf>,
    pub noexec_path: Option<PathBuf>,
    pub plugins: Vec<PluginConf>,
}

impl Default for SudoConf {
    fn default() -> Self {
        SudoConf {
            askpass_path: None,
            noexec_path: None,
            plugins: bundled_plugin_defaults(),
        }
    }
}

fn bundled_plugin_defaults() -> Vec<PluginConf> {
    vec![
        PluginConf {
            symbol_name: "sudoers_policy".to_string(),
            path: PathBuf::from(DEFAULT_POLICY_PLUGIN_PATH),
        },
        PluginConf {
            symbol_name: "sudoers_io".to_string(),
            path: PathBuf::from(DEFAULT_POLICY_PLUGIN_PATH),
        },
    ]
}

impl SudoConf {
    /// Reads and parses `path`. A missing file yields [`SudoConf::default`], matching
    /// the legacy loader falling back to the bundled sudoers plugin when `fopen` fails;
    /// any other I/O error (permission denied, not a regular file, ...) is propagated.
    pub fn open(path: &Path) -> io::Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err),
        };

        Ok(Self::parse(&contents))
    }

    /// Parses already-read file contents. Unrecognized or malformed lines are skipped,
    /// matching the legacy parser's `continue`-on-short-tokens behavior.
    pub fn parse(contents: &str) -> Self {
        let mut askpass_path = None;
        let mut noexec_path = None;
        let mut plugins = Vec::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = strip_keyword(line, "Path") {
                let mut words = rest.split_whitespace();
                let (Some(name), Some(path)) = (words.next(), words.next()) else {
                    continue;
                };
                if name.eq_ignore_ascii_case("askpass") {
                    askpass_path = Some(PathBuf::from(path));
                } else if name.eq_ignore_ascii_case("noexec") {
                    noexec_path = Some(PathBuf::from(path));
                }
                continue;
            }

            if let Some(rest) = strip_keyword(line, "Plugin") {
                let mut words = rest.split_whitespace();
                let (Some(symbol_name), Some(path)) = (words.next(), words.next()) else {
                    continue;
                };
                plugins.push(PluginConf {
                    symbol_name: symbol_name.to_string(),
                    path: PathBuf::from(path),
                });
            }
        }

        if plugins.is_empty() {
            plugins = bundled_plugin_defaults();
        }

        SudoConf { askpass_path, noexec_path, plugins }
    }
}

/// Matches `line` against a case-insensitive leading keyword, returning the remainder
/// if it matches. `Path`/`Plugin` take no separator before their argument (`Pathaskpass`
/// and `Path askpass` both parse in the legacy format, since it just calls `strtok` on
/// the tail), so this only requires the keyword prefix, not a following space.
fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    if line.len() >= keyword.len() && line[..keyword.len()].eq_ignore_ascii_case(keyword) {
        Some(&line[keyword.len()..])
    } else {
        None
    }
}
