//! Parsing for the two key=value string vectors `open` receives (spec.md §6):
//! `settings` (front-end configuration) and `user_info` (facts about the invoking
//! process). Unrecognized keys are ignored, the way the legacy plugin ABI tolerates
//! a front-end sending keys from a newer protocol version.

use std::path::PathBuf;

use crate::common::{Error, SudoString};

fn parse_kv(entries: &[String]) -> Vec<(&str, &str)> {
    entries
        .iter()
        .filter_map(|entry| entry.split_once('='))
        .collect()
}

fn sudo_string(value: &str) -> Result<SudoString, Error> {
    SudoString::new(value.to_string())
}

/// Front-end configuration passed to `open` (spec.md §6 "settings").
#[derive(Debug, Clone, Default)]
pub struct OpenSettings {
    pub closefrom: Option<i32>,
    pub debug_level: Option<u32>,
    pub runas_user: Option<SudoString>,
    pub runas_group: Option<SudoString>,
    pub prompt: Option<String>,
    pub set_home: bool,
    pub preserve_environment: bool,
    pub run_shell: bool,
    pub login_shell: bool,
    pub implied_shell: bool,
    pub preserve_groups_hint: bool,
    pub ignore_ticket: bool,
    pub noninteractive: bool,
    pub sudoedit: bool,
    pub login_class: Option<String>,
    pub selinux_role: Option<String>,
    pub selinux_type: Option<String>,
    pub bsdauth_type: Option<String>,
    pub network_addrs: Vec<String>,
    pub sudoers_file: Option<PathBuf>,
    pub sudoers_uid: Option<u32>,
    pub sudoers_gid: Option<u32>,
    pub sudoers_mode: Option<u32>,
    pub progname: Option<String>,
}

impl OpenSettings {
    pub fn parse(entries: &[String]) -> Result<Self, Error> {
        let mut settings = Self::default();

        for (key, value) in parse_kv(entries) {
            match key {
                "closefrom" => settings.closefrom = value.parse().ok(),
                "debug_level" => settings.debug_level = value.parse().ok(),
                "runas_user" if !value.is_empty() => {
                    settings.runas_user = Some(sudo_string(value)?)
                }
                "runas_group" if !value.is_empty() => {
                    settings.runas_group = Some(sudo_string(value)?)
                }
                "prompt" => settings.prompt = Some(value.to_string()),
                "set_home" => settings.set_home = is_true(value),
                "preserve_environment" => settings.preserve_environment = is_true(value),
                "run_shell" => settings.run_shell = is_true(value),
                "login_shell" => settings.login_shell = is_true(value),
                "implied_shell" => settings.implied_shell = is_true(value),
                "preserve_groups" => settings.preserve_groups_hint = is_true(value),
                "ignore_ticket" => settings.ignore_ticket = is_true(value),
                "noninteractive" => settings.noninteractive = is_true(value),
                "sudoedit" => settings.sudoedit = is_true(value),
                "login_class" => settings.login_class = Some(value.to_string()),
                "selinux_role" => settings.selinux_role = Some(value.to_string()),
                "selinux_type" => settings.selinux_type = Some(value.to_string()),
                "bsdauth_type" => settings.bsdauth_type = Some(value.to_string()),
                "network_addrs" => {
                    settings.network_addrs =
                        value.split(',').map(str::to_string).filter(|s| !s.is_empty()).collect()
                }
                "sudoers_file" => settings.sudoers_file = Some(PathBuf::from(value)),
                "sudoers_uid" => settings.sudoers_uid = value.parse().ok(),
                "sudoers_gid" => settings.sudoers_gid = value.parse().ok(),
                "sudoers_mode" => settings.sudoers_mode = u32::from_str_radix(value, 8).ok(),
                "progname" => settings.progname = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(settings)
    }
}

/// Facts about the invoking process passed to `open` (spec.md §6 "user_info").
#[derive(Debug, Clone, Default)]
pub struct UserInfo {
    pub user: Option<String>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub groups: Vec<u32>,
    pub cwd: Option<PathBuf>,
    pub tty: Option<String>,
    pub host: String,
    pub lines: Option<u32>,
    pub cols: Option<u32>,
}

impl UserInfo {
    pub fn parse(entries: &[String]) -> Result<Self, Error> {
        let mut info = Self::default();

        for (key, value) in parse_kv(entries) {
            match key {
                "user" => info.user = Some(value.to_string()),
                "uid" => info.uid = value.parse().ok(),
                "gid" => info.gid = value.parse().ok(),
                "groups" => {
                    info.groups = value
                        .split(',')
                        .filter_map(|g| g.parse().ok())
                        .collect()
                }
                "cwd" => info.cwd = Some(PathBuf::from(value)),
                "tty" => info.tty = Some(value.to_string()),
                "host" => info.host = value.to_string(),
                "lines" => info.lines = value.parse().ok(),
                "cols" => info.cols = value.parse().ok(),
                _ => {}
            }
        }

        Ok(info)
    }
}

fn is_true(value: &str) -> bool {
    matches!(value, "true" | "1" | "yes")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_recognized_settings_keys() {
        let entries = vec![
            "runas_user=root".to_string(),
            "login_shell=true".to_string(),
            "closefrom=3".to_string(),
            "sudoedit=false".to_string(),
            "unknown_future_key=whatever".to_string(),
        ];
        let settings = OpenSettings::parse(&entries).unwrap();
        assert_eq!(settings.runas_user.as_deref(), Some("root"));
        assert!(settings.login_shell);
        assert_eq!(settings.closefrom, Some(3));
        assert!(!settings.sudoedit);
    }

    #[test]
    fn parses_user_info_groups_as_list() {
        let entries = vec![
            "user=alice".to_string(),
            "uid=1000".to_string(),
            "groups=1000,27,100".to_string(),
            "host=web1".to_string(),
        ];
        let info = UserInfo::parse(&entries).unwrap();
        assert_eq!(info.user.as_deref(), Some("alice"));
        assert_eq!(info.groups, vec![1000, 27, 100]);
        assert_eq!(info.host, "web1");
    }
}
