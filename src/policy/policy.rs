use super::Sudoers;

use super::Judgement;
use crate::common::{
    HARDENED_ENUM_VALUE_0, HARDENED_ENUM_VALUE_1, HARDENED_ENUM_VALUE_2, SudoPath,
};
use crate::exec::Umask;
use crate::policy::ast::{ExecControl, Tag};
use crate::system::{Hostname, User};
/// Data types and traits that represent what the "terms and conditions" are after a successful
/// permission check.
///
/// The trait definitions can be part of some global crate in the future, if we support more
/// than just the sudoers file.
use std::collections::HashSet;
use std::time::Duration;

#[must_use]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[repr(u32)]
pub enum Authorization<T = ()> {
    Allowed(Authentication, T) = HARDENED_ENUM_VALUE_0,
    Forbidden = HARDENED_ENUM_VALUE_1,
}

#[cfg_attr(test, derive(Debug, PartialEq))]
#[must_use]
pub struct Authentication {
    pub must_authenticate: bool,
    pub credential: AuthenticatingUser,
    pub allowed_attempts: u16,
    pub prior_validity: Duration,
    pub pwfeedback: bool,
    pub password_timeout: Option<Duration>,
    pub noninteractive_auth: bool,
}

impl super::Settings {
    pub(super) fn to_auth(&self, tag: &Tag) -> Authentication {
        Authentication {
            must_authenticate: tag.needs_passwd(),
            allowed_attempts: self.passwd_tries().try_into().unwrap(),
            prior_validity: Duration::from_secs(self.timestamp_timeout()),
            pwfeedback: self.pwfeedback(),
            password_timeout: match self.passwd_timeout() {
                0 => None,
                timeout => Some(Duration::from_secs(timeout)),
            },
            noninteractive_auth: self.noninteractive_auth(),
            credential: if self.rootpw() {
                AuthenticatingUser::Root
            } else if self.targetpw() {
                AuthenticatingUser::TargetUser
            } else {
                AuthenticatingUser::InvokingUser
            },
        }
    }
}

#[must_use]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub struct Restrictions<'a> {
    pub use_pty: bool,
    pub trust_environment: bool,
    pub noexec: bool,
    pub env_keep: &'a HashSet<String>,
    pub env_check: &'a HashSet<String>,
    pub chdir: DirChange<'a>,
    pub path: Option<&'a str>,
    pub umask: Umask,
    /// Keep the real uid/gid as the invoking user's and only set the effective
    /// identity to the runas target, per the `stay_setuid` Default.
    pub stay_setuid: bool,
    /// Keep the invoking user's supplementary group list instead of the runas
    /// target's, per the `preserve_groups` Default.
    pub preserve_groups: bool,
    #[cfg(feature = "apparmor")]
    pub apparmor_profile: Option<String>,
}

#[must_use]
#[cfg_attr(test, derive(Debug, PartialEq))]
#[repr(u32)]
pub enum DirChange<'a> {
    Strict(Option<&'a SudoPath>) = HARDENED_ENUM_VALUE_0,
    Any = HARDENED_ENUM_VALUE_1,
}

#[cfg_attr(test, derive(Debug, PartialEq))]
#[repr(u32)]
pub enum AuthenticatingUser {
    InvokingUser = HARDENED_ENUM_VALUE_0,
    Root = HARDENED_ENUM_VALUE_1,
    TargetUser = HARDENED_ENUM_VALUE_2,
}

impl Judgement {
    pub fn authorization(&self) -> Authorization<Restrictions<'_>> {
        // NOTE: we should add conditional compilation to the DSL; this avoids getting
        // an unused warning message
        #[cfg(not(feature = "apparmor"))]
        let _ = &self.settings.apparmor_profile();

        if let Some(tag) = &self.flags {
            Authorization::Allowed(
                self.settings.to_auth(tag),
                Restrictions {
                    use_pty: self.settings.use_pty(),
                    trust_environment: match tag.env {
                        super::EnvironmentControl::Implicit => self.settings.setenv(),
                        super::EnvironmentControl::Setenv => true,
                        super::EnvironmentControl::Nosetenv => false,
                    },
                    noexec: match tag.noexec {
                        ExecControl::Implicit => self.settings.noexec(),
                        ExecControl::Exec => false,
                        ExecControl::Noexec => true,
                    },
                    env_keep: self.settings.env_keep(),
                    env_check: self.settings.env_check(),
                    chdir: match tag.cwd.as_ref() {
                        None => DirChange::Strict(None),
                        Some(super::ChDir::Any) => DirChange::Any,
                        Some(super::ChDir::Path(path)) => DirChange::Strict(Some(path)),
                    },
                    path: self.settings.secure_path(),
                    stay_setuid: self.settings.stay_setuid(),
                    preserve_groups: self.settings.preserve_groups(),
                    umask: {
                        let mask = self
                            .settings
                            .umask()
                            .try_into()
                            .expect("the umask parser should have prevented overflow");
                        if mask == 0o777 {
                            Umask::Preserve
                        } else if self.settings.umask_override() {
                            Umask::Override(mask)
                        } else {
                            Umask::Extend(mask)
                        }
                    },
                    #[cfg(feature = "apparmor")]
                    apparmor_profile: tag
                        .apparmor_profile
                        .as_deref()
                        .or(self.settings.apparmor_profile())
                        .map(|x| x.to_string()),
                },
            )
        } else {
            Authorization::Forbidden
        }
    }
}

impl Sudoers {
    pub fn search_path(
        &mut self,
        on_host: &Hostname,
        current_user: &User,
        target_user: &User,
    ) -> Option<&str> {
        self.specify_host_user_runas(on_host, current_user, Some(target_user));
        self.settings.secure_path()
    }

    /// The `exempt_group` name (if any), consulted by C10 when `secure_path` is set:
    /// a caller who is a member of this group keeps their own `PATH` instead of
    /// having `secure_path` imposed on them (spec.md §4.5).
    pub fn exempt_group(
        &mut self,
        on_host: &Hostname,
        current_user: &User,
        target_user: &User,
    ) -> Option<&str> {
        self.specify_host_user_runas(on_host, current_user, Some(target_user));
        self.settings.exempt_group()
    }

    /// The editor-selection inputs (§4.9's `sudoedit` plan composition): whether the
    /// invoker's own `SUDO_EDITOR`/`VISUAL`/`EDITOR` is honored, and the Defaults
    /// fallback editor list to use otherwise.
    pub fn editor_settings(
        &mut self,
        on_host: &Hostname,
        current_user: &User,
        target_user: &User,
    ) -> (bool, &str) {
        self.specify_host_user_runas(on_host, current_user, Some(target_user));
        (self.settings.env_editor(), self.settings.editor())
    }

    /// The `noexec_file` path (if any) that the facade threads into `Plan` inertly.
    pub fn noexec_file(
        &mut self,
        on_host: &Hostname,
        current_user: &User,
        target_user: &User,
    ) -> Option<&str> {
        self.specify_host_user_runas(on_host, current_user, Some(target_user));
        self.settings.noexec_file()
    }

    /// The `set_utmp`/`utmp_user` pair the facade carries inertly on `Plan` (§1's
    /// utmp-accounting non-goal still commits to declaring these, per SPEC_FULL.md).
    pub fn utmp_settings(
        &mut self,
        on_host: &Hostname,
        current_user: &User,
        target_user: &User,
    ) -> (bool, Option<&str>) {
        self.specify_host_user_runas(on_host, current_user, Some(target_user));
        (self.settings.set_utmp(), self.settings.utmp_user())
    }
}
