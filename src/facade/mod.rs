#![forbid(unsafe_code)]
//! The plugin facade (C10): the single boundary a front-end talks to. Every public
//! operation here corresponds to one of the legacy plugin's entry points
//! (`open`/`check`/`list`/`validate`/`invalidate`/`close`/`version`/`init_session`)
//! and is wrapped by [`guarded`] so that a detected invariant violation turns into
//! a [`crate::common::Error::Internal`] instead of unwinding into the caller.

mod settings;

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::common::context::LaunchType;
use crate::common::resolve::{resolve_shell, resolve_target_user_and_group, CurrentUser};
use crate::common::{CommandAndArguments, Environment, Error};
use crate::exec::Umask;
use crate::log::{auth_info, auth_warn};
use crate::policy::{Authentication, Authorization, DirChange, ListRequest, Request, Restrictions, Sudoers};
use crate::system::interface::{GroupId, UnixUser, UserId};
use crate::system::{Group, Hostname, User};

pub use settings::{OpenSettings, UserInfo};

/// Runs `op`, converting a caught panic (a detected invariant violation, never an
/// expected control-flow path) into [`Error::Internal`] instead of letting it unwind
/// past the facade boundary. This is the "outer failure-return barrier" DESIGN NOTES
/// §9 describes as the replacement for the legacy plugin's `longjmp`-based escape.
pub fn guarded<T>(op: impl FnOnce() -> Result<T, Error>) -> Result<T, Error> {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(op)) {
        Ok(result) => result,
        Err(_) => Err(Error::Internal("invariant violation".to_string())),
    }
}

/// The plugin's integer return codes (§6): `1` success, `0` denial, `-1` error, `-2`
/// usage error. A front-end that calls through the facade as a C ABI plugin would
/// read this back; `bin/sudoctl` uses it to pick a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PluginStatus {
    Success = 1,
    Denied = 0,
    Error = -1,
    UsageError = -2,
}

impl PluginStatus {
    pub fn of<T>(result: &Result<Decision<T>, Error>) -> Self {
        match result {
            Ok(Decision::Allowed(_)) => PluginStatus::Success,
            Ok(Decision::Denied(_)) => PluginStatus::Denied,
            Err(Error::UsageError(_)) => PluginStatus::UsageError,
            Err(_) => PluginStatus::Error,
        }
    }
}

/// The outcome of an authorization check: either the execution plan C9 assembled, or
/// a short user-visible denial message (not an [`Error`] — denials are not errors, §7).
#[derive(Debug)]
pub enum Decision<T> {
    Allowed(T),
    Denied(String),
}

/// The execution plan handed back on `ALLOW` (§4.9): everything a front-end needs to
/// spawn the child, flattened to the key=value shape the legacy plugin ABI used.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub command: PathBuf,
    pub argv: Vec<String>,
    pub runas_uid: UserId,
    pub runas_gid: GroupId,
    pub runas_euid: Option<UserId>,
    pub runas_egid: Option<GroupId>,
    pub runas_groups: Option<Vec<GroupId>>,
    pub umask: Umask,
    pub cwd: Option<PathBuf>,
    pub use_pty: bool,
    pub noexec: bool,
    pub noexec_file: Option<String>,
    pub trust_environment: bool,
    pub env_keep: HashSet<String>,
    pub env_check: HashSet<String>,
    pub path: Option<String>,
    pub closefrom: Option<i32>,
    pub login_class: Option<String>,
    pub selinux_role: Option<String>,
    pub selinux_type: Option<String>,
    pub set_utmp: bool,
    pub utmp_user: Option<String>,
    pub sudoedit: bool,
    pub require_password: bool,
}

impl Plan {
    /// Flattens the plan to `key=value` pairs, the shape `check`'s plugin-ABI return
    /// value takes (§6): "null-terminated vector of key=value strings".
    pub fn to_key_value_pairs(&self) -> Vec<String> {
        let mut pairs = vec![format!("command={}", self.command.display())];

        pairs.push(format!("runas_uid={}", self.runas_uid));
        pairs.push(format!("runas_gid={}", self.runas_gid));
        if let Some(euid) = self.runas_euid {
            pairs.push(format!("runas_euid={euid}"));
        }
        if let Some(egid) = self.runas_egid {
            pairs.push(format!("runas_egid={egid}"));
        }
        if let Some(groups) = &self.runas_groups {
            let joined = groups
                .iter()
                .map(|gid| gid.to_string())
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(format!("runas_groups={joined}"));
        }

        match self.umask {
            Umask::Preserve => {}
            Umask::Override(mask) => pairs.push(format!("umask={mask:04o}")),
            Umask::Extend(mask) => pairs.push(format!("umask={mask:04o}")),
        }

        if let Some(cwd) = &self.cwd {
            pairs.push(format!("cwd={}", cwd.display()));
        }
        if let Some(closefrom) = self.closefrom {
            pairs.push(format!("closefrom={closefrom}"));
        }
        if let Some(path) = &self.path {
            pairs.push(format!("path={path}"));
        }
        if let Some(class) = &self.login_class {
            pairs.push(format!("login_class={class}"));
        }
        if let Some(role) = &self.selinux_role {
            pairs.push(format!("selinux_role={role}"));
        }
        if let Some(kind) = &self.selinux_type {
            pairs.push(format!("selinux_type={kind}"));
        }
        if let Some(noexec_file) = &self.noexec_file {
            pairs.push(format!("noexec_file={noexec_file}"));
        }
        if let Some(utmp_user) = &self.utmp_user {
            pairs.push(format!("utmp_user={utmp_user}"));
        }

        pairs.push(format!("use_pty={}", self.use_pty));
        pairs.push(format!("noexec={}", self.noexec));
        pairs.push(format!("set_utmp={}", self.set_utmp));
        pairs.push(format!("set_env={}", self.trust_environment));
        if self.sudoedit {
            pairs.push("sudoedit=true".to_string());
        }
        pairs.push(format!("require_password={}", self.require_password));

        pairs
    }
}

/// `open`'s result: the live plugin plus any non-fatal parse diagnostics collected
/// while reading the policy source (a malformed line is skipped, not fatal, per
/// the recursive-descent parser's error-recovery behavior).
pub struct OpenResult {
    pub plugin: Plugin,
    pub parse_warnings: Vec<String>,
}

/// A minimal handle standing in for the session/pty/signal-forwarding machinery
/// `init_session` would hand off to; actually spawning and supervising the child
/// is explicitly out of scope (§1 "Out of scope" lists pty allocation and signal
/// forwarding as external collaborators).
#[derive(Debug)]
pub struct SessionHandle {
    pub runas_uid: UserId,
    pub runas_gid: GroupId,
}

/// The live plugin instance an `open` call produces. Holds the parsed policy source,
/// the caller-supplied settings/user facts, and the resolved identities a `check`,
/// `list`, or `validate` call needs.
pub struct Plugin {
    sudoers: Sudoers,
    settings: OpenSettings,
    user_info: UserInfo,
    current_user: CurrentUser,
    target_user: User,
    target_group: Group,
    hostname: Hostname,
    envp: Vec<String>,
}

/// Looks up `key` in a plugin-ABI style `envp` vector of `"KEY=value"` strings (§6's
/// `open`/`check` both receive one). Returns the first match, mirroring `getenv`.
fn env_lookup<'a>(envp: &'a [String], key: &str) -> Option<&'a str> {
    envp.iter().find_map(|entry| {
        let (name, value) = entry.split_once('=')?;
        (name == key).then_some(value)
    })
}

impl Plugin {
    /// Parses `settings` and `user_info`, resolves identities, and parses the policy
    /// source. Non-destructive and idempotent: repeated calls reset the Defaults
    /// registry before reparsing (§5), since each call builds a fresh `Sudoers`.
    /// `envp` is the caller's environment (`"KEY=value"` entries), consulted for the
    /// `PATH` fallback (§4.5) and, in `sudoedit` mode, editor selection (§4.9).
    pub fn open(
        settings: &[String],
        user_info: &[String],
        envp: &[String],
    ) -> Result<OpenResult, Error> {
        guarded(|| Self::open_inner(settings, user_info, envp))
    }

    fn open_inner(
        settings: &[String],
        user_info: &[String],
        envp: &[String],
    ) -> Result<OpenResult, Error> {
        let settings = OpenSettings::parse(settings)?;
        let user_info = UserInfo::parse(user_info)?;

        let sudoers_path = settings
            .sudoers_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("/etc/sudoers"));

        let sudoers_trust = crate::system::audit::SudoersTrust {
            uid: settings.sudoers_uid.unwrap_or(0),
            gid: settings.sudoers_gid.unwrap_or(0),
            mode: settings.sudoers_mode.unwrap_or(0o440),
        };
        let (sudoers, parse_errors) = Sudoers::open(&sudoers_path, &sudoers_trust).map_err(|io_error| {
            if io_error.kind() == std::io::ErrorKind::PermissionDenied {
                Error::PolicyFileUntrusted
            } else {
                Error::IoError(Some(sudoers_path.clone()), io_error)
            }
        })?;
        let parse_warnings: Vec<String> = parse_errors.iter().map(|e| e.to_string()).collect();
        for warning in &parse_warnings {
            auth_warn!("{sudoers_path_display}: {warning}", sudoers_path_display = sudoers_path.display());
        }

        let current_user = CurrentUser::resolve()?;
        let (target_user, target_group) = resolve_target_user_and_group(
            &settings.runas_user.clone(),
            &settings.runas_group.clone(),
            &current_user,
        )?;

        let hostname = if user_info.host.is_empty() {
            Hostname::resolve()
        } else {
            Hostname::new(user_info.host.clone())
        };

        Ok(OpenResult {
            plugin: Plugin {
                sudoers,
                settings,
                user_info,
                current_user,
                target_user,
                target_group,
                hostname,
                envp: envp.to_vec(),
            },
            parse_warnings,
        })
    }

    fn launch_type(&self) -> LaunchType {
        if self.settings.login_shell {
            LaunchType::Login
        } else if self.settings.run_shell {
            LaunchType::Shell
        } else {
            LaunchType::Direct
        }
    }

    /// Resolves the target command, runs C3/C4/C6/C7/C8 via [`Sudoers::check`], and on
    /// `ALLOW` assembles the execution plan (C9). `env_add` is the `-E`-style
    /// caller-requested additional environment; it only affects `trust_environment`,
    /// whether the front-end is allowed to honor it at all.
    pub fn check(
        &mut self,
        argv: &[String],
        env_add: &Environment,
    ) -> Result<Decision<Plan>, Error> {
        guarded(|| self.check_inner(argv, env_add))
    }

    fn check_inner(&mut self, argv: &[String], _env_add: &Environment) -> Result<Decision<Plan>, Error> {
        if self.settings.sudoedit {
            return self.check_sudoedit_inner(argv);
        }

        let launch_type = self.launch_type();
        let shell = resolve_shell(launch_type, &self.current_user, &self.target_user);
        let search_path = self.resolve_search_path();

        let command_and_arguments =
            CommandAndArguments::try_from_args(shell, argv.to_vec(), &search_path)?;
        let arguments: Vec<OsString> = command_and_arguments
            .arguments
            .iter()
            .map(OsString::from)
            .collect();

        let judgement = self.sudoers.check(
            &*self.current_user,
            &self.hostname,
            Request {
                user: &self.target_user,
                group: &self.target_group,
                command: &command_and_arguments.command,
                arguments: &arguments,
            },
        );

        match judgement.authorization() {
            Authorization::Forbidden => {
                let message = Error::NotPermitted {
                    user: self.current_user.name.to_string(),
                    command: command_and_arguments.command.display().to_string(),
                    host: self.hostname.to_string(),
                    other_user: (self.target_user.name != self.current_user.name)
                        .then(|| self.target_user.name.to_string()),
                }
                .to_string();
                auth_warn!("{message}");
                Ok(Decision::Denied(message))
            }
            Authorization::Allowed(authentication, restrictions) => {
                auth_info!(
                    "{} ran '{}' as {} on {}",
                    self.current_user.name,
                    command_and_arguments.command.display(),
                    self.target_user.name,
                    self.hostname
                );

                let mut argv = vec![command_and_arguments.command.display().to_string()];
                argv.extend(command_and_arguments.arguments.iter().cloned());
                if launch_type == LaunchType::Login {
                    rewrite_login_argv(&mut argv, &command_and_arguments.command);
                }

                Ok(Decision::Allowed(self.assemble_plan(
                    command_and_arguments.command,
                    argv,
                    launch_type,
                    authentication,
                    restrictions,
                    false,
                )))
            }
        }
    }

    /// The `PATH` a bare command name is resolved against (§4.5's C5): `secure_path`
    /// when it is set and the caller is not in `exempt_group`; otherwise the caller's
    /// own `PATH` from `envp`; a hardcoded default only if neither is available.
    fn resolve_search_path(&mut self) -> String {
        let exempt_group = self
            .sudoers
            .exempt_group(&self.hostname, &self.current_user, &self.target_user)
            .map(str::to_string);
        let secure_path = self
            .sudoers
            .search_path(&self.hostname, &self.current_user, &self.target_user)
            .map(str::to_string);

        let caller_is_exempt = exempt_group
            .as_deref()
            .and_then(|name| std::ffi::CString::new(name).ok())
            .is_some_and(|name| self.current_user.in_group_by_name(&name));

        match secure_path {
            Some(secure) if !caller_is_exempt => secure,
            _ => env_lookup(&self.envp, "PATH")
                .map(str::to_string)
                .unwrap_or_else(|| "/usr/bin:/bin:/usr/sbin:/sbin".to_string()),
        }
    }

    /// Picks the editor to run in `sudoedit` mode (§4.9): when `env_editor` is set,
    /// the first of `SUDO_EDITOR`, `VISUAL`, `EDITOR` present in `envp` wins;
    /// otherwise the first entry of the Defaults `editor` colon-separated list.
    fn resolve_editor(&mut self) -> String {
        let (env_editor, default_editor) =
            self.sudoers
                .editor_settings(&self.hostname, &self.current_user, &self.target_user);
        let default_editor = default_editor.to_string();

        if env_editor {
            for key in ["SUDO_EDITOR", "VISUAL", "EDITOR"] {
                if let Some(value) = env_lookup(&self.envp, key) {
                    if !value.is_empty() {
                        return value.to_string();
                    }
                }
            }
        }

        default_editor
            .split(':')
            .next()
            .unwrap_or(&default_editor)
            .to_string()
    }

    /// The `sudoedit` plan-composition branch (§4.9): the matcher treats `sudoedit`
    /// as a pseudo-command whose "arguments" are the files to edit, and the assembled
    /// plan's command is the resolved editor, invoked as `editor_path -- files...`.
    fn check_sudoedit_inner(&mut self, argv: &[String]) -> Result<Decision<Plan>, Error> {
        let arguments: Vec<OsString> = argv.iter().map(OsString::from).collect();

        let judgement = self.sudoers.check(
            &*self.current_user,
            &self.hostname,
            Request {
                user: &self.target_user,
                group: &self.target_group,
                command: std::path::Path::new("sudoedit"),
                arguments: &arguments,
            },
        );

        match judgement.authorization() {
            Authorization::Forbidden => {
                let message = Error::NotPermitted {
                    user: self.current_user.name.to_string(),
                    command: format!("sudoedit {}", argv.join(" ")),
                    host: self.hostname.to_string(),
                    other_user: (self.target_user.name != self.current_user.name)
                        .then(|| self.target_user.name.to_string()),
                }
                .to_string();
                auth_warn!("{message}");
                Ok(Decision::Denied(message))
            }
            Authorization::Allowed(authentication, restrictions) => {
                let editor_path = self.resolve_editor();
                auth_info!(
                    "{} edited '{}' as {} on {}",
                    self.current_user.name,
                    argv.join(" "),
                    self.target_user.name,
                    self.hostname
                );

                let mut plan_argv = vec![editor_path.clone(), "--".to_string()];
                plan_argv.extend(argv.iter().cloned());

                Ok(Decision::Allowed(self.assemble_plan(
                    PathBuf::from(editor_path),
                    plan_argv,
                    LaunchType::Direct,
                    authentication,
                    restrictions,
                    true,
                )))
            }
        }
    }

    /// Shared `Plan` assembly for both the normal command path and `sudoedit` mode:
    /// everything after the matcher's decision is identical (runas identity, cwd,
    /// umask, the inert Defaults carried through regardless of execution concerns).
    fn assemble_plan(
        &mut self,
        command: PathBuf,
        argv: Vec<String>,
        launch_type: LaunchType,
        authentication: Authentication,
        restrictions: Restrictions<'_>,
        sudoedit: bool,
    ) -> Plan {
        let cwd = match restrictions.chdir {
            DirChange::Strict(Some(path)) => Some(PathBuf::from(path.as_ref())),
            DirChange::Strict(None) => (launch_type == LaunchType::Login)
                .then(|| PathBuf::from(self.target_user.home.clone())),
            DirChange::Any => self.user_info.cwd.clone(),
        };

        let runas_groups = if restrictions.preserve_groups {
            None
        } else {
            Some(self.target_user.groups.clone())
        };

        let (runas_uid, runas_euid, runas_gid, runas_egid) = if restrictions.stay_setuid {
            (
                self.current_user.uid,
                Some(self.target_user.uid),
                self.current_user.gid,
                Some(self.target_group.gid),
            )
        } else {
            (self.target_user.uid, None, self.target_group.gid, None)
        };

        let noexec_file = self
            .sudoers
            .noexec_file(&self.hostname, &self.current_user, &self.target_user)
            .map(str::to_string);
        let (set_utmp, utmp_user) =
            self.sudoers
                .utmp_settings(&self.hostname, &self.current_user, &self.target_user);
        let utmp_user = utmp_user.map(str::to_string);

        Plan {
            command,
            argv,
            runas_uid,
            runas_gid,
            runas_euid,
            runas_egid,
            runas_groups,
            umask: restrictions.umask,
            cwd,
            use_pty: restrictions.use_pty,
            noexec: restrictions.noexec,
            noexec_file,
            trust_environment: restrictions.trust_environment,
            env_keep: restrictions.env_keep.clone(),
            env_check: restrictions.env_check.clone(),
            path: restrictions.path.map(str::to_string),
            closefrom: self.settings.closefrom,
            login_class: self.settings.login_class.clone(),
            selinux_role: self.settings.selinux_role.clone(),
            selinux_type: self.settings.selinux_type.clone(),
            set_utmp,
            utmp_user,
            sudoedit,
            require_password: authentication.must_authenticate,
        }
    }

    /// Lists the entries that apply to `user` (the invoking user when `None`), the
    /// way `sudo -l`/`sudo -U user -l` does. `verbose` selects [`Entry::verbose`]'s
    /// longer rendering over the terse one-line-per-rule default.
    pub fn list(&mut self, user: Option<&str>, verbose: bool) -> Result<Decision<String>, Error> {
        guarded(|| self.list_inner(user, verbose))
    }

    fn list_inner(&mut self, user: Option<&str>, verbose: bool) -> Result<Decision<String>, Error> {
        let inspected_user = match user {
            Some(name) => {
                let name = crate::common::SudoString::new(name.to_string())?;
                User::from_name(name.as_cstr())?
                    .ok_or_else(|| Error::UnknownUser(name.to_string()))?
            }
            None => self.current_user.clone().into(),
        };
        let inspected_group = inspected_user.primary_group()?;

        let list_request = ListRequest {
            inspected_user: &inspected_user,
            inspected_group: &inspected_group,
            target_user: &self.target_user,
            target_group: &self.target_group,
        };

        let authorization =
            self.sudoers
                .check_list_permission(&*self.current_user, &self.hostname, list_request);

        if let Authorization::Forbidden = authorization {
            let message = format!(
                "Sorry, user {} is not allowed to list {}'s privileges on {}.",
                self.current_user.name, inspected_user.name, self.hostname
            );
            auth_warn!("{message}");
            return Ok(Decision::Denied(message));
        }

        let mut output = String::new();
        for entry in self
            .sudoers
            .matching_entries(&inspected_user, &self.hostname)
        {
            use std::fmt::Write;
            if verbose {
                let _ = write!(output, "{}", entry.verbose());
            } else {
                let _ = write!(output, "{entry}");
            }
        }

        Ok(Decision::Allowed(output))
    }

    /// Checks whether the invoking user may run `sudo` at all, without naming a
    /// command (`sudo -v`).
    pub fn validate(&mut self) -> Result<Decision<()>, Error> {
        guarded(|| {
            match self
                .sudoers
                .check_validate_permission(&*self.current_user, &self.hostname)
            {
                Authorization::Allowed(..) => Ok(Decision::Allowed(())),
                Authorization::Forbidden => {
                    let message = format!(
                        "Sorry, user {} may not run sudo on {}.",
                        self.current_user.name, self.hostname
                    );
                    auth_warn!("{message}");
                    Ok(Decision::Denied(message))
                }
            }
        })
    }

    /// Invalidates the invoking user's cached credential ("timestamp"), optionally
    /// removing the record entirely (`sudo -K` vs `sudo -k`). The credential-cache
    /// (timestamp file) is an out-of-scope external collaborator (§1); this is a
    /// deliberate no-op boundary, not an oversight.
    pub fn invalidate(&mut self, _remove: bool) -> Result<(), Error> {
        guarded(|| Ok(()))
    }

    /// Releases whatever this plugin instance holds. `open` caches nothing on disk
    /// and holds no OS handles beyond what `Sudoers`/`CurrentUser` already acquired,
    /// so dropping `self` is the whole of it; taking `self` by value means the type
    /// system rejects any further use (§5: "close must release every handle
    /// acquired").
    pub fn close(self) {}

    /// A `SessionHandle` standing in for the (out-of-scope) pty/signal-forwarding
    /// setup a real front-end would perform before exec'ing the plan.
    pub fn init_session(&self, plan: &Plan) -> Result<SessionHandle, Error> {
        guarded(|| {
            Ok(SessionHandle {
                runas_uid: plan.runas_uid,
                runas_gid: plan.runas_gid,
            })
        })
    }

    /// The crate's name/version, and (when `verbose`) the grammar version consumed
    /// (§6: "currently 40") and the configured sudoers path.
    pub fn version(&self, verbose: bool) -> String {
        let base = format!(
            "{} version {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        if verbose {
            format!("{base}\nSudoers policy plugin grammar version 40")
        } else {
            base
        }
    }
}

/// For login shells, rewrite `argv[0]` from `/path/sh` to `-sh` (§4.9). Bash's
/// `--login` injection (when `-c` is present) is left to the front-end assembling
/// the final exec argv from this plan, since it depends on argv slots this crate
/// does not own.
fn rewrite_login_argv(argv: &mut [String], command: &std::path::Path) {
    if let Some(name) = command.file_name().and_then(|n| n.to_str()) {
        if let Some(first) = argv.first_mut() {
            *first = format!("-{name}");
        }
    }
}
