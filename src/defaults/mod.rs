#![forbid(unsafe_code)]
//! The Defaults registry (component C1): a declarative table of named settings that
//! a sudoers-style `Defaults` binding can assign to. [`Settings`] holds one process-wide
//! snapshot of the table; [`set`] and [`negate`] are the by-name lookup the settings-binding
//! parser (see [`crate::policy::ast`]) uses to turn a parsed key into something that can
//! mutate a `Settings` value.
//!
//! Scoped bindings (`Defaults@host`, `Defaults:user`, ...) are represented upstream as a
//! `Vec<SettingsModifier>` paired with a selector; this module only has to know how to
//! build and apply one modifier at a time; re-walking bindings in source order so later
//! ones win is the caller's job (see `crate::policy::Sudoers::specify_host_user_runas`).

mod strenum;

use std::collections::HashSet;

pub use strenum::StrEnum;

/// A setting value, for introspection (e.g. a `-l` style listing).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Flag(bool),
    Integer(i64),
    Text(Option<String>),
    List(Vec<String>),
}

/// Whether a list binding adds, removes, or (`name=...` / `!name`) replaces the given words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Add,
    Del,
    Set,
}

/// A parsed `Defaults` binding, ready to apply to a [`Settings`] value. Built by [`set`]
/// or [`negate`]; never constructed directly outside this module.
pub type SettingsModifier = Box<dyn Fn(&mut Settings) + Send + Sync>;

/// What kind of value a named setting accepts, together with however much logic is needed
/// to turn the parsed text into a [`SettingsModifier`]. Looked up by [`set`].
pub enum SettingKind {
    /// A boolean setting; `name` sets it true, `!name` (via [`negate`]) sets it false.
    Flag(SettingsModifier),
    /// `name=123`; the function validates and converts the decimal (or, for `umask`,
    /// octal) text, returning `None` if the value is out of range or malformed.
    Integer(fn(&str) -> Option<SettingsModifier>),
    /// `name=val`, `name+=val`, `name-=val`; the function builds the modifier for
    /// whichever mutation the binding requested.
    List(fn(ListMode, Vec<String>) -> SettingsModifier),
    /// `name="text"` or `name=text`; the function validates the text (for enum-like
    /// settings such as `verifypw`, rejecting anything outside the allowed set).
    Text(fn(&str) -> Option<SettingsModifier>),
}

/// A custom parser for seconds expressed as fractional "minutes", the format sudoers
/// uses for `passwd_timeout` and `timestamp_timeout`.
fn fractional_minutes(input: &str) -> Option<u64> {
    let minutes = if input.contains('.') {
        input.parse::<f64>().ok()? * 60.0
    } else {
        (input.parse::<i64>().ok()? * 60) as f64
    };
    if minutes < 0.0 {
        None
    } else {
        Some(minutes.floor() as u64)
    }
}

macro_rules! flag_modifier {
    ($field:ident, $value:expr) => {
        Box::new(move |s: &mut Settings| s.$field = $value)
    };
}

/// One bound per Flag-kind setting name, used by both [`set`] and [`negate`].
macro_rules! flags {
    ($var:expr, { $($name:ident),* $(,)? }) => {
        match $var {
            $(stringify!($name) => Some(SettingKind::Flag(flag_modifier!($name, true))),)*
            _ => None,
        }
    };
}

macro_rules! negate_flags {
    ($var:expr, { $($name:ident),* $(,)? }) => {
        match $var {
            $(stringify!($name) => Some(flag_modifier!($name, false) as SettingsModifier),)*
            _ => None,
        }
    };
}

/// Looks up a setting by name, returning how the parser should treat its value syntax.
/// `None` means the name isn't a known setting at all (distinct from "known but not
/// usable in this position", which the individual `SettingKind` arms raise themselves).
pub fn set(var: &str) -> Option<SettingKind> {
    if let Some(kind) = flags!(
        var,
        {
            authenticate,
            root_sudo,
            requiretty,
            env_reset,
            env_editor,
            use_pty,
            setenv,
            noexec,
            targetpw,
            rootpw,
            pwfeedback,
            visiblepw,
            always_set_home,
            set_home,
            stay_setuid,
            preserve_groups,
            fqdn,
            mail_badpass,
            closefrom_override,
            ignore_dot,
            fast_glob,
            umask_override,
            always_query_group_plugin,
            match_group_by_gid,
            noninteractive_auth,
            tty_tickets,

            log_host,
            log_year,
            shell_noargs,
            path_info,
            insults,
            runaspw,
            use_loginclass,
            set_logname,
            mail_always,
            mail_no_user,
            mail_no_host,
            mail_no_perms,
            set_utmp,
        }
    ) {
        return Some(kind);
    }

    Some(match var {
        "passwd_tries" => SettingKind::Integer(set_passwd_tries),
        "timestamp_timeout" => SettingKind::Integer(set_timestamp_timeout),
        "passwd_timeout" => SettingKind::Integer(set_passwd_timeout),
        "umask" => SettingKind::Integer(set_umask),
        "loglinelen" => SettingKind::Integer(set_loglinelen),

        "secure_path" => SettingKind::Text(set_secure_path),
        "editor" => SettingKind::Text(set_editor),
        "apparmor_profile" => SettingKind::Text(set_apparmor_profile),
        "logfile" => SettingKind::Text(set_logfile),
        "mailerpath" => SettingKind::Text(set_mailerpath),
        "runas_default" => SettingKind::Text(set_runas_default),
        "verifypw" => SettingKind::Text(set_verifypw),
        "lecture" => SettingKind::Text(set_lecture),
        "lecture_file" => SettingKind::Text(set_lecture_file),
        "mailsubject" => SettingKind::Text(set_mailsubject),
        "badpass_message" => SettingKind::Text(set_badpass_message),
        "timestampdir" => SettingKind::Text(set_timestampdir),
        "timestampowner" => SettingKind::Text(set_timestampowner),
        "exempt_group" => SettingKind::Text(set_exempt_group),
        "passprompt" => SettingKind::Text(set_passprompt),
        "mailfrom" => SettingKind::Text(set_mailfrom),
        "noexec_file" => SettingKind::Text(set_noexec_file),
        "syslog" => SettingKind::Text(set_syslog),
        "syslog_goodpri" => SettingKind::Text(set_syslog_goodpri),
        "syslog_badpri" => SettingKind::Text(set_syslog_badpri),
        "utmp_user" => SettingKind::Text(set_utmp_user),

        "env_keep" => SettingKind::List(env_keep_modifier),
        "env_check" => SettingKind::List(env_check_modifier),
        "env_delete" => SettingKind::List(env_delete_modifier),

        _ => return None,
    })
}

/// `!name`: clears a boolean to false, a list to empty, or an optional text setting to
/// unset. `None` either because `name` isn't a setting at all, or because it is one but
/// negating it isn't meaningful (an integer, or a text setting with no "unset" state);
/// the caller (the `!`-binding parser in `ast.rs`) tells those two cases apart by also
/// calling [`set`].
pub fn negate(var: &str) -> Option<SettingsModifier> {
    if let Some(modifier) = negate_flags!(
        var,
        {
            authenticate,
            root_sudo,
            requiretty,
            env_reset,
            env_editor,
            use_pty,
            setenv,
            noexec,
            targetpw,
            rootpw,
            pwfeedback,
            visiblepw,
            always_set_home,
            set_home,
            stay_setuid,
            preserve_groups,
            fqdn,
            mail_badpass,
            closefrom_override,
            ignore_dot,
            fast_glob,
            umask_override,
            always_query_group_plugin,
            match_group_by_gid,
            noninteractive_auth,
            tty_tickets,

            log_host,
            log_year,
            shell_noargs,
            path_info,
            insults,
            runaspw,
            use_loginclass,
            set_logname,
            mail_always,
            mail_no_user,
            mail_no_host,
            mail_no_perms,
            set_utmp,
        }
    ) {
        return Some(modifier);
    }

    Some(match var {
        "env_keep" => env_keep_modifier(ListMode::Set, Vec::new()),
        "env_check" => env_check_modifier(ListMode::Set, Vec::new()),
        "env_delete" => env_delete_modifier(ListMode::Set, Vec::new()),
        "secure_path" => Box::new(|s: &mut Settings| s.secure_path = None),
        "apparmor_profile" => Box::new(|s: &mut Settings| s.apparmor_profile = None),
        "logfile" => Box::new(|s: &mut Settings| s.logfile = None),
        "lecture_file" => Box::new(|s: &mut Settings| s.lecture_file = None),
        "exempt_group" => Box::new(|s: &mut Settings| s.exempt_group = None),
        "mailfrom" => Box::new(|s: &mut Settings| s.mailfrom = None),
        "noexec_file" => Box::new(|s: &mut Settings| s.noexec_file = None),
        "syslog" => Box::new(|s: &mut Settings| s.syslog = None),
        "utmp_user" => Box::new(|s: &mut Settings| s.utmp_user = None),
        _ => return None,
    })
}

fn set_passwd_tries(text: &str) -> Option<SettingsModifier> {
    let n: i64 = text.parse().ok()?;
    if !(0..=1000).contains(&n) {
        return None;
    }
    Some(Box::new(move |s: &mut Settings| s.passwd_tries = n))
}

fn set_timestamp_timeout(text: &str) -> Option<SettingsModifier> {
    let secs = fractional_minutes(text)?;
    Some(Box::new(move |s: &mut Settings| s.timestamp_timeout = secs))
}

fn set_passwd_timeout(text: &str) -> Option<SettingsModifier> {
    let secs = fractional_minutes(text)?;
    Some(Box::new(move |s: &mut Settings| s.passwd_timeout = secs))
}

fn set_umask(text: &str) -> Option<SettingsModifier> {
    let n = i64::from_str_radix(text, 8).ok()?;
    if !(0..=0o777).contains(&n) {
        return None;
    }
    Some(Box::new(move |s: &mut Settings| s.umask = n))
}

fn set_secure_path(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| {
        s.secure_path = Some(value.clone())
    }))
}

fn set_editor(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| s.editor = value.clone()))
}

fn set_apparmor_profile(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| {
        s.apparmor_profile = Some(value.clone())
    }))
}

fn set_logfile(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| s.logfile = Some(value.clone())))
}

fn set_mailerpath(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| s.mailerpath = value.clone()))
}

fn set_runas_default(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| {
        s.runas_default = value.clone()
    }))
}

const VERIFYPW_VALUES: &[&str] = &["all", "always", "any", "never"];

fn set_verifypw(text: &str) -> Option<SettingsModifier> {
    let value = StrEnum::new(text, VERIFYPW_VALUES)?.get().to_string();
    Some(Box::new(move |s: &mut Settings| s.verifypw = value.clone()))
}

fn set_loglinelen(text: &str) -> Option<SettingsModifier> {
    let n: i64 = text.parse().ok()?;
    if n < 0 {
        return None;
    }
    Some(Box::new(move |s: &mut Settings| s.loglinelen = n))
}

const LECTURE_VALUES: &[&str] = &["never", "once", "always"];

fn set_lecture(text: &str) -> Option<SettingsModifier> {
    let value = StrEnum::new(text, LECTURE_VALUES)?.get().to_string();
    Some(Box::new(move |s: &mut Settings| s.lecture = value.clone()))
}

fn set_lecture_file(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| {
        s.lecture_file = Some(value.clone())
    }))
}

fn set_mailsubject(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| s.mailsubject = value.clone()))
}

fn set_badpass_message(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| {
        s.badpass_message = value.clone()
    }))
}

fn set_timestampdir(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| s.timestampdir = value.clone()))
}

fn set_timestampowner(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| {
        s.timestampowner = value.clone()
    }))
}

/// The `exempt_group` name, consulted by the facade (C10) when deciding whether an
/// unset `secure_path` falls back to the caller's own `PATH` rather than a built-in one.
fn set_exempt_group(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| {
        s.exempt_group = Some(value.clone())
    }))
}

fn set_passprompt(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| s.passprompt = value.clone()))
}

fn set_mailfrom(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| s.mailfrom = Some(value.clone())))
}

fn set_noexec_file(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| {
        s.noexec_file = Some(value.clone())
    }))
}

fn set_syslog(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| s.syslog = Some(value.clone())))
}

fn set_syslog_goodpri(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| {
        s.syslog_goodpri = value.clone()
    }))
}

fn set_syslog_badpri(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| {
        s.syslog_badpri = value.clone()
    }))
}

/// The utmp/wtmp entry name to log the session under, consulted by the facade (C9)
/// when carrying `set_utmp`'s inert `utmp_user` payload.
fn set_utmp_user(text: &str) -> Option<SettingsModifier> {
    let value = text.to_string();
    Some(Box::new(move |s: &mut Settings| s.utmp_user = Some(value.clone())))
}

fn apply_list_mode(set: &mut HashSet<String>, mode: ListMode, items: Vec<String>) {
    match mode {
        ListMode::Add => set.extend(items),
        ListMode::Del => {
            for item in items {
                set.remove(&item);
            }
        }
        ListMode::Set => *set = items.into_iter().collect(),
    }
}

fn env_keep_modifier(mode: ListMode, items: Vec<String>) -> SettingsModifier {
    Box::new(move |s: &mut Settings| apply_list_mode(&mut s.env_keep, mode, items.clone()))
}

fn env_check_modifier(mode: ListMode, items: Vec<String>) -> SettingsModifier {
    Box::new(move |s: &mut Settings| apply_list_mode(&mut s.env_check, mode, items.clone()))
}

fn env_delete_modifier(mode: ListMode, items: Vec<String>) -> SettingsModifier {
    Box::new(move |s: &mut Settings| apply_list_mode(&mut s.env_delete, mode, items.clone()))
}

/// A snapshot of the Defaults table: the compiled-in values, as mutated by whichever
/// `Defaults` bindings have been applied so far. The policy evaluator (C8) resets this
/// to [`Settings::default`] at the start of every `open`, applies unscoped bindings, then
/// re-applies scoped bindings as the request's host/user/runas/command become known.
#[derive(Debug, Clone)]
pub struct Settings {
    authenticate: bool,
    root_sudo: bool,
    requiretty: bool,
    env_reset: bool,
    env_editor: bool,
    use_pty: bool,
    setenv: bool,
    noexec: bool,
    targetpw: bool,
    rootpw: bool,
    pwfeedback: bool,
    visiblepw: bool,
    always_set_home: bool,
    set_home: bool,
    stay_setuid: bool,
    preserve_groups: bool,
    fqdn: bool,
    mail_badpass: bool,
    closefrom_override: bool,
    ignore_dot: bool,
    fast_glob: bool,
    umask_override: bool,
    always_query_group_plugin: bool,
    match_group_by_gid: bool,
    noninteractive_auth: bool,
    tty_tickets: bool,

    // Carried inert per SPEC_FULL.md's commitment that every name in
    // `def_data.c`'s option set is declared and settable in the registry even
    // when this crate's C9/C10 doesn't act on the effect (authentication
    // dialog, mail notifications, syslog routing, login-class accounting).
    log_host: bool,
    log_year: bool,
    shell_noargs: bool,
    path_info: bool,
    insults: bool,
    runaspw: bool,
    use_loginclass: bool,
    set_logname: bool,
    mail_always: bool,
    mail_no_user: bool,
    mail_no_host: bool,
    mail_no_perms: bool,
    set_utmp: bool,

    passwd_tries: i64,
    timestamp_timeout: u64,
    passwd_timeout: u64,
    umask: i64,
    loglinelen: i64,

    secure_path: Option<String>,
    editor: String,
    apparmor_profile: Option<String>,
    logfile: Option<String>,
    mailerpath: String,
    runas_default: String,
    verifypw: String,
    lecture: String,
    lecture_file: Option<String>,
    mailsubject: String,
    badpass_message: String,
    timestampdir: String,
    timestampowner: String,
    exempt_group: Option<String>,
    passprompt: String,
    mailfrom: Option<String>,
    noexec_file: Option<String>,
    syslog: Option<String>,
    syslog_goodpri: String,
    syslog_badpri: String,
    utmp_user: Option<String>,

    env_keep: HashSet<String>,
    env_check: HashSet<String>,
    env_delete: HashSet<String>,
}

fn wordset(words: &[&str]) -> HashSet<String> {
    words.iter().map(|s| s.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            authenticate: true,
            root_sudo: true,
            requiretty: false,
            env_reset: true,
            env_editor: false,
            use_pty: true,
            setenv: false,
            noexec: false,
            targetpw: false,
            rootpw: false,
            pwfeedback: false,
            visiblepw: false,
            always_set_home: false,
            set_home: false,
            stay_setuid: false,
            preserve_groups: false,
            fqdn: false,
            mail_badpass: true,
            closefrom_override: false,
            ignore_dot: false,
            fast_glob: false,
            umask_override: false,
            always_query_group_plugin: false,
            match_group_by_gid: false,
            noninteractive_auth: false,
            tty_tickets: true,

            log_host: false,
            log_year: false,
            shell_noargs: false,
            path_info: true,
            insults: false,
            runaspw: false,
            use_loginclass: false,
            set_logname: true,
            mail_always: false,
            mail_no_user: true,
            mail_no_host: false,
            mail_no_perms: false,
            set_utmp: true,

            passwd_tries: 3,
            timestamp_timeout: 15 * 60,
            passwd_timeout: 5 * 60,
            umask: 0o22,
            loglinelen: 80,

            secure_path: None,
            editor: "/usr/bin/editor".to_string(),
            apparmor_profile: None,
            logfile: None,
            mailerpath: "/usr/sbin/sendmail".to_string(),
            runas_default: "root".to_string(),
            verifypw: "all".to_string(),
            lecture: "once".to_string(),
            lecture_file: None,
            mailsubject: "*** SECURITY information for %h ***".to_string(),
            badpass_message: "Sorry, try again.".to_string(),
            timestampdir: "/var/run/sudo/ts".to_string(),
            timestampowner: "root".to_string(),
            exempt_group: None,
            passprompt: "Password: ".to_string(),
            mailfrom: None,
            noexec_file: None,
            syslog: Some("authpriv".to_string()),
            syslog_goodpri: "notice".to_string(),
            syslog_badpri: "alert".to_string(),
            utmp_user: None,

            env_keep: wordset(&[
                "COLORS",
                "DISPLAY",
                "HOSTNAME",
                "KRB5CCNAME",
                "LS_COLORS",
                "PATH",
                "PS1",
                "PS2",
                "XAUTHORITY",
                "XAUTHORIZATION",
                "XDG_CURRENT_DESKTOP",
            ]),
            env_check: wordset(&[
                "COLORTERM", "LANG", "LANGUAGE", "LC_*", "LINGUAS", "TERM", "TZ",
            ]),
            env_delete: wordset(&[
                "IFS",
                "CDPATH",
                "LOCALDOMAIN",
                "RES_OPTIONS",
                "HOSTALIASES",
                "NLSPATH",
                "PATH_LOCALE",
                "LD_*",
                "_RLD*",
                "TERMINFO",
                "TERMINFO_DIRS",
                "TERMPATH",
                "TERMCAP",
                "ENV",
                "BASH_ENV",
                "PS4",
                "GLOBIGNORE",
                "BASHOPTS",
                "SHELLOPTS",
                "JAVA_TOOL_OPTIONS",
                "PERLIO_DEBUG",
                "PERLLIB",
                "PERL5LIB",
                "PERL5OPT",
                "PERL5DB",
                "FPATH",
                "NULLCMD",
                "READNULLCMD",
                "ZDOTDIR",
                "TMPPREFIX",
                "PYTHONHOME",
                "PYTHONPATH",
                "PYTHONINSPECT",
                "PYTHONUSERBASE",
                "RUBYLIB",
                "RUBYOPT",
                "*=()*",
            ]),
        }
    }
}

impl Settings {
    /// Restores every setting to its compiled-in default, discarding anything a prior
    /// `Defaults` pass applied. Called at the start of every plugin `open` (spec C1).
    pub fn reset_all_to_builtin(&mut self) {
        *self = Settings::default();
    }

    /// Generic by-name read, for introspection (e.g. a future `-l`/`-V` listing).
    pub fn get(&self, name: &str) -> Option<Value> {
        Some(match name {
            "authenticate" => Value::Flag(self.authenticate),
            "root_sudo" => Value::Flag(self.root_sudo),
            "requiretty" => Value::Flag(self.requiretty),
            "env_reset" => Value::Flag(self.env_reset),
            "env_editor" => Value::Flag(self.env_editor),
            "use_pty" => Value::Flag(self.use_pty),
            "setenv" => Value::Flag(self.setenv),
            "noexec" => Value::Flag(self.noexec),
            "targetpw" => Value::Flag(self.targetpw),
            "rootpw" => Value::Flag(self.rootpw),
            "pwfeedback" => Value::Flag(self.pwfeedback),
            "visiblepw" => Value::Flag(self.visiblepw),
            "always_set_home" => Value::Flag(self.always_set_home),
            "set_home" => Value::Flag(self.set_home),
            "stay_setuid" => Value::Flag(self.stay_setuid),
            "preserve_groups" => Value::Flag(self.preserve_groups),
            "fqdn" => Value::Flag(self.fqdn),
            "mail_badpass" => Value::Flag(self.mail_badpass),
            "closefrom_override" => Value::Flag(self.closefrom_override),
            "ignore_dot" => Value::Flag(self.ignore_dot),
            "fast_glob" => Value::Flag(self.fast_glob),
            "umask_override" => Value::Flag(self.umask_override),
            "always_query_group_plugin" => Value::Flag(self.always_query_group_plugin),
            "match_group_by_gid" => Value::Flag(self.match_group_by_gid),
            "noninteractive_auth" => Value::Flag(self.noninteractive_auth),
            "tty_tickets" => Value::Flag(self.tty_tickets),

            "log_host" => Value::Flag(self.log_host),
            "log_year" => Value::Flag(self.log_year),
            "shell_noargs" => Value::Flag(self.shell_noargs),
            "path_info" => Value::Flag(self.path_info),
            "insults" => Value::Flag(self.insults),
            "runaspw" => Value::Flag(self.runaspw),
            "use_loginclass" => Value::Flag(self.use_loginclass),
            "set_logname" => Value::Flag(self.set_logname),
            "mail_always" => Value::Flag(self.mail_always),
            "mail_no_user" => Value::Flag(self.mail_no_user),
            "mail_no_host" => Value::Flag(self.mail_no_host),
            "mail_no_perms" => Value::Flag(self.mail_no_perms),
            "set_utmp" => Value::Flag(self.set_utmp),

            "passwd_tries" => Value::Integer(self.passwd_tries),
            "timestamp_timeout" => Value::Integer(self.timestamp_timeout as i64),
            "passwd_timeout" => Value::Integer(self.passwd_timeout as i64),
            "umask" => Value::Integer(self.umask),
            "loglinelen" => Value::Integer(self.loglinelen),

            "secure_path" => Value::Text(self.secure_path.clone()),
            "editor" => Value::Text(Some(self.editor.clone())),
            "apparmor_profile" => Value::Text(self.apparmor_profile.clone()),
            "logfile" => Value::Text(self.logfile.clone()),
            "mailerpath" => Value::Text(Some(self.mailerpath.clone())),
            "runas_default" => Value::Text(Some(self.runas_default.clone())),
            "verifypw" => Value::Text(Some(self.verifypw.clone())),
            "lecture" => Value::Text(Some(self.lecture.clone())),
            "lecture_file" => Value::Text(self.lecture_file.clone()),
            "mailsubject" => Value::Text(Some(self.mailsubject.clone())),
            "badpass_message" => Value::Text(Some(self.badpass_message.clone())),
            "timestampdir" => Value::Text(Some(self.timestampdir.clone())),
            "timestampowner" => Value::Text(Some(self.timestampowner.clone())),
            "exempt_group" => Value::Text(self.exempt_group.clone()),
            "passprompt" => Value::Text(Some(self.passprompt.clone())),
            "mailfrom" => Value::Text(self.mailfrom.clone()),
            "noexec_file" => Value::Text(self.noexec_file.clone()),
            "syslog" => Value::Text(self.syslog.clone()),
            "syslog_goodpri" => Value::Text(Some(self.syslog_goodpri.clone())),
            "syslog_badpri" => Value::Text(Some(self.syslog_badpri.clone())),
            "utmp_user" => Value::Text(self.utmp_user.clone()),

            "env_keep" => Value::List(self.env_keep.iter().cloned().collect()),
            "env_check" => Value::List(self.env_check.iter().cloned().collect()),
            "env_delete" => Value::List(self.env_delete.iter().cloned().collect()),

            _ => return None,
        })
    }

    pub fn authenticate(&self) -> bool {
        self.authenticate
    }
    pub fn root_sudo(&self) -> bool {
        self.root_sudo
    }
    pub fn requiretty(&self) -> bool {
        self.requiretty
    }
    pub fn env_reset(&self) -> bool {
        self.env_reset
    }
    pub fn env_editor(&self) -> bool {
        self.env_editor
    }
    pub fn use_pty(&self) -> bool {
        self.use_pty
    }
    pub fn setenv(&self) -> bool {
        self.setenv
    }
    pub fn noexec(&self) -> bool {
        self.noexec
    }
    pub fn targetpw(&self) -> bool {
        self.targetpw
    }
    pub fn rootpw(&self) -> bool {
        self.rootpw
    }
    pub fn pwfeedback(&self) -> bool {
        self.pwfeedback
    }
    pub fn visiblepw(&self) -> bool {
        self.visiblepw
    }
    pub fn always_set_home(&self) -> bool {
        self.always_set_home
    }
    pub fn set_home(&self) -> bool {
        self.set_home
    }
    pub fn stay_setuid(&self) -> bool {
        self.stay_setuid
    }
    pub fn preserve_groups(&self) -> bool {
        self.preserve_groups
    }
    pub fn fqdn(&self) -> bool {
        self.fqdn
    }
    pub fn mail_badpass(&self) -> bool {
        self.mail_badpass
    }
    pub fn closefrom_override(&self) -> bool {
        self.closefrom_override
    }
    pub fn ignore_dot(&self) -> bool {
        self.ignore_dot
    }
    pub fn fast_glob(&self) -> bool {
        self.fast_glob
    }
    pub fn umask_override(&self) -> bool {
        self.umask_override
    }
    pub fn always_query_group_plugin(&self) -> bool {
        self.always_query_group_plugin
    }
    pub fn match_group_by_gid(&self) -> bool {
        self.match_group_by_gid
    }
    pub fn noninteractive_auth(&self) -> bool {
        self.noninteractive_auth
    }
    pub fn tty_tickets(&self) -> bool {
        self.tty_tickets
    }

    pub fn log_host(&self) -> bool {
        self.log_host
    }
    pub fn log_year(&self) -> bool {
        self.log_year
    }
    pub fn shell_noargs(&self) -> bool {
        self.shell_noargs
    }
    pub fn path_info(&self) -> bool {
        self.path_info
    }
    pub fn insults(&self) -> bool {
        self.insults
    }
    pub fn runaspw(&self) -> bool {
        self.runaspw
    }
    pub fn use_loginclass(&self) -> bool {
        self.use_loginclass
    }
    pub fn set_logname(&self) -> bool {
        self.set_logname
    }
    pub fn mail_always(&self) -> bool {
        self.mail_always
    }
    pub fn mail_no_user(&self) -> bool {
        self.mail_no_user
    }
    pub fn mail_no_host(&self) -> bool {
        self.mail_no_host
    }
    pub fn mail_no_perms(&self) -> bool {
        self.mail_no_perms
    }
    pub fn set_utmp(&self) -> bool {
        self.set_utmp
    }

    pub fn passwd_tries(&self) -> i64 {
        self.passwd_tries
    }
    pub fn timestamp_timeout(&self) -> u64 {
        self.timestamp_timeout
    }
    pub fn passwd_timeout(&self) -> u64 {
        self.passwd_timeout
    }
    pub fn umask(&self) -> i64 {
        self.umask
    }
    pub fn loglinelen(&self) -> i64 {
        self.loglinelen
    }

    pub fn secure_path(&self) -> Option<&str> {
        self.secure_path.as_deref()
    }
    pub fn editor(&self) -> &str {
        &self.editor
    }
    pub fn apparmor_profile(&self) -> Option<&str> {
        self.apparmor_profile.as_deref()
    }
    pub fn logfile(&self) -> Option<&str> {
        self.logfile.as_deref()
    }
    pub fn mailerpath(&self) -> &str {
        &self.mailerpath
    }
    pub fn runas_default(&self) -> &str {
        &self.runas_default
    }
    pub fn verifypw(&self) -> &str {
        &self.verifypw
    }
    pub fn lecture(&self) -> &str {
        &self.lecture
    }
    pub fn lecture_file(&self) -> Option<&str> {
        self.lecture_file.as_deref()
    }
    pub fn mailsubject(&self) -> &str {
        &self.mailsubject
    }
    pub fn badpass_message(&self) -> &str {
        &self.badpass_message
    }
    pub fn timestampdir(&self) -> &str {
        &self.timestampdir
    }
    pub fn timestampowner(&self) -> &str {
        &self.timestampowner
    }
    pub fn exempt_group(&self) -> Option<&str> {
        self.exempt_group.as_deref()
    }
    pub fn passprompt(&self) -> &str {
        &self.passprompt
    }
    pub fn mailfrom(&self) -> Option<&str> {
        self.mailfrom.as_deref()
    }
    pub fn noexec_file(&self) -> Option<&str> {
        self.noexec_file.as_deref()
    }
    pub fn syslog(&self) -> Option<&str> {
        self.syslog.as_deref()
    }
    pub fn syslog_goodpri(&self) -> &str {
        &self.syslog_goodpri
    }
    pub fn syslog_badpri(&self) -> &str {
        &self.syslog_badpri
    }
    pub fn utmp_user(&self) -> Option<&str> {
        self.utmp_user.as_deref()
    }

    pub fn env_keep(&self) -> &HashSet<String> {
        &self.env_keep
    }
    pub fn env_check(&self) -> &HashSet<String> {
        &self.env_check
    }
    pub fn env_delete(&self) -> &HashSet<String> {
        &self.env_delete
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_setting_is_none() {
        assert!(set("bla").is_none());
        assert!(negate("bla").is_none());
    }

    #[test]
    fn flags_round_trip() {
        let mut settings = Settings::default();
        assert!(!settings.requiretty());

        let SettingKind::Flag(modifier) = set("requiretty").unwrap() else {
            unreachable!()
        };
        modifier(&mut settings);
        assert!(settings.requiretty());

        let modifier = negate("requiretty").unwrap();
        modifier(&mut settings);
        assert!(!settings.requiretty());
    }

    #[test]
    fn non_flag_is_not_negatable() {
        assert!(set("passwd_tries").is_some());
        assert!(negate("passwd_tries").is_none());
    }

    #[test]
    fn integer_rejects_out_of_range() {
        let SettingKind::Integer(checker) = set("passwd_tries").unwrap() else {
            unreachable!()
        };
        assert!(checker("3").is_some());
        assert!(checker("-1").is_none());
        assert!(checker("not a number").is_none());
    }

    #[test]
    fn umask_is_parsed_as_octal() {
        let SettingKind::Integer(checker) = set("umask").unwrap() else {
            unreachable!()
        };
        let modifier = checker("027").unwrap();
        let mut settings = Settings::default();
        modifier(&mut settings);
        assert_eq!(settings.umask(), 0o27);
    }

    #[test]
    fn timestamp_timeout_accepts_fractional_minutes() {
        let SettingKind::Integer(checker) = set("timestamp_timeout").unwrap() else {
            unreachable!()
        };
        let modifier = checker("1.5").unwrap();
        let mut settings = Settings::default();
        modifier(&mut settings);
        assert_eq!(settings.timestamp_timeout(), 90);
    }

    #[test]
    fn list_add_and_remove() {
        let SettingKind::List(checker) = set("env_keep").unwrap() else {
            unreachable!()
        };
        let mut settings = Settings::default();
        assert!(settings.env_keep().contains("PATH"));

        checker(ListMode::Add, vec!["FOO".to_string()])(&mut settings);
        assert!(settings.env_keep().contains("FOO"));

        checker(ListMode::Del, vec!["PATH".to_string()])(&mut settings);
        assert!(!settings.env_keep().contains("PATH"));
    }

    #[test]
    fn verifypw_rejects_unknown_value() {
        let SettingKind::Text(checker) = set("verifypw").unwrap() else {
            unreachable!()
        };
        assert!(checker("always").is_some());
        assert!(checker("sometimes").is_none());
    }

    #[test]
    fn full_option_table_is_declared_and_settable() {
        // Every name SPEC_FULL.md lists from `def_data.c` must be a known setting,
        // even though most of these have no behavioral effect in this crate.
        for name in [
            "log_host",
            "log_year",
            "shell_noargs",
            "path_info",
            "insults",
            "runaspw",
            "use_loginclass",
            "set_logname",
            "mail_always",
            "mail_no_user",
            "mail_no_host",
            "mail_no_perms",
            "lecture",
            "lecture_file",
            "loglinelen",
            "mailsubject",
            "badpass_message",
            "timestampdir",
            "timestampowner",
            "exempt_group",
            "passprompt",
            "mailfrom",
            "noexec_file",
            "syslog",
            "syslog_goodpri",
            "syslog_badpri",
            "set_utmp",
            "utmp_user",
        ] {
            assert!(set(name).is_some(), "{name} should be a known setting");
        }

        let settings = Settings::default();
        assert!(settings.get("exempt_group").is_some());
    }

    #[test]
    fn lecture_rejects_unknown_value() {
        let SettingKind::Text(checker) = set("lecture").unwrap() else {
            unreachable!()
        };
        assert!(checker("never").is_some());
        assert!(checker("sometimes").is_none());
    }

    #[test]
    fn exempt_group_round_trips_and_negates() {
        let SettingKind::Text(checker) = set("exempt_group").unwrap() else {
            unreachable!()
        };
        let mut settings = Settings::default();
        assert_eq!(settings.exempt_group(), None);

        checker("wheel").unwrap()(&mut settings);
        assert_eq!(settings.exempt_group(), Some("wheel"));

        negate("exempt_group").unwrap()(&mut settings);
        assert_eq!(settings.exempt_group(), None);
    }

    #[test]
    fn reset_all_to_builtin_discards_changes() {
        let mut settings = Settings::default();
        let SettingKind::Flag(modifier) = set("requiretty").unwrap() else {
            unreachable!()
        };
        modifier(&mut settings);
        assert!(settings.requiretty());

        settings.reset_all_to_builtin();
        assert!(!settings.requiretty());
    }
}
