//! Minimal front-end exercising the `facade` plugin operations end to end: gathers
//! a couple of process facts, drives `sudoctl::facade::Plugin`, and maps the result
//! onto the exit codes spec.md §6 assigns to front-end-facing operations (0 =
//! allowed/listed, 1 = denied/error, 2 = usage error).

use std::env;
use std::process::ExitCode;

use sudoctl::common::Environment;
use sudoctl::facade::{Decision, Plugin, PluginStatus};
use sudoctl::log::SudoLogger;

struct GlobalOpts {
    runas_user: Option<String>,
    runas_group: Option<String>,
    sudoers_file: Option<String>,
}

fn usage() -> ExitCode {
    eprintln!("usage: sudoctl check [-u user] [-g group] [--sudoers path] -- command [args...]");
    eprintln!("       sudoctl list [-u user] [--sudoers path] [-v] [user]");
    eprintln!("       sudoctl validate [-u user] [--sudoers path]");
    eprintln!("       sudoctl version [-v]");
    ExitCode::from(2)
}

fn build_settings(opts: &GlobalOpts) -> Vec<String> {
    let mut settings = Vec::new();
    if let Some(user) = &opts.runas_user {
        settings.push(format!("runas_user={user}"));
    }
    if let Some(group) = &opts.runas_group {
        settings.push(format!("runas_group={group}"));
    }
    if let Some(path) = &opts.sudoers_file {
        settings.push(format!("sudoers_file={path}"));
    }
    settings
}

fn build_user_info() -> Vec<String> {
    let mut info = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        info.push(format!("cwd={}", cwd.display()));
    }
    info
}

fn build_envp() -> Vec<String> {
    env::vars().map(|(key, value)| format!("{key}={value}")).collect()
}

fn main() -> ExitCode {
    SudoLogger::new("sudoctl: ").into_global_logger();

    let mut args = env::args().skip(1);
    let Some(subcommand) = args.next() else {
        return usage();
    };

    let mut opts = GlobalOpts {
        runas_user: None,
        runas_group: None,
        sudoers_file: None,
    };
    let mut positional = Vec::new();
    let mut verbose = false;
    let mut rest_is_command = false;

    while let Some(arg) = args.next() {
        if rest_is_command {
            positional.push(arg);
            continue;
        }
        match arg.as_str() {
            "--" => rest_is_command = true,
            "-u" | "--user" => match args.next() {
                Some(value) => opts.runas_user = Some(value),
                None => return usage(),
            },
            "-g" | "--group" => match args.next() {
                Some(value) => opts.runas_group = Some(value),
                None => return usage(),
            },
            "--sudoers" => match args.next() {
                Some(value) => opts.sudoers_file = Some(value),
                None => return usage(),
            },
            "-v" | "--verbose" => verbose = true,
            flag if flag.starts_with('-') => return usage(),
            _ => positional.push(arg),
        }
    }

    let settings = build_settings(&opts);
    let user_info = build_user_info();
    let envp = build_envp();

    let open_result = match Plugin::open(&settings, &user_info, &envp) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("sudoctl: {err}");
            return ExitCode::from(1);
        }
    };
    for warning in &open_result.parse_warnings {
        eprintln!("sudoctl: {warning}");
    }
    let mut plugin = open_result.plugin;

    let status = match subcommand.as_str() {
        "check" => run_check(&mut plugin, &positional),
        "list" => run_list(&mut plugin, positional.first().map(String::as_str), verbose),
        "validate" => run_validate(&mut plugin),
        "version" => {
            println!("{}", plugin.version(verbose));
            PluginStatus::Success
        }
        _ => {
            plugin.close();
            return usage();
        }
    };

    plugin.close();
    exit_code_for(status)
}

fn run_check(plugin: &mut Plugin, argv: &[String]) -> PluginStatus {
    if argv.is_empty() {
        eprintln!("sudoctl: check requires a command after --");
        return PluginStatus::UsageError;
    }
    let env_add = Environment::new();
    let result = plugin.check(argv, &env_add);
    let status = PluginStatus::of(&result);
    match result {
        Ok(Decision::Allowed(plan)) => {
            for pair in plan.to_key_value_pairs() {
                println!("{pair}");
            }
        }
        Ok(Decision::Denied(message)) => eprintln!("sudoctl: {message}"),
        Err(err) => eprintln!("sudoctl: {err}"),
    }
    status
}

fn run_list(plugin: &mut Plugin, user: Option<&str>, verbose: bool) -> PluginStatus {
    let result = plugin.list(user, verbose);
    let status = PluginStatus::of(&result);
    match result {
        Ok(Decision::Allowed(output)) => print!("{output}"),
        Ok(Decision::Denied(message)) => eprintln!("sudoctl: {message}"),
        Err(err) => eprintln!("sudoctl: {err}"),
    }
    status
}

fn run_validate(plugin: &mut Plugin) -> PluginStatus {
    let result = plugin.validate();
    let status = PluginStatus::of(&result);
    match &result {
        Ok(Decision::Denied(message)) => eprintln!("sudoctl: {message}"),
        Err(err) => eprintln!("sudoctl: {err}"),
        _ => {}
    }
    status
}

fn exit_code_for(status: PluginStatus) -> ExitCode {
    match status {
        PluginStatus::Success => ExitCode::from(0),
        PluginStatus::Denied | PluginStatus::Error => ExitCode::from(1),
        PluginStatus::UsageError => ExitCode::from(2),
    }
}
