// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod deploy;
mod launch;
mod logging;
mod runtime;
mod shell;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use deploy::{DeployArgs, NodeRole, Workload};
use lambdactl_app::{ConsoleSettings, ShellTarget};
use launch::LaunchArgs;
use lambdactl_tui::ConsoleRuntime;
use runtime::{ApiRuntime, DEMO_SEED, DemoRuntime};
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `lambdactl --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    let settings = config.console_settings()?;

    if let Some(Subcommand::Deploy(args)) = &options.command {
        if options.demo {
            bail!("deploy needs a real host; drop --demo");
        }
        let target = deploy_target(&settings, args);
        let plan = deploy::plan(args, &target.user)?;
        if options.check_only {
            return Ok(());
        }
        let log = logging::init(config.log_level(), config.log_dir())?;
        info!(destination = %target.destination(), log_dir = %log.dir.display(), "starting deploy");
        return deploy::run(config.ssh_binary(), &target, &plan);
    }

    if options.demo {
        if options.check_only {
            return Ok(());
        }
        let log = logging::init(config.log_level(), config.log_dir())?;
        info!(seed = DEMO_SEED, log_dir = %log.dir.display(), "starting demo fleet");
        return dispatch(DemoRuntime::new(DEMO_SEED), options.command, settings);
    }

    let api_key = config.require_api_key()?;
    let client = lambdactl_api::Client::new(
        &config.api_base_url(),
        &api_key,
        config.api_timeout()?,
    )
    .with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/api_key/timeout values",
            options.config_path.display()
        )
    })?;
    if options.check_only {
        return Ok(());
    }

    let log = logging::init(config.log_level(), config.log_dir())?;
    info!(base_url = client.base_url(), log_dir = %log.dir.display(), "starting");
    let runtime = ApiRuntime::new(client, config.launch_ssh_key_names(), config.ssh_binary());
    dispatch(runtime, options.command, settings)
}

fn dispatch<R: ConsoleRuntime>(
    runtime: R,
    command: Option<Subcommand>,
    settings: ConsoleSettings,
) -> Result<()> {
    match command {
        None => lambdactl_tui::run_app(runtime, settings),
        Some(Subcommand::List) => print_yaml(&runtime.list_instances()?),
        Some(Subcommand::Fetch) => print_yaml(&runtime.fetch_offerings()?),
        Some(Subcommand::Ssh { address }) => {
            runtime.open_shell(&shell_target(&settings, &address))
        }
        Some(Subcommand::Launch(args)) => print_yaml(&launch::launch(&runtime, &args)?),
        Some(Subcommand::Deploy(_)) => bail!("deploy runs before a runtime is created"),
    }
}

fn print_yaml<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_yaml::to_string(value).context("render YAML")?;
    print!("{rendered}");
    Ok(())
}

fn shell_target(settings: &ConsoleSettings, address: &str) -> ShellTarget {
    ShellTarget {
        address: address.to_owned(),
        port: settings.shell.port,
        user: settings.shell.user.clone(),
        key: settings.shell.key_path.clone(),
    }
}

fn deploy_target(settings: &ConsoleSettings, args: &DeployArgs) -> ShellTarget {
    ShellTarget {
        address: args.host.trim().to_owned(),
        port: args.port.unwrap_or(settings.shell.port),
        user: args
            .user
            .clone()
            .unwrap_or_else(|| settings.shell.user.clone()),
        key: settings.shell.key_path.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Subcommand {
    List,
    Fetch,
    Ssh { address: String },
    Launch(LaunchArgs),
    Deploy(DeployArgs),
}

/// A subcommand while its own flags are still being read.
#[derive(Debug)]
enum PendingCommand {
    List,
    Fetch,
    Ssh {
        address: Option<String>,
    },
    Launch(LaunchArgs),
    Deploy {
        workload: Option<String>,
        host: Option<String>,
        port: Option<u16>,
        user: Option<String>,
        root: bool,
        role: Option<String>,
        version: Option<String>,
        server: Option<String>,
        token: Option<String>,
    },
}

impl PendingCommand {
    fn start(name: &str) -> Option<Self> {
        match name {
            "list" => Some(Self::List),
            "fetch" => Some(Self::Fetch),
            "ssh" => Some(Self::Ssh { address: None }),
            "launch" => Some(Self::Launch(LaunchArgs::default())),
            "deploy" => Some(Self::Deploy {
                workload: None,
                host: None,
                port: None,
                user: None,
                root: false,
                role: None,
                version: None,
                server: None,
                token: None,
            }),
            _ => None,
        }
    }

    /// Consumes `arg` (and its value) if it belongs to this subcommand.
    fn accept<S: AsRef<str>>(
        &mut self,
        arg: &str,
        rest: &mut impl Iterator<Item = S>,
    ) -> Result<bool> {
        match (self, arg) {
            (Self::Ssh { address }, "--ip") => {
                *address = Some(flag_value(rest, "--ip", "an address")?);
            }
            (Self::Launch(args), "--type") => {
                args.instance_type = flag_value(rest, "--type", "an instance type name")?;
            }
            (Self::Launch(args), "--region") => {
                args.region = flag_value(rest, "--region", "a region name")?;
            }
            (Self::Launch(args), "--count") => {
                let raw = flag_value(rest, "--count", "a number")?;
                args.count = raw
                    .parse::<u32>()
                    .ok()
                    .filter(|count| *count >= 1)
                    .ok_or_else(|| anyhow!("--count must be a whole number of at least 1, got {raw:?}"))?;
            }
            (Self::Deploy { host, .. }, "--host") => {
                *host = Some(flag_value(rest, "--host", "an address")?);
            }
            (Self::Deploy { port, .. }, "--port") => {
                let raw = flag_value(rest, "--port", "a port number")?;
                *port = Some(
                    raw.parse::<u16>()
                        .with_context(|| format!("--port must be a port number, got {raw:?}"))?,
                );
            }
            (Self::Deploy { user, .. }, "--user") => {
                *user = Some(flag_value(rest, "--user", "a user name")?);
            }
            (Self::Deploy { root, .. }, "--root") => {
                *root = true;
            }
            (Self::Deploy { role, .. }, "--role") => {
                *role = Some(flag_value(rest, "--role", "a node role")?);
            }
            (Self::Deploy { version, .. }, "--version") => {
                *version = Some(flag_value(rest, "--version", "an rke2 version")?);
            }
            (Self::Deploy { server, .. }, "--server") => {
                *server = Some(flag_value(rest, "--server", "an address")?);
            }
            (Self::Deploy { token, .. }, "--token") => {
                *token = Some(flag_value(rest, "--token", "a cluster token")?);
            }
            (Self::Deploy { workload, .. }, positional)
                if workload.is_none() && !positional.starts_with('-') =>
            {
                *workload = Some(positional.to_owned());
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn finish(self) -> Result<Subcommand> {
        Ok(match self {
            Self::List => Subcommand::List,
            Self::Fetch => Subcommand::Fetch,
            Self::Ssh { address } => Subcommand::Ssh {
                address: address
                    .filter(|address| !address.trim().is_empty())
                    .ok_or_else(|| anyhow!("ssh requires --ip <address>"))?,
            },
            Self::Launch(args) => Subcommand::Launch(args),
            Self::Deploy {
                workload,
                host,
                port,
                user,
                root,
                role,
                version,
                server,
                token,
            } => {
                let workload = workload
                    .ok_or_else(|| anyhow!("deploy requires a deployment type, e.g. `deploy kubernetes`"))?;
                Subcommand::Deploy(DeployArgs {
                    workload: Workload::parse(&workload)?,
                    host: host
                        .filter(|host| !host.trim().is_empty())
                        .ok_or_else(|| anyhow!("deploy requires --host <address>"))?,
                    port,
                    user,
                    root,
                    role: role.as_deref().map_or(Ok(NodeRole::Worker), NodeRole::parse)?,
                    version,
                    server,
                    token,
                })
            }
        })
    }
}

fn flag_value<S: AsRef<str>>(
    rest: &mut impl Iterator<Item = S>,
    flag: &str,
    what: &str,
) -> Result<String> {
    rest.next()
        .map(|value| value.as_ref().to_owned())
        .ok_or_else(|| anyhow!("{flag} requires {what}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    command: Option<Subcommand>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        command: None,
    };
    let mut pending: Option<PendingCommand> = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            name if PendingCommand::start(name).is_some() && pending.is_some() => {
                bail!("only one subcommand may be given; got {name:?} after another");
            }
            other => {
                if let Some(command) = pending.as_mut() {
                    if command.accept(other, &mut iter)? {
                        continue;
                    }
                } else if let Some(command) = PendingCommand::start(other) {
                    pending = Some(command);
                    continue;
                }
                bail!("unknown argument {other:?}; run with --help to see supported options");
            }
        }
    }

    options.command = pending.map(PendingCommand::finish).transpose()?;
    Ok(options)
}

fn print_help() {
    println!("lambdactl [options] [list | fetch | ssh | launch | deploy]");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Run against an in-memory demo fleet");
    println!("  --check                  Validate config + API client settings");
    println!("  --help                   Show this help");
    println!();
    println!("  list                     Print instances as YAML");
    println!("  fetch                    Print available offerings as YAML");
    println!("  ssh --ip <address>       Open a shell on an instance");
    println!("  launch [--type <name>] [--region <name>] [--count <n>]");
    println!("                           Launch instances and print their ids");
    println!("  deploy kubernetes --host <address> [--port <n>] [--user <name>] [--root]");
    println!("         [--role bootstrap|controller|worker] [--version <rke2 version>]");
    println!("         [--server <address>] [--token <token>]");
    println!("                           Install an RKE2 node over ssh");
    println!("  (no subcommand)          Start the interactive console");
}
