// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use lambdactl_app::ShellTarget;
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::shell;

const RKE2_INSTALLER: &str = "https://get.rke2.io";
const RKE2_CONFIG_DIR: &str = "/etc/rancher/rke2";
const RKE2_SUPERVISOR_PORT: u16 = 9345;
const ROOT_USER: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    Kubernetes,
}

impl Workload {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "kubernetes" => Ok(Self::Kubernetes),
            other => bail!("unsupported deployment {other:?}; supported: kubernetes"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Bootstrap,
    Controller,
    Worker,
}

impl NodeRole {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bootstrap" => Ok(Self::Bootstrap),
            "controller" => Ok(Self::Controller),
            "worker" => Ok(Self::Worker),
            other => bail!("invalid node role {other:?}; use bootstrap, controller or worker"),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Controller => "controller",
            Self::Worker => "worker",
        }
    }

    /// The RKE2 install type, which is also the systemd unit suffix.
    pub const fn rke2_type(self) -> &'static str {
        match self {
            Self::Bootstrap | Self::Controller => "server",
            Self::Worker => "agent",
        }
    }

    const fn joins_cluster(self) -> bool {
        !matches!(self, Self::Bootstrap)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployArgs {
    pub workload: Workload,
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub root: bool,
    pub role: NodeRole,
    pub version: Option<String>,
    pub server: Option<String>,
    pub token: Option<String>,
}

/// One non-interactive `ssh` invocation. `input` is written to its stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStep {
    pub label: &'static str,
    pub command: String,
    pub input: Option<String>,
}

impl RemoteStep {
    fn new(label: &'static str, command: impl Into<String>) -> Self {
        Self {
            label,
            command: command.into(),
            input: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    /// Runs as the login user; every later step then logs in as root.
    pub enable_root: Option<RemoteStep>,
    pub steps: Vec<RemoteStep>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
struct Rke2Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    node_name: String,
    node_external_ip: String,
    tls_san: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cni: Option<String>,
}

pub fn plan(args: &DeployArgs, login_user: &str) -> Result<DeployPlan> {
    debug!(workload = ?args.workload, role = args.role.label(), "planning deploy");
    if args.host.trim().is_empty() {
        bail!("deploy requires --host <address>");
    }
    if args.role.joins_cluster() {
        if args.server.is_none() || args.token.is_none() {
            bail!(
                "a {} joins an existing cluster; pass --server <address> and --token <token>",
                args.role.label()
            );
        }
    } else if args.server.is_some() {
        bail!("bootstrap starts a new cluster; drop --server");
    }

    let already_root = login_user == ROOT_USER;
    let enable_root = (args.root && !already_root).then(|| {
        RemoteStep::new(
            "enable root login",
            "sudo mkdir -p /root/.ssh && sudo cp ~/.ssh/authorized_keys /root/.ssh/authorized_keys && sudo chmod 600 /root/.ssh/authorized_keys",
        )
    });
    let elevated = already_root || enable_root.is_some();

    let rke2_type = args.role.rke2_type();
    let mut installer = format!("curl -sfL {RKE2_INSTALLER} | INSTALL_RKE2_TYPE={rke2_type}");
    if let Some(version) = &args.version {
        installer.push_str(&format!(" INSTALL_RKE2_VERSION={}", shell_quote(version)));
    }
    installer.push_str(" sh -");

    let mut write_config = RemoteStep::new(
        "write rke2 config",
        format!("mkdir -p {RKE2_CONFIG_DIR} && cat > {RKE2_CONFIG_DIR}/config.yaml"),
    );
    write_config.input = Some(render_config(args)?);

    let steps = vec![
        RemoteStep::new(
            "remove third-party packages",
            "DEBIAN_FRONTEND=noninteractive apt-get autoremove --purge -y '~i !~OUbuntu'",
        ),
        RemoteStep::new(
            "update package lists",
            "DEBIAN_FRONTEND=noninteractive apt-get update",
        ),
        RemoteStep::new(
            "upgrade packages",
            "DEBIAN_FRONTEND=noninteractive apt-get upgrade -y",
        ),
        RemoteStep::new("install rke2", installer),
        write_config,
        RemoteStep::new(
            "start rke2",
            format!("systemctl enable --now --no-block rke2-{rke2_type}"),
        ),
    ]
    .into_iter()
    .map(|step| if elevated { step } else { with_sudo(step) })
    .collect();

    Ok(DeployPlan { enable_root, steps })
}

fn render_config(args: &DeployArgs) -> Result<String> {
    let host = args.host.trim().to_owned();
    let config = Rke2Config {
        server: args
            .server
            .as_ref()
            .map(|server| format!("https://{server}:{RKE2_SUPERVISOR_PORT}")),
        token: args.token.clone(),
        node_name: format!("{}-{}", args.role.label(), host.replace(['.', ':'], "-")),
        node_external_ip: host.clone(),
        tls_san: vec![host],
        cni: (args.role.rke2_type() == "server").then(|| "cilium".to_owned()),
    };
    serde_yaml::to_string(&config).context("render rke2 config")
}

fn with_sudo(step: RemoteStep) -> RemoteStep {
    RemoteStep {
        command: format!("sudo -n sh -c {}", shell_quote(&step.command)),
        ..step
    }
}

/// Single-quote for a POSIX shell.
pub fn shell_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Run the plan over `ssh`, stopping at the first failing step.
pub fn run(binary: &str, target: &ShellTarget, plan: &DeployPlan) -> Result<()> {
    let mut target = target.clone();
    if let Some(step) = &plan.enable_root {
        run_step(binary, &target, step)?;
        target.user = ROOT_USER.to_owned();
    }
    for step in &plan.steps {
        run_step(binary, &target, step)?;
    }
    info!(destination = %target.destination(), "deploy finished");
    Ok(())
}

fn run_step(binary: &str, target: &ShellTarget, step: &RemoteStep) -> Result<()> {
    info!(step = step.label, destination = %target.destination(), "deploy step");
    println!("==> {}", step.label);

    let mut args = shell::ssh_args(target);
    args.push(step.command.clone().into());
    debug!(binary, ?args, "spawning ssh");

    let mut child = Command::new(binary)
        .args(&args)
        .stdin(if step.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .spawn()
        .with_context(|| {
            format!("start {binary:?}; install OpenSSH or set [ssh].binary in the config")
        })?;

    if let Some(input) = &step.input {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("ssh stdin was not captured"))?;
        // A remote side that exits early shows up in the exit status below.
        if let Err(error) = stdin.write_all(input.as_bytes())
            && error.kind() != ErrorKind::BrokenPipe
        {
            return Err(error).with_context(|| format!("send input for {:?}", step.label));
        }
    }

    let status = child
        .wait()
        .with_context(|| format!("wait for ssh during {:?}", step.label))?;
    if !status.success() {
        let code = status
            .code()
            .map_or_else(|| "a signal".to_owned(), |code| format!("status {code}"));
        bail!(
            "deploy step {:?} on {} exited with {code}",
            step.label,
            target.destination()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DeployArgs, NodeRole, Workload, plan, run, shell_quote};
    use lambdactl_app::ShellTarget;

    fn args(role: NodeRole) -> DeployArgs {
        DeployArgs {
            workload: Workload::Kubernetes,
            host: "198.51.100.9".to_owned(),
            port: None,
            user: None,
            root: false,
            role,
            version: None,
            server: None,
            token: None,
        }
    }

    fn joining(role: NodeRole) -> DeployArgs {
        DeployArgs {
            server: Some("10.0.0.1".to_owned()),
            token: Some("s3cret".to_owned()),
            ..args(role)
        }
    }

    fn commands(args: &DeployArgs, user: &str) -> Vec<String> {
        plan(args, user)
            .expect("plan should build")
            .steps
            .into_iter()
            .map(|step| step.command)
            .collect()
    }

    #[test]
    fn roles_map_to_rke2_types() {
        assert_eq!(NodeRole::Bootstrap.rke2_type(), "server");
        assert_eq!(NodeRole::Controller.rke2_type(), "server");
        assert_eq!(NodeRole::Worker.rke2_type(), "agent");
        assert_eq!(NodeRole::parse(" Worker ").expect("role"), NodeRole::Worker);
        let error = NodeRole::parse("leader").expect_err("unknown role should fail");
        assert!(error.to_string().contains("bootstrap, controller or worker"));
    }

    #[test]
    fn only_kubernetes_is_deployable() {
        assert_eq!(
            Workload::parse("Kubernetes").expect("workload"),
            Workload::Kubernetes
        );
        let error = Workload::parse("slurm").expect_err("slurm should fail");
        assert!(error.to_string().contains("\"slurm\""));
    }

    #[test]
    fn bootstrap_as_root_installs_and_starts_a_server() {
        let plan = plan(
            &DeployArgs {
                version: Some("v1.30.4+rke2r1".to_owned()),
                ..args(NodeRole::Bootstrap)
            },
            "root",
        )
        .expect("plan should build");
        assert_eq!(plan.enable_root, None);
        let labels: Vec<_> = plan.steps.iter().map(|step| step.label).collect();
        assert_eq!(
            labels,
            vec![
                "remove third-party packages",
                "update package lists",
                "upgrade packages",
                "install rke2",
                "write rke2 config",
                "start rke2",
            ]
        );
        assert_eq!(
            plan.steps[3].command,
            "curl -sfL https://get.rke2.io | INSTALL_RKE2_TYPE=server INSTALL_RKE2_VERSION='v1.30.4+rke2r1' sh -"
        );
        assert_eq!(
            plan.steps[5].command,
            "systemctl enable --now --no-block rke2-server"
        );

        let config = plan.steps[4].input.as_deref().expect("config input");
        assert!(config.contains("node-name: bootstrap-198-51-100-9"), "{config}");
        assert!(config.contains("node-external-ip: 198.51.100.9"), "{config}");
        assert!(config.contains("cni: cilium"), "{config}");
        assert!(!config.contains("server:"), "{config}");
        assert!(!config.contains("token:"), "{config}");
    }

    #[test]
    fn worker_joins_the_given_server() {
        let plan = plan(&joining(NodeRole::Worker), "root").expect("plan should build");
        let config = plan.steps[4].input.as_deref().expect("config input");
        assert!(config.contains("https://10.0.0.1:9345"), "{config}");
        assert!(config.contains("token: s3cret"), "{config}");
        assert!(!config.contains("cni:"), "{config}");
        assert!(plan.steps[3].command.contains("INSTALL_RKE2_TYPE=agent sh -"));
        assert_eq!(
            plan.steps[5].command,
            "systemctl enable --now --no-block rke2-agent"
        );
    }

    #[test]
    fn joining_roles_need_server_and_token() {
        for role in [NodeRole::Controller, NodeRole::Worker] {
            let error = plan(&args(role), "ubuntu").expect_err("join without server");
            assert!(error.to_string().contains("--server"), "{error}");
        }
        let error = plan(
            &DeployArgs {
                server: Some("10.0.0.1".to_owned()),
                ..args(NodeRole::Bootstrap)
            },
            "ubuntu",
        )
        .expect_err("bootstrap with server should fail");
        assert!(error.to_string().contains("drop --server"));
    }

    #[test]
    fn non_root_login_runs_steps_through_sudo() {
        let commands = commands(&args(NodeRole::Bootstrap), "ubuntu");
        assert_eq!(
            commands[1],
            "sudo -n sh -c 'DEBIAN_FRONTEND=noninteractive apt-get update'"
        );
        assert_eq!(
            commands[0],
            r"sudo -n sh -c 'DEBIAN_FRONTEND=noninteractive apt-get autoremove --purge -y '\''~i !~OUbuntu'\'''"
        );
    }

    #[test]
    fn root_flag_enables_root_login_first() {
        let root = DeployArgs {
            root: true,
            ..args(NodeRole::Bootstrap)
        };
        let plan = plan(&root, "ubuntu").expect("plan should build");
        let enable = plan.enable_root.expect("root step");
        assert!(enable.command.contains("/root/.ssh/authorized_keys"));
        assert!(plan.steps.iter().all(|step| !step.command.starts_with("sudo")));

        assert_eq!(
            super::plan(&root, "root").expect("plan").enable_root,
            None,
            "already root"
        );
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn blank_host_is_rejected() {
        let error = plan(
            &DeployArgs {
                host: "  ".to_owned(),
                ..args(NodeRole::Bootstrap)
            },
            "root",
        )
        .expect_err("blank host should fail");
        assert!(error.to_string().contains("--host"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_step_stops_the_deploy() {
        let target = ShellTarget {
            address: "198.51.100.9".to_owned(),
            port: 22,
            user: "root".to_owned(),
            key: None,
        };
        let plan = plan(&args(NodeRole::Bootstrap), "root").expect("plan should build");
        let error = run("false", &target, &plan).expect_err("false should fail");
        let message = error.to_string();
        assert!(message.contains("remove third-party packages"), "{message}");
        assert!(message.contains("root@198.51.100.9"), "{message}");

        run("true", &target, &plan).expect("true should succeed");
    }
}
