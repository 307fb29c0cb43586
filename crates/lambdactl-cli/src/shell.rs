// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use lambdactl_app::ShellTarget;
use std::ffi::OsString;
use std::process::Command;
use tracing::{debug, info};

/// Arguments for `ssh`, in order, excluding the binary itself.
pub fn ssh_args(target: &ShellTarget) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-p".into(), target.port.to_string().into()];
    if let Some(key) = &target.key {
        args.push("-i".into());
        args.push(key.as_os_str().to_owned());
    }
    args.push("-o".into());
    args.push("StrictHostKeyChecking=accept-new".into());
    args.push(target.destination().into());
    args
}

/// Run `ssh` in the foreground with the caller's terminal. Blocks until the
/// session ends.
pub fn open(binary: &str, target: &ShellTarget) -> Result<()> {
    let args = ssh_args(target);
    debug!(binary, ?args, "spawning ssh");
    let status = Command::new(binary)
        .args(&args)
        .status()
        .with_context(|| {
            format!("start {binary:?}; install OpenSSH or set [ssh].binary in the config")
        })?;

    if !status.success() {
        let code = status
            .code()
            .map_or_else(|| "a signal".to_owned(), |code| format!("status {code}"));
        bail!("ssh to {} exited with {code}", target.destination());
    }
    info!(destination = %target.destination(), "ssh session ended");
    Ok(())
}
