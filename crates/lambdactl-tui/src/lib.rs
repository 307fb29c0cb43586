// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod console;
mod keys;
mod render;
mod scheduler;
mod terminal;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::Result;
use lambdactl_app::{
    Collection, ConsoleSettings, ConsoleState, Credential, Filesystem, Instance, InstanceId,
    ListView, Offering, ShellTarget,
};

pub use console::Console;
pub use keys::command_for_key;
pub use render::render;
pub use scheduler::{LaunchOutcome, Scheduler, await_ready, run_launch};
pub use terminal::{CrosstermTerminal, TerminalOwnership};

/// Everything the console needs from the outside world. Calls run on
/// background threads, so implementations must be shareable.
pub trait ConsoleRuntime: Send + Sync + 'static {
    fn list_instances(&self) -> Result<Vec<Instance>>;
    fn fetch_offerings(&self) -> Result<Vec<Offering>>;
    fn list_filesystems(&self) -> Result<Vec<Filesystem>>;
    fn list_credentials(&self) -> Result<Vec<Credential>>;
    fn launch_instances(&self, offering: &Offering, quantity: u32) -> Result<Vec<InstanceId>>;
    fn open_shell(&self, target: &ShellTarget) -> Result<()>;

    fn load(&self, view: ListView) -> Result<Collection> {
        Ok(match view {
            ListView::Instances => Collection::Instances(self.list_instances()?),
            ListView::Offerings => Collection::Offerings(self.fetch_offerings()?),
            ListView::Filesystems => Collection::Filesystems(self.list_filesystems()?),
            ListView::Credentials => Collection::Credentials(self.list_credentials()?),
        })
    }
}

pub fn run_app<R: ConsoleRuntime>(runtime: R, settings: ConsoleSettings) -> Result<()> {
    let terminal = CrosstermTerminal::enter()?;
    let mut console = Console::new(ConsoleState::new(settings), Arc::new(runtime), terminal);
    let result = console.run();
    let restored = console.into_terminal().leave();
    result.and(restored)
}
