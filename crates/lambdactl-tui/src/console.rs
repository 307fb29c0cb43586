// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use lambdactl_app::{Completion, ConsoleState, Effect, Message, ShellTarget};
use tracing::{info, warn};

use crate::keys::command_for_key;
use crate::scheduler::Scheduler;
use crate::{ConsoleRuntime, TerminalOwnership};

const INPUT_POLL: Duration = Duration::from_millis(120);

/// Owns the controller state and feeds it one message at a time: keys and
/// resizes from the terminal, completions from the scheduler.
pub struct Console<R: ConsoleRuntime, T: TerminalOwnership> {
    state: ConsoleState,
    runtime: Arc<R>,
    scheduler: Scheduler<R>,
    terminal: T,
    rx: Receiver<Message>,
}

impl<R: ConsoleRuntime, T: TerminalOwnership> Console<R, T> {
    pub fn new(state: ConsoleState, runtime: Arc<R>, terminal: T) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state,
            scheduler: Scheduler::new(Arc::clone(&runtime), tx),
            runtime,
            terminal,
            rx,
        }
    }

    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn into_terminal(self) -> T {
        self.terminal
    }

    /// Size the tables and kick off the first fetch and tick.
    pub fn start(&mut self) -> Result<()> {
        let (width, height) = self.terminal.size()?;
        self.dispatch(Message::Resize { width, height })?;
        let effects = self.state.init();
        self.apply(effects)
    }

    pub fn dispatch(&mut self, message: Message) -> Result<()> {
        let effects = self.state.update(message);
        self.apply(effects)
    }

    /// Handle every message already waiting on the channel.
    pub fn drain(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.dispatch(message)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Block up to `timeout` for one message. Returns whether one arrived.
    pub fn wait(&mut self, timeout: Duration) -> Result<bool> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => {
                self.dispatch(message)?;
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Ok(false),
        }
    }

    pub fn draw(&mut self) -> Result<()> {
        self.terminal.draw(&self.state)
    }

    pub fn run(&mut self) -> Result<()> {
        self.start()?;
        while !self.state.is_quitting() {
            self.drain()?;
            if self.state.is_quitting() {
                break;
            }
            self.draw()?;

            if !event::poll(INPUT_POLL).context("poll event")? {
                continue;
            }
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if let Some(command) = command_for_key(self.state.mode(), key) {
                        self.dispatch(Message::Command(command))?;
                    }
                }
                Event::Resize(width, height) => {
                    self.dispatch(Message::Resize { width, height })?;
                }
                _ => {}
            }
        }
        info!("console exiting");
        Ok(())
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Result<()> {
        for effect in effects {
            match effect {
                Effect::Quit => {}
                Effect::Fetch(view) => self.scheduler.fetch(view),
                Effect::ScheduleTick(after) => self.scheduler.schedule_tick(after),
                Effect::ScheduleErrorClear { token, after } => {
                    self.scheduler.schedule_error_clear(token, after);
                }
                Effect::Launch(request) => {
                    info!(
                        launch = request.id.get(),
                        offering = %request.offering.key(),
                        "starting launch"
                    );
                    self.scheduler.launch(request);
                }
                Effect::CancelLaunch(id) => self.scheduler.cancel(id),
                Effect::OpenShell(target) => {
                    let result = self.run_shell(&target)?;
                    self.dispatch(Message::Completed(Completion::ShellExited(result)))?;
                }
            }
        }
        Ok(())
    }

    /// The outer error means the terminal could not be reclaimed.
    fn run_shell(&mut self, target: &ShellTarget) -> Result<Result<(), String>> {
        info!(destination = %target.destination(), "opening shell");
        if let Err(error) = self.terminal.suspend() {
            warn!("cannot hand terminal to ssh: {error:#}");
            self.terminal.resume()?;
            return Ok(Err(format!("{error:#}")));
        }

        let outcome = self
            .runtime
            .open_shell(target)
            .map_err(|error| format!("{error:#}"));
        self.terminal.resume()?;
        if let Err(error) = &outcome {
            warn!(destination = %target.destination(), "shell failed: {error}");
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::Console;
    use crate::testing::{FakeRuntime, RecordingTerminal, instance, sample_instances};
    use lambdactl_app::{
        AppCommand, ConsoleSettings, ConsoleState, LaunchPhase, ListView, Message, ViewMode,
    };
    use lambdactl_testkit::FleetFaker;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(5);

    fn settings() -> ConsoleSettings {
        ConsoleSettings {
            refresh_interval: Duration::from_secs(3600),
            error_timeout: Duration::from_millis(20),
            launch_poll_interval: Duration::ZERO,
            launch_timeout: WAIT,
            ..ConsoleSettings::default()
        }
    }

    fn console(runtime: FakeRuntime) -> Console<FakeRuntime, RecordingTerminal> {
        Console::new(
            ConsoleState::new(settings()),
            Arc::new(runtime),
            RecordingTerminal::new(120, 30),
        )
    }

    fn wait_until(
        console: &mut Console<FakeRuntime, RecordingTerminal>,
        done: impl Fn(&ConsoleState) -> bool,
    ) {
        let deadline = Instant::now() + WAIT;
        while !done(console.state()) {
            assert!(Instant::now() < deadline, "condition not reached in time");
            console
                .wait(Duration::from_millis(50))
                .expect("dispatch should succeed");
        }
    }

    fn command(
        console: &mut Console<FakeRuntime, RecordingTerminal>,
        command: AppCommand,
    ) {
        console
            .dispatch(Message::Command(command))
            .expect("dispatch should succeed");
    }

    #[test]
    fn start_sizes_tables_and_loads_instances() {
        let mut console = console(FakeRuntime::with_listings(vec![Ok(sample_instances())]));
        console.start().expect("start should succeed");
        assert_eq!(console.state().width(), 120);
        assert_eq!(console.state().table(ListView::Instances).viewport(), 21);

        wait_until(&mut console, |state| state.instances().len() == 3);
        console.draw().expect("draw should succeed");
        let text = console.terminal().text();
        assert!(text.contains("Instances (3)"), "{text}");
        assert!(text.contains("charlie"), "{text}");
    }

    #[test]
    fn shell_suspends_and_resumes_terminal() {
        let mut console = console(FakeRuntime::with_listings(vec![Ok(sample_instances())]));
        console.start().expect("start should succeed");
        wait_until(&mut console, |state| !state.instances().is_empty());

        command(&mut console, AppCommand::Select);
        command(&mut console, AppCommand::OpenShell);

        assert_eq!(console.state().mode(), ViewMode::DetailOverlay);
        assert!(console.state().error().is_none());
        let events: Vec<&str> = console
            .terminal()
            .events
            .iter()
            .copied()
            .filter(|event| *event != "draw")
            .collect();
        assert_eq!(events, vec!["suspend", "resume"]);
        let shells = console.runtime.shells.lock().expect("lock").clone();
        assert_eq!(shells.len(), 1);
        assert_eq!(shells[0].destination(), "ubuntu@198.51.100.1");
    }

    #[test]
    fn failed_shell_shows_banner_then_clears() {
        let runtime = FakeRuntime::with_listings(vec![Ok(sample_instances())]);
        *runtime.shell_result.lock().expect("lock") = Err("ssh exited with status 255".to_owned());
        let mut console = console(runtime);
        console.start().expect("start should succeed");
        wait_until(&mut console, |state| !state.instances().is_empty());

        command(&mut console, AppCommand::Select);
        command(&mut console, AppCommand::OpenShell);
        assert_eq!(console.state().mode(), ViewMode::DetailOverlay);
        assert_eq!(
            console.state().error().map(|error| error.message.as_str()),
            Some("ssh session failed: ssh exited with status 255")
        );

        wait_until(&mut console, |state| state.error().is_none());
    }

    #[test]
    fn fetch_failure_surfaces_in_footer() {
        let mut console = console(FakeRuntime::new());
        console.start().expect("start should succeed");
        command(&mut console, AppCommand::NextView);
        command(&mut console, AppCommand::NextView);
        wait_until(&mut console, |state| state.error().is_some());

        console.draw().expect("draw should succeed");
        let text = console.terminal().text();
        assert!(
            text.contains("refreshing filesystems failed: filesystems unavailable"),
            "{text}"
        );
    }

    #[test]
    fn launch_runs_to_ready() {
        let runtime = FakeRuntime::with_listings(vec![
            Ok(Vec::new()),
            Ok(vec![instance("A", "fresh", None)]),
            Ok(vec![instance("A", "fresh", Some("203.0.113.9"))]),
        ]);
        *runtime.offerings.lock().expect("lock") = FleetFaker::new(3).offerings(4);
        *runtime.launch_result.lock().expect("lock") =
            Ok(vec![lambdactl_app::InstanceId::new("A")]);
        let mut console = console(runtime);
        console.start().expect("start should succeed");

        command(&mut console, AppCommand::NextView);
        wait_until(&mut console, |state| state.offerings().len() == 4);
        command(&mut console, AppCommand::Select);
        assert_eq!(console.state().mode(), ViewMode::LaunchConfirm);
        command(&mut console, AppCommand::Launch);
        assert_eq!(console.state().mode(), ViewMode::InstanceList);

        wait_until(&mut console, |state| {
            matches!(
                state.launch().map(|launch| &launch.phase),
                Some(LaunchPhase::Ready { .. })
            )
        });
        let launches = console.runtime.launches.lock().expect("lock").clone();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].1, 1);
    }
}
