// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use lambdactl_app::{
    ConsoleState, Credential, Filesystem, Instance, InstanceId, InstanceStatus, Offering,
    ShellTarget,
};
use lambdactl_testkit::FleetFaker;
use ratatui::Terminal;
use ratatui::backend::TestBackend;
use ratatui::buffer::Buffer;

use crate::render::render;
use crate::{ConsoleRuntime, TerminalOwnership};

pub fn buffer_text(buffer: &Buffer) -> String {
    let width = usize::from(buffer.area.width).max(1);
    buffer
        .content
        .chunks(width)
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn instance(id: &str, name: &str, ip: Option<&str>) -> Instance {
    let mut faker = FleetFaker::new(1);
    let offering = faker.offering();
    let mut instance = faker.booting_instance(&offering);
    instance.id = InstanceId::new(id);
    instance.name = Some(name.to_owned());
    instance.ip = ip.map(str::to_owned);
    instance.status = if ip.is_some() {
        InstanceStatus::Active
    } else {
        InstanceStatus::Booting
    };
    instance
}

pub fn sample_instances() -> Vec<Instance> {
    vec![
        instance("i-3", "charlie", None),
        instance("i-1", "alpha", Some("198.51.100.1")),
        instance("i-2", "bravo", Some("198.51.100.2")),
    ]
}

/// Scripted runtime. Each instance listing pops the next scripted response
/// and the last one repeats.
pub struct FakeRuntime {
    pub listings: Mutex<Vec<Result<Vec<Instance>, String>>>,
    pub offerings: Mutex<Vec<Offering>>,
    pub launch_result: Mutex<Result<Vec<InstanceId>, String>>,
    pub shell_result: Mutex<Result<(), String>>,
    pub shells: Mutex<Vec<ShellTarget>>,
    pub launches: Mutex<Vec<(String, u32)>>,
    pub list_calls: AtomicUsize,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self {
            listings: Mutex::new(Vec::new()),
            offerings: Mutex::new(Vec::new()),
            launch_result: Mutex::new(Ok(Vec::new())),
            shell_result: Mutex::new(Ok(())),
            shells: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_listings(listings: Vec<Result<Vec<Instance>, String>>) -> Self {
        let runtime = Self::new();
        *runtime.listings.lock().expect("listings lock") = listings;
        runtime
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

impl ConsoleRuntime for FakeRuntime {
    fn list_instances(&self) -> Result<Vec<Instance>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut listings = self.listings.lock().expect("listings lock");
        let next = if listings.len() > 1 {
            listings.remove(0)
        } else {
            listings.first().cloned().unwrap_or_else(|| Ok(Vec::new()))
        };
        next.map_err(|error| anyhow!(error))
    }

    fn fetch_offerings(&self) -> Result<Vec<Offering>> {
        Ok(self.offerings.lock().expect("offerings lock").clone())
    }

    fn list_filesystems(&self) -> Result<Vec<Filesystem>> {
        Err(anyhow!("filesystems unavailable"))
    }

    fn list_credentials(&self) -> Result<Vec<Credential>> {
        Ok(Vec::new())
    }

    fn launch_instances(&self, offering: &Offering, quantity: u32) -> Result<Vec<InstanceId>> {
        self.launches
            .lock()
            .expect("launches lock")
            .push((offering.key(), quantity));
        self.launch_result
            .lock()
            .expect("launch lock")
            .clone()
            .map_err(|error| anyhow!(error))
    }

    fn open_shell(&self, target: &ShellTarget) -> Result<()> {
        self.shells.lock().expect("shells lock").push(target.clone());
        self.shell_result
            .lock()
            .expect("shell lock")
            .clone()
            .map_err(|error| anyhow!(error))
    }
}

/// Draws into a `TestBackend` and records ownership hand-offs.
pub struct RecordingTerminal {
    pub terminal: Terminal<TestBackend>,
    pub events: Vec<&'static str>,
}

impl RecordingTerminal {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            terminal: Terminal::new(TestBackend::new(width, height))
                .expect("test terminal should initialize"),
            events: Vec::new(),
        }
    }

    pub fn text(&self) -> String {
        buffer_text(self.terminal.backend().buffer())
    }
}

impl TerminalOwnership for RecordingTerminal {
    fn size(&self) -> Result<(u16, u16)> {
        let area = self.terminal.backend().buffer().area;
        Ok((area.width, area.height))
    }

    fn draw(&mut self, state: &ConsoleState) -> Result<()> {
        self.events.push("draw");
        self.terminal.draw(|frame| render(frame, state))?;
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        self.events.push("suspend");
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.events.push("resume");
        Ok(())
    }
}
