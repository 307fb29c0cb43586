// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::path::PathBuf;
use std::time::Duration;

use crate::launch::{LaunchId, LaunchPhase, LaunchRequest, PendingLaunch};
use crate::{
    Credential, Filesystem, Instance, InstanceId, ListView, Offering, Record, TableWidget,
    ViewMode, sort_credentials, sort_filesystems, sort_instances, sort_offerings,
};

/// Rows taken by the tabs header.
pub const HEADER_HEIGHT: u16 = 3;
/// Rows taken by the hints/error footer.
pub const FOOTER_HEIGHT: u16 = 3;
/// Table border plus the header row.
pub const TABLE_CHROME_HEIGHT: u16 = 3;
pub const TABLE_CHROME_WIDTH: u16 = 2;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_ERROR_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_LAUNCH_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_SHELL_USER: &str = "ubuntu";
pub const DEFAULT_SHELL_PORT: u16 = 22;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub user: String,
    pub port: u16,
    pub key_path: Option<PathBuf>,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            user: DEFAULT_SHELL_USER.to_owned(),
            port: DEFAULT_SHELL_PORT,
            key_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub refresh_interval: Duration,
    pub error_timeout: Duration,
    pub launch_poll_interval: Duration,
    pub launch_timeout: Duration,
    pub shell: ShellSettings,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            error_timeout: DEFAULT_ERROR_TIMEOUT,
            launch_poll_interval: DEFAULT_LAUNCH_POLL_INTERVAL,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            shell: ShellSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellTarget {
    pub address: String,
    pub port: u16,
    pub user: String,
    pub key: Option<PathBuf>,
}

impl ShellTarget {
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub view: ListView,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBanner {
    pub message: String,
    pub token: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    Quit,
    NextView,
    PrevView,
    Select,
    Back,
    OpenShell,
    Launch,
    CancelLaunch,
    Refresh,
    MoveUp(usize),
    MoveDown(usize),
    MoveTop,
    MoveBottom,
    PageUp,
    PageDown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collection {
    Instances(Vec<Instance>),
    Offerings(Vec<Offering>),
    Filesystems(Vec<Filesystem>),
    Credentials(Vec<Credential>),
}

impl Collection {
    pub fn view(&self) -> ListView {
        match self {
            Self::Instances(_) => ListView::Instances,
            Self::Offerings(_) => ListView::Offerings,
            Self::Filesystems(_) => ListView::Filesystems,
            Self::Credentials(_) => ListView::Credentials,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Instances(records) => records.len(),
            Self::Offerings(records) => records.len(),
            Self::Filesystems(records) => records.len(),
            Self::Credentials(records) => records.len(),
        }
    }
}

/// Outcome of background work, posted back to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Fetched(Collection),
    FetchFailed {
        view: ListView,
        error: String,
    },
    LaunchSubmitted {
        launch: LaunchId,
        created: Vec<InstanceId>,
    },
    LaunchProgress {
        launch: LaunchId,
        found: usize,
        ready: usize,
    },
    LaunchReady {
        launch: LaunchId,
        instances: Vec<Instance>,
    },
    LaunchFailed {
        launch: LaunchId,
        error: String,
    },
    ShellExited(Result<(), String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command(AppCommand),
    Resize { width: u16, height: u16 },
    Tick,
    ClearError { token: u64 },
    Completed(Completion),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Quit,
    Fetch(ListView),
    ScheduleTick(Duration),
    ScheduleErrorClear { token: u64, after: Duration },
    Launch(LaunchRequest),
    CancelLaunch(LaunchId),
    OpenShell(ShellTarget),
}

/// The record a modal is showing, resolved by key against the latest cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedRecord<'a> {
    Instance(&'a Instance),
    Offering(&'a Offering),
    Filesystem(&'a Filesystem),
    Credential(&'a Credential),
}

impl SelectedRecord<'_> {
    pub fn title(&self) -> String {
        match self {
            Self::Instance(record) => record.title(),
            Self::Offering(record) => record.title(),
            Self::Filesystem(record) => record.title(),
            Self::Credential(record) => record.title(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleState {
    mode: ViewMode,
    previous_mode: ViewMode,
    instances: Vec<Instance>,
    offerings: Vec<Offering>,
    filesystems: Vec<Filesystem>,
    credentials: Vec<Credential>,
    selected: Option<Selection>,
    error: Option<ErrorBanner>,
    error_token: u64,
    width: u16,
    height: u16,
    settings: ConsoleSettings,
    tables: [TableWidget; 4],
    launch: Option<PendingLaunch>,
    next_launch_id: u64,
    quitting: bool,
}

impl Default for ConsoleState {
    fn default() -> Self {
        Self::new(ConsoleSettings::default())
    }
}

impl ConsoleState {
    pub fn new(settings: ConsoleSettings) -> Self {
        Self {
            mode: ViewMode::InstanceList,
            previous_mode: ViewMode::InstanceList,
            instances: Vec::new(),
            offerings: Vec::new(),
            filesystems: Vec::new(),
            credentials: Vec::new(),
            selected: None,
            error: None,
            error_token: 0,
            width: 0,
            height: 0,
            settings,
            tables: ListView::ALL.map(|view| TableWidget::new(view.headers())),
            launch: None,
            next_launch_id: 1,
            quitting: false,
        }
    }

    pub fn init(&self) -> Vec<Effect> {
        vec![
            Effect::Fetch(ListView::Instances),
            Effect::ScheduleTick(self.settings.refresh_interval),
        ]
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn previous_mode(&self) -> ViewMode {
        self.previous_mode
    }

    /// The list on screen, or the list underneath a modal or shell session.
    pub fn active_view(&self) -> ListView {
        self.mode
            .list()
            .or_else(|| self.previous_mode.list())
            .unwrap_or(ListView::Instances)
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn offerings(&self) -> &[Offering] {
        &self.offerings
    }

    pub fn filesystems(&self) -> &[Filesystem] {
        &self.filesystems
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selected.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorBanner> {
        self.error.as_ref()
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn settings(&self) -> &ConsoleSettings {
        &self.settings
    }

    pub fn table(&self, view: ListView) -> &TableWidget {
        &self.tables[view.index()]
    }

    pub fn launch(&self) -> Option<&PendingLaunch> {
        self.launch.as_ref()
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    /// `None` when nothing is selected or the record vanished on refresh.
    pub fn selected_record(&self) -> Option<SelectedRecord<'_>> {
        let selection = self.selected.as_ref()?;
        let key = selection.key.as_str();
        match selection.view {
            ListView::Instances => find_by_key(&self.instances, key).map(SelectedRecord::Instance),
            ListView::Offerings => find_by_key(&self.offerings, key).map(SelectedRecord::Offering),
            ListView::Filesystems => {
                find_by_key(&self.filesystems, key).map(SelectedRecord::Filesystem)
            }
            ListView::Credentials => {
                find_by_key(&self.credentials, key).map(SelectedRecord::Credential)
            }
        }
    }

    pub fn update(&mut self, message: Message) -> Vec<Effect> {
        match message {
            Message::Command(command) => self.dispatch(command),
            Message::Resize { width, height } => {
                self.resize(width, height);
                Vec::new()
            }
            Message::Tick => self.tick(),
            Message::ClearError { token } => {
                if self.error.as_ref().is_some_and(|error| error.token == token) {
                    self.error = None;
                }
                Vec::new()
            }
            Message::Completed(completion) => self.complete(completion),
        }
    }

    fn dispatch(&mut self, command: AppCommand) -> Vec<Effect> {
        if command == AppCommand::Quit {
            self.quitting = true;
            return vec![Effect::Quit];
        }

        if self.mode.is_modal() {
            return match command {
                AppCommand::Back => {
                    self.mode = self.previous_mode;
                    self.selected = None;
                    Vec::new()
                }
                AppCommand::OpenShell
                    if self.mode == ViewMode::DetailOverlay
                        && self
                            .selected
                            .as_ref()
                            .is_some_and(|selection| selection.view == ListView::Instances) =>
                {
                    self.open_shell()
                }
                AppCommand::Launch if self.mode == ViewMode::LaunchConfirm => self.start_launch(),
                _ => Vec::new(),
            };
        }

        let Some(view) = self.mode.list() else {
            return Vec::new();
        };
        match command {
            AppCommand::NextView => self.switch_view(view.rotate(1)),
            AppCommand::PrevView => self.switch_view(view.rotate(-1)),
            AppCommand::Select => self.select(view),
            AppCommand::Refresh => vec![Effect::Fetch(view)],
            AppCommand::CancelLaunch => self.cancel_launch(),
            AppCommand::MoveUp(step) => self.move_cursor(view, |table| table.move_up(step)),
            AppCommand::MoveDown(step) => self.move_cursor(view, |table| table.move_down(step)),
            AppCommand::MoveTop => self.move_cursor(view, TableWidget::move_top),
            AppCommand::MoveBottom => self.move_cursor(view, TableWidget::move_bottom),
            AppCommand::PageUp => self.move_cursor(view, TableWidget::page_up),
            AppCommand::PageDown => self.move_cursor(view, TableWidget::page_down),
            AppCommand::Quit | AppCommand::Back | AppCommand::OpenShell | AppCommand::Launch => {
                Vec::new()
            }
        }
    }

    fn move_cursor(&mut self, view: ListView, apply: impl FnOnce(&mut TableWidget)) -> Vec<Effect> {
        apply(&mut self.tables[view.index()]);
        Vec::new()
    }

    fn switch_view(&mut self, next: ListView) -> Vec<Effect> {
        self.mode = next.mode();
        self.previous_mode = self.mode;
        self.tables[next.index()].move_top();
        vec![Effect::Fetch(next)]
    }

    fn select(&mut self, view: ListView) -> Vec<Effect> {
        let Some(index) = self.tables[view.index()].selected_index() else {
            return Vec::new();
        };
        let key = match view {
            ListView::Instances => self.instances.get(index).map(Record::key),
            ListView::Offerings => self.offerings.get(index).map(Record::key),
            ListView::Filesystems => self.filesystems.get(index).map(Record::key),
            ListView::Credentials => self.credentials.get(index).map(Record::key),
        };
        let Some(key) = key else {
            return Vec::new();
        };

        self.selected = Some(Selection { view, key });
        self.previous_mode = self.mode;
        self.mode = if view == ListView::Offerings {
            ViewMode::LaunchConfirm
        } else {
            ViewMode::DetailOverlay
        };
        Vec::new()
    }

    fn open_shell(&mut self) -> Vec<Effect> {
        let Some(SelectedRecord::Instance(instance)) = self.selected_record() else {
            return self.fail("instance is no longer available".to_owned());
        };
        let Some(address) = instance.address() else {
            let message = format!(
                "instance {} has no public address yet",
                instance.display_name()
            );
            return self.fail(message);
        };

        let shell = &self.settings.shell;
        let target = ShellTarget {
            address: address.to_owned(),
            port: shell.port,
            user: shell.user.clone(),
            key: shell.key_path.clone(),
        };
        self.mode = ViewMode::ShellSession;
        vec![Effect::OpenShell(target)]
    }

    fn start_launch(&mut self) -> Vec<Effect> {
        if let Some(launch) = &self.launch
            && launch.is_outstanding()
        {
            let message = format!("a launch is already in progress: {}", launch.summary());
            return self.fail(message);
        }
        let offering = match self.selected_record() {
            Some(SelectedRecord::Offering(offering)) => offering.clone(),
            _ => return self.fail("offering is no longer available".to_owned()),
        };

        let id = LaunchId::new(self.next_launch_id);
        self.next_launch_id += 1;
        let mut launch = PendingLaunch::new(id, offering);
        let request = LaunchRequest {
            id,
            offering: launch.offering.clone(),
            quantity: launch.quantity,
            poll_interval: self.settings.launch_poll_interval,
            timeout: self.settings.launch_timeout,
        };
        launch.phase = LaunchPhase::Submitted;
        self.launch = Some(launch);

        self.selected = None;
        self.mode = ViewMode::InstanceList;
        self.previous_mode = ViewMode::InstanceList;
        vec![Effect::Launch(request), Effect::Fetch(ListView::Instances)]
    }

    fn cancel_launch(&mut self) -> Vec<Effect> {
        let Some(launch) = self.launch.as_mut().filter(|launch| launch.is_outstanding()) else {
            return Vec::new();
        };
        launch.phase = LaunchPhase::Failed {
            reason: "cancelled".to_owned(),
        };
        vec![Effect::CancelLaunch(launch.id)]
    }

    fn tick(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.mode != ViewMode::ShellSession {
            effects.push(Effect::Fetch(self.active_view()));
        }
        effects.push(Effect::ScheduleTick(self.settings.refresh_interval));
        effects
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let chrome = i32::from(HEADER_HEIGHT + FOOTER_HEIGHT + TABLE_CHROME_HEIGHT);
        let body_height = i32::from(height) - chrome;
        let body_width = usize::from(width.saturating_sub(TABLE_CHROME_WIDTH));
        for table in &mut self.tables {
            table.resize(body_width, body_height);
        }
    }

    fn complete(&mut self, completion: Completion) -> Vec<Effect> {
        match completion {
            Completion::Fetched(collection) => {
                self.store(collection);
                Vec::new()
            }
            Completion::FetchFailed { view, error } => self.fail(format!(
                "refreshing {} failed: {error}",
                view.label().to_lowercase()
            )),
            Completion::LaunchSubmitted { launch, created } => {
                if let Some(pending) = self.outstanding_launch(launch) {
                    pending.phase = LaunchPhase::Polling {
                        created,
                        found: 0,
                        ready: 0,
                    };
                }
                Vec::new()
            }
            Completion::LaunchProgress {
                launch,
                found,
                ready,
            } => {
                if let Some(pending) = self.outstanding_launch(launch)
                    && let LaunchPhase::Polling {
                        found: seen,
                        ready: up,
                        ..
                    } = &mut pending.phase
                {
                    *seen = found;
                    *up = ready;
                }
                Vec::new()
            }
            Completion::LaunchReady { launch, instances } => {
                let Some(pending) = self.outstanding_launch(launch) else {
                    return Vec::new();
                };
                pending.phase = LaunchPhase::Ready {
                    instances: instances.iter().map(|instance| instance.id.clone()).collect(),
                };
                vec![Effect::Fetch(ListView::Instances)]
            }
            Completion::LaunchFailed { launch, error } => {
                let Some(pending) = self.outstanding_launch(launch) else {
                    return Vec::new();
                };
                pending.phase = LaunchPhase::Failed {
                    reason: error.clone(),
                };
                self.fail(format!("launch failed: {error}"))
            }
            Completion::ShellExited(result) => {
                if self.mode == ViewMode::ShellSession {
                    self.mode = ViewMode::DetailOverlay;
                }
                match result {
                    Ok(()) => Vec::new(),
                    Err(error) => self.fail(format!("ssh session failed: {error}")),
                }
            }
        }
    }

    fn outstanding_launch(&mut self, id: LaunchId) -> Option<&mut PendingLaunch> {
        self.launch
            .as_mut()
            .filter(|launch| launch.id == id && launch.is_outstanding())
    }

    fn store(&mut self, collection: Collection) {
        let table = &mut self.tables[collection.view().index()];
        match collection {
            Collection::Instances(records) => {
                replace_records(table, &mut self.instances, records, sort_instances);
            }
            Collection::Offerings(records) => {
                replace_records(table, &mut self.offerings, records, sort_offerings);
            }
            Collection::Filesystems(records) => {
                replace_records(table, &mut self.filesystems, records, sort_filesystems);
            }
            Collection::Credentials(records) => {
                replace_records(table, &mut self.credentials, records, sort_credentials);
            }
        }
    }

    fn fail(&mut self, message: String) -> Vec<Effect> {
        self.error_token += 1;
        let token = self.error_token;
        self.error = Some(ErrorBanner { message, token });
        vec![Effect::ScheduleErrorClear {
            token,
            after: self.settings.error_timeout,
        }]
    }
}

fn find_by_key<'a, R: Record>(records: &'a [R], key: &str) -> Option<&'a R> {
    records.iter().find(|record| record.key() == key)
}

/// Swap in a fresh snapshot, keeping the cursor on the record it pointed at.
fn replace_records<R: Record>(
    table: &mut TableWidget,
    cache: &mut Vec<R>,
    mut records: Vec<R>,
    sort: fn(&mut [R]),
) {
    let focused = table
        .selected_index()
        .and_then(|index| cache.get(index))
        .map(Record::key);

    sort(&mut records);
    table.set_rows(records.iter().map(Record::cells).collect());
    if let Some(key) = focused
        && let Some(index) = records.iter().position(|record| record.key() == key)
    {
        table.select_index(index);
    }
    *cache = records;
}
