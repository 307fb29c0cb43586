// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use lambdactl_app::{
    Completion, Instance, InstanceId, LaunchId, LaunchRequest, ListView, Message, ReadyCheck,
    check_ready,
};
use tracing::{debug, info, warn};

use crate::ConsoleRuntime;

const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Runs fetches, timers and launches off the event loop. Every outcome comes
/// back as a `Message` on the console channel.
pub struct Scheduler<R> {
    runtime: Arc<R>,
    tx: Sender<Message>,
    launches: HashMap<LaunchId, Arc<AtomicBool>>,
}

impl<R: ConsoleRuntime> Scheduler<R> {
    pub fn new(runtime: Arc<R>, tx: Sender<Message>) -> Self {
        Self {
            runtime,
            tx,
            launches: HashMap::new(),
        }
    }

    pub fn fetch(&self, view: ListView) {
        let runtime = Arc::clone(&self.runtime);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let completion = match runtime.load(view) {
                Ok(collection) => {
                    debug!(view = view.label(), records = collection.len(), "fetched");
                    Completion::Fetched(collection)
                }
                Err(error) => {
                    warn!(view = view.label(), "fetch failed: {error:#}");
                    Completion::FetchFailed {
                        view,
                        error: format!("{error:#}"),
                    }
                }
            };
            let _ = tx.send(Message::Completed(completion));
        });
    }

    pub fn schedule_tick(&self, after: Duration) {
        self.send_after(after, Message::Tick);
    }

    pub fn schedule_error_clear(&self, token: u64, after: Duration) {
        self.send_after(after, Message::ClearError { token });
    }

    pub fn launch(&mut self, request: LaunchRequest) {
        // A finished driver has dropped its clone of the flag.
        self.launches.retain(|_, flag| Arc::strong_count(flag) > 1);
        let cancel = Arc::new(AtomicBool::new(false));
        self.launches.insert(request.id, Arc::clone(&cancel));

        let runtime = Arc::clone(&self.runtime);
        let tx = self.tx.clone();
        thread::spawn(move || run_launch(runtime.as_ref(), &request, &cancel, &tx));
    }

    pub fn cancel(&mut self, id: LaunchId) {
        if let Some(flag) = self.launches.remove(&id) {
            info!(launch = id.get(), "cancelling launch");
            flag.store(true, Ordering::SeqCst);
        }
    }

    fn send_after(&self, after: Duration, message: Message) {
        let tx = self.tx.clone();
        thread::spawn(move || {
            thread::sleep(after);
            let _ = tx.send(message);
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    Ready(Vec<Instance>),
    Failed(String),
    Cancelled,
}

/// Submit a launch and follow it until it is ready, fails, times out or is
/// cancelled. A cancelled launch posts nothing further.
pub fn run_launch<R: ConsoleRuntime + ?Sized>(
    runtime: &R,
    request: &LaunchRequest,
    cancel: &AtomicBool,
    tx: &Sender<Message>,
) {
    let launch = request.id;
    let post = |completion: Completion| {
        if !cancel.load(Ordering::SeqCst) {
            let _ = tx.send(Message::Completed(completion));
        }
    };

    let created = match runtime.launch_instances(&request.offering, request.quantity) {
        Ok(ids) if ids.is_empty() => {
            warn!(launch = launch.get(), "launch returned no instance ids");
            post(Completion::LaunchFailed {
                launch,
                error: "no instances were created".to_owned(),
            });
            return;
        }
        Ok(ids) => ids,
        Err(error) => {
            warn!(launch = launch.get(), "launch failed: {error:#}");
            post(Completion::LaunchFailed {
                launch,
                error: format!("{error:#}"),
            });
            return;
        }
    };

    info!(launch = launch.get(), instances = created.len(), "launch submitted");
    post(Completion::LaunchSubmitted {
        launch,
        created: created.clone(),
    });

    let outcome = await_ready(
        runtime,
        &created,
        request.poll_interval,
        request.timeout,
        cancel,
        |found, ready| post(Completion::LaunchProgress {
            launch,
            found,
            ready,
        }),
    );
    match outcome {
        LaunchOutcome::Ready(instances) => {
            info!(launch = launch.get(), "launched instances are ready");
            post(Completion::LaunchReady { launch, instances });
        }
        LaunchOutcome::Failed(error) => {
            warn!(launch = launch.get(), "launch did not become ready: {error}");
            post(Completion::LaunchFailed { launch, error });
        }
        LaunchOutcome::Cancelled => debug!(launch = launch.get(), "launch poller stopped"),
    }
}

/// Poll the instance listing until every id in `created` is active with an
/// address. A failed listing ends the wait.
pub fn await_ready<R: ConsoleRuntime + ?Sized>(
    runtime: &R,
    created: &[InstanceId],
    poll_interval: Duration,
    timeout: Duration,
    cancel: &AtomicBool,
    mut progress: impl FnMut(usize, usize),
) -> LaunchOutcome {
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.load(Ordering::SeqCst) {
            return LaunchOutcome::Cancelled;
        }

        let instances = match runtime.list_instances() {
            Ok(instances) => instances,
            Err(error) => {
                return LaunchOutcome::Failed(format!("polling instances failed: {error:#}"));
            }
        };
        match check_ready(created, &instances) {
            ReadyCheck::Ready(ready) => return LaunchOutcome::Ready(ready),
            ReadyCheck::Pending { found, ready } => {
                debug!(found, ready, expected = created.len(), "launch pending");
                progress(found, ready);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return LaunchOutcome::Failed(format!("timed out after {}s", timeout.as_secs()));
        }
        let wake = (now + poll_interval).min(deadline);
        if !sleep_until(wake, cancel) {
            return LaunchOutcome::Cancelled;
        }
    }
}

/// Returns false if cancelled while sleeping.
fn sleep_until(wake: Instant, cancel: &AtomicBool) -> bool {
    loop {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= wake {
            return true;
        }
        thread::sleep((wake - now).min(CANCEL_CHECK_INTERVAL));
    }
}
