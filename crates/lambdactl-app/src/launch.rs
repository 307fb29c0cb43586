// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::time::Duration;

use crate::{Instance, InstanceId, Offering};

pub const LAUNCH_QUANTITY: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LaunchId(u64);

impl LaunchId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchPhase {
    NotSubmitted,
    Submitted,
    Polling {
        created: Vec<InstanceId>,
        found: usize,
        ready: usize,
    },
    Ready {
        instances: Vec<InstanceId>,
    },
    Failed {
        reason: String,
    },
}

impl LaunchPhase {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLaunch {
    pub id: LaunchId,
    pub offering: Offering,
    pub quantity: u32,
    pub phase: LaunchPhase,
}

impl PendingLaunch {
    pub fn new(id: LaunchId, offering: Offering) -> Self {
        Self {
            id,
            offering,
            quantity: LAUNCH_QUANTITY,
            phase: LaunchPhase::NotSubmitted,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        !self.phase.is_terminal()
    }

    pub fn summary(&self) -> String {
        let target = format!(
            "{} in {}",
            self.offering.instance_type.name, self.offering.region.name
        );
        match &self.phase {
            LaunchPhase::NotSubmitted => format!("launch {target} pending"),
            LaunchPhase::Submitted => format!("launching {target}"),
            LaunchPhase::Polling {
                created,
                found,
                ready,
            } => format!(
                "waiting on {target}: {ready}/{} ready ({found} visible)",
                created.len()
            ),
            LaunchPhase::Ready { instances } => {
                format!("{target}: {} instance(s) ready", instances.len())
            }
            LaunchPhase::Failed { reason } => format!("launch {target} failed: {reason}"),
        }
    }
}

/// Everything the background poller needs to drive one launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub id: LaunchId,
    pub offering: Offering,
    pub quantity: u32,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyCheck {
    Pending { found: usize, ready: usize },
    Ready(Vec<Instance>),
}

/// Launched instances are ready once every created id is listed, active, and
/// has an address. Ids missing from the listing keep the launch pending.
pub fn check_ready(created: &[InstanceId], instances: &[Instance]) -> ReadyCheck {
    let mut matched: BTreeMap<&InstanceId, &Instance> = BTreeMap::new();
    for instance in instances {
        if created.contains(&instance.id) {
            matched.insert(&instance.id, instance);
        }
    }

    let found = matched.len();
    let ready = matched.values().filter(|instance| instance.is_ready()).count();
    let expected = created
        .iter()
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    if expected > 0 && found == expected && ready == expected {
        return ReadyCheck::Ready(matched.into_values().cloned().collect());
    }
    ReadyCheck::Pending { found, ready }
}
