// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use lambdactl_app::{
    Credential, Filesystem, Instance, InstanceId, InstanceStatus, Offering, ShellTarget,
    sort_credentials, sort_filesystems, sort_instances, sort_offerings,
};
use lambdactl_testkit::{Fleet, FleetFaker};
use lambdactl_tui::ConsoleRuntime;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::shell;

/// Talks to the cloud API and hands shells to the system `ssh`.
pub struct ApiRuntime {
    client: lambdactl_api::Client,
    ssh_key_names: Vec<String>,
    ssh_binary: String,
}

impl ApiRuntime {
    pub fn new(
        client: lambdactl_api::Client,
        ssh_key_names: Vec<String>,
        ssh_binary: impl Into<String>,
    ) -> Self {
        Self {
            client,
            ssh_key_names,
            ssh_binary: ssh_binary.into(),
        }
    }

    fn key_names_for_launch(&self) -> Result<Vec<String>> {
        if !self.ssh_key_names.is_empty() {
            return Ok(self.ssh_key_names.clone());
        }
        let credentials = self.client.list_ssh_keys()?;
        resolve_key_names(&[], &credentials)
    }
}

/// Configured names win; otherwise the first registered key, sorted by name.
pub fn resolve_key_names(
    configured: &[String],
    credentials: &[Credential],
) -> Result<Vec<String>> {
    if !configured.is_empty() {
        return Ok(configured.to_vec());
    }
    credentials
        .iter()
        .map(|credential| credential.name.as_str())
        .min()
        .map(|name| vec![name.to_owned()])
        .ok_or_else(|| {
            anyhow!(
                "no SSH keys are registered on the account; add one in the cloud dashboard or set [launch].ssh_key_names"
            )
        })
}

impl ConsoleRuntime for ApiRuntime {
    fn list_instances(&self) -> Result<Vec<Instance>> {
        let mut instances = self.client.list_instances()?;
        sort_instances(&mut instances);
        Ok(instances)
    }

    fn fetch_offerings(&self) -> Result<Vec<Offering>> {
        let mut offerings = self.client.instance_types()?;
        sort_offerings(&mut offerings);
        Ok(offerings)
    }

    fn list_filesystems(&self) -> Result<Vec<Filesystem>> {
        let mut filesystems = self.client.list_filesystems()?;
        sort_filesystems(&mut filesystems);
        Ok(filesystems)
    }

    fn list_credentials(&self) -> Result<Vec<Credential>> {
        let mut credentials = self.client.list_ssh_keys()?;
        sort_credentials(&mut credentials);
        Ok(credentials)
    }

    fn launch_instances(&self, offering: &Offering, quantity: u32) -> Result<Vec<InstanceId>> {
        let key_names = self.key_names_for_launch()?;
        let created = self
            .client
            .launch_instances(offering, quantity, &key_names)?;
        info!(
            offering = %offering.key(),
            created = created.len(),
            "launch accepted"
        );
        Ok(created)
    }

    fn open_shell(&self, target: &ShellTarget) -> Result<()> {
        shell::open(&self.ssh_binary, target)
    }
}

/// Instances launched in the demo fleet stay booting for this many listings.
pub const DEMO_BOOT_POLLS: u32 = 3;
pub const DEMO_SEED: u64 = 42;
const DEMO_INSTANCES: usize = 6;

struct DemoFleet {
    fleet: Fleet,
    faker: FleetFaker,
    booting: BTreeMap<InstanceId, u32>,
}

/// In-memory fleet for `--demo`. Launches appear immediately as booting and
/// turn active with an address after [`DEMO_BOOT_POLLS`] listings.
pub struct DemoRuntime {
    inner: Mutex<DemoFleet>,
}

impl DemoRuntime {
    pub fn new(seed: u64) -> Self {
        let mut faker = FleetFaker::new(seed);
        let fleet = faker.fleet(DEMO_INSTANCES);
        Self {
            inner: Mutex::new(DemoFleet {
                fleet,
                faker,
                booting: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, DemoFleet>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("demo fleet lock poisoned"))
    }
}

impl DemoFleet {
    fn advance_boots(&mut self) {
        let mut finished = Vec::new();
        for (id, remaining) in &mut self.booting {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                finished.push(id.clone());
            }
        }
        for id in finished {
            self.booting.remove(&id);
            let ip = self.faker.public_ip();
            if let Some(instance) = self
                .fleet
                .instances
                .iter_mut()
                .find(|instance| instance.id == id)
            {
                debug!(instance = %id.as_str(), "demo instance finished booting");
                instance.status = InstanceStatus::Active;
                instance.ip = Some(ip);
            }
        }
    }
}

impl ConsoleRuntime for DemoRuntime {
    fn list_instances(&self) -> Result<Vec<Instance>> {
        let mut inner = self.lock()?;
        inner.advance_boots();
        let mut instances = inner.fleet.instances.clone();
        sort_instances(&mut instances);
        Ok(instances)
    }

    fn fetch_offerings(&self) -> Result<Vec<Offering>> {
        let mut offerings = self.lock()?.fleet.offerings.clone();
        sort_offerings(&mut offerings);
        Ok(offerings)
    }

    fn list_filesystems(&self) -> Result<Vec<Filesystem>> {
        let mut filesystems = self.lock()?.fleet.filesystems.clone();
        sort_filesystems(&mut filesystems);
        Ok(filesystems)
    }

    fn list_credentials(&self) -> Result<Vec<Credential>> {
        let mut credentials = self.lock()?.fleet.credentials.clone();
        sort_credentials(&mut credentials);
        Ok(credentials)
    }

    fn launch_instances(&self, offering: &Offering, quantity: u32) -> Result<Vec<InstanceId>> {
        let mut inner = self.lock()?;
        if !inner
            .fleet
            .offerings
            .iter()
            .any(|candidate| candidate.key() == offering.key())
        {
            bail!(
                "server error (instance-operations/launch/insufficient-capacity): no capacity for {}",
                offering.key()
            );
        }

        let mut created = Vec::new();
        for _ in 0..quantity.max(1) {
            let instance = inner.faker.booting_instance(offering);
            created.push(instance.id.clone());
            inner.booting.insert(instance.id.clone(), DEMO_BOOT_POLLS);
            inner.fleet.instances.push(instance);
        }
        info!(offering = %offering.key(), created = created.len(), "demo launch accepted");
        Ok(created)
    }

    fn open_shell(&self, target: &ShellTarget) -> Result<()> {
        bail!(
            "demo fleet has no real hosts; would run ssh {}",
            target.destination()
        )
    }
}
