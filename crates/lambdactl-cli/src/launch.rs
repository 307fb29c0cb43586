// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use lambdactl_app::{InstanceId, Offering};
use lambdactl_tui::ConsoleRuntime;
use tracing::info;

pub const DEFAULT_INSTANCE_TYPE: &str = "gpu_1x_h100_sxm5";
pub const DEFAULT_REGION: &str = "us-south-2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchArgs {
    pub instance_type: String,
    pub region: String,
    pub count: u32,
}

impl Default for LaunchArgs {
    fn default() -> Self {
        Self {
            instance_type: DEFAULT_INSTANCE_TYPE.to_owned(),
            region: DEFAULT_REGION.to_owned(),
            count: 1,
        }
    }
}

pub fn find_offering(offerings: &[Offering], instance_type: &str, region: &str) -> Result<Offering> {
    let matching: Vec<&Offering> = offerings
        .iter()
        .filter(|offering| offering.instance_type.name == instance_type)
        .collect();
    if matching.is_empty() {
        bail!("unknown instance type {instance_type:?}; run `lambdactl fetch` to list offerings");
    }
    if let Some(offering) = matching
        .iter()
        .find(|offering| offering.region.name == region)
    {
        return Ok((*offering).clone());
    }

    let mut regions: Vec<&str> = matching
        .iter()
        .map(|offering| offering.region.name.as_str())
        .collect();
    regions.sort_unstable();
    regions.dedup();
    bail!(
        "no capacity for {instance_type} in {region}; available in: {}",
        regions.join(", ")
    )
}

/// Submit one launch and return the created ids without waiting for boot.
pub fn launch<R: ConsoleRuntime>(runtime: &R, args: &LaunchArgs) -> Result<Vec<InstanceId>> {
    let offerings = runtime.fetch_offerings()?;
    let offering = find_offering(&offerings, &args.instance_type, &args.region)?;
    let created = runtime.launch_instances(&offering, args.count)?;
    if created.is_empty() {
        bail!("launch of {} returned no instances", offering.key());
    }
    info!(offering = %offering.key(), created = created.len(), "one-shot launch accepted");
    Ok(created)
}
