// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::ids::*;

const GPU_DESCRIPTION_MISSING: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Booting,
    Active,
    Unhealthy,
    Terminating,
    Terminated,
    Preempted,
    #[serde(other)]
    Unknown,
}

impl InstanceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Booting => "booting",
            Self::Active => "active",
            Self::Unhealthy => "unhealthy",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
            Self::Preempted => "preempted",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceSpecs {
    pub vcpus: u32,
    pub memory_gib: u32,
    pub storage_gib: u32,
    pub gpus: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceType {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub gpu_description: String,
    pub price_cents_per_hour: i64,
    pub specs: InstanceSpecs,
}

impl InstanceType {
    pub fn model_label(&self) -> &str {
        if self.gpu_description.is_empty() || self.gpu_description == GPU_DESCRIPTION_MISSING {
            &self.description
        } else {
            &self.gpu_description
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub private_ip: Option<String>,
    pub status: InstanceStatus,
    pub region: Region,
    pub instance_type: InstanceType,
    #[serde(default)]
    pub ssh_key_names: Vec<String>,
    #[serde(default)]
    pub file_system_names: Vec<String>,
    #[serde(default)]
    pub is_reserved: bool,
}

impl Instance {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.id.as_str(),
        }
    }

    pub fn address(&self) -> Option<&str> {
        self.ip.as_deref().filter(|ip| !ip.is_empty())
    }

    pub fn is_ready(&self) -> bool {
        self.status == InstanceStatus::Active && self.address().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub instance_type: InstanceType,
    pub region: Region,
}

impl Offering {
    pub fn key(&self) -> String {
        format!("{}@{}", self.instance_type.name, self.region.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub id: UserId,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filesystem {
    pub id: FilesystemId,
    pub name: String,
    #[serde(default)]
    pub mount_point: String,
    pub region: Region,
    #[serde(default)]
    pub bytes_used: Option<u64>,
    #[serde(default)]
    pub is_in_use: bool,
    #[serde(default)]
    pub created_by: Option<Owner>,
    #[serde(default)]
    pub created: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub name: String,
    pub public_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListView {
    Instances,
    Offerings,
    Filesystems,
    Credentials,
}

impl ListView {
    pub const ALL: [Self; 4] = [
        Self::Instances,
        Self::Offerings,
        Self::Filesystems,
        Self::Credentials,
    ];

    pub const fn index(self) -> usize {
        match self {
            Self::Instances => 0,
            Self::Offerings => 1,
            Self::Filesystems => 2,
            Self::Credentials => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Instances => "Instances",
            Self::Offerings => "Offerings",
            Self::Filesystems => "Filesystems",
            Self::Credentials => "SSH Keys",
        }
    }

    pub const fn headers(self) -> &'static [&'static str] {
        match self {
            Self::Instances => &[
                "Name",
                "Region",
                "Public IP",
                "Private IP",
                "Model",
                "GPUs",
                "CPUs",
                "RAM",
                "Storage",
                "Status",
            ],
            Self::Offerings => &[
                "Region", "Model", "GPUs", "vCPUs", "Memory", "Storage", "$/Hour",
            ],
            Self::Filesystems => &[
                "Name",
                "Region",
                "Mount Point",
                "Used",
                "In Use",
                "Created By",
                "Created At",
            ],
            Self::Credentials => &["Name", "Public Key"],
        }
    }

    pub const fn mode(self) -> ViewMode {
        match self {
            Self::Instances => ViewMode::InstanceList,
            Self::Offerings => ViewMode::OfferingList,
            Self::Filesystems => ViewMode::FilesystemList,
            Self::Credentials => ViewMode::CredentialList,
        }
    }

    pub fn rotate(self, delta: isize) -> Self {
        let len = Self::ALL.len() as isize;
        let next = (self.index() as isize + delta).rem_euclid(len) as usize;
        Self::ALL[next]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    InstanceList,
    OfferingList,
    FilesystemList,
    CredentialList,
    DetailOverlay,
    LaunchConfirm,
    ShellSession,
}

impl ViewMode {
    pub const fn list(self) -> Option<ListView> {
        match self {
            Self::InstanceList => Some(ListView::Instances),
            Self::OfferingList => Some(ListView::Offerings),
            Self::FilesystemList => Some(ListView::Filesystems),
            Self::CredentialList => Some(ListView::Credentials),
            Self::DetailOverlay | Self::LaunchConfirm | Self::ShellSession => None,
        }
    }

    pub const fn is_modal(self) -> bool {
        matches!(self, Self::DetailOverlay | Self::LaunchConfirm)
    }
}

/// A displayable inventory entry with an identity that survives refreshes.
pub trait Record {
    fn key(&self) -> String;
    fn title(&self) -> String;
    fn cells(&self) -> Vec<String>;
}

impl Record for Instance {
    fn key(&self) -> String {
        self.id.as_str().to_owned()
    }

    fn title(&self) -> String {
        format!("instance {}", self.display_name())
    }

    fn cells(&self) -> Vec<String> {
        let specs = self.instance_type.specs;
        vec![
            self.display_name().to_owned(),
            self.region.name.clone(),
            self.ip.clone().unwrap_or_default(),
            self.private_ip.clone().unwrap_or_default(),
            self.instance_type.model_label().to_owned(),
            specs.gpus.to_string(),
            specs.vcpus.to_string(),
            format!("{} GiB", specs.memory_gib),
            format!("{} GiB", specs.storage_gib),
            self.status.as_str().to_owned(),
        ]
    }
}

impl Record for Offering {
    fn key(&self) -> String {
        Offering::key(self)
    }

    fn title(&self) -> String {
        format!("offering {}", self.instance_type.name)
    }

    fn cells(&self) -> Vec<String> {
        let specs = self.instance_type.specs;
        vec![
            self.region.name.clone(),
            self.instance_type.model_label().to_owned(),
            specs.gpus.to_string(),
            specs.vcpus.to_string(),
            format!("{} GiB", specs.memory_gib),
            format!("{} GiB", specs.storage_gib),
            format_price_cents(self.instance_type.price_cents_per_hour),
        ]
    }
}

impl Record for Filesystem {
    fn key(&self) -> String {
        self.id.as_str().to_owned()
    }

    fn title(&self) -> String {
        format!("filesystem {}", self.name)
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.region.name.clone(),
            self.mount_point.clone(),
            self.bytes_used.map(format_bytes).unwrap_or_default(),
            if self.is_in_use { "yes" } else { "no" }.to_owned(),
            self.created_by
                .as_ref()
                .map(|owner| owner.email.clone())
                .unwrap_or_default(),
            format_timestamp(&self.created),
        ]
    }
}

impl Record for Credential {
    fn key(&self) -> String {
        self.id.as_str().to_owned()
    }

    fn title(&self) -> String {
        format!("ssh key {}", self.name)
    }

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), self.public_key.clone()]
    }
}

/// Sort order applied to every fresh snapshot before it reaches a table.
pub fn sort_instances(instances: &mut [Instance]) {
    instances.sort_by(|left, right| left.display_name().cmp(right.display_name()));
}

pub fn sort_offerings(offerings: &mut [Offering]) {
    offerings.sort_by_key(|offering| offering.instance_type.price_cents_per_hour);
}

pub fn sort_filesystems(filesystems: &mut [Filesystem]) {
    filesystems.sort_by(|left, right| left.name.cmp(&right.name));
}

pub fn sort_credentials(credentials: &mut [Credential]) {
    credentials.sort_by(|left, right| left.name.cmp(&right.name));
}

pub fn format_price_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn format_timestamp(raw: &str) -> String {
    let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) else {
        return raw.to_owned();
    };
    parsed
        .format(time::macros::format_description!(
            "[year]-[month]-[day] [hour]:[minute]"
        ))
        .unwrap_or_else(|_| raw.to_owned())
}
