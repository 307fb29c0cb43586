// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use lambdactl_app::{
    Credential, CredentialId, Filesystem, FilesystemId, Instance, InstanceId, InstanceSpecs,
    InstanceStatus, InstanceType, Offering, Owner, Region, UserId,
};
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, Month, OffsetDateTime, Time};

const REGIONS: [(&str, &str); 8] = [
    ("us-east-1", "Virginia, USA"),
    ("us-east-3", "Washington DC, USA"),
    ("us-west-1", "California, USA"),
    ("us-west-2", "Arizona, USA"),
    ("us-west-3", "Utah, USA"),
    ("us-south-1", "Texas, USA"),
    ("europe-central-1", "Germany"),
    ("asia-northeast-1", "Tokyo, Japan"),
];

/// (name, gpu model, gpu memory GB, bus, gpus, vcpus, memory GiB, storage GiB, cents/hour)
type TypeRow = (&'static str, &'static str, u32, &'static str, u32, u32, u32, u32, i64);

const INSTANCE_TYPES: [TypeRow; 10] = [
    ("gpu_1x_a10", "A10", 24, "PCIe", 1, 30, 200, 1_400, 75),
    ("gpu_1x_a6000", "RTX A6000", 48, "PCIe", 1, 14, 46, 512, 80),
    ("gpu_1x_a100", "A100", 40, "PCIe", 1, 30, 200, 512, 129),
    ("gpu_1x_a100_sxm4", "A100", 40, "SXM4", 1, 30, 200, 512, 129),
    ("gpu_2x_a6000", "RTX A6000", 48, "PCIe", 2, 28, 92, 1_024, 160),
    ("gpu_1x_h100_pcie", "H100", 80, "PCIe", 1, 26, 200, 1_024, 249),
    ("gpu_4x_a100", "A100", 40, "PCIe", 4, 120, 800, 2_048, 516),
    ("gpu_8x_v100", "Tesla V100", 16, "SXM2", 8, 92, 448, 5_960, 440),
    ("gpu_8x_a100_80gb_sxm4", "A100", 80, "SXM4", 8, 240, 1_800, 19_500, 1_432),
    ("gpu_8x_h100_sxm5", "H100", 80, "SXM5", 8, 208, 1_800, 24_780, 2_392),
];

const NAME_ADJECTIVES: [&str; 12] = [
    "amber", "brisk", "cobalt", "dusty", "ember", "frosty", "gilded", "hollow", "ivory", "jade",
    "lunar", "misty",
];
const NAME_NOUNS: [&str; 12] = [
    "trainer",
    "notebook",
    "sweep",
    "finetune",
    "eval",
    "inference",
    "sandbox",
    "pretrain",
    "bench",
    "render",
    "worker",
    "scratch",
];
const KEY_OWNERS: [&str; 10] = [
    "avery", "jordan", "taylor", "riley", "morgan", "casey", "quinn", "parker", "rowan", "kai",
];
const KEY_DEVICES: [&str; 6] = ["laptop", "desktop", "ci", "workstation", "bastion", "tablet"];
const SETTLED_STATUSES: [InstanceStatus; 5] = [
    InstanceStatus::Active,
    InstanceStatus::Active,
    InstanceStatus::Active,
    InstanceStatus::Booting,
    InstanceStatus::Unhealthy,
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// A complete fake inventory, one collection per console list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fleet {
    pub instances: Vec<Instance>,
    pub offerings: Vec<Offering>,
    pub filesystems: Vec<Filesystem>,
    pub credentials: Vec<Credential>,
}

#[derive(Debug, Clone)]
pub struct FleetFaker {
    rng: DeterministicRng,
    seed: u64,
}

impl FleetFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn region(&mut self) -> Region {
        let (name, description) = REGIONS[self.rng.int_n(REGIONS.len())];
        Region {
            name: name.to_owned(),
            description: description.to_owned(),
        }
    }

    pub fn instance_type(&mut self) -> InstanceType {
        let row = INSTANCE_TYPES[self.rng.int_n(INSTANCE_TYPES.len())];
        instance_type_from_row(row)
    }

    pub fn offering(&mut self) -> Offering {
        Offering {
            instance_type: self.instance_type(),
            region: self.region(),
        }
    }

    /// Up to `count` offerings with distinct type/region keys.
    pub fn offerings(&mut self, count: usize) -> Vec<Offering> {
        let mut offerings: Vec<Offering> = Vec::new();
        let limit = INSTANCE_TYPES.len() * REGIONS.len();
        let mut attempts = 0;
        while offerings.len() < count.min(limit) && attempts < limit * 8 {
            attempts += 1;
            let candidate = self.offering();
            if offerings
                .iter()
                .all(|existing| existing.key() != candidate.key())
            {
                offerings.push(candidate);
            }
        }
        offerings
    }

    pub fn instance_id(&mut self) -> InstanceId {
        InstanceId::new(self.hex_id())
    }

    pub fn public_ip(&mut self) -> String {
        format!(
            "{}.{}.{}.{}",
            [129, 138, 150, 192][self.rng.int_n(4)],
            self.rng.int_n(255),
            self.rng.int_n(255),
            1 + self.rng.int_n(253)
        )
    }

    pub fn private_ip(&mut self) -> String {
        format!(
            "10.{}.{}.{}",
            self.rng.int_n(255),
            self.rng.int_n(255),
            1 + self.rng.int_n(253)
        )
    }

    pub fn instance_name(&mut self) -> String {
        format!(
            "{}-{}",
            self.pick(&NAME_ADJECTIVES),
            self.pick(&NAME_NOUNS)
        )
    }

    /// A settled instance: mostly active, with an address whenever active.
    pub fn instance(&mut self) -> Instance {
        let status = SETTLED_STATUSES[self.rng.int_n(SETTLED_STATUSES.len())];
        let offering = self.offering();
        let mut instance = self.booting_instance(&offering);
        instance.status = status;
        if status == InstanceStatus::Active || self.rng.bool() {
            instance.ip = Some(self.public_ip());
        }
        instance
    }

    /// A freshly launched instance: booting, no public address yet.
    pub fn booting_instance(&mut self, offering: &Offering) -> Instance {
        let id = self.instance_id();
        let private_ip = self.private_ip();
        Instance {
            hostname: Some(format!("{}.cloud.lambdalabs.com", private_ip.replace('.', "-"))),
            name: Some(self.instance_name()),
            id,
            ip: None,
            private_ip: Some(private_ip),
            status: InstanceStatus::Booting,
            region: offering.region.clone(),
            instance_type: offering.instance_type.clone(),
            ssh_key_names: vec![self.key_name()],
            file_system_names: Vec::new(),
            is_reserved: false,
        }
    }

    pub fn filesystem(&mut self) -> Filesystem {
        let name = format!("{}-{}", self.pick(&NAME_ADJECTIVES), "fs");
        let owner = self.pick(&KEY_OWNERS);
        Filesystem {
            id: FilesystemId::new(self.hex_id()),
            mount_point: format!("/home/ubuntu/{name}"),
            name,
            region: self.region(),
            bytes_used: self
                .rng
                .bool()
                .then(|| self.rng.next_u64() % (2_u64 << 40)),
            is_in_use: self.rng.bool(),
            created_by: Some(Owner {
                id: UserId::new(self.hex_id()),
                email: format!("{owner}@example.com"),
            }),
            created: self.timestamp_in_year(2024),
        }
    }

    pub fn credential(&mut self) -> Credential {
        let name = self.key_name();
        let body = format!("{:016x}{:016x}", self.rng.next_u64(), self.rng.next_u64());
        Credential {
            id: CredentialId::new(self.hex_id()),
            public_key: format!("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5{body} {name}"),
            name,
        }
    }

    pub fn fleet(&mut self, instances: usize) -> Fleet {
        Fleet {
            instances: (0..instances).map(|_| self.instance()).collect(),
            offerings: self.offerings(12),
            filesystems: (0..3).map(|_| self.filesystem()).collect(),
            credentials: (0..3).map(|_| self.credential()).collect(),
        }
    }

    /// RFC 3339 timestamp somewhere inside `year`.
    pub fn timestamp_in_year(&mut self, year: i32) -> String {
        let Ok(date) = Date::from_calendar_date(year, Month::January, 1) else {
            return String::new();
        };
        let start = date.with_time(Time::MIDNIGHT).assume_utc();
        let offset = Duration::seconds((self.rng.next_u64() % (365 * 24 * 3600)) as i64);
        format_rfc3339(start + offset)
    }

    fn key_name(&mut self) -> String {
        format!("{}-{}", self.pick(&KEY_OWNERS), self.pick(&KEY_DEVICES))
    }

    fn hex_id(&mut self) -> String {
        format!("{:016x}{:016x}", self.rng.next_u64(), self.rng.next_u64())
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

pub fn instance_types() -> Vec<InstanceType> {
    INSTANCE_TYPES
        .iter()
        .copied()
        .map(instance_type_from_row)
        .collect()
}

pub fn region_names() -> Vec<&'static str> {
    REGIONS.iter().map(|(name, _)| *name).collect()
}

fn instance_type_from_row(row: TypeRow) -> InstanceType {
    let (name, model, gpu_memory, bus, gpus, vcpus, memory_gib, storage_gib, cents) = row;
    InstanceType {
        name: name.to_owned(),
        description: format!("{gpus}x {model} ({gpu_memory} GB {bus})"),
        gpu_description: format!("{model} ({gpu_memory} GB {bus})"),
        price_cents_per_hour: cents,
        specs: InstanceSpecs {
            vcpus,
            memory_gib,
            storage_gib,
            gpus,
        },
    }
}

fn format_rfc3339(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{FleetFaker, instance_types, region_names};
    use lambdactl_app::{InstanceStatus, format_timestamp};
    use std::collections::BTreeSet;

    #[test]
    fn same_seed_same_fleet() {
        let left = FleetFaker::new(42).fleet(5);
        let right = FleetFaker::new(42).fleet(5);
        assert_eq!(left, right);
    }

    #[test]
    fn different_seeds_diverge() {
        let left = FleetFaker::new(1).fleet(5);
        let right = FleetFaker::new(2).fleet(5);
        assert_ne!(left.instances, right.instances);
    }

    #[test]
    fn zero_seed_is_normalized() {
        assert_eq!(FleetFaker::new(0).seed(), 1);
        assert_eq!(FleetFaker::new(0).fleet(2), FleetFaker::new(1).fleet(2));
    }

    #[test]
    fn active_instances_always_have_addresses() {
        let mut faker = FleetFaker::new(7);
        for _ in 0..200 {
            let instance = faker.instance();
            if instance.status == InstanceStatus::Active {
                assert!(instance.is_ready(), "{instance:?}");
            }
            assert!(!instance.display_name().is_empty());
            assert_eq!(instance.id.as_str().len(), 32);
        }
    }

    #[test]
    fn booting_instance_is_not_ready() {
        let mut faker = FleetFaker::new(3);
        let offering = faker.offering();
        let instance = faker.booting_instance(&offering);
        assert_eq!(instance.status, InstanceStatus::Booting);
        assert!(instance.address().is_none());
        assert_eq!(instance.instance_type, offering.instance_type);
        assert_eq!(instance.region, offering.region);
    }

    #[test]
    fn offerings_have_distinct_keys() {
        let mut faker = FleetFaker::new(9);
        let offerings = faker.offerings(20);
        assert_eq!(offerings.len(), 20);
        let keys: BTreeSet<String> = offerings.iter().map(|offering| offering.key()).collect();
        assert_eq!(keys.len(), 20);
    }

    #[test]
    fn instance_type_labels_follow_api_shape() {
        for instance_type in instance_types() {
            assert!(instance_type.description.starts_with(&format!(
                "{}x ",
                instance_type.specs.gpus
            )));
            assert!(instance_type.price_cents_per_hour > 0);
        }
        assert!(region_names().contains(&"us-east-1"));
    }

    #[test]
    fn filesystems_carry_parseable_timestamps() {
        let mut faker = FleetFaker::new(11);
        for _ in 0..20 {
            let filesystem = faker.filesystem();
            assert!(filesystem.created.starts_with("2024-"));
            assert!(format_timestamp(&filesystem.created).starts_with("2024-"));
            assert!(filesystem.mount_point.ends_with(&filesystem.name));
        }
    }

    #[test]
    fn credentials_look_like_ed25519_keys() {
        let mut faker = FleetFaker::new(5);
        let credential = faker.credential();
        assert!(credential.public_key.starts_with("ssh-ed25519 "));
        assert!(credential.public_key.ends_with(&credential.name));
    }
}
