//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::path::Path;

use autotest_utils::host::HostRegistry;
use ipnetwork::IpNetwork;
use serde::Serialize;
use tracing::debug;

use crate::error::Error;

/// One testbed configuration of the testbed file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TestbedEntry {
    pub conf_name: String,
    pub group_name: String,
    pub topo: String,
    pub dut: String,
    pub vm_base: String,
    pub vm_base_ip: Option<IpAddr>,
    pub ptf_ip: Option<IpNetwork>,
    // Remaining columns, verbatim.
    pub extra: BTreeMap<String, String>,
}

/// Catalog of the testbed configurations declared in the testbed file.
///
/// Holds at most one configuration per topology.
#[derive(Clone, Debug, Default)]
pub struct TestbedCatalog {
    entries: Vec<TestbedEntry>,
    topologies: BTreeSet<String>,
}

// ===== impl TestbedEntry =====

impl TestbedEntry {
    const FIELD_CONF_NAME: &'static str = "conf-name";
    const FIELD_GROUP_NAME: &'static str = "group-name";
    const FIELD_TOPO: &'static str = "topo";
    const FIELD_DUT: &'static str = "dut";
    const FIELD_VM_BASE: &'static str = "vm_base";
    const FIELD_PTF_IP: &'static str = "ptf_ip";

    pub fn ptf_addr(&self) -> Option<IpAddr> {
        self.ptf_ip.map(|ptf_ip| ptf_ip.ip())
    }

    pub fn ptf_mask(&self) -> Option<u8> {
        self.ptf_ip.map(|ptf_ip| ptf_ip.prefix())
    }

    // Inventory name of the packet-test host attached to this testbed.
    pub fn ptf_host(&self) -> String {
        format!("ptf_{}", self.group_name)
    }

    pub fn has_vm_base(&self) -> bool {
        !self.vm_base.is_empty()
    }
}

// ===== impl TestbedCatalog =====

impl TestbedCatalog {
    /// Loads the testbed file, resolving the base VM of every testbed
    /// through the host registry.
    pub async fn load(
        path: &Path,
        hosts: &HostRegistry,
    ) -> Result<TestbedCatalog, Error> {
        let data = std::fs::read_to_string(path)
            .map_err(|error| Error::FileRead(path.to_owned(), error))?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());

        let headers = reader
            .headers()
            .map_err(|error| Error::TestbedParse(path.to_owned(), error))?
            .iter()
            .map(|field| field.trim_matches('#').trim().to_owned())
            .collect::<Vec<_>>();
        for field in [
            TestbedEntry::FIELD_CONF_NAME,
            TestbedEntry::FIELD_GROUP_NAME,
            TestbedEntry::FIELD_TOPO,
            TestbedEntry::FIELD_DUT,
            TestbedEntry::FIELD_VM_BASE,
            TestbedEntry::FIELD_PTF_IP,
        ] {
            if !headers.iter().any(|header| header == field) {
                return Err(Error::TestbedMissingField(path.to_owned(), field));
            }
        }

        let mut catalog = TestbedCatalog::default();
        for record in reader.records() {
            let record = record
                .map_err(|error| Error::TestbedParse(path.to_owned(), error))?;
            let mut fields = headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_owned))
                .collect::<BTreeMap<_, _>>();
            let mut take =
                |field: &str| fields.remove(field).unwrap_or_default();
            let conf_name = take(TestbedEntry::FIELD_CONF_NAME);
            let group_name = take(TestbedEntry::FIELD_GROUP_NAME);
            let topo = take(TestbedEntry::FIELD_TOPO);
            let dut = take(TestbedEntry::FIELD_DUT);
            let vm_base = take(TestbedEntry::FIELD_VM_BASE);
            let ptf_ip = take(TestbedEntry::FIELD_PTF_IP);

            let vm_base_ip = if vm_base.is_empty() {
                None
            } else {
                Some(resolve_host_address(hosts, &vm_base).await?)
            };
            let ptf_ip = if ptf_ip.is_empty() {
                None
            } else {
                let ptf_ip = ptf_ip.parse::<IpNetwork>().map_err(|_| {
                    Error::InvalidPtfAddress(conf_name.clone(), ptf_ip.clone())
                })?;
                Some(ptf_ip)
            };

            let entry = TestbedEntry {
                conf_name,
                group_name,
                topo,
                dut,
                vm_base,
                vm_base_ip,
                ptf_ip,
                extra: fields,
            };
            catalog.insert(entry)?;
        }

        Ok(catalog)
    }

    fn insert(&mut self, entry: TestbedEntry) -> Result<(), Error> {
        if !self.topologies.insert(entry.topo.clone()) {
            return Err(Error::DuplicateTopology(entry.topo));
        }
        debug!(topo = %entry.topo, conf_name = %entry.conf_name, ?entry, "found testbed");
        self.entries.push(entry);
        Ok(())
    }

    pub fn get_by_name(&self, conf_name: &str) -> Option<&TestbedEntry> {
        self.entries
            .iter()
            .find(|entry| entry.conf_name == conf_name)
    }

    pub fn get_by_topo(&self, topo: &str) -> Option<&TestbedEntry> {
        let entry = self.entries.iter().find(|entry| entry.topo == topo);
        if entry.is_none() {
            debug!(%topo, "topology not found");
        }
        entry
    }

    pub fn is_valid_topo(&self, topo: &str) -> bool {
        self.topologies.contains(topo)
    }

    pub fn topologies(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.topo.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestbedEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ===== helper functions =====

// Resolves the management address of an inventory host.
async fn resolve_host_address(
    hosts: &HostRegistry,
    host: &str,
) -> Result<IpAddr, Error> {
    let value = hosts.var(host, "ansible_host").await?;
    value
        .as_deref()
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| Error::InvalidHostAddress(host.to_owned(), value))
}
