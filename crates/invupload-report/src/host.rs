//! Host records as handed over by the inventory lookup layer

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ReportError;

/// Read a batch of hosts from a JSON array file
///
/// # Errors
/// Returns an error if the file cannot be opened or is not a JSON array of hosts.
pub fn load_hosts(path: &Path) -> Result<Vec<Host>, ReportError> {
    let file = File::open(path).map_err(|e| ReportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let hosts: Vec<Host> = serde_json::from_reader(BufReader::new(file))?;
    debug!(path = %path.display(), count = hosts.len(), "loaded host batch");
    Ok(hosts)
}

// ============================================================================
// Host
// ============================================================================

/// Read-only view of a managed host at report time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Host {
    /// Database id
    #[serde(default)]
    pub id: u64,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Fully qualified domain name
    pub fqdn: Option<String>,
    /// Owning organization
    pub organization_id: u64,
    /// Architecture name (`x86_64`, `aarch64`, ...)
    pub architecture: Option<String>,
    /// Human readable subscription status
    pub subscription_status_label: Option<String>,
    /// Subscription data; hosts without it are never reported
    pub subscription_facet: Option<SubscriptionFacet>,
    /// Content management data
    pub content_facet: Option<ContentFacet>,
    /// Namespaced facts (`cpu::cpu(s)` => `"4"`)
    #[serde(default)]
    pub facts: HashMap<String, String>,
    /// Network interfaces
    #[serde(default)]
    pub interfaces: Vec<NetworkInterface>,
    /// Installed packages
    #[serde(default)]
    pub installed_packages: Vec<InstalledPackage>,
}

impl Host {
    /// Create a host with only the identity fields set
    pub fn new(name: impl Into<String>, organization_id: u64) -> Self {
        let name = name.into();
        Self {
            fqdn: Some(name.clone()),
            name,
            organization_id,
            ..Self::default()
        }
    }

    /// Attach subscription data
    #[must_use]
    pub fn with_subscription(mut self, facet: SubscriptionFacet) -> Self {
        self.subscription_facet = Some(facet);
        self
    }

    /// Set a fact value
    #[must_use]
    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.facts.insert(key.into(), value.into());
        self
    }

    /// Look up a fact value
    #[must_use]
    pub fn fact(&self, key: &str) -> Option<&str> {
        self.facts.get(key).map(String::as_str)
    }

    /// Whether the host carries the data needed to be reported
    #[must_use]
    pub fn is_reportable(&self) -> bool {
        self.subscription_facet.is_some()
    }
}

/// Subscription facet of a host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionFacet {
    /// Consumer uuid registered with the entitlement server
    pub uuid: Option<String>,
    /// System purpose usage
    pub purpose_usage: Option<String>,
    /// System purpose role
    pub purpose_role: Option<String>,
    /// Hypervisor running this guest, if known
    pub hypervisor_host: Option<HypervisorHost>,
    /// Products installed on the host
    #[serde(default)]
    pub installed_products: Vec<InstalledProduct>,
}

impl SubscriptionFacet {
    /// Create a facet with the given consumer uuid
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            ..Self::default()
        }
    }
}

/// Hypervisor a guest is mapped to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HypervisorHost {
    pub name: Option<String>,
    /// Consumer uuid of the hypervisor's own subscription facet
    pub uuid: Option<String>,
}

/// Installed product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledProduct {
    pub name: String,
    /// Candlepin product id
    pub cp_product_id: String,
}

/// Content facet of a host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentFacet {
    #[serde(default)]
    pub katello_agent_installed: bool,
}

/// Network interface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Interface name (`eth0`)
    pub identifier: Option<String>,
    /// IPv4 address
    pub ip: Option<String>,
    /// IPv6 address
    pub ip6: Option<String>,
    /// MAC address
    pub mac: Option<String>,
    /// MTU, only known for some interface types
    pub mtu: Option<u32>,
}

/// Installed package
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstalledPackage {
    /// `name-version-release.arch`
    pub nvra: String,
}

impl From<&str> for InstalledPackage {
    fn from(nvra: &str) -> Self {
        Self {
            nvra: nvra.to_string(),
        }
    }
}

// ============================================================================
// Organizations
// ============================================================================

/// Organization level lookups needed while reporting a host
pub trait OrganizationLookup: Send + Sync {
    /// Upstream account number of the organization
    fn account_id(&self, organization_id: u64) -> Option<String>;

    /// Whether the organization has an unlimited entitlement ("golden ticket")
    fn golden_ticket(&self, organization_id: u64) -> bool;
}

/// Organization data known ahead of time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationInfo {
    pub account: Option<String>,
    #[serde(default)]
    pub golden_ticket: bool,
}

/// Map backed [`OrganizationLookup`]
#[derive(Debug, Clone, Default)]
pub struct StaticOrganizations {
    organizations: HashMap<u64, OrganizationInfo>,
}

impl StaticOrganizations {
    /// Create an empty lookup
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an organization
    #[must_use]
    pub fn with_organization(mut self, id: u64, info: OrganizationInfo) -> Self {
        self.organizations.insert(id, info);
        self
    }
}

impl FromIterator<(u64, OrganizationInfo)> for StaticOrganizations {
    fn from_iter<T: IntoIterator<Item = (u64, OrganizationInfo)>>(iter: T) -> Self {
        Self {
            organizations: iter.into_iter().collect(),
        }
    }
}

impl OrganizationLookup for StaticOrganizations {
    fn account_id(&self, organization_id: u64) -> Option<String> {
        self.organizations
            .get(&organization_id)
            .and_then(|org| org.account.clone())
    }

    fn golden_ticket(&self, organization_id: u64) -> bool {
        self.organizations
            .get(&organization_id)
            .is_some_and(|org| org.golden_ticket)
    }
}
