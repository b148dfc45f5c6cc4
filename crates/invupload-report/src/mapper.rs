//! Host to inventory record mapping
//!
//! Writes one host object of the inventory upload schema into a
//! [`JsonStream`]. Field names and their order are part of the wire format
//! consumed by the inventory service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::facts::{self, keys};
use crate::host::{Host, OrganizationLookup};
use crate::stream::{FragmentSink, JsonStream};

/// Namespace used for reported facts and tags
pub const SATELLITE_NAMESPACE: &str = "satellite";

/// Deployment wide values reported with every host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportContext {
    /// Identifier of this management server installation
    pub instance_id: Option<String>,
    /// Product version, present only when the branded distribution is installed
    pub satellite_version: Option<String>,
}

impl ReportContext {
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    #[must_use]
    pub fn with_satellite_version(mut self, version: impl Into<String>) -> Self {
        self.satellite_version = Some(version.into());
        self
    }
}

/// Maps hosts onto the inventory schema
#[derive(Clone, Copy)]
pub struct HostMapper<'a> {
    context: &'a ReportContext,
    organizations: &'a dyn OrganizationLookup,
}

impl<'a> HostMapper<'a> {
    pub fn new(context: &'a ReportContext, organizations: &'a dyn OrganizationLookup) -> Self {
        Self {
            context,
            organizations,
        }
    }

    /// Emit `host` as the next element of the enclosing array
    ///
    /// Returns `false` without emitting anything when the host has no
    /// subscription data.
    pub fn report_host<S: FragmentSink>(&self, stream: &mut JsonStream<S>, host: &Host) -> bool {
        if !host.is_reportable() {
            return false;
        }
        let subscription_id = host
            .subscription_facet
            .as_ref()
            .and_then(|facet| facet.uuid.clone());

        stream.object(|s| {
            s.field("fqdn", host.fqdn.clone());
            s.field(
                "account",
                self.organizations
                    .account_id(host.organization_id)
                    .unwrap_or_default(),
            );
            s.field("subscription_manager_id", subscription_id.clone());
            s.field("satellite_id", subscription_id);
            s.field("bios_uuid", host.fact(keys::BIOS_UUID));
            s.field("vm_uuid", host.fact(keys::VM_UUID));
            s.joined_array_field(
                "ip_addresses",
                host.interfaces
                    .iter()
                    .filter_map(|nic| nic.ip.as_deref())
                    .map(|ip| Value::from(ip).to_string()),
            );
            s.joined_array_field(
                "mac_addresses",
                host.interfaces
                    .iter()
                    .filter_map(|nic| nic.mac.as_deref())
                    .map(|mac| Value::from(mac).to_string()),
            );
            s.object_field("system_profile", |s| self.report_system_profile(s, host));
            s.array_field("facts", |s| {
                s.object(|s| {
                    s.field("namespace", SATELLITE_NAMESPACE);
                    s.object_field("facts", |s| self.report_satellite_facts(s, host));
                });
            });
            s.array_field("tags", |s| {
                if let Some(instance_id) = &self.context.instance_id {
                    report_tag(s, "satellite_instance_id", instance_id);
                }
                report_tag(s, "organization_id", &host.organization_id.to_string());
            });
        });

        true
    }

    fn report_system_profile<S: FragmentSink>(&self, s: &mut JsonStream<S>, host: &Host) {
        s.field("number_of_cpus", facts::to_int(host.fact(keys::CPUS)));
        s.field("number_of_sockets", facts::to_int(host.fact(keys::SOCKETS)));
        s.field(
            "cores_per_socket",
            facts::to_int(host.fact(keys::CORES_PER_SOCKET)),
        );
        s.field(
            "system_memory_bytes",
            facts::kilobytes_to_bytes(facts::to_int(host.fact(keys::MEMTOTAL))),
        );
        s.joined_array_field(
            "network_interfaces",
            host.interfaces.iter().map(|nic| {
                let mut iface = Map::new();
                iface.insert("ipv4_addresses".into(), json!(nic.ip.iter().collect::<Vec<_>>()));
                iface.insert("ipv6_addresses".into(), json!(nic.ip6.iter().collect::<Vec<_>>()));
                if let Some(mtu) = nic.mtu {
                    iface.insert("mtu".into(), json!(mtu));
                }
                if let Some(mac) = &nic.mac {
                    iface.insert("mac_address".into(), json!(mac));
                }
                if let Some(name) = &nic.identifier {
                    iface.insert("name".into(), json!(name));
                }
                Value::Object(iface).to_string()
            }),
        );
        s.field("bios_vendor", host.fact(keys::BIOS_VENDOR));
        s.field("bios_version", host.fact(keys::BIOS_VERSION));
        s.field("bios_release_date", host.fact(keys::BIOS_RELEASE_DATE));
        if let Some(flags) = host.fact(keys::CPU_FLAGS) {
            s.joined_array_field(
                "cpu_flags",
                flags
                    .split_whitespace()
                    .map(|flag| Value::from(flag).to_string()),
            );
        }
        s.field(
            "os_release",
            facts::os_release(
                host.fact(keys::DISTRIBUTION_NAME),
                host.fact(keys::DISTRIBUTION_VERSION),
                host.fact(keys::DISTRIBUTION_ID),
            ),
        );
        s.field("os_kernel_version", host.fact(keys::KERNEL_RELEASE));
        s.field("arch", host.architecture.clone());
        s.field("subscription_status", host.subscription_status_label.clone());
        s.field(
            "katello_agent_running",
            host.content_facet
                .as_ref()
                .map(|facet| facet.katello_agent_installed),
        );
        s.field("satellite_managed", true);
        s.field(
            "infrastructure_type",
            if facts::cast_boolean(host.fact(keys::IS_GUEST)) {
                "virtual"
            } else {
                "physical"
            },
        );

        // Absent rather than empty when there are no products
        let products = host
            .subscription_facet
            .as_ref()
            .map(|facet| facet.installed_products.as_slice())
            .unwrap_or_default();
        if !products.is_empty() {
            s.joined_array_field(
                "installed_products",
                products.iter().map(|product| {
                    json!({ "name": product.name, "id": product.cp_product_id }).to_string()
                }),
            );
        }

        // Package lists can be huge, stream them
        s.array_field("installed_packages", |s| {
            for package in &host.installed_packages {
                s.element(package.nvra.as_str());
            }
        });
    }

    fn report_satellite_facts<S: FragmentSink>(&self, s: &mut JsonStream<S>, host: &Host) {
        let subscription = host.subscription_facet.as_ref();
        let hypervisor = subscription.and_then(|facet| facet.hypervisor_host.as_ref());

        s.field(
            "virtual_host_name",
            hypervisor.and_then(|hv| hv.name.clone()),
        );
        s.field(
            "virtual_host_uuid",
            hypervisor.and_then(|hv| hv.uuid.clone()),
        );
        if let Some(version) = &self.context.satellite_version {
            s.field("satellite_version", version.as_str());
        }
        s.field(
            "system_purpose_usage",
            subscription.and_then(|facet| facet.purpose_usage.clone()),
        );
        s.field(
            "system_purpose_role",
            subscription.and_then(|facet| facet.purpose_role.clone()),
        );
        s.field(
            "distribution_version",
            host.fact(keys::DISTRIBUTION_VERSION),
        );
        s.field("satellite_instance_id", self.context.instance_id.clone());
        s.field(
            "is_simple_content_access",
            self.organizations.golden_ticket(host.organization_id),
        );
        s.field("organization_id", host.organization_id);
    }
}

fn report_tag<S: FragmentSink>(s: &mut JsonStream<S>, key: &str, value: &str) {
    s.object(|s| {
        s.field("namespace", SATELLITE_NAMESPACE);
        s.field("key", key);
        s.field("value", value);
    });
}
