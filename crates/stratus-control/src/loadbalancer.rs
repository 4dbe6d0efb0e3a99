//! Load balancer lifecycle.
//!
//! Appliance provisioning is the slowest sequence in the account:
//! contract first, then a setup call that wires both network legs, then
//! one call per additional traffic IP binding, each acknowledged
//! asynchronously. The topology decision is made before the first remote
//! call, so an unsupported leg combination never leaves a half-built
//! appliance behind.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use stratus_api::ControlPlane;
use stratus_core::{ContractStatus, ResourceId, ResourceStatus};

use crate::error::{ControlError, ProvisionError, Result};
use crate::poller::{StatusPoller, DEFAULT_POLL_INTERVAL};
use crate::types::{
    decode, is_yes, parse_id, require_str, yes_no, FilterRule, LbHost, LbSpec, LbState,
    NetworkKind, NetworkLeg, TrafficIpState,
};

/// Appliances converge slowly; twice the usual deadline.
pub const LB_DEADLINE: Duration = Duration::from_secs(10 * 60);

/// The leg combinations the setup call supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topology {
    /// External leg on the global segment, internal leg on the standard
    /// private segment; everything is auto-assigned.
    Simple,
    /// Both legs on dedicated private networks; every address must be
    /// spelled out.
    Private,
}

/// Orchestrates load balancer lifecycles.
pub struct LoadBalancers {
    client: Arc<dyn ControlPlane>,
    account: String,
    poller: StatusPoller,
}

impl LoadBalancers {
    /// Create an orchestrator scoped to `account`.
    pub fn new(client: Arc<dyn ControlPlane>, account: impl Into<String>) -> Self {
        Self {
            client,
            account: account.into(),
            poller: StatusPoller::new(DEFAULT_POLL_INTERVAL, LB_DEADLINE),
        }
    }

    /// Override the convergence poller.
    #[must_use]
    pub const fn with_poller(mut self, poller: StatusPoller) -> Self {
        self.poller = poller;
        self
    }

    /// Provision an appliance pair from `spec`.
    ///
    /// # Errors
    ///
    /// Unsupported topologies and malformed legs are rejected before the
    /// first remote call. A failure after allocation carries the
    /// allocated identifier; no rollback is attempted.
    pub async fn create(&self, spec: &LbSpec) -> std::result::Result<ResourceId, ProvisionError> {
        let topology = plan_topology(spec).map_err(ProvisionError::before_allocation)?;

        tracing::info!(plan = %spec.lb_type, "allocating load balancer");
        let body = self
            .client
            .invoke(
                "FwLbAdd",
                json!({
                    "gis_service_code": self.account,
                    "type": spec.lb_type,
                    "redundant": yes_no(spec.redundant),
                }),
            )
            .await
            .map_err(|err| ProvisionError::before_allocation(err.into()))?;
        let code = require_str("FwLbAdd", &body, "service_code")
            .map_err(ProvisionError::before_allocation)?;
        let id = parse_id("FwLbAdd", &code).map_err(ProvisionError::before_allocation)?;

        match self.provision(&id, spec, topology).await {
            Ok(()) => {
                tracing::info!(%id, "load balancer provisioned");
                Ok(id)
            }
            Err(source) => Err(ProvisionError::after_allocation(id, source)),
        }
    }

    async fn provision(&self, id: &ResourceId, spec: &LbSpec, topology: Topology) -> Result<()> {
        self.wait_for(id, ResourceStatus::Initialized).await?;

        if let Some(label) = &spec.label {
            if !label.is_empty() {
                self.set_label(id, label).await?;
            }
        }

        for (index, binding) in spec.traffic_ips.iter().enumerate() {
            if index == 0 {
                self.client
                    .invoke("FwLbSetup", setup_params(&self.account, id, spec, topology))
                    .await?;
            } else {
                self.client
                    .invoke(
                        "TrafficIpAdd",
                        json!({
                            "gis_service_code": self.account,
                            "ifl_service_code": id.as_str(),
                            "traffic_ip_name": binding.name,
                            "traffic_ip_address": binding.address.clone().unwrap_or_default(),
                        }),
                    )
                    .await?;
            }
            self.wait_for(id, ResourceStatus::Configured).await?;
        }

        if let Some(password) = &spec.admin_password {
            self.client
                .invoke(
                    "FwLbAdminPasswordSet",
                    json!({
                        "gis_service_code": self.account,
                        "ifl_service_code": id.as_str(),
                        "password": password,
                    }),
                )
                .await?;
        }

        if !spec.filters_in.is_empty() {
            self.set_filters(id, "in", &spec.filters_in).await?;
        }
        if !spec.filters_out.is_empty() {
            self.set_filters(id, "out", &spec.filters_out).await?;
        }
        if !spec.admin_allow_networks.is_empty() {
            self.set_admin_acl(id, &spec.admin_allow_networks).await?;
        }
        if !spec.static_routes.is_empty() {
            self.set_static_routes(id, &spec.static_routes).await?;
        }

        Ok(())
    }

    /// Snapshot the appliance's observed state.
    ///
    /// Filters are reported by a separate query per direction; static
    /// routes are not reported at all.
    ///
    /// # Errors
    ///
    /// Transport and decode failures.
    pub async fn read(&self, id: &ResourceId) -> Result<LbState> {
        let body = self
            .client
            .invoke(
                "FwLbGet",
                json!({
                    "gis_service_code": self.account,
                    "ifl_service_code": id.as_str(),
                }),
            )
            .await?;
        let wire: LbGetResponse = decode("FwLbGet", &body)?;

        let filters_in = self.get_filters(id, "in").await?;
        let filters_out = self.get_filters(id, "out").await?;

        Ok(wire.into_state(filters_in, filters_out))
    }

    /// Reconcile the appliance toward `desired`.
    ///
    /// Plan, redundancy and traffic-ip bindings are frozen after setup;
    /// a drift on any of them is rejected before anything is applied.
    /// Label, filters, the administration allow list and static routes
    /// are applied in that order with per-field write-back to `observed`.
    /// The appliance keeps serving throughout.
    ///
    /// # Errors
    ///
    /// [`ControlError::UnsupportedUpdate`] for frozen fields, plus
    /// transport failures.
    pub async fn update(
        &self,
        id: &ResourceId,
        observed: &mut LbState,
        desired: &LbSpec,
    ) -> Result<()> {
        if desired.lb_type != observed.lb_type {
            return Err(ControlError::UnsupportedUpdate { field: "type" });
        }
        if desired.redundant != observed.redundant {
            return Err(ControlError::UnsupportedUpdate { field: "redundant" });
        }
        if !same_binding_names(desired, observed) {
            return Err(ControlError::UnsupportedUpdate {
                field: "traffic_ips",
            });
        }

        if desired.label != observed.label {
            let label = desired.label.clone().unwrap_or_default();
            self.set_label(id, &label).await?;
            observed.label.clone_from(&desired.label);
        }

        if desired.filters_in != observed.filters_in {
            self.set_filters(id, "in", &desired.filters_in).await?;
            observed.filters_in.clone_from(&desired.filters_in);
        }

        if desired.filters_out != observed.filters_out {
            self.set_filters(id, "out", &desired.filters_out).await?;
            observed.filters_out.clone_from(&desired.filters_out);
        }

        if desired.admin_allow_networks != observed.admin_allow_networks {
            self.set_admin_acl(id, &desired.admin_allow_networks).await?;
            observed
                .admin_allow_networks
                .clone_from(&desired.admin_allow_networks);
        }

        if desired.static_routes != observed.static_routes {
            self.set_static_routes(id, &desired.static_routes).await?;
            observed.static_routes.clone_from(&desired.static_routes);
        }

        Ok(())
    }

    /// Cancel the appliance contract.
    ///
    /// # Errors
    ///
    /// Transport failures.
    pub async fn delete(&self, id: &ResourceId) -> Result<()> {
        tracing::info!(%id, "cancelling load balancer");
        self.client
            .invoke(
                "FwLbCancel",
                json!({
                    "gis_service_code": self.account,
                    "ifl_service_code": id.as_str(),
                }),
            )
            .await?;
        Ok(())
    }

    async fn wait_for(&self, id: &ResourceId, resource: ResourceStatus) -> Result<()> {
        self.poller
            .wait_two_phase(
                self.client.as_ref(),
                id,
                ContractStatus::InService,
                resource,
            )
            .await
    }

    async fn set_label(&self, id: &ResourceId, label: &str) -> Result<()> {
        self.client
            .invoke(
                "FwLbLabelSet",
                json!({
                    "gis_service_code": self.account,
                    "ifl_service_code": id.as_str(),
                    "name": label,
                }),
            )
            .await?;
        Ok(())
    }

    async fn set_filters(
        &self,
        id: &ResourceId,
        direction: &str,
        rules: &[FilterRule],
    ) -> Result<()> {
        self.client
            .invoke(
                "FwLbFilterSet",
                json!({
                    "gis_service_code": self.account,
                    "ifl_service_code": id.as_str(),
                    "ip_version": "v4",
                    "direction": direction,
                    "filter_rule_list": rules,
                }),
            )
            .await?;
        Ok(())
    }

    async fn get_filters(&self, id: &ResourceId, direction: &str) -> Result<Vec<FilterRule>> {
        let body = self
            .client
            .invoke(
                "FwLbFilterGet",
                json!({
                    "gis_service_code": self.account,
                    "ifl_service_code": id.as_str(),
                    "ip_version": "v4",
                    "direction": direction,
                }),
            )
            .await?;
        let wire: FilterGetResponse = decode("FwLbFilterGet", &body)?;
        Ok(wire.filter_rule_list)
    }

    async fn set_admin_acl(&self, id: &ResourceId, networks: &[String]) -> Result<()> {
        self.client
            .invoke(
                "LBControlPanelACLSet",
                json!({
                    "gis_service_code": self.account,
                    "ifl_service_code": id.as_str(),
                    "administration_server_allow_network_list": networks,
                }),
            )
            .await?;
        Ok(())
    }

    async fn set_static_routes(
        &self,
        id: &ResourceId,
        routes: &[crate::types::StaticRoute],
    ) -> Result<()> {
        self.client
            .invoke(
                "FwLbStaticRouteSet",
                json!({
                    "gis_service_code": self.account,
                    "ifl_service_code": id.as_str(),
                    "static_route_list": routes,
                }),
            )
            .await?;
        Ok(())
    }
}

/// Decide the setup shape, rejecting what the setup call cannot express.
fn plan_topology(spec: &LbSpec) -> Result<Topology> {
    if spec.traffic_ips.is_empty() {
        return Err(ControlError::InvalidSpec {
            what: "traffic ips",
            message: "at least one traffic ip binding is required".to_owned(),
        });
    }
    match (spec.external.kind, spec.internal.kind) {
        (NetworkKind::Global, NetworkKind::PrivateStandard) => Ok(Topology::Simple),
        (NetworkKind::Private, NetworkKind::Private) => {
            require_private_leg("external leg", &spec.external)?;
            require_private_leg("internal leg", &spec.internal)?;
            Ok(Topology::Private)
        }
        (external, internal) => Err(ControlError::UnsupportedTopology { external, internal }),
    }
}

fn require_private_leg(what: &'static str, leg: &NetworkLeg) -> Result<()> {
    if leg.service_code.is_none() {
        return Err(ControlError::InvalidSpec {
            what,
            message: "a private leg needs a backing network contract".to_owned(),
        });
    }
    if leg.addressing.is_none() {
        return Err(ControlError::InvalidSpec {
            what,
            message: "a private leg needs explicit addressing".to_owned(),
        });
    }
    Ok(())
}

fn setup_params(account: &str, id: &ResourceId, spec: &LbSpec, topology: Topology) -> Value {
    let first_binding = &spec.traffic_ips[0];
    match topology {
        Topology::Simple => json!({
            "gis_service_code": account,
            "ifl_service_code": id.as_str(),
            "action_type": "Setup",
            "external": {
                "network_type": spec.external.kind.as_str(),
                "traffic_ip_name": first_binding.name,
            },
            "internal": {
                "network_type": spec.internal.kind.as_str(),
            },
        }),
        Topology::Private => {
            // plan_topology already checked both legs are complete.
            let leg = |leg: &NetworkLeg, name: Option<&str>| {
                let addressing = leg.addressing.as_ref().expect("validated private leg");
                let mut obj = json!({
                    "network_type": leg.kind.as_str(),
                    "service_code": leg.service_code.as_ref().expect("validated private leg").as_str(),
                    "traffic_ip_address": addressing.traffic_ip_address,
                    "netmask": addressing.netmask,
                    "master_host_address": addressing.master_host_address,
                    "slave_host_address": addressing.slave_host_address,
                });
                if let Some(name) = name {
                    obj["traffic_ip_name"] = Value::String(name.to_owned());
                }
                obj
            };
            json!({
                "gis_service_code": account,
                "ifl_service_code": id.as_str(),
                "action_type": "Setup",
                "external": leg(&spec.external, Some(&first_binding.name)),
                "internal": leg(&spec.internal, None),
            })
        }
    }
}

/// Bindings are keyed by their IPv4 name; order is not meaningful.
fn same_binding_names(desired: &LbSpec, observed: &LbState) -> bool {
    let mut wanted: Vec<&str> = desired.traffic_ips.iter().map(|t| t.name.as_str()).collect();
    let mut have: Vec<&str> = observed
        .traffic_ips
        .iter()
        .map(|t| t.ipv4_name.as_str())
        .collect();
    wanted.sort_unstable();
    have.sort_unstable();
    wanted == have
}

#[derive(Debug, Deserialize, Default)]
struct LegWire {
    #[serde(default)]
    network_type: Option<NetworkKind>,
    #[serde(default)]
    service_code: String,
    #[serde(default)]
    traffic_ip_address: String,
}

#[derive(Debug, Deserialize, Default)]
struct TrafficIpAxisWire {
    #[serde(default)]
    traffic_ip_name: String,
    #[serde(default)]
    traffic_ip_address: String,
    #[serde(default)]
    domain_name: String,
}

#[derive(Debug, Deserialize, Default)]
struct TrafficIpWire {
    #[serde(default)]
    ipv4: TrafficIpAxisWire,
    #[serde(default)]
    ipv6: TrafficIpAxisWire,
}

#[derive(Debug, Deserialize, Default)]
struct LbSectionWire {
    #[serde(default)]
    administration_server_allow_network_list: Vec<String>,
    #[serde(default)]
    traffic_ip_list: Vec<TrafficIpWire>,
}

#[derive(Debug, Deserialize, Default)]
struct HostAddressesWire {
    #[serde(default)]
    ipv4_address: String,
    #[serde(default)]
    ipv6_address: String,
}

#[derive(Debug, Deserialize)]
struct HostWire {
    #[serde(default)]
    lb_administration_server_url: String,
    #[serde(default)]
    lb_software_version: String,
    #[serde(default)]
    master: String,
    #[serde(default)]
    external: HostAddressesWire,
    #[serde(default)]
    internal: HostAddressesWire,
}

#[derive(Debug, Deserialize)]
struct LbGetResponse {
    #[serde(rename = "type")]
    lb_type: String,
    #[serde(default)]
    redundant: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    external: LegWire,
    #[serde(default)]
    internal: LegWire,
    #[serde(default)]
    lb: LbSectionWire,
    #[serde(default)]
    host_list: Vec<HostWire>,
}

impl LbGetResponse {
    fn into_state(self, filters_in: Vec<FilterRule>, filters_out: Vec<FilterRule>) -> LbState {
        LbState {
            lb_type: self.lb_type,
            redundant: is_yes(&self.redundant),
            label: (!self.label.is_empty()).then_some(self.label),
            external_type: self.external.network_type.unwrap_or(NetworkKind::Global),
            external_service_code: self.external.service_code,
            internal_type: self
                .internal
                .network_type
                .unwrap_or(NetworkKind::PrivateStandard),
            internal_service_code: self.internal.service_code,
            internal_traffic_ip_address: self.internal.traffic_ip_address,
            traffic_ips: self
                .lb
                .traffic_ip_list
                .into_iter()
                .map(|t| TrafficIpState {
                    ipv4_name: t.ipv4.traffic_ip_name,
                    ipv4_address: t.ipv4.traffic_ip_address,
                    ipv4_domainname: t.ipv4.domain_name,
                    ipv6_name: t.ipv6.traffic_ip_name,
                    ipv6_address: t.ipv6.traffic_ip_address,
                    ipv6_domainname: t.ipv6.domain_name,
                })
                .collect(),
            hosts: self
                .host_list
                .into_iter()
                .map(|h| LbHost {
                    url: h.lb_administration_server_url,
                    version: h.lb_software_version,
                    master: is_yes(&h.master),
                    external_ipv4_address: h.external.ipv4_address,
                    external_ipv6_address: h.external.ipv6_address,
                    internal_ipv4_address: h.internal.ipv4_address,
                })
                .collect(),
            filters_in,
            filters_out,
            admin_allow_networks: self.lb.administration_server_allow_network_list,
            static_routes: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FilterGetResponse {
    #[serde(default)]
    filter_rule_list: Vec<FilterRule>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockControlPlane;
    use crate::types::{LegAddressing, StaticRoute, TrafficIp};
    use stratus_core::StatusPair;

    const ACCOUNT: &str = "gis00000001";

    fn simple_spec() -> LbSpec {
        LbSpec {
            lb_type: "D100M".into(),
            redundant: true,
            label: Some("edge".into()),
            external: NetworkLeg {
                kind: NetworkKind::Global,
                service_code: None,
                addressing: None,
            },
            internal: NetworkLeg {
                kind: NetworkKind::PrivateStandard,
                service_code: None,
                addressing: None,
            },
            traffic_ips: vec![
                TrafficIp {
                    name: "web".into(),
                    address: None,
                },
                TrafficIp {
                    name: "api".into(),
                    address: Some("198.51.100.7".into()),
                },
            ],
            admin_password: Some("hunter2".into()),
            filters_in: vec![FilterRule {
                source_network: "ANY".into(),
                destination_network: "ANY".into(),
                destination_port: "443".into(),
                protocol: "TCP".into(),
                action: "ACCEPT".into(),
                label: String::new(),
            }],
            filters_out: Vec::new(),
            admin_allow_networks: vec!["203.0.113.0/24".into()],
            static_routes: vec![StaticRoute {
                destination: "10.1.0.0/16".into(),
                gateway: "10.0.0.1".into(),
            }],
        }
    }

    fn plane_for_create() -> Arc<MockControlPlane> {
        let plane = Arc::new(MockControlPlane::new(StatusPair::new(
            ContractStatus::InService,
            ResourceStatus::Initialized,
        )));
        plane.queue_response("FwLbAdd", json!({ "service_code": "ifl00000001" }));
        plane.transition_on(
            "FwLbSetup",
            StatusPair::new(ContractStatus::InService, ResourceStatus::Configured),
        );
        plane.transition_on(
            "TrafficIpAdd",
            StatusPair::new(ContractStatus::InService, ResourceStatus::Configured),
        );
        plane
    }

    #[tokio::test(start_paused = true)]
    async fn create_sets_up_first_binding_then_adds_the_rest() {
        let plane = plane_for_create();
        let id = LoadBalancers::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .create(&simple_spec())
            .await
            .unwrap();

        assert_eq!(id.as_str(), "ifl00000001");
        assert_eq!(
            plane.call_sequence(),
            [
                "FwLbAdd",
                "FwLbLabelSet",
                "FwLbSetup",
                "TrafficIpAdd",
                "FwLbAdminPasswordSet",
                "FwLbFilterSet",
                "LBControlPanelACLSet",
                "FwLbStaticRouteSet",
            ]
        );

        let setup = &plane.calls_for("FwLbSetup")[0];
        assert_eq!(setup["external"]["traffic_ip_name"], "web");
        assert_eq!(setup["external"]["network_type"], "Global");
        assert_eq!(setup["internal"]["network_type"], "PrivateStandard");

        let added = &plane.calls_for("TrafficIpAdd")[0];
        assert_eq!(added["traffic_ip_name"], "api");
        assert_eq!(added["traffic_ip_address"], "198.51.100.7");
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_topology_fails_before_any_call() {
        let plane = Arc::new(MockControlPlane::default());
        let mut spec = simple_spec();
        spec.external.kind = NetworkKind::PrivateStandard;

        let err = LoadBalancers::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .create(&spec)
            .await
            .unwrap_err();

        assert!(err.id.is_none());
        assert!(matches!(
            err.source,
            ControlError::UnsupportedTopology { .. }
        ));
        assert!(plane.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn private_topology_requires_complete_legs() {
        let plane = Arc::new(MockControlPlane::default());
        let mut spec = simple_spec();
        spec.external = NetworkLeg {
            kind: NetworkKind::Private,
            service_code: Some("ivl00000001".parse().unwrap()),
            addressing: Some(LegAddressing {
                traffic_ip_address: "10.0.0.10".into(),
                netmask: "255.255.255.0".into(),
                master_host_address: "10.0.0.2".into(),
                slave_host_address: "10.0.0.3".into(),
            }),
        };
        spec.internal = NetworkLeg {
            kind: NetworkKind::Private,
            service_code: Some("ivl00000002".parse().unwrap()),
            addressing: None,
        };

        let err = LoadBalancers::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .create(&spec)
            .await
            .unwrap_err();

        assert!(matches!(err.source, ControlError::InvalidSpec { .. }));
        assert!(plane.calls().is_empty());
    }

    fn observed_state() -> LbState {
        LbState {
            lb_type: "D100M".into(),
            redundant: true,
            label: Some("edge".into()),
            external_type: NetworkKind::Global,
            external_service_code: String::new(),
            internal_type: NetworkKind::PrivateStandard,
            internal_service_code: String::new(),
            internal_traffic_ip_address: String::new(),
            traffic_ips: vec![
                TrafficIpState {
                    ipv4_name: "web".into(),
                    ..TrafficIpState::default()
                },
                TrafficIpState {
                    ipv4_name: "api".into(),
                    ..TrafficIpState::default()
                },
            ],
            hosts: Vec::new(),
            filters_in: simple_spec().filters_in,
            filters_out: Vec::new(),
            admin_allow_networks: vec!["203.0.113.0/24".into()],
            static_routes: simple_spec().static_routes,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn update_rejects_plan_changes_before_any_call() {
        let plane = Arc::new(MockControlPlane::default());
        let mut observed = observed_state();
        let mut desired = simple_spec();
        desired.lb_type = "D1000M".into();

        let err = LoadBalancers::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .update(&"ifl00000001".parse().unwrap(), &mut observed, &desired)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ControlError::UnsupportedUpdate { field: "type" }
        ));
        assert!(plane.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn update_applies_only_the_drifted_config() {
        let plane = Arc::new(MockControlPlane::default());
        let mut observed = observed_state();
        let mut desired = simple_spec();
        desired.filters_out = vec![FilterRule {
            source_network: "ANY".into(),
            destination_network: "ANY".into(),
            destination_port: "ANY".into(),
            protocol: "UDP".into(),
            action: "DROP".into(),
            label: "no-udp".into(),
        }];

        LoadBalancers::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .update(&"ifl00000001".parse().unwrap(), &mut observed, &desired)
            .await
            .unwrap();

        assert_eq!(plane.call_sequence(), ["FwLbFilterSet"]);
        assert_eq!(plane.calls_for("FwLbFilterSet")[0]["direction"], "out");
        assert_eq!(observed.filters_out, desired.filters_out);
    }

    #[tokio::test(start_paused = true)]
    async fn read_merges_filter_queries_into_the_snapshot() {
        let plane = Arc::new(MockControlPlane::default());
        plane.queue_response(
            "FwLbGet",
            json!({
                "type": "D100M",
                "redundant": "Yes",
                "label": "edge",
                "external": { "network_type": "Global" },
                "internal": { "network_type": "PrivateStandard",
                              "traffic_ip_address": "172.16.0.10" },
                "lb": {
                    "administration_server_allow_network_list": ["203.0.113.0/24"],
                    "traffic_ip_list": [
                        { "ipv4": { "traffic_ip_name": "web",
                                    "traffic_ip_address": "198.51.100.1" } },
                    ],
                },
                "host_list": [
                    { "lb_administration_server_url": "https://lb1.example.jp",
                      "lb_software_version": "18.1",
                      "master": "Yes",
                      "external": { "ipv4_address": "198.51.100.2" },
                      "internal": { "ipv4_address": "172.16.0.2" } },
                ],
            }),
        );
        plane.queue_response(
            "FwLbFilterGet",
            json!({ "filter_rule_list": [
                { "source_network": "ANY", "destination_network": "ANY",
                  "destination_port": "443", "protocol": "TCP",
                  "action": "ACCEPT" },
            ]}),
        );
        plane.queue_response("FwLbFilterGet", json!({ "filter_rule_list": [] }));

        let state = LoadBalancers::new(Arc::clone(&plane) as Arc<dyn ControlPlane>, ACCOUNT)
            .read(&"ifl00000001".parse().unwrap())
            .await
            .unwrap();

        assert!(state.redundant);
        assert_eq!(state.internal_traffic_ip_address, "172.16.0.10");
        assert_eq!(state.traffic_ips[0].ipv4_name, "web");
        assert!(state.hosts[0].master);
        assert_eq!(state.filters_in.len(), 1);
        assert!(state.filters_out.is_empty());
    }
}
