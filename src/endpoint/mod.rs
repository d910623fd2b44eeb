//! Logical endpoint names to physical endpoint numbers.
//!
//! A definition names the endpoints it cares about (`l1`, `l2`, `top`) and
//! either maps them statically or computes the map from the device's live
//! endpoint inventory. Resolution never looks at anything but the inventory.

use crate::error::ConfigureWarning;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One physical endpoint as reported by the device interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointInfo {
    #[serde(alias = "ID")]
    pub id: u8,
    #[serde(default)]
    pub input_clusters: Vec<String>,
    #[serde(default)]
    pub output_clusters: Vec<String>,
}

impl EndpointInfo {
    pub fn new<S: Into<String>>(id: u8, input_clusters: impl IntoIterator<Item = S>) -> Self {
        Self {
            id,
            input_clusters: input_clusters.into_iter().map(Into::into).collect(),
            output_clusters: Vec::new(),
        }
    }

    pub fn supports(&self, cluster: &str) -> bool {
        self.input_clusters.iter().any(|c| c == cluster)
    }
}

/// Read-only snapshot of a device's endpoints, in interview order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointInventory {
    endpoints: Vec<EndpointInfo>,
}

impl EndpointInventory {
    pub fn new(endpoints: Vec<EndpointInfo>) -> Self {
        Self { endpoints }
    }

    /// Inventory of bare endpoints without cluster information.
    pub fn from_ids(ids: impl IntoIterator<Item = u8>) -> Self {
        Self::new(
            ids.into_iter()
                .map(|id| EndpointInfo::new(id, Vec::<String>::new()))
                .collect(),
        )
    }

    /// Builder helper for tests and the planning CLI.
    pub fn with<S: Into<String>>(mut self, id: u8, input_clusters: impl IntoIterator<Item = S>) -> Self {
        self.endpoints.push(EndpointInfo::new(id, input_clusters));
        self
    }

    pub fn endpoints(&self) -> &[EndpointInfo] {
        &self.endpoints
    }

    pub fn get(&self, id: u8) -> Option<&EndpointInfo> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    pub fn has_endpoint(&self, id: u8) -> bool {
        self.get(id).is_some()
    }

    pub fn first(&self) -> Option<u8> {
        self.endpoints.first().map(|e| e.id)
    }

    /// Endpoints whose input clusters include `cluster`.
    pub fn supporting(&self, cluster: &str) -> Vec<u8> {
        self.endpoints
            .iter()
            .filter(|e| e.supports(cluster))
            .map(|e| e.id)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Logical name to physical endpoint number.
pub type EndpointMap = BTreeMap<String, u8>;

/// Endpoint map computed from the live inventory.
pub type DynamicEndpoints = fn(&EndpointInventory) -> EndpointMap;

/// How a definition names its endpoints.
#[derive(Debug, Clone, Default)]
pub enum EndpointSpec {
    /// No logical endpoints, everything is addressed physically
    #[default]
    None,
    Static(EndpointMap),
    Dynamic(DynamicEndpoints),
}

impl EndpointSpec {
    pub fn fixed<S: Into<String>>(entries: impl IntoIterator<Item = (S, u8)>) -> Self {
        EndpointSpec::Static(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Resolve against one device's inventory.
    ///
    /// Static entries pointing at endpoints the device lacks are dropped and
    /// reported. Dynamic maps are taken as computed.
    pub fn resolve(&self, inventory: &EndpointInventory) -> Resolution {
        match self {
            EndpointSpec::None => Resolution::default(),
            EndpointSpec::Static(map) => {
                let mut resolution = Resolution::default();
                for (name, &endpoint) in map {
                    if inventory.has_endpoint(endpoint) {
                        resolution.map.insert(name.clone(), endpoint);
                    } else {
                        warn!(
                            "[Endpoints] Mapping '{}' -> {} skipped, endpoint not present",
                            name, endpoint
                        );
                        resolution.warnings.push(ConfigureWarning::MissingEndpoint {
                            name: name.clone(),
                            endpoint,
                        });
                    }
                }
                resolution
            }
            EndpointSpec::Dynamic(compute) => Resolution {
                map: compute(inventory),
                warnings: Vec::new(),
            },
        }
    }
}

/// Endpoint a configure step is addressed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum EndpointTarget {
    /// Logical endpoint name, resolved through the definition's map
    Named(String),
    Physical(u8),
    /// Every endpoint whose input clusters include the step's cluster,
    /// or the first endpoint when none declares it
    #[default]
    Supporting,
}

impl EndpointTarget {
    pub fn named(name: impl Into<String>) -> Self {
        EndpointTarget::Named(name.into())
    }
}

impl fmt::Display for EndpointTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointTarget::Named(name) => write!(f, "'{name}'"),
            EndpointTarget::Physical(id) => write!(f, "{id}"),
            EndpointTarget::Supporting => write!(f, "*"),
        }
    }
}

/// Result of resolving an [`EndpointSpec`] for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub map: EndpointMap,
    pub warnings: Vec<ConfigureWarning>,
}

impl Resolution {
    pub fn physical(&self, name: &str) -> Option<u8> {
        self.map.get(name).copied()
    }

    /// Reverse lookup, physical endpoint to logical name.
    pub fn name_of(&self, endpoint: u8) -> Option<&str> {
        self.map
            .iter()
            .find(|&(_, &id)| id == endpoint)
            .map(|(name, _)| name.as_str())
    }

    /// Physical endpoints a step addressed to `target` runs on.
    pub fn targets(
        &self,
        target: &EndpointTarget,
        cluster: Option<&str>,
        inventory: &EndpointInventory,
    ) -> Result<Vec<u8>, ConfigureWarning> {
        match target {
            EndpointTarget::Named(name) => {
                let endpoint = self
                    .physical(name)
                    .ok_or_else(|| ConfigureWarning::UnresolvedEndpoint { name: name.clone() })?;
                if inventory.has_endpoint(endpoint) {
                    Ok(vec![endpoint])
                } else {
                    Err(ConfigureWarning::AbsentEndpoint { endpoint })
                }
            }
            EndpointTarget::Physical(endpoint) => {
                if inventory.has_endpoint(*endpoint) {
                    Ok(vec![*endpoint])
                } else {
                    Err(ConfigureWarning::AbsentEndpoint { endpoint: *endpoint })
                }
            }
            EndpointTarget::Supporting => {
                if let Some(cluster) = cluster {
                    let supporting = inventory.supporting(cluster);
                    if !supporting.is_empty() {
                        return Ok(supporting);
                    }
                }
                inventory
                    .first()
                    .map(|endpoint| vec![endpoint])
                    .ok_or_else(|| ConfigureWarning::NoEndpoints {
                        cluster: cluster.unwrap_or("custom").to_string(),
                    })
            }
        }
    }
}
