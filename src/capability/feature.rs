//! User-facing features ("exposes").
//!
//! A feature is a named, typed property such as `state`, `brightness` or
//! `current_heating_setpoint`, optionally qualified by a logical endpoint.

use serde::Serialize;
use serde_json::Value;

/// Access mode of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Access {
    /// Published by the device, read-only
    State,
    /// Write-only
    Set,
    /// Published and writable
    StateSet,
    /// Published and can be polled
    StateGet,
    /// Published, writable and can be polled
    All,
}

impl Access {
    /// The device publishes this feature (reports or read responses).
    pub fn is_readable(self) -> bool {
        matches!(
            self,
            Access::State | Access::StateSet | Access::StateGet | Access::All
        )
    }

    pub fn is_writable(self) -> bool {
        matches!(self, Access::Set | Access::StateSet | Access::All)
    }

    /// The feature can be actively read back from the device.
    pub fn is_gettable(self) -> bool {
        matches!(self, Access::StateGet | Access::All)
    }
}

/// Entity category hint for front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Config,
    Diagnostic,
}

/// Value type of a feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureKind {
    Binary {
        value_on: Value,
        value_off: Value,
    },
    Numeric {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    Enum {
        values: Vec<String>,
    },
    Text,
    /// Group of features presented as one entity (`light`, `switch`, `climate`, `cover`)
    Composite {
        features: Vec<Feature>,
    },
}

/// A user-facing property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub name: String,
    #[serde(flatten)]
    pub kind: FeatureKind,
    pub access: Access,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// A later capability may replace this feature instead of colliding with it.
    #[serde(skip)]
    pub override_eligible: bool,
}

impl Feature {
    fn with_kind(name: impl Into<String>, kind: FeatureKind, access: Access) -> Self {
        Self {
            name: name.into(),
            kind,
            access,
            endpoint: None,
            description: None,
            unit: None,
            category: None,
            override_eligible: false,
        }
    }

    pub fn binary(
        name: impl Into<String>,
        access: Access,
        value_on: impl Into<Value>,
        value_off: impl Into<Value>,
    ) -> Self {
        Self::with_kind(
            name,
            FeatureKind::Binary {
                value_on: value_on.into(),
                value_off: value_off.into(),
            },
            access,
        )
    }

    pub fn numeric(name: impl Into<String>, access: Access) -> Self {
        Self::with_kind(
            name,
            FeatureKind::Numeric {
                min: None,
                max: None,
                step: None,
            },
            access,
        )
    }

    pub fn enumeration<S: Into<String>>(
        name: impl Into<String>,
        access: Access,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::with_kind(
            name,
            FeatureKind::Enum {
                values: values.into_iter().map(Into::into).collect(),
            },
            access,
        )
    }

    pub fn text(name: impl Into<String>, access: Access) -> Self {
        Self::with_kind(name, FeatureKind::Text, access)
    }

    /// Group features under one entity, e.g. `light(state, brightness)`.
    ///
    /// The group's access is the union of its members' access.
    pub fn composite(name: impl Into<String>, features: Vec<Feature>) -> Self {
        let readable = features.iter().any(|f| f.access.is_readable());
        let writable = features.iter().any(|f| f.access.is_writable());
        let gettable = features.iter().any(|f| f.access.is_gettable());
        let access = match (readable, writable, gettable) {
            (_, true, true) => Access::All,
            (_, false, true) => Access::StateGet,
            (true, true, false) => Access::StateSet,
            (false, true, false) => Access::Set,
            _ => Access::State,
        };
        Self::with_kind(name, FeatureKind::Composite { features }, access)
    }

    /// Qualify the feature (and composite members) with a logical endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if let FeatureKind::Composite { features } = &mut self.kind {
            for feature in features.iter_mut() {
                feature.endpoint = Some(endpoint.clone());
            }
        }
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Set numeric bounds. No-op on non-numeric features.
    pub fn with_range(mut self, min: f64, max: f64, step: Option<f64>) -> Self {
        if let FeatureKind::Numeric {
            min: lo,
            max: hi,
            step: st,
        } = &mut self.kind
        {
            *lo = Some(min);
            *hi = Some(max);
            *st = step;
        }
        self
    }

    /// Allow a later capability to replace this feature.
    pub fn overridable(mut self) -> Self {
        self.override_eligible = true;
        self
    }

    /// Identity used for collision detection.
    pub fn key(&self) -> (&str, Option<&str>) {
        (self.name.as_str(), self.endpoint.as_deref())
    }

    /// Published property name, suffixed with the endpoint when qualified
    /// (`state_l1`).
    pub fn property(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}_{}", self.name, endpoint),
            None => self.name.clone(),
        }
    }

    /// Compact signature, `light_l1(state,brightness)` for composites.
    pub fn signature(&self) -> String {
        match &self.kind {
            FeatureKind::Composite { features } => {
                let members: Vec<&str> = features.iter().map(|f| f.name.as_str()).collect();
                format!("{}({})", self.property(), members.join(","))
            }
            _ => self.property(),
        }
    }
}
