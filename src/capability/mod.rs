//! Capability descriptors and the reusable capability library.
//!
//! A capability (on/off, light, metering, ...) is authored independently as a
//! [`CapabilityDescriptor`]: the features it exposes, the converters that
//! translate between ZCL messages and feature values, and the configure steps
//! that set the device up for reporting.

mod converter;
mod descriptor;
pub mod feature;
pub mod library;
mod step;

pub use converter::{
    ActionSource, AttributeMapping, ConvertContext, CustomDecode, CustomEncode, Decode, Encode,
    InboundConverter, Message, OutboundConverter, Payload, ReadBack, Transform, WireRequest,
};
pub use descriptor::CapabilityDescriptor;
pub use feature::{Access, Category, Feature, FeatureKind};
pub use step::{ActionContext, ConfigureAction, ConfigureStep, StepKind, reporting_steps};
