//! Zigbee capability composition engine.
//!
//! Device drivers are assembled from reusable capabilities. Each capability
//! describes the features it exposes, how inbound ZCL messages become feature
//! updates, how feature requests become radio commands, and which bind, read
//! and reporting steps configure it on a device. The [`compose`] module merges
//! a definition's capabilities into one descriptor, the [`planner`] batches
//! configure steps into radio commands, and the [`executor`] runs them against
//! a live device through a [`radio::Radio`].

pub mod capability;
pub mod compose;
pub mod config;
pub mod devices;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod planner;
pub mod radio;
pub mod transport;
pub mod zcl;
