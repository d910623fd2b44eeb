//! Transports carrying radio commands and device messages to a coordinator.

pub mod mqtt;
