//! Cloud provider adapters for the credential exchange and identity check ports.

pub mod aws;
