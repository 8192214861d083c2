//! Ports Layer
//!
//! - Driving Ports (inbound) - API for the protocol layer
//! - Driven Ports (outbound) - the storage collaborator behind each filter

pub mod inbound;
pub mod outbound;

pub use inbound::{FilterInfo, FilterManagerApi};
pub use outbound::{FilterFactory, FilterStore, StoreInfo};
