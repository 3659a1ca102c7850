//! Type definitions for Keystone.
//!
//! This module contains the identifier types shared by the driver and
//! resource adapters.

mod ids;

pub use ids::{SavepointId, TxnId};
