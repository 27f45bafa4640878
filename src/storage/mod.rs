//! Storage layer: capsule container, configuration envelope and transports.
//!
//! - Versioned repository configuration (`config`)
//! - Binary container with integrity trailer (`format`)
//! - Location-scheme transports (`connectors`)

pub mod config;
pub mod connectors;
pub mod format;

use std::collections::BTreeMap;

use crate::context::Context;
use crate::errors::{KapsulError, Result};

pub use config::{Configuration, EncryptionDescriptor, KdfParams, Version, VERSION};
pub use connectors::Connector;
pub use format::RawCapsule;

/// Key of the location entry in `StoreParams`.
pub const LOCATION_KEY: &str = "location";

/// Parameters handed to a store backend. Must carry at least `location`.
pub type StoreParams = BTreeMap<String, String>;

/// Build `StoreParams` holding just a location.
pub fn location_params(location: &str) -> StoreParams {
    StoreParams::from([(LOCATION_KEY.to_string(), location.to_string())])
}

fn location_of(params: &StoreParams) -> Result<&str> {
    params
        .get(LOCATION_KEY)
        .map(String::as_str)
        .filter(|l| !l.is_empty())
        .ok_or(KapsulError::NoLocation)
}

/// An opened store: the transport plus the raw sections it yielded.
pub struct Store {
    connector: Box<dyn Connector>,
    raw: RawCapsule,
}

impl Store {
    pub fn location(&self) -> String {
        self.connector.location()
    }

    pub fn scheme(&self) -> &'static str {
        self.connector.scheme()
    }

    pub fn raw(&self) -> &RawCapsule {
        &self.raw
    }
}

/// Open the store at `params["location"]`.
///
/// Returns the store and its serialized configuration envelope. Transport
/// failures are reported with their underlying cause.
pub fn open(ctx: &Context, params: &StoreParams) -> Result<(Store, Vec<u8>)> {
    let location = location_of(params)?;
    let connector = connectors::connector_for(location, &ctx.cwd)?;

    tracing::debug!(scheme = connector.scheme(), location, "opening store");

    let data = connector.load().map_err(|e| match e {
        KapsulError::Io(io) => KapsulError::StoreOpen {
            location: location.to_string(),
            cause: io.to_string(),
        },
        other => other,
    })?;

    let raw = format::parse_capsule(&data)?;
    let serialized_config = raw.config_bytes.clone();

    Ok((Store { connector, raw }, serialized_config))
}

/// Write a brand-new serialized capsule at `params["location"]`.
pub fn create(ctx: &Context, params: &StoreParams, bytes: &[u8]) -> Result<()> {
    let location = location_of(params)?;
    let connector = connectors::connector_for(location, &ctx.cwd)?;

    tracing::debug!(scheme = connector.scheme(), location, size = bytes.len(), "creating store");
    connector.save(bytes)
}
