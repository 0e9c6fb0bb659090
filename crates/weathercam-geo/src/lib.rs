//! Last-known location lookup for weathercam.
//!
//! A capture cycle asks a [`LocationProvider`] for the most recent fix it
//! knows about. Lookups fail open: any error becomes "no location".

pub mod location;
pub mod types;

pub use location::{from_config, FixedLocation, HttpLocationProvider, LocationProvider, NoLocation};
pub use types::*;
