//! Client for the Peplink appliance management API.

pub mod api;
pub mod client;
pub mod error;
pub mod model;

pub use api::{ClientWeight, PeplinkApi, PeplinkApiRef, UsagePeriod};
pub use client::{ClientSetupError, PeplinkClient};
pub use error::ApiError;
