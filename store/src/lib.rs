pub mod alerts;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod mqtt;
pub mod rest;
pub mod store;
pub mod validate;

pub use alerts::{Alert, AlertKind, AlertSettings};
pub use errors::{Error, Result};
pub use model::{DeviceDetail, DeviceState, DeviceStatus, Reading};
pub use store::DeviceStore;
