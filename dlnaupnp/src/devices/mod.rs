//! # Module Devices
//!
//! Description statique d'un device UPnP et de ses services : identité,
//! URLs, types de notification SSDP et document `device.xml`.

mod device_info;
mod errors;
mod service_info;

pub use device_info::{DESCRIPTION_PATH, DeviceInfo, device_type_urn};
pub use errors::DeviceError;
pub use service_info::ServiceInfo;
