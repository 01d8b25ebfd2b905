//! Kernel mode-setting backend.
//!
//! The backend is split leaf-first:
//! - `property` - object property lookup shared by everything below
//! - `topology` - picks the connector and CRTC to drive
//! - `plane` - picks the primary plane for that CRTC and scans a framebuffer out on it
//!
//! All of it is written against the [`KmsDevice`] trait; [`Card`] is the implementation backed
//! by an opened DRM device node.

mod card;
mod device;
mod plane;
mod property;
mod topology;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use card::{Card, CardPlane};
pub use device::{
    ConnectorDescriptor, CrtcMask, EncoderDescriptor, KmsDevice, PlaneDescriptor,
    PropertyDescriptor, Resources,
};
pub use plane::{
    bind_primary_plane, describe_planes, scanout, select_primary_plane, BindError, PlaneSummary,
};
pub use property::{find_property_info, find_property_value, plane_type, PropertyMatch};
pub use topology::{discover, discover_topology, open_device, DiscoveryError};
pub use types::{DiscoveryOptions, DisplayPipe, PlaneScanout, ScanoutRect, Topology};

/// Plane classification as reported by the `type` plane property.
pub use smithay::reexports::drm::control::PlaneType;
