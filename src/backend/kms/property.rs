//! Object property lookup.

use std::fmt;

use smithay::reexports::drm::control::{plane, property, PlaneType, ResourceHandle};

use super::device::{KmsDevice, PropertyDescriptor};

/// A property found on an object, together with its owned descriptor.
#[derive(Debug)]
pub struct PropertyMatch<P> {
    pub handle: property::Handle,
    pub value: property::RawValue,
    pub info: P,
}

/// Find a property by exact name and hand its descriptor to the caller.
///
/// Descriptors of non-matching properties are released before the next one is fetched. A failure
/// to list the object's properties is treated as the property not existing.
pub fn find_property_info<D, H>(
    device: &D,
    object: H,
    name: &str,
) -> Option<PropertyMatch<D::Property>>
where
    D: KmsDevice,
    H: ResourceHandle + fmt::Debug,
{
    let props = match device.object_properties(object) {
        Ok(props) => props,
        Err(err) => {
            warn!("error getting properties of {object:?}: {err:?}");
            return None;
        }
    };

    props.into_iter().find_map(|(handle, value)| {
        let info = match device.property(handle) {
            Ok(info) => info,
            Err(err) => {
                trace!("error getting property {handle:?}: {err:?}");
                return None;
            }
        };

        (info.name() == Some(name)).then_some(PropertyMatch {
            handle,
            value,
            info,
        })
    })
}

/// Find a property by exact name, returning its handle and current value.
pub fn find_property_value<D, H>(
    device: &D,
    object: H,
    name: &str,
) -> Option<(property::Handle, property::RawValue)>
where
    D: KmsDevice,
    H: ResourceHandle + fmt::Debug,
{
    find_property_info(device, object, name).map(|found| (found.handle, found.value))
}

/// Plane type from the `type` property; planes without one count as overlays.
pub fn plane_type<D: KmsDevice>(device: &D, plane: plane::Handle) -> PlaneType {
    let Some((_, value)) = find_property_value(device, plane, "type") else {
        debug!("couldn't find plane type property on {plane:?}");
        return PlaneType::Overlay;
    };

    match value {
        v if v == PlaneType::Primary as u64 => PlaneType::Primary,
        v if v == PlaneType::Cursor as u64 => PlaneType::Cursor,
        v if v == PlaneType::Overlay as u64 => PlaneType::Overlay,
        v => {
            debug!("unknown plane type {v} on {plane:?}");
            PlaneType::Overlay
        }
    }
}
