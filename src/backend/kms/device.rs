//! The slice of the mode-setting ioctl interface the backend relies on.
//!
//! Every fetch returns an owned descriptor. Dropping a descriptor releases it, so a descriptor
//! never outlives the call that fetched it unless it is explicitly handed back to the caller.

use std::io;

use smithay::reexports::drm::control::{
    connector, crtc, encoder, framebuffer, plane, property, Mode, ResourceHandle,
};
use smithay::reexports::drm::ClientCapability;

use super::types::PlaneScanout;

pub trait ConnectorDescriptor {
    fn handle(&self) -> connector::Handle;
    fn interface(&self) -> connector::Interface;
    fn interface_id(&self) -> u32;
    fn state(&self) -> connector::State;
    fn modes(&self) -> &[Mode];
    fn current_encoder(&self) -> Option<encoder::Handle>;

    /// Name in the usual `HDMI-A-1` form.
    fn name(&self) -> String {
        format!("{}-{}", self.interface().as_str(), self.interface_id())
    }
}

pub trait EncoderDescriptor {
    fn handle(&self) -> encoder::Handle;
    fn crtc(&self) -> Option<crtc::Handle>;
}

pub trait PlaneDescriptor {
    fn handle(&self) -> plane::Handle;
    /// CRTCs this plane can be attached to, as indices into [`Resources::crtcs`].
    fn possible_crtcs(&self) -> CrtcMask;
}

pub trait PropertyDescriptor {
    fn handle(&self) -> property::Handle;
    /// `None` if the kernel-provided name is not valid UTF-8.
    fn name(&self) -> Option<&str>;
}

/// Bitmask over the device's global CRTC list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrtcMask(u32);

impl CrtcMask {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn contains_index(self, index: usize) -> bool {
        index < u32::BITS as usize && self.0 & (1 << index) != 0
    }

    pub fn with_index(self, index: usize) -> Self {
        if index < u32::BITS as usize {
            Self(self.0 | 1 << index)
        } else {
            self
        }
    }
}

/// Global card resources.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resources {
    pub connectors: Vec<connector::Handle>,
    pub crtcs: Vec<crtc::Handle>,
}

impl Resources {
    /// Position of `crtc` in the global CRTC list, which is what plane CRTC masks refer to.
    pub fn crtc_index(&self, crtc: crtc::Handle) -> Option<usize> {
        self.crtcs.iter().position(|c| *c == crtc)
    }
}

/// A mode-setting device.
///
/// Calls are blocking and not reentrant; a device must only be driven from one place at a time.
pub trait KmsDevice {
    type Connector: ConnectorDescriptor;
    type Encoder: EncoderDescriptor;
    type Plane: PlaneDescriptor;
    type Property: PropertyDescriptor;

    fn set_client_capability(&self, cap: ClientCapability, enable: bool) -> io::Result<()>;

    fn resources(&self) -> io::Result<Resources>;
    fn connector(&self, handle: connector::Handle) -> io::Result<Self::Connector>;
    fn encoder(&self, handle: encoder::Handle) -> io::Result<Self::Encoder>;

    fn plane_handles(&self) -> io::Result<Vec<plane::Handle>>;
    fn plane(&self, handle: plane::Handle) -> io::Result<Self::Plane>;

    /// Property handles and current values of any mode-setting object.
    fn object_properties<H: ResourceHandle>(
        &self,
        object: H,
    ) -> io::Result<Vec<(property::Handle, property::RawValue)>>;
    fn property(&self, handle: property::Handle) -> io::Result<Self::Property>;

    fn framebuffer_size(&self, handle: framebuffer::Handle) -> io::Result<(u32, u32)>;

    /// Legacy set-plane. Reprograms live hardware, there is no rollback on failure.
    fn set_plane(&self, scanout: &PlaneScanout) -> io::Result<()>;
}

impl<D: KmsDevice> KmsDevice for &D {
    type Connector = D::Connector;
    type Encoder = D::Encoder;
    type Plane = D::Plane;
    type Property = D::Property;

    fn set_client_capability(&self, cap: ClientCapability, enable: bool) -> io::Result<()> {
        (**self).set_client_capability(cap, enable)
    }

    fn resources(&self) -> io::Result<Resources> {
        (**self).resources()
    }

    fn connector(&self, handle: connector::Handle) -> io::Result<Self::Connector> {
        (**self).connector(handle)
    }

    fn encoder(&self, handle: encoder::Handle) -> io::Result<Self::Encoder> {
        (**self).encoder(handle)
    }

    fn plane_handles(&self) -> io::Result<Vec<plane::Handle>> {
        (**self).plane_handles()
    }

    fn plane(&self, handle: plane::Handle) -> io::Result<Self::Plane> {
        (**self).plane(handle)
    }

    fn object_properties<H: ResourceHandle>(
        &self,
        object: H,
    ) -> io::Result<Vec<(property::Handle, property::RawValue)>> {
        (**self).object_properties(object)
    }

    fn property(&self, handle: property::Handle) -> io::Result<Self::Property> {
        (**self).property(handle)
    }

    fn framebuffer_size(&self, handle: framebuffer::Handle) -> io::Result<(u32, u32)> {
        (**self).framebuffer_size(handle)
    }

    fn set_plane(&self, scanout: &PlaneScanout) -> io::Result<()> {
        (**self).set_plane(scanout)
    }
}
