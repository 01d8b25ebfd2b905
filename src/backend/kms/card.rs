use std::cell::OnceCell;
use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};

use smithay::backend::drm::DrmDeviceFd;
use smithay::reexports::drm::control::{
    connector, crtc, encoder, framebuffer, plane, property, Device as ControlDevice, Mode,
    ResourceHandle, ResourceHandles,
};
use smithay::reexports::drm::{ClientCapability, Device as _};
use smithay::utils::DeviceFd;

use super::device::{
    ConnectorDescriptor, CrtcMask, EncoderDescriptor, KmsDevice, PlaneDescriptor,
    PropertyDescriptor, Resources,
};
use super::types::PlaneScanout;

/// An opened DRM device node.
///
/// The file descriptor is closed when the last clone of the inner [`DrmDeviceFd`] goes away, which
/// for a `Card` owned by a display is when the display is dropped.
pub struct Card {
    fd: DrmDeviceFd,
    path: PathBuf,
    resources: OnceCell<ResourceHandles>,
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Card").field("path", &self.path).finish()
    }
}

impl Card {
    pub fn open(path: &Path) -> io::Result<Self> {
        debug!("opening {path:?}");

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let fd = DrmDeviceFd::new(DeviceFd::from(OwnedFd::from(file)));

        Ok(Self {
            fd,
            path: path.to_owned(),
            resources: OnceCell::new(),
        })
    }

    fn resource_handles(&self) -> io::Result<&ResourceHandles> {
        if let Some(res) = self.resources.get() {
            return Ok(res);
        }

        let res = self.fd.resource_handles()?;
        Ok(self.resources.get_or_init(|| res))
    }
}

/// A plane with its possible CRTCs resolved against the card's CRTC list.
#[derive(Debug)]
pub struct CardPlane {
    info: plane::Info,
    possible_crtcs: CrtcMask,
}

/// Mask with bit `i` set for every CRTC in `allowed` that sits at index `i` of `crtcs`.
fn mask_from_allowed(crtcs: &[crtc::Handle], allowed: &[crtc::Handle]) -> CrtcMask {
    crtcs
        .iter()
        .enumerate()
        .filter(|(_, crtc)| allowed.contains(crtc))
        .fold(CrtcMask::default(), |mask, (idx, _)| mask.with_index(idx))
}

impl KmsDevice for Card {
    type Connector = connector::Info;
    type Encoder = encoder::Info;
    type Plane = CardPlane;
    type Property = property::Info;

    fn set_client_capability(&self, cap: ClientCapability, enable: bool) -> io::Result<()> {
        self.fd.set_client_capability(cap, enable)
    }

    fn resources(&self) -> io::Result<Resources> {
        let res = self.resource_handles()?;
        Ok(Resources {
            connectors: res.connectors().to_vec(),
            crtcs: res.crtcs().to_vec(),
        })
    }

    fn connector(&self, handle: connector::Handle) -> io::Result<Self::Connector> {
        self.fd.get_connector(handle, true)
    }

    fn encoder(&self, handle: encoder::Handle) -> io::Result<Self::Encoder> {
        self.fd.get_encoder(handle)
    }

    fn plane_handles(&self) -> io::Result<Vec<plane::Handle>> {
        self.fd.plane_handles()
    }

    fn plane(&self, handle: plane::Handle) -> io::Result<Self::Plane> {
        let info = self.fd.get_plane(handle)?;

        // The kernel reports possible CRTCs as a bitmask over the resource CRTC list.
        let res = self.resource_handles()?;
        let allowed = res.filter_crtcs(info.possible_crtcs());
        let possible_crtcs = mask_from_allowed(res.crtcs(), &allowed);

        Ok(CardPlane {
            info,
            possible_crtcs,
        })
    }

    fn object_properties<H: ResourceHandle>(
        &self,
        object: H,
    ) -> io::Result<Vec<(property::Handle, property::RawValue)>> {
        let props = self.fd.get_properties(object)?;
        Ok(props.into_iter().collect())
    }

    fn property(&self, handle: property::Handle) -> io::Result<Self::Property> {
        self.fd.get_property(handle)
    }

    fn framebuffer_size(&self, handle: framebuffer::Handle) -> io::Result<(u32, u32)> {
        let info = self.fd.get_framebuffer(handle)?;
        Ok(info.size())
    }

    fn set_plane(&self, scanout: &PlaneScanout) -> io::Result<()> {
        let dst = scanout.dst;
        self.fd.set_plane(
            scanout.plane,
            scanout.crtc,
            Some(scanout.framebuffer),
            0,
            (dst.x, dst.y, dst.width, dst.height),
            scanout.src,
        )
    }
}

impl ConnectorDescriptor for connector::Info {
    fn handle(&self) -> connector::Handle {
        connector::Info::handle(self)
    }

    fn interface(&self) -> connector::Interface {
        connector::Info::interface(self)
    }

    fn interface_id(&self) -> u32 {
        connector::Info::interface_id(self)
    }

    fn state(&self) -> connector::State {
        connector::Info::state(self)
    }

    fn modes(&self) -> &[Mode] {
        connector::Info::modes(self)
    }

    fn current_encoder(&self) -> Option<encoder::Handle> {
        connector::Info::current_encoder(self)
    }
}

impl EncoderDescriptor for encoder::Info {
    fn handle(&self) -> encoder::Handle {
        encoder::Info::handle(self)
    }

    fn crtc(&self) -> Option<crtc::Handle> {
        encoder::Info::crtc(self)
    }
}

impl PlaneDescriptor for CardPlane {
    fn handle(&self) -> plane::Handle {
        self.info.handle()
    }

    fn possible_crtcs(&self) -> CrtcMask {
        self.possible_crtcs
    }
}

impl PropertyDescriptor for property::Info {
    fn handle(&self) -> property::Handle {
        property::Info::handle(self)
    }

    fn name(&self) -> Option<&str> {
        property::Info::name(self).to_str().ok()
    }
}
