//! Primary plane selection and scanout.

use std::io;

use smithay::reexports::drm::control::{crtc, framebuffer, plane, PlaneType};

use super::device::{KmsDevice, PlaneDescriptor};
use super::property::plane_type;
use super::types::{PlaneScanout, ScanoutRect};

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("error getting DRM resources")]
    ResourceQueryFailed(#[source] io::Error),
    #[error("{0:?} is not one of the device's CRTCs")]
    CrtcNotFound(crtc::Handle),
    #[error("cannot find a primary plane for {framebuffer:?} (errno {errno:?})")]
    NoPrimaryPlane {
        framebuffer: framebuffer::Handle,
        /// OS error of the last plane that failed to fetch, if any.
        errno: Option<i32>,
    },
    #[error("error setting {plane:?} on {crtc:?} to {framebuffer:?}")]
    ScanoutFailed {
        plane: plane::Handle,
        crtc: crtc::Handle,
        framebuffer: framebuffer::Handle,
        #[source]
        source: io::Error,
    },
}

/// Find the first primary plane that can be attached to `crtc`.
///
/// `framebuffer` is only used to describe the failure.
pub fn select_primary_plane<D: KmsDevice>(
    device: &D,
    crtc: crtc::Handle,
    framebuffer: framebuffer::Handle,
) -> Result<plane::Handle, BindError> {
    let resources = device
        .resources()
        .map_err(BindError::ResourceQueryFailed)?;
    let crtc_idx = resources
        .crtc_index(crtc)
        .ok_or(BindError::CrtcNotFound(crtc))?;

    let planes = device
        .plane_handles()
        .map_err(BindError::ResourceQueryFailed)?;

    let mut errno = None;
    let mut primary = None;

    for &handle in &planes {
        let plane = match device.plane(handle) {
            Ok(plane) => plane,
            Err(err) => {
                warn!("error getting plane {handle:?}: {err:?}");
                errno = err.raw_os_error();
                continue;
            }
        };

        if !plane.possible_crtcs().contains_index(crtc_idx) {
            trace!("{handle:?} cannot be used with {crtc:?}");
            continue;
        }

        let ty = plane_type(device, handle);
        if ty == PlaneType::Primary {
            primary = Some(handle);
            break;
        }

        trace!("skipping {ty:?} plane {handle:?}");
    }

    trace!("plane ids: {planes:?}");

    let Some(plane) = primary else {
        warn!("cannot find a primary plane for {framebuffer:?} on {crtc:?}");
        return Err(BindError::NoPrimaryPlane { framebuffer, errno });
    };

    debug!("picked primary plane {plane:?} for {crtc:?}");
    Ok(plane)
}

/// Point `plane` at `framebuffer` on `crtc`.
///
/// The whole framebuffer is scanned out into `dst`. If the framebuffer's size can't be queried,
/// it is assumed to be the size of `dst`.
pub fn scanout<D: KmsDevice>(
    device: &D,
    plane: plane::Handle,
    crtc: crtc::Handle,
    framebuffer: framebuffer::Handle,
    dst: ScanoutRect,
) -> Result<(), BindError> {
    let (width, height) = match device.framebuffer_size(framebuffer) {
        Ok(size) => size,
        Err(err) => {
            debug!("error getting size of {framebuffer:?}, assuming {dst:?}: {err:?}");
            (dst.width, dst.height)
        }
    };

    // 16.16 fixed point, which caps the source at 65535 pixels per side.
    const MAX_SRC: u32 = 0xffff;
    if width > MAX_SRC || height > MAX_SRC {
        debug!(
            "{framebuffer:?} is {width}x{height}, \
             scanning out only its top-left {MAX_SRC}x{MAX_SRC} at most"
        );
    }
    let src = (0, 0, width.min(MAX_SRC) << 16, height.min(MAX_SRC) << 16);

    let request = PlaneScanout {
        plane,
        crtc,
        framebuffer,
        dst,
        src,
    };

    device
        .set_plane(&request)
        .map_err(|source| BindError::ScanoutFailed {
            plane,
            crtc,
            framebuffer,
            source,
        })?;

    debug!("scanning out {framebuffer:?} on {plane:?}");
    Ok(())
}

/// Select the primary plane for `crtc` and scan `framebuffer` out on it.
pub fn bind_primary_plane<D: KmsDevice>(
    device: &D,
    crtc: crtc::Handle,
    framebuffer: framebuffer::Handle,
    dst: ScanoutRect,
) -> Result<plane::Handle, BindError> {
    let plane = select_primary_plane(device, crtc, framebuffer)?;
    scanout(device, plane, crtc, framebuffer, dst)?;
    Ok(plane)
}

/// A plane as seen from one CRTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneSummary {
    pub handle: plane::Handle,
    pub ty: PlaneType,
    pub usable: bool,
}

/// All planes of the device, with their type and whether they can be attached to `crtc`.
///
/// Planes that fail to fetch are left out.
pub fn describe_planes<D: KmsDevice>(
    device: &D,
    crtc: crtc::Handle,
) -> Result<Vec<PlaneSummary>, BindError> {
    let resources = device
        .resources()
        .map_err(BindError::ResourceQueryFailed)?;
    let crtc_idx = resources
        .crtc_index(crtc)
        .ok_or(BindError::CrtcNotFound(crtc))?;

    let planes = device
        .plane_handles()
        .map_err(BindError::ResourceQueryFailed)?;

    let summaries = planes
        .into_iter()
        .filter_map(|handle| {
            let plane = device
                .plane(handle)
                .map_err(|err| warn!("error getting plane {handle:?}: {err:?}"))
                .ok()?;

            Some(PlaneSummary {
                handle,
                ty: plane_type(device, handle),
                usable: plane.possible_crtcs().contains_index(crtc_idx),
            })
        })
        .collect();

    Ok(summaries)
}
