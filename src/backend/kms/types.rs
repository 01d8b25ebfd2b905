//! Records produced and consumed by the KMS backend.

use kms_scanout_config::{Config, ConfiguredMode, Output};
use smithay::reexports::drm::control::{connector, crtc, framebuffer, plane, Mode};

/// The output path picked by topology discovery.
///
/// Only exists for a successful discovery, so the handles are always valid (non-zero) ids.
#[derive(Debug, Clone)]
pub struct Topology {
    pub crtc: crtc::Handle,
    pub connector: connector::Handle,
    pub connector_name: String,
    pub mode: Mode,
}

impl Topology {
    pub fn size(&self) -> (u32, u32) {
        let (w, h) = self.mode.size();
        (u32::from(w), u32::from(h))
    }
}

/// Knobs for topology discovery.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DiscoveryOptions {
    pub skip_atomic_cap: bool,
    pub mode: Option<ConfiguredMode>,
}

impl From<&Config> for DiscoveryOptions {
    fn from(config: &Config) -> Self {
        Self {
            skip_atomic_cap: config.device.skip_atomic_cap,
            mode: config.output.mode,
        }
    }
}

/// Destination rectangle on the CRTC, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanoutRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl ScanoutRect {
    /// Full-mode rectangle, with the position and size overrides from `output` applied.
    pub fn for_output(topology: &Topology, output: &Output) -> Self {
        let (width, height) = output
            .size
            .map(|size| (size.width, size.height))
            .unwrap_or_else(|| topology.size());
        let position = output.position.unwrap_or_default();

        Self {
            x: position.x,
            y: position.y,
            width,
            height,
        }
    }
}

/// One set-plane request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneScanout {
    pub plane: plane::Handle,
    pub crtc: crtc::Handle,
    pub framebuffer: framebuffer::Handle,
    pub dst: ScanoutRect,
    /// Source rectangle in 16.16 fixed point.
    pub src: (u32, u32, u32, u32),
}

/// Framebuffers and planes assigned to the display.
///
/// The cursor fields are never filled in; only the primary plane is driven.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPipe {
    pub primary_framebuffer: Option<framebuffer::Handle>,
    pub cursor_framebuffer: Option<framebuffer::Handle>,
    pub primary_plane: Option<plane::Handle>,
    pub cursor_plane: Option<plane::Handle>,
    pub crtc: Option<crtc::Handle>,
}
