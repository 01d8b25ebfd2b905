//! Display front-end: glues topology discovery and plane binding to the host display layer.
//!
//! The host owns display listeners and decides which framebuffer backs the primary plane. This
//! module registers a passive listener, asks the host for that framebuffer, and scans it out on
//! the discovered output. Failures are returned to the host, which picks the exit policy.

use kms_scanout_config::Config;
use smithay::reexports::drm::control::framebuffer;

use crate::backend::kms::{
    discover_topology, open_device, scanout, select_primary_plane, BindError, Card,
    DiscoveryError, DiscoveryOptions, DisplayPipe, KmsDevice, ScanoutRect, Topology,
};

mod listener;
mod standalone;


pub use listener::{DisplayListener, KmsListener};
pub use standalone::StandaloneHost;

/// The host display layer.
pub trait DisplayHost {
    type ListenerId: Copy + std::fmt::Debug;

    fn register_listener(&mut self, listener: Box<dyn DisplayListener>) -> Self::ListenerId;
    fn unregister_listener(&mut self, id: Self::ListenerId);

    /// Framebuffer the host rendered the listener's primary plane contents into.
    fn primary_plane_framebuffer(&mut self, id: Self::ListenerId) -> Option<framebuffer::Handle>;
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("the host has no primary plane framebuffer for the display")]
    NoFramebuffer,
    #[error(transparent)]
    Bind(#[from] BindError),
}

/// A display driven on one KMS output.
///
/// Owns the device; dropping the display closes it.
#[derive(Debug)]
pub struct KmsDisplay<D, L> {
    device: D,
    topology: Topology,
    pipe: DisplayPipe,
    dst: ScanoutRect,
    listener: L,
}

/// Open the configured device and bring the display up on it.
pub fn initialize<H: DisplayHost>(
    host: &mut H,
    config: &Config,
) -> Result<KmsDisplay<Card, H::ListenerId>, InitError> {
    let card = open_device(config.device.path())?;
    initialize_with(card, host, config)
}

/// Bring the display up on an already opened device.
pub fn initialize_with<D: KmsDevice, H: DisplayHost>(
    device: D,
    host: &mut H,
    config: &Config,
) -> Result<KmsDisplay<D, H::ListenerId>, InitError> {
    let topology = discover_topology(&device, &DiscoveryOptions::from(config))?;
    let dst = ScanoutRect::for_output(&topology, &config.output);

    let listener = host.register_listener(Box::new(KmsListener));
    debug!("registered display listener {listener:?}");

    let Some(framebuffer) = host.primary_plane_framebuffer(listener) else {
        host.unregister_listener(listener);
        return Err(InitError::NoFramebuffer);
    };

    let mut display = KmsDisplay {
        device,
        topology,
        pipe: DisplayPipe::default(),
        dst,
        listener,
    };

    if let Err(err) = display.present(framebuffer) {
        host.unregister_listener(listener);
        return Err(err.into());
    }

    Ok(display)
}

impl<D: KmsDevice, L: Copy> KmsDisplay<D, L> {
    /// Scan `framebuffer` out on the display's primary plane.
    ///
    /// The plane is picked on the first call and reused afterwards.
    pub fn present(&mut self, framebuffer: framebuffer::Handle) -> Result<(), BindError> {
        let crtc = self.topology.crtc;
        self.pipe.primary_framebuffer = Some(framebuffer);

        let plane = match self.pipe.primary_plane {
            Some(plane) => plane,
            None => select_primary_plane(&self.device, crtc, framebuffer)?,
        };

        scanout(&self.device, plane, crtc, framebuffer, self.dst)?;

        self.pipe.primary_plane = Some(plane);
        self.pipe.crtc = Some(crtc);
        Ok(())
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn pipe(&self) -> &DisplayPipe {
        &self.pipe
    }

    pub fn destination(&self) -> ScanoutRect {
        self.dst
    }

    pub fn listener(&self) -> L {
        self.listener
    }
}
