use smithay::reexports::drm::control::framebuffer;

use super::{DisplayHost, DisplayListener};

/// Host for running without a display layer around us.
///
/// The framebuffer to present is known up front, e.g. from the command line.
pub struct StandaloneHost {
    framebuffer: Option<framebuffer::Handle>,
    listeners: Vec<Option<Box<dyn DisplayListener>>>,
}

impl StandaloneHost {
    pub fn new(framebuffer: Option<framebuffer::Handle>) -> Self {
        Self {
            framebuffer,
            listeners: Vec::new(),
        }
    }

    /// Names of the currently registered listeners.
    pub fn listener_names(&self) -> Vec<&str> {
        self.listeners
            .iter()
            .flatten()
            .map(|listener| listener.name())
            .collect()
    }
}

impl DisplayHost for StandaloneHost {
    type ListenerId = usize;

    fn register_listener(&mut self, listener: Box<dyn DisplayListener>) -> usize {
        debug!("registering display listener {}", listener.name());
        self.listeners.push(Some(listener));
        self.listeners.len() - 1
    }

    fn unregister_listener(&mut self, id: usize) {
        match self.listeners.get_mut(id).and_then(Option::take) {
            Some(listener) => debug!("unregistered display listener {}", listener.name()),
            None => warn!("unregistering unknown display listener {id}"),
        }
    }

    fn primary_plane_framebuffer(&mut self, id: usize) -> Option<framebuffer::Handle> {
        if !matches!(self.listeners.get(id), Some(Some(_))) {
            return None;
        }

        self.framebuffer
    }
}
