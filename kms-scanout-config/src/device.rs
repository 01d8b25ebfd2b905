use std::path::{Path, PathBuf};

/// Device node opened when the config names none.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/dri/card0";

#[derive(knuffel::Decode, Debug, Default, Clone, PartialEq, Eq)]
pub struct Device {
    #[knuffel(argument)]
    pub path: Option<PathBuf>,
    /// Don't ask the kernel for the atomic client capability.
    #[knuffel(child)]
    pub skip_atomic_cap: bool,
}

impl Device {
    pub fn path(&self) -> &Path {
        self.path
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_DEVICE_PATH))
    }
}
