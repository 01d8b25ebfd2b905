//! Configuration for the KMS scanout layer.
//!
//! The config is a KDL document; every node is optional:
//!
//! ```kdl
//! device "/dev/dri/card0" {
//!     skip-atomic-cap
//! }
//!
//! output {
//!     mode "1920x1200@60"
//!     position x=0 y=0
//!     size 1920 1200
//! }
//! ```

use std::ffi::OsStr;
use std::path::Path;

use miette::{Context, IntoDiagnostic};
use tracing::debug;

pub mod device;
pub mod output;

pub use crate::device::{Device, DEFAULT_DEVICE_PATH};
pub use crate::output::{ConfiguredMode, Output, Position, Size};

#[derive(knuffel::Decode, Debug, Default, Clone, PartialEq)]
pub struct Config {
    #[knuffel(child, default)]
    pub device: Device,
    #[knuffel(child, default)]
    pub output: Output,
}

impl Config {
    pub fn load(path: &Path) -> miette::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("error reading {path:?}"))?;

        let filename = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("config.kdl");

        let config = Self::parse(filename, &contents).context("error parsing")?;
        debug!("loaded config from {path:?}");
        Ok(config)
    }

    pub fn parse(filename: &str, text: &str) -> Result<Self, knuffel::Error> {
        knuffel::parse(filename, text)
    }
}
