use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use kms_scanout_config::Config;
use miette::miette;
use smithay::reexports::drm::control::{self, framebuffer, RawResourceHandle};

use crate::backend::kms::{PlaneSummary, Topology};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(subcommand_value_name = "SUBCOMMAND")]
#[command(subcommand_help_heading = "Subcommands")]
pub struct Cli {
    /// Path to config file (default: `$XDG_CONFIG_HOME/kms-scanout/config.kdl`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// DRM device to use instead of the one from the config.
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    #[command(subcommand)]
    pub subcommand: Sub,
}

#[derive(Subcommand)]
pub enum Sub {
    /// Scan a framebuffer out on the primary plane of the first connected output.
    Present {
        /// Id of a framebuffer already registered with the device.
        #[arg(short, long, value_parser = parse_framebuffer)]
        framebuffer: framebuffer::Handle,
        /// Keep the device open, and the framebuffer on screen, until killed.
        #[arg(long)]
        hold: bool,
    },
    /// Print the discovered output and the device's planes.
    Probe,
}

fn parse_framebuffer(s: &str) -> Result<framebuffer::Handle, String> {
    let id: u32 = s.parse().map_err(|err| format!("invalid framebuffer id: {err}"))?;
    control::from_u32(id).ok_or_else(|| String::from("framebuffer id must be non-zero"))
}

/// `$XDG_CONFIG_HOME/kms-scanout/config.kdl` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "kms-scanout")?;
    Some(dirs.config_dir().join("config.kdl"))
}

/// Load the config named on the command line, else the default one.
///
/// An explicitly given file must load. A missing default file means the default config.
pub fn load_config(explicit: Option<&Path>, default: Option<&Path>) -> miette::Result<Config> {
    let path = match (explicit, default) {
        (Some(path), _) => path,
        (None, Some(path)) if path.exists() => path,
        _ => {
            debug!("no config file, using defaults");
            return Ok(Config::default());
        }
    };

    Config::load(path)
}

/// Apply the command-line device override and check the result.
pub fn apply_device_override(config: &mut Config, device: Option<PathBuf>) -> miette::Result<()> {
    if let Some(device) = device {
        config.device.path = Some(device);
    }

    if config.device.path().as_os_str().is_empty() {
        return Err(miette!("device path is empty"));
    }
    Ok(())
}

fn id<T: Into<RawResourceHandle>>(handle: T) -> u32 {
    handle.into().get()
}

/// Human-readable summary of the discovered output and its planes.
pub fn format_probe(topology: &Topology, planes: &[PlaneSummary]) -> String {
    let mut out = String::new();
    let (width, height) = topology.size();

    let _ = writeln!(
        out,
        "connector {} (id {}) on CRTC {}",
        topology.connector_name,
        id(topology.connector),
        id(topology.crtc)
    );
    let _ = writeln!(out, "mode {width}x{height}@{}", topology.mode.vrefresh());
    let _ = writeln!(out, "planes:");

    for plane in planes {
        let ty = format!("{:?}", plane.ty).to_lowercase();
        let usable = if plane.usable { "usable" } else { "-" };
        let _ = writeln!(out, "  {:<4} {ty:<8} {usable}", id(plane.handle));
    }

    out
}
