//! Picking the output path: the first connected connector with a mode and an encoder bound to a
//! CRTC.

use std::io;
use std::path::{Path, PathBuf};

use kms_scanout_config::ConfiguredMode;
use smithay::reexports::drm::control::{connector, Mode, ModeFlags, ModeTypeFlags};
use smithay::reexports::drm::ClientCapability;

use super::card::Card;
use super::device::{ConnectorDescriptor, EncoderDescriptor, KmsDevice};
use super::types::{DiscoveryOptions, Topology};

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("error opening DRM device {path:?}")]
    DeviceOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("error getting DRM resources")]
    ResourceQueryFailed(#[source] io::Error),
    #[error("no connected connector with a mode and an encoder")]
    NoEligibleConnector,
    #[error("the encoder of connector {connector} is not bound to a CRTC")]
    EncoderMissingCrtc { connector: String },
}

/// Open the device node at `path` read/write.
pub fn open_device(path: &Path) -> Result<Card, DiscoveryError> {
    Card::open(path).map_err(|source| DiscoveryError::DeviceOpenFailed {
        path: path.to_owned(),
        source,
    })
}

/// Open the device at `path` and discover its topology.
///
/// The returned card owns the device file descriptor.
pub fn discover(path: &Path, options: &DiscoveryOptions) -> Result<(Card, Topology), DiscoveryError> {
    let card = open_device(path)?;
    let topology = discover_topology(&card, options)?;
    Ok((card, topology))
}

pub fn discover_topology<D: KmsDevice>(
    device: &D,
    options: &DiscoveryOptions,
) -> Result<Topology, DiscoveryError> {
    request_client_caps(device, options);

    let resources = device
        .resources()
        .map_err(DiscoveryError::ResourceQueryFailed)?;

    // Connector whose encoder lacked a CRTC, reported if nothing else qualifies.
    let mut missing_crtc = None;

    for (idx, &handle) in resources.connectors.iter().enumerate() {
        let conn = match device.connector(handle) {
            Ok(conn) => conn,
            Err(err) => {
                warn!("error getting connector {idx}:{handle:?}: {err:?}");
                continue;
            }
        };
        let name = conn.name();

        if conn.state() != connector::State::Connected {
            debug!("ignoring unused connector {name}");
            continue;
        }

        let Some(mode) = pick_mode(conn.modes(), options.mode) else {
            debug!("no valid mode for connector {name}");
            continue;
        };

        let Some(enc) = conn.current_encoder() else {
            debug!("connector {name} has no encoder");
            continue;
        };

        let enc = match device.encoder(enc) {
            Ok(enc) => enc,
            Err(err) => {
                warn!("error getting encoder {enc:?} of connector {name}: {err:?}");
                continue;
            }
        };

        let Some(crtc) = enc.crtc() else {
            debug!("encoder {:?} of connector {name} has no CRTC", enc.handle());
            missing_crtc.get_or_insert(name);
            continue;
        };

        info!(
            "using connector {name} on {crtc:?} with mode {}x{}@{}",
            mode.size().0,
            mode.size().1,
            mode.vrefresh()
        );

        return Ok(Topology {
            crtc,
            connector: conn.handle(),
            connector_name: name,
            mode,
        });
    }

    Err(match missing_crtc {
        Some(connector) => DiscoveryError::EncoderMissingCrtc { connector },
        None => DiscoveryError::NoEligibleConnector,
    })
}

fn request_client_caps<D: KmsDevice>(device: &D, options: &DiscoveryOptions) {
    if !options.skip_atomic_cap {
        match device.set_client_capability(ClientCapability::Atomic, true) {
            Ok(()) => return,
            Err(err) => debug!("error enabling atomic modesetting: {err:?}"),
        }
    }

    // Primary planes are only listed with universal planes enabled, which atomic implies.
    if let Err(err) = device.set_client_capability(ClientCapability::UniversalPlanes, true) {
        warn!("error enabling universal planes: {err:?}");
    }
}

/// Refresh rate of a mode in mHz.
pub(super) fn refresh_mhz(mode: &Mode) -> i64 {
    let clock = i64::from(mode.clock());
    let htotal = i64::from(mode.hsync().2);
    let vtotal = i64::from(mode.vsync().2);
    if htotal == 0 || vtotal == 0 {
        return 0;
    }

    let mut refresh = (clock * 1_000_000 / htotal + vtotal / 2) / vtotal;

    if mode.flags().contains(ModeFlags::INTERLACE) {
        refresh *= 2;
    }
    if mode.flags().contains(ModeFlags::DBLSCAN) {
        refresh /= 2;
    }
    if mode.vscan() > 1 {
        refresh /= i64::from(mode.vscan());
    }

    refresh
}

/// Pick the mode to drive a connector with.
///
/// A configured mode wins if the connector has it, otherwise the fastest preferred mode, otherwise
/// the first one.
pub(super) fn pick_mode(modes: &[Mode], target: Option<ConfiguredMode>) -> Option<Mode> {
    let mut mode: Option<&Mode> = None;

    if let Some(target) = target {
        let refresh = target.refresh.map(|r| (r * 1000.).round() as i64);
        for m in modes {
            if m.size() != (target.width, target.height) {
                continue;
            }

            // Interlaced modes don't appear to work.
            if m.flags().contains(ModeFlags::INTERLACE) {
                continue;
            }

            if let Some(refresh) = refresh {
                // Pick the closest refresh rate, within 1 Hz of the requested one.
                let diff = (refresh_mhz(m) - refresh).abs();
                if diff > 1000 {
                    continue;
                }
                if mode.map_or(true, |curr| diff < (refresh_mhz(curr) - refresh).abs()) {
                    mode = Some(m);
                }
            } else if let Some(curr) = mode {
                // If refresh isn't set, pick the mode with the highest refresh.
                if curr.vrefresh() < m.vrefresh() {
                    mode = Some(m);
                }
            } else {
                mode = Some(m);
            }
        }

        if mode.is_none() {
            warn!(
                "configured mode {}x{} not found, falling back to a preferred mode",
                target.width, target.height
            );
        }
    }

    if mode.is_none() {
        for m in modes {
            if !m.mode_type().contains(ModeTypeFlags::PREFERRED) {
                continue;
            }

            if let Some(curr) = mode {
                if curr.vrefresh() < m.vrefresh() {
                    mode = Some(m);
                }
            } else {
                mode = Some(m);
            }
        }
    }

    if mode.is_none() {
        mode = modes.first();
    }

    mode.copied()
}
