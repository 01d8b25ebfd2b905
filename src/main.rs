#[macro_use]
extern crate tracing;

use std::{env, thread};

use anyhow::Context;
use clap::Parser;
use kms_scanout::backend::kms::{describe_planes, discover, DiscoveryOptions};
use kms_scanout::cli::{
    apply_device_override, default_config_path, format_probe, load_config, Cli, Sub,
};
use kms_scanout::display::{initialize, StandaloneHost};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "kms_scanout=debug";

fn main() -> anyhow::Result<()> {
    let directives = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_owned());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();

    let default_path = default_config_path();
    let config = load_config(cli.config.as_deref(), default_path.as_deref())
        .and_then(|mut config| {
            apply_device_override(&mut config, cli.device)?;
            Ok(config)
        })
        // Render the diagnostic now; anyhow would only keep the top-level message.
        .map_err(|err| anyhow::anyhow!("{err:?}"))?;

    match cli.subcommand {
        Sub::Present { framebuffer, hold } => {
            let mut host = StandaloneHost::new(Some(framebuffer));
            let kms_display =
                initialize(&mut host, &config).context("error initializing the KMS display")?;

            info!(
                "presenting {framebuffer:?} on {} via {:?}",
                kms_display.topology().connector_name,
                kms_display.pipe().primary_plane
            );
            debug!("registered display listeners: {:?}", host.listener_names());

            if hold {
                loop {
                    thread::park();
                }
            }
        }
        Sub::Probe => {
            let path = config.device.path();
            let (card, topology) = discover(path, &DiscoveryOptions::from(&config))
                .with_context(|| format!("error probing {path:?}"))?;
            let planes =
                describe_planes(&card, topology.crtc).context("error listing planes")?;

            print!("{}", format_probe(&topology, &planes));
        }
    }

    Ok(())
}
