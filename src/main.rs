//! statik - A static site generator for Markdown and Handlebars sites.

mod build;
mod cli;
mod config;
mod content;
mod logger;
mod reload;
mod serve;
mod template;
mod watch;

use anyhow::Result;
use build::{BuildOptions, BuildOrchestrator};
use clap::Parser;
use cli::{Cli, Commands};
use config::{ConfigHandle, SiteConfig};
use parking_lot::Mutex;
use reload::LiveReload;
use serve::serve_site;
use std::{path::PathBuf, sync::Arc, thread};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let mut config = load_config(&cli)?;
    let options = BuildOptions {
        dev_server: cli.is_serve(),
        live_reload: cli.is_serve() && config.serve.watch,
    };

    // Bind first so `baseUrl` carries the port actually in use.
    let bound = if cli.is_serve() {
        let (server, addr) = serve::bind(&config.serve)?;
        config.use_bound_port(addr.port());
        Some((server, addr))
    } else {
        None
    };

    let handle = ConfigHandle::new(config);
    let mut orchestrator = BuildOrchestrator::new(handle.clone(), options);
    orchestrator.build_full()?;

    let Some((server, addr)) = bound else {
        return Ok(());
    };

    let output = orchestrator.layout().output.clone();
    let reload = LiveReload::new();

    if handle.load().serve.watch {
        spawn_watcher(orchestrator, handle, reload.clone());
    }

    serve_site(server, addr, output, reload)
}

/// Load the config and apply `serve` command overrides.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let mut config = SiteConfig::load(&cli.root, &cli.config)?;

    if let Commands::Serve { interface, port, watch } = &cli.command {
        if let Some(interface) = interface {
            config.serve.interface.clone_from(interface);
        }
        if let Some(port) = port {
            config.serve.port = *port;
        }
        if let Some(watch) = watch {
            config.serve.watch = *watch;
        }
    }

    Ok(config)
}

/// Rebuild on every debounced batch of changes.
///
/// The browser only reloads when the batch wrote something. A full rebuild
/// tells the watcher to pick up a possibly changed layout.
fn spawn_watcher(orchestrator: BuildOrchestrator, handle: ConfigHandle, reload: LiveReload) {
    let orchestrator = Arc::new(Mutex::new(orchestrator));

    thread::spawn(move || {
        let rebuild = move |paths: Vec<PathBuf>| {
            let mut orchestrator = orchestrator.lock();
            match orchestrator.build_incremental(&paths) {
                Ok(report) => {
                    if report.wrote_output() {
                        reload.mark_rebuilt();
                    }
                    report.full
                }
                Err(err) => {
                    log!("error"; "rebuild failed: {err:#}");
                    false
                }
            }
        };

        if let Err(err) = watch::watch_site(handle, rebuild) {
            log!("watch"; "{err:#}");
        }
    });
}
