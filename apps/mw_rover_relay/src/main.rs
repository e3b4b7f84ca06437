//! MWRover relay: serves the browser client and forwards its servo targets
//! to the Maestro controller on the serial line.
//!
//! ```sh
//! mw-rover-relay --device /dev/ttyACM0 --static-root /srv/mwrover
//! mw-rover-relay --config relay.json --gpio -v
//! mw-rover-relay --dry-run          # no controller attached
//! ```

mod config;
mod dry_run;
mod form;
mod http;
mod server;

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, error, info, warn};
use mw_maestro_bridge::{Dispatcher, SerialTransport};
use mw_pinctrl_gpio::GpioBank;

use crate::config::RelayConfig;
use crate::dry_run::DryRunPort;
use crate::http::Relay;

#[cfg(target_os = "linux")]
type HostWindow = mw_linux_resources::PhysMemWindow;

/// No pin-control block off Linux; the bank can never be opened.
#[cfg(not(target_os = "linux"))]
enum HostWindow {}

#[cfg(not(target_os = "linux"))]
impl mw_pinctrl_gpio::RegisterWindow for HostWindow {
    fn read(&self, _offset: usize) -> u32 {
        match *self {}
    }

    fn write(&mut self, _offset: usize, _value: u32) {
        match *self {}
    }
}

#[derive(Parser)]
#[command(name = "mw-rover-relay", version, about = "Relay browser servo commands to a Maestro controller")]
struct Cli {
    /// JSON configuration file; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device of the controller.
    #[arg(long)]
    device: Option<String>,

    #[arg(long)]
    baud: Option<u32>,

    /// Listen address, e.g. 0.0.0.0:8080.
    #[arg(long)]
    bind: Option<String>,

    /// Directory holding MWRover.* and www/.
    #[arg(long)]
    static_root: Option<PathBuf>,

    /// Map the pin-control GPIO bank and serve /gpio/.
    #[arg(long)]
    gpio: bool,

    #[arg(long)]
    mem_device: Option<PathBuf>,

    /// Log frames instead of opening the serial device.
    #[arg(long)]
    dry_run: bool,

    /// Write the effective configuration to this file and exit.
    #[arg(long, value_name = "FILE")]
    write_config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Warn,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }

    fn apply(&self, config: &mut RelayConfig) {
        if let Some(device) = &self.device {
            config.serial.device = device.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud = baud;
        }
        if let Some(bind) = &self.bind {
            config.http.bind = bind.clone();
        }
        if let Some(root) = &self.static_root {
            config.http.static_root = root.clone();
        }
        if self.gpio {
            config.gpio.enabled = true;
        }
        if let Some(mem) = &self.mem_device {
            config.gpio.mem_device = mem.clone();
        }
    }
}

fn init_logging(level: LevelFilter) {
    let config = simplelog::ConfigBuilder::new()
        .set_thread_level(LevelFilter::Debug)
        .build();
    if simplelog::TermLogger::init(
        level,
        config.clone(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
    .is_err()
    {
        // no terminal, e.g. under a service manager
        let _ = simplelog::SimpleLogger::init(level, config);
    }
}

/// Context for failures that the host's setup can fix: opening the serial
/// device, mapping the GPIO window, binding the listener.
#[derive(Debug)]
struct SetupStep(String);

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn needs_setup_help(e: &anyhow::Error) -> bool {
    e.downcast_ref::<SetupStep>().is_some()
}

fn print_setup_help(config: &RelayConfig) {
    eprintln!();
    eprintln!("Check that:");
    eprintln!("  - the Maestro is plugged in and shows up as {}", config.serial.device);
    eprintln!("  - your user may open it (usually: sudo usermod -aG dialout $USER, then log in again)");
    eprintln!("  - the controller is in USB dual port mode");
    eprintln!("  - {} is free, or pass --bind", config.http.bind);
    if config.gpio.enabled {
        eprintln!("  - {} is readable and writable (GPIO needs root)", config.gpio.mem_device.display());
    }
    eprintln!("Use --dry-run to try the relay without a controller.");
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.level());

    let mut config = match &cli.config {
        Some(path) => match RelayConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                std::process::exit(2);
            }
        },
        None => RelayConfig::default(),
    };
    cli.apply(&mut config);

    if let Err(e) = run(&cli, &config) {
        error!("{e:#}");
        if needs_setup_help(&e) {
            print_setup_help(&config);
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli, config: &RelayConfig) -> Result<()> {
    if let Some(path) = &cli.write_config {
        config.save(path)?;
        info!("configuration written to {}", path.display());
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
            .context("cannot install the signal handler")?;
    }

    if cli.dry_run {
        warn!("dry run: frames are logged, nothing is sent");
        let transport = SerialTransport::new("dry-run", DryRunPort);
        serve_with(config, transport, &shutdown)
    } else {
        let transport = SerialTransport::open(&config.serial)
            .with_context(|| SetupStep(format!("cannot reach the servo controller on {}", config.serial.device)))?;
        serve_with(config, transport, &shutdown)
    }
}

fn serve_with<W: Write + Send + 'static>(
    config: &RelayConfig,
    transport: SerialTransport<W>,
    shutdown: &AtomicBool,
) -> Result<()> {
    let dispatcher = Dispatcher::new(transport, config.pulse);
    let range = dispatcher.range();
    info!("servo targets accepted in {}..={} µs", range.min_us(), range.max_us());

    let gpio = if config.gpio.enabled {
        Some(open_gpio(config).with_context(|| {
            SetupStep(format!("cannot map GPIO through {}", config.gpio.mem_device.display()))
        })?)
    } else {
        None
    };

    let addr = config.bind_addr()?;
    let listener = server::bind(addr).with_context(|| SetupStep(format!("cannot listen on {addr}")))?;

    let relay = Arc::new(Relay::new(dispatcher, gpio, &config.http.static_root));
    info!(
        "relaying to {}{}",
        relay.dispatcher().transport().name(),
        if relay.gpio().is_some() { ", GPIO bank mapped" } else { "" }
    );
    server::serve(listener, Arc::clone(&relay), shutdown).context("server stopped")?;

    match Arc::into_inner(relay) {
        Some(relay) => relay.shutdown(),
        None => warn!("relay still shared at exit, leaving cleanup to drop"),
    }
    info!("bye");
    Ok(())
}

#[cfg(target_os = "linux")]
fn open_gpio(config: &RelayConfig) -> Result<GpioBank<HostWindow>> {
    Ok(GpioBank::open(&config.gpio.mem_device)?)
}

#[cfg(not(target_os = "linux"))]
fn open_gpio(_config: &RelayConfig) -> Result<GpioBank<HostWindow>> {
    anyhow::bail!("the pin-control GPIO bank is only reachable on Linux")
}
