use std::path::PathBuf;

use anyhow::{Context as _, anyhow};
use clap::{Parser, Subcommand};
use log::{error, info};
use tokio::sync::watch;

use labtrack_gateway::bus::{self, BusTransport};
use labtrack_gateway::config::AppConfig;
use labtrack_gateway::device::DeviceRegistry;
use labtrack_gateway::manager::Gateway;
use labtrack_gateway::notifier::{DiscordWebhook, NotificationRouter};
use labtrack_gateway::sink::{JsonLinesSink, LogSink, SinkSet};
use labtrack_gateway::status::Command;

#[derive(Parser, Debug)]
#[command(version, about = "Polls lab equipment trackers on the I2C bus and reports state changes")]
struct Cli {
    /// Configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Poll devices until interrupted (default)
    Run,
    /// Load and validate the configuration, then print the device list
    CheckConfig,
    /// Read status, tag and remaining timer from one device
    Inspect { device_id: String },
    /// Tell one device to silence its alarm
    StopAlarm { device_id: String },
}

fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string());
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let registry = DeviceRegistry::from_config(&config)?;

    match cli.command.unwrap_or(Cmd::Run) {
        Cmd::Run => run(config, registry).await,
        Cmd::CheckConfig => {
            println!("Configuration OK, {} device(s):", registry.len());
            for device in registry.iter() {
                println!("  {}", device);
            }
            Ok(())
        }
        Cmd::Inspect { device_id } => inspect(&config, &registry, &device_id),
        Cmd::StopAlarm { device_id } => stop_alarm(&config, &registry, &device_id),
    }
}

async fn run(config: AppConfig, registry: DeviceRegistry) -> anyhow::Result<()> {
    for device in registry.iter() {
        info!("Device: {}", device);
    }

    let bus = bus::open_linux(config.bus_device())?;

    let sinks = SinkSet::new()
        .with(LogSink)
        .with(JsonLinesSink::open(config.events_path())?);

    let mut router = NotificationRouter::new();
    if let Some(url) = config.discord_webhook() {
        router = router.with_channel(DiscordWebhook::new(
            url,
            config.notify_timeout(),
            config.user_agent(),
        )?);
    }
    if router.channel_count() == 0 {
        info!("No notification channel configured");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                let _ = shutdown_tx.send(true);
            }
            // Polling continues; only an operator interrupt stops the gateway.
            Err(err) => error!("Error listening for interrupt: {:?}", err),
        }
    });

    let mut gateway = Gateway::new(registry, bus, sinks, router, config.poll_interval());
    gateway.run_loop(shutdown_rx).await;

    Ok(())
}

fn inspect(
    config: &AppConfig,
    registry: &DeviceRegistry,
    device_id: &str,
) -> anyhow::Result<()> {
    let device = registry
        .get(device_id)
        .ok_or_else(|| anyhow!("unknown device '{}'", device_id))?;
    let mut bus = bus::open_linux(config.bus_device())?;

    let status = bus.read_status(device.address)?;
    let tag = bus.read_tag_id(device.address)?;
    let timer_left = bus.read_timer_left(device.address)?;
    bus.close();

    println!("{}", device);
    println!("  status:     {}", status);
    println!("  tag:        {}", tag);
    println!("  timer left: {}s", timer_left);
    Ok(())
}

fn stop_alarm(
    config: &AppConfig,
    registry: &DeviceRegistry,
    device_id: &str,
) -> anyhow::Result<()> {
    let device = registry
        .get(device_id)
        .ok_or_else(|| anyhow!("unknown device '{}'", device_id))?;
    let mut bus = bus::open_linux(config.bus_device())?;

    bus.write_command(device.address, Command::StopAlarm)?;
    bus.close();

    info!("Stop-alarm sent to {} (0x{:02X})", device.id, device.address);
    Ok(())
}
