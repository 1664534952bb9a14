use clap::Parser;
use hue_temperature_delta::config::{Config, default_cache_path, default_config_path};
use hue_temperature_delta::host::AccessoryCache;
use hue_temperature_delta::hue::{HueClient, HueSession};
use hue_temperature_delta::platform::DeltaPlatform;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

/// Virtual temperature delta sensors for a Philips Hue bridge.
#[derive(Parser, Debug)]
#[command(name = "hue-temperature-delta", version, about)]
struct Args {
    /// Configuration file (JSON)
    #[arg(short, long, env = "DELTA_CONFIG")]
    config: Option<PathBuf>,

    /// Accessory cache file
    #[arg(long, env = "DELTA_CACHE")]
    cache: Option<PathBuf>,

    /// Print the bridge's temperature sensors and exit
    #[arg(long)]
    list_sensors: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    init_logger();
    let args = Args::parse();

    let Some(config_path) = args.config.or_else(default_config_path) else {
        error!("No configuration file given and no default config directory available");
        std::process::exit(1);
    };
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration from {:?}: {}", config_path, e);
            std::process::exit(1);
        }
    };

    info!("Starting Hue temperature delta");
    info!("  Bridge: {}", config.hue.host);
    info!("  Deltas: {}", config.deltas.len());
    info!("  Interval: {} ms", config.interval);

    let client = match HueClient::new(&config.hue) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create Hue client: {}", e);
            std::process::exit(1);
        }
    };
    let session = Arc::new(HueSession::new(Arc::new(client)));

    if args.list_sensors {
        list_sensors(&session).await;
        return;
    }

    let cache = match args.cache.or_else(default_cache_path) {
        Some(path) => AccessoryCache::load(path),
        None => {
            warn!("No data directory available; accessories will not survive a restart");
            AccessoryCache::in_memory()
        }
    };

    let mut platform = DeltaPlatform::new(config, session, Arc::new(cache.clone()));
    let shutdown = platform.shutdown_token();

    tokio::select! {
        result = platform.start() => match result {
            Ok(report) => info!(
                "Hue temperature delta is running with {} delta sensor(s)",
                report.active()
            ),
            Err(e) => error!("Startup failed, no delta sensors are active: {}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal during startup");
            shutdown.cancel();
        }
    }

    if !shutdown.is_cancelled() {
        info!("  - Press Ctrl+C to exit");
        match signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    }

    platform.shutdown().await;

    for device in platform.devices() {
        if let Some(delta) = cache.read_value(&device.persistent_id) {
            info!(
                "  {}: {:.2}°C",
                device.display_name,
                delta as f32 / 100.0
            );
        }
    }
    if let Err(e) = cache.save() {
        error!("Failed to save accessory cache: {}", e);
    }

    info!("Hue temperature delta stopped");
}

/// Diagnostic listing used when writing the configuration.
async fn list_sensors(session: &HueSession) {
    let gateway = match session.ready().await {
        Ok(gateway) => gateway,
        Err(e) => {
            error!("Cannot reach the bridge: {}", e);
            std::process::exit(1);
        }
    };

    match gateway.fetch_all().await {
        Ok(sensors) => {
            for sensor in sensors.iter().filter(|sensor| sensor.kind.is_temperature()) {
                let temperature = sensor
                    .temperature
                    .map(|t| format!("{:.2}°C", t as f32 / 100.0))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>4}  {:<32} {:<40} {}",
                    sensor.id.as_str(),
                    sensor.name,
                    sensor.unique_id.as_deref().unwrap_or("-"),
                    temperature
                );
            }
        }
        Err(e) => {
            error!("Failed to list sensors: {}", e);
            std::process::exit(1);
        }
    }
}
