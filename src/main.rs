mod ardrone;
mod assets;
mod command;
mod config;
mod transport;
mod vehicle;

use anyhow::{Context, Result};
use ardrone::ArDroneClient;
use config::RelayConfig;
use gamepad_shared::CommandCatalog;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use transport::ControlHub;
use vehicle::{DroneStateReport, FlightStateNotification, VehicleControl};

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = RelayConfig::from_env().context("loading configuration")?;

    info!("Gamepad relay starting");
    info!("  HTTP: {}", config.http_bind);
    info!("  Control: {}", config.control_bind);
    info!("  Assets: {}", config.asset_dir.display());

    let catalog = Arc::new(
        CommandCatalog::standard()
            .without(&config.disabled_commands)
            .context("applying GAMEPAD_DISABLED_COMMANDS")?,
    );
    if !config.disabled_commands.is_empty() {
        info!("  Disabled commands: {}", config.disabled_commands.join(", "));
    }

    let vehicle: Arc<dyn VehicleControl> =
        Arc::new(ArDroneClient::connect(config.ardrone.clone()).await?);

    // Log flight-state transitions
    let flight_state_rx = vehicle.subscribe_flight_state();
    tokio::spawn(async move {
        log_flight_state(flight_state_rx).await;
    });

    // Native input devices
    let control_listener = TcpListener::bind(config.control_bind)
        .await
        .with_context(|| format!("binding control listener on {}", config.control_bind))?;
    let tcp_vehicle = vehicle.clone();
    let tcp_catalog = catalog.clone();
    tokio::spawn(async move {
        if let Err(e) = transport::tcp::serve(control_listener, tcp_vehicle, tcp_catalog).await {
            error!("Control listener failed: {}", e);
        }
    });

    // Browser input devices; unknown paths get the test page
    let test_page = config.asset_dir.join("gamepad-test.html");
    let app = transport::websocket::router(ControlHub { vehicle, catalog })
        .fallback(move || assets::serve_asset(test_page.clone()));
    let app = assets::with_assets(app, config.asset_dir.clone());

    let http_listener = TcpListener::bind(config.http_bind)
        .await
        .with_context(|| format!("binding HTTP listener on {}", config.http_bind))?;
    info!("Open http://{}/ with a gamepad attached", config.http_bind);

    axum::serve(http_listener, app)
        .await
        .context("HTTP server stopped")?;

    Ok(())
}

/// Log changes in the drone's reported flags
async fn log_flight_state(mut rx: broadcast::Receiver<FlightStateNotification>) {
    let mut last = DroneStateReport::default();

    loop {
        let notification = match rx.recv().await {
            Ok(notification) => notification,
            Err(RecvError::Lagged(skipped)) => {
                debug!("Flight-state log skipped {} notifications", skipped);
                continue;
            }
            Err(RecvError::Closed) => {
                warn!("[Drone] Flight-state feed closed");
                break;
            }
        };

        let state = notification.drone_state;
        if state.flying != last.flying {
            info!("[Drone] Flying: {:?}", state.flying);
        }
        if state.emergency == Some(true) && last.emergency != Some(true) {
            warn!("[Drone] Emergency state");
        }
        if state.low_battery == Some(true) && last.low_battery != Some(true) {
            warn!(
                "[Drone] Low battery ({}%)",
                notification
                    .battery_percent
                    .map_or_else(|| "?".to_string(), |p| p.to_string())
            );
        }
        last = state;
    }
}
