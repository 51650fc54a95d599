//! AR.Drone UDP client
//!
//! AT commands go to the drone's command port on a fixed tick. Navdata comes
//! back on a second socket once the drone has been woken up.

use super::at::{AtCommand, ControlState};
use super::navdata::Navdata;
use crate::vehicle::{FlightStateNotification, VehicleCommand, VehicleControl};
use anyhow::{Context, Result};
use gamepad_shared::{Animation, Movement};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Datagram that asks the drone to start streaming navdata to the sender
const WAKE_PACKET: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// Connection settings for one drone
#[derive(Debug, Clone)]
pub struct ArDroneConfig {
    pub address: String,
    pub at_port: u16,
    pub navdata_port: u16,
    /// Period between AT datagrams
    pub command_interval: Duration,
    /// Silence after which the drone is woken again
    pub navdata_timeout: Duration,
}

impl Default for ArDroneConfig {
    fn default() -> Self {
        Self {
            address: "192.168.1.1".into(),
            at_port: 5556,
            navdata_port: 5554,
            command_interval: Duration::from_millis(30),
            navdata_timeout: Duration::from_secs(1),
        }
    }
}

/// Messages consumed by the control loop
#[derive(Debug)]
enum Outbound {
    Command(VehicleCommand),
    Raw(AtCommand),
}

/// Handle to a running drone connection
///
/// Dropping the client stops both background loops.
pub struct ArDroneClient {
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    flight_state_tx: broadcast::Sender<FlightStateNotification>,
    control_task: JoinHandle<()>,
    navdata_task: JoinHandle<()>,
}

impl ArDroneClient {
    /// Open both sockets and start the control and navdata loops
    pub async fn connect(config: ArDroneConfig) -> Result<Self> {
        let at_socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("binding AT socket")?;
        at_socket
            .connect((config.address.as_str(), config.at_port))
            .await
            .with_context(|| format!("connecting to {}:{}", config.address, config.at_port))?;

        let navdata_socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("binding navdata socket")?;
        navdata_socket
            .connect((config.address.as_str(), config.navdata_port))
            .await
            .with_context(|| {
                format!("connecting to {}:{}", config.address, config.navdata_port)
            })?;

        info!(
            "AR.Drone client for {} (AT port {}, navdata port {})",
            config.address, config.at_port, config.navdata_port
        );

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (flight_state_tx, _) = broadcast::channel(64);

        let control_task = tokio::spawn(control_loop(
            at_socket,
            outbound_rx,
            config.command_interval,
        ));
        let navdata_task = tokio::spawn(navdata_loop(
            navdata_socket,
            outbound_tx.clone(),
            flight_state_tx.clone(),
            config.navdata_timeout,
        ));

        Ok(Self {
            outbound_tx,
            flight_state_tx,
            control_task,
            navdata_task,
        })
    }

    fn send(&self, command: VehicleCommand) {
        if self.outbound_tx.send(Outbound::Command(command)).is_err() {
            warn!("AR.Drone control loop has stopped; command dropped");
        }
    }

    fn send_move(&self, movement: Movement, speed: f64) {
        self.send(VehicleCommand::Move { movement, speed });
    }
}

impl Drop for ArDroneClient {
    fn drop(&mut self) {
        self.control_task.abort();
        self.navdata_task.abort();
    }
}

impl VehicleControl for ArDroneClient {
    fn stop(&self) {
        self.send(VehicleCommand::Stop);
    }

    fn takeoff(&self) {
        self.send(VehicleCommand::Takeoff);
    }

    fn land(&self) {
        self.send(VehicleCommand::Land);
    }

    fn disable_emergency(&self) {
        self.send(VehicleCommand::DisableEmergency);
    }

    fn animate(&self, animation: Animation, duration: Option<f64>) {
        self.send(VehicleCommand::Animate {
            animation,
            duration,
        });
    }

    fn left(&self, speed: f64) {
        self.send_move(Movement::Left, speed);
    }

    fn right(&self, speed: f64) {
        self.send_move(Movement::Right, speed);
    }

    fn front(&self, speed: f64) {
        self.send_move(Movement::Front, speed);
    }

    fn back(&self, speed: f64) {
        self.send_move(Movement::Back, speed);
    }

    fn up(&self, speed: f64) {
        self.send_move(Movement::Up, speed);
    }

    fn down(&self, speed: f64) {
        self.send_move(Movement::Down, speed);
    }

    fn clockwise(&self, speed: f64) {
        self.send_move(Movement::Clockwise, speed);
    }

    fn counter_clockwise(&self, speed: f64) {
        self.send_move(Movement::CounterClockwise, speed);
    }

    fn subscribe_flight_state(&self) -> broadcast::Receiver<FlightStateNotification> {
        self.flight_state_tx.subscribe()
    }
}

/// Fold commands into the control state and flush it every tick
async fn control_loop(
    socket: UdpSocket,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    period: Duration,
) {
    let mut state = ControlState::new();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut send_failing = false;

    loop {
        tokio::select! {
            message = outbound_rx.recv() => match message {
                Some(Outbound::Command(command)) => {
                    debug!("AR.Drone <- {:?}", command);
                    state.apply(&command);
                }
                Some(Outbound::Raw(command)) => state.queue(command),
                None => break,
            },
            _ = ticker.tick() => {
                let datagram = state.flush();
                match socket.send(datagram.as_bytes()).await {
                    Ok(_) if send_failing => {
                        info!("AT commands reaching the drone again");
                        send_failing = false;
                    }
                    Ok(_) => {}
                    Err(e) if !send_failing => {
                        warn!("Failed to send AT commands: {}", e);
                        send_failing = true;
                    }
                    Err(_) => {}
                }
            }
        }
    }

    info!("AR.Drone control loop stopped");
}

/// Receive navdata, keep the drone streaming, and publish flight state
async fn navdata_loop(
    socket: UdpSocket,
    outbound_tx: mpsc::UnboundedSender<Outbound>,
    flight_state_tx: broadcast::Sender<FlightStateNotification>,
    navdata_timeout: Duration,
) {
    let mut buf = vec![0u8; 4096];
    let mut last_sequence: Option<u32> = None;

    wake(&socket).await;

    loop {
        let received = match timeout(navdata_timeout, socket.recv(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                // nothing listening yet; back off before waking again
                debug!("Navdata receive error: {}", e);
                tokio::time::sleep(navdata_timeout).await;
                wake(&socket).await;
                continue;
            }
            Err(_) => {
                debug!("No navdata for {:?}, waking drone", navdata_timeout);
                last_sequence = None;
                wake(&socket).await;
                continue;
            }
        };

        let navdata = match Navdata::parse(&buf[..received]) {
            Ok(navdata) => navdata,
            Err(e) => {
                warn!("Discarding navdata packet: {}", e);
                continue;
            }
        };

        if let Some(last) = last_sequence {
            if navdata.sequence <= last {
                debug!(
                    "Dropping out-of-order navdata {} (last {})",
                    navdata.sequence, last
                );
                continue;
            }
        }
        last_sequence = Some(navdata.sequence);

        if let Some(demo) = &navdata.demo {
            trace!(
                "Navdata {}: control={:#x} theta={} phi={} psi={} v={:?} vision={}",
                navdata.sequence,
                demo.control_state,
                demo.theta,
                demo.phi,
                demo.psi,
                demo.velocity,
                navdata.vision_defined
            );
        }

        if navdata.state.navdata_bootstrap() {
            let _ = outbound_tx.send(Outbound::Raw(AtCommand::navdata_demo()));
        }
        if navdata.state.com_watchdog() {
            let _ = outbound_tx.send(Outbound::Raw(AtCommand::ComWdg));
        }

        // no subscribers is fine
        let _ = flight_state_tx.send(FlightStateNotification::from(&navdata));
    }
}

async fn wake(socket: &UdpSocket) {
    if let Err(e) = socket.send(&WAKE_PACKET).await {
        debug!("Failed to send navdata wake packet: {}", e);
    }
}
