//! Control dispatcher - validates control events and issues vehicle commands

use super::classifier::{classify, Classification};
use crate::transport::ControlEventSource;
use crate::vehicle::{FlightStateNotification, VehicleCommand, VehicleControl};
use gamepad_shared::{limits, Action, CommandCatalog, ControlEvent, Movement};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Diagnostics reported while handling a control event
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("invalid action {0}")]
    InvalidAction(String),

    #[error("invalid animation {}", .0.as_deref().unwrap_or("<none>"))]
    InvalidAnimation(Option<String>),

    #[error("out of bound value {0}")]
    OutOfBound(f64),

    #[error("undefined flying-state, not sending command")]
    UndefinedFlyingState,
}

/// Outcome of a single control event
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    /// Command issued as requested
    Sent(VehicleCommand),
    /// Speed exceeded the upper bound; command issued with the clamped speed
    Clamped {
        command: VehicleCommand,
        requested: f64,
    },
    /// Event dropped, the vehicle was not called
    Rejected(DispatchError),
}

impl DispatchResult {
    /// The command issued to the vehicle, if any
    pub fn command(&self) -> Option<&VehicleCommand> {
        match self {
            DispatchResult::Sent(command) | DispatchResult::Clamped { command, .. } => {
                Some(command)
            }
            DispatchResult::Rejected(_) => None,
        }
    }
}

enum Step {
    Control(Option<ControlEvent>),
    FlightState(Result<FlightStateNotification, RecvError>),
}

/// Turns control events from one input device into vehicle commands
pub struct ControlDispatcher {
    vehicle: Arc<dyn VehicleControl>,
    catalog: Arc<CommandCatalog>,
    /// Last reported flying flag; `None` until a notification carries one
    flying: Option<bool>,
    flight_state_rx: Option<broadcast::Receiver<FlightStateNotification>>,
}

impl ControlDispatcher {
    /// Create a dispatcher and subscribe to the vehicle's flight-state feed
    pub fn new(vehicle: Arc<dyn VehicleControl>, catalog: Arc<CommandCatalog>) -> Self {
        let flight_state_rx = vehicle.subscribe_flight_state();

        Self {
            vehicle,
            catalog,
            flying: None,
            flight_state_rx: Some(flight_state_rx),
        }
    }

    #[cfg(test)]
    pub fn flying(&self) -> Option<bool> {
        self.flying
    }

    /// Replace the cached flying state with the one carried by `notification`
    pub fn on_flight_state(&mut self, notification: &FlightStateNotification) {
        if self.flying != notification.drone_state.flying {
            debug!(
                "Flying state {:?} -> {:?}",
                self.flying, notification.drone_state.flying
            );
        }
        self.flying = notification.drone_state.flying;
    }

    /// Handle one control event, calling the vehicle at most once
    ///
    /// Diagnostics are logged here; nothing is propagated to the caller's error path.
    pub fn on_control_event(&mut self, event: &ControlEvent) -> DispatchResult {
        let result = self.resolve(event);

        match &result {
            DispatchResult::Sent(command) => debug!("Control '{}' -> {:?}", event.action, command),
            DispatchResult::Clamped { requested, .. } => {
                error!("{}", DispatchError::OutOfBound(*requested))
            }
            DispatchResult::Rejected(reason) => error!("{}", reason),
        }
        if let Some(command) = result.command() {
            command.apply(self.vehicle.as_ref());
        }

        result
    }

    fn resolve(&self, event: &ControlEvent) -> DispatchResult {
        match classify(&self.catalog, &event.action) {
            Classification::Invalid => {
                DispatchResult::Rejected(DispatchError::InvalidAction(event.action.clone()))
            }
            Classification::Action(action) => self.resolve_action(action, event),
            Classification::Movement(movement) => resolve_movement(movement, event.speed),
        }
    }

    fn resolve_action(&self, action: Action, event: &ControlEvent) -> DispatchResult {
        let command = match action {
            Action::Animate => {
                let animation = event
                    .animation
                    .as_deref()
                    .and_then(|name| self.catalog.animation(name));

                match animation {
                    Some(animation) => VehicleCommand::Animate {
                        animation,
                        duration: event.duration,
                    },
                    None => {
                        return DispatchResult::Rejected(DispatchError::InvalidAnimation(
                            event.animation.clone(),
                        ))
                    }
                }
            }
            Action::TakeoffOrLand => {
                let (resolved, command) = match self.flying {
                    Some(true) => (Action::Land, VehicleCommand::Land),
                    Some(false) => (Action::Takeoff, VehicleCommand::Takeoff),
                    None => return DispatchResult::Rejected(DispatchError::UndefinedFlyingState),
                };
                // the resolved action must itself be enabled
                if self.catalog.action(resolved.as_str()).is_none() {
                    return DispatchResult::Rejected(DispatchError::InvalidAction(
                        resolved.as_str().into(),
                    ));
                }
                command
            }
            Action::Stop => VehicleCommand::Stop,
            Action::Takeoff => VehicleCommand::Takeoff,
            Action::Land => VehicleCommand::Land,
            Action::DisableEmergency => VehicleCommand::DisableEmergency,
        };

        DispatchResult::Sent(command)
    }

    /// Process events until the control source closes
    ///
    /// Events are handled one at a time. Pending flight-state updates are applied
    /// before a pending control event so `takeoffOrLand` sees the newest state.
    pub async fn run<S: ControlEventSource>(mut self, mut source: S) {
        info!("Dispatcher attached to {} source", source.name());
        let mut flight_state_rx = self.flight_state_rx.take();

        loop {
            let step = match flight_state_rx.as_mut() {
                Some(rx) => tokio::select! {
                    biased;
                    notification = rx.recv() => Step::FlightState(notification),
                    event = source.next_event() => Step::Control(event),
                },
                None => Step::Control(source.next_event().await),
            };

            match step {
                Step::Control(Some(event)) => {
                    self.on_control_event(&event);
                }
                Step::Control(None) => break,
                Step::FlightState(Ok(notification)) => self.on_flight_state(&notification),
                Step::FlightState(Err(RecvError::Lagged(skipped))) => {
                    debug!("Skipped {} stale flight-state notifications", skipped);
                }
                Step::FlightState(Err(RecvError::Closed)) => {
                    warn!("Flight-state feed closed, keeping last known state");
                    flight_state_rx = None;
                }
            }
        }

        info!("Dispatcher detached: {} source closed", source.name());
    }
}

fn resolve_movement(movement: Movement, speed: Option<f64>) -> DispatchResult {
    let speed = speed.unwrap_or(limits::DEFAULT_SPEED);

    // no lower bound: negative speeds pass through
    if speed > limits::MAX_SPEED {
        return DispatchResult::Clamped {
            command: VehicleCommand::Move {
                movement,
                speed: limits::MAX_SPEED,
            },
            requested: speed,
        };
    }

    DispatchResult::Sent(VehicleCommand::Move { movement, speed })
}

/// Attach a new dispatcher to `source` and run it on the runtime
pub fn init<S>(
    vehicle: Arc<dyn VehicleControl>,
    catalog: Arc<CommandCatalog>,
    source: S,
) -> JoinHandle<()>
where
    S: ControlEventSource + 'static,
{
    let dispatcher = ControlDispatcher::new(vehicle, catalog);
    tokio::spawn(dispatcher.run(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::testing::RecordingVehicle;
    use gamepad_shared::Animation;
    use std::io;
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tracing_subscriber::fmt::MakeWriter;

    fn setup() -> (Arc<RecordingVehicle>, ControlDispatcher) {
        let vehicle = Arc::new(RecordingVehicle::new());
        let dispatcher =
            ControlDispatcher::new(vehicle.clone(), Arc::new(CommandCatalog::standard()));
        (vehicle, dispatcher)
    }

    /// Collects formatted log output in memory
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Run `f` with error-level logs captured
    fn capture_errors(f: impl FnOnce()) -> String {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::ERROR)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        logs.contents()
    }

    #[test]
    fn test_movement_passes_speed() {
        let (vehicle, mut dispatcher) = setup();

        for (idx, movement) in Movement::ALL.iter().enumerate() {
            let speed = 1.0 / (idx as f64 + 2.0);
            dispatcher.on_control_event(&ControlEvent::movement(movement.as_str(), speed));

            assert_eq!(
                vehicle.calls().last(),
                Some(&VehicleCommand::Move {
                    movement: *movement,
                    speed
                })
            );
        }

        // bounds are inclusive
        dispatcher.on_control_event(&ControlEvent::movement("up", 0.0));
        dispatcher.on_control_event(&ControlEvent::movement("down", 1.0));
        let calls = vehicle.calls();
        assert_eq!(
            &calls[calls.len() - 2..],
            &[
                VehicleCommand::Move {
                    movement: Movement::Up,
                    speed: 0.0
                },
                VehicleCommand::Move {
                    movement: Movement::Down,
                    speed: 1.0
                },
            ]
        );
    }

    #[test]
    fn test_movement_without_speed_is_full_speed() {
        let (vehicle, mut dispatcher) = setup();

        for movement in Movement::ALL {
            let result = dispatcher.on_control_event(&ControlEvent::action(movement.as_str()));
            assert_eq!(
                result,
                DispatchResult::Sent(VehicleCommand::Move {
                    movement,
                    speed: 1.0
                })
            );
        }
        assert_eq!(vehicle.calls().len(), Movement::ALL.len());
    }

    #[test]
    fn test_out_of_bound_speed_is_clamped() {
        let (vehicle, mut dispatcher) = setup();

        let result = dispatcher.on_control_event(&ControlEvent::movement("left", 500.0));

        assert_eq!(
            result,
            DispatchResult::Clamped {
                command: VehicleCommand::Move {
                    movement: Movement::Left,
                    speed: 1.0
                },
                requested: 500.0,
            }
        );
        assert_eq!(
            DispatchError::OutOfBound(500.0).to_string(),
            "out of bound value 500"
        );
        assert_eq!(
            vehicle.calls(),
            vec![VehicleCommand::Move {
                movement: Movement::Left,
                speed: 1.0
            }]
        );
    }

    #[test]
    fn test_diagnostics_are_logged_as_errors() {
        let (vehicle, mut dispatcher) = setup();

        let logs = capture_errors(|| {
            dispatcher.on_control_event(&ControlEvent::movement("left", 500.0));
            dispatcher.on_control_event(&ControlEvent::action("foo"));
            dispatcher.on_control_event(&ControlEvent::animate("fnordfoo", None));
            dispatcher.on_control_event(&ControlEvent::action("takeoffOrLand"));
        });

        assert!(logs.contains("ERROR"), "{}", logs);
        assert!(logs.contains("out of bound value 500"), "{}", logs);
        assert!(logs.contains("invalid action foo"), "{}", logs);
        assert!(logs.contains("invalid animation fnordfoo"), "{}", logs);
        assert!(
            logs.contains("undefined flying-state, not sending command"),
            "{}",
            logs
        );
        assert_eq!(vehicle.calls().len(), 1);
    }

    #[test]
    fn test_accepted_events_log_no_errors() {
        let (_vehicle, mut dispatcher) = setup();

        let logs = capture_errors(|| {
            dispatcher.on_control_event(&ControlEvent::movement("up", 0.5));
            dispatcher.on_control_event(&ControlEvent::action("stop"));
        });

        assert!(logs.is_empty(), "{}", logs);
    }

    #[test]
    fn test_negative_speed_passes_through() {
        let (vehicle, mut dispatcher) = setup();

        dispatcher.on_control_event(&ControlEvent::movement("front", -0.3));

        assert_eq!(
            vehicle.calls(),
            vec![VehicleCommand::Move {
                movement: Movement::Front,
                speed: -0.3
            }]
        );
    }

    #[test]
    fn test_plain_actions() {
        let (vehicle, mut dispatcher) = setup();

        let expected = [
            ("stop", VehicleCommand::Stop),
            ("takeoff", VehicleCommand::Takeoff),
            ("land", VehicleCommand::Land),
            ("disableEmergency", VehicleCommand::DisableEmergency),
        ];

        for (name, command) in expected {
            vehicle.clear();
            dispatcher.on_control_event(&ControlEvent::action(name));
            assert_eq!(vehicle.calls(), vec![command]);
        }
    }

    #[test]
    fn test_all_animations() {
        let (vehicle, mut dispatcher) = setup();

        for (idx, animation) in Animation::ALL.iter().enumerate() {
            let duration = idx as f64 * 100.0;
            dispatcher.on_control_event(&ControlEvent::animate(animation.as_str(), Some(duration)));

            assert_eq!(
                vehicle.calls().last(),
                Some(&VehicleCommand::Animate {
                    animation: *animation,
                    duration: Some(duration),
                })
            );
        }
        assert_eq!(vehicle.calls().len(), Animation::ALL.len());
    }

    #[test]
    fn test_invalid_animation() {
        let (vehicle, mut dispatcher) = setup();

        let result = dispatcher.on_control_event(&ControlEvent::animate("fnordfoo", None));
        assert_eq!(
            result,
            DispatchResult::Rejected(DispatchError::InvalidAnimation(Some("fnordfoo".into())))
        );
        assert_eq!(
            DispatchError::InvalidAnimation(Some("fnordfoo".into())).to_string(),
            "invalid animation fnordfoo"
        );

        let result = dispatcher.on_control_event(&ControlEvent::action("animate"));
        assert!(matches!(
            result,
            DispatchResult::Rejected(DispatchError::InvalidAnimation(None))
        ));

        assert!(vehicle.calls().is_empty());
    }

    #[test]
    fn test_invalid_action() {
        let (vehicle, mut dispatcher) = setup();

        let result = dispatcher.on_control_event(&ControlEvent::action("foo"));

        assert_eq!(
            result,
            DispatchResult::Rejected(DispatchError::InvalidAction("foo".into()))
        );
        assert_eq!(result.command(), None);
        assert_eq!(
            DispatchError::InvalidAction("foo".into()).to_string(),
            "invalid action foo"
        );
        assert!(vehicle.calls().is_empty());
    }

    #[test]
    fn test_takeoff_or_land_follows_flying_state() {
        let (vehicle, mut dispatcher) = setup();

        dispatcher.on_flight_state(&FlightStateNotification::flying(Some(false)));
        dispatcher.on_control_event(&ControlEvent::action("takeoffOrLand"));

        dispatcher.on_flight_state(&FlightStateNotification::flying(Some(true)));
        dispatcher.on_control_event(&ControlEvent::action("takeoffOrLand"));

        assert_eq!(
            vehicle.calls(),
            vec![VehicleCommand::Takeoff, VehicleCommand::Land]
        );
    }

    #[test]
    fn test_takeoff_or_land_with_unknown_state() {
        let (vehicle, mut dispatcher) = setup();
        assert_eq!(dispatcher.flying(), None);

        let result = dispatcher.on_control_event(&ControlEvent::action("takeoffOrLand"));
        assert_eq!(
            result,
            DispatchResult::Rejected(DispatchError::UndefinedFlyingState)
        );

        // a later notification without the flag forgets the earlier state
        dispatcher.on_flight_state(&FlightStateNotification::flying(Some(true)));
        dispatcher.on_flight_state(&FlightStateNotification::flying(None));
        let result = dispatcher.on_control_event(&ControlEvent::action("takeoffOrLand"));
        assert_eq!(
            result,
            DispatchResult::Rejected(DispatchError::UndefinedFlyingState)
        );
        assert_eq!(
            DispatchError::UndefinedFlyingState.to_string(),
            "undefined flying-state, not sending command"
        );

        assert!(vehicle.calls().is_empty());
    }

    #[test]
    fn test_unknown_state_does_not_block_movement() {
        let (vehicle, mut dispatcher) = setup();

        dispatcher.on_control_event(&ControlEvent::movement("clockwise", 0.5));

        assert_eq!(
            vehicle.calls(),
            vec![VehicleCommand::Move {
                movement: Movement::Clockwise,
                speed: 0.5
            }]
        );
    }

    #[test]
    fn test_reduced_catalog_rejects_disabled_animation() {
        let vehicle = Arc::new(RecordingVehicle::new());
        let catalog = CommandCatalog::standard().without(&["flipAhead"]).unwrap();
        let mut dispatcher = ControlDispatcher::new(vehicle.clone(), Arc::new(catalog));

        let result = dispatcher.on_control_event(&ControlEvent::animate("flipAhead", Some(0.0)));

        assert!(matches!(result, DispatchResult::Rejected(_)));
        assert!(vehicle.calls().is_empty());
    }

    #[test]
    fn test_takeoff_or_land_needs_resolved_action_enabled() {
        let vehicle = Arc::new(RecordingVehicle::new());
        let catalog = CommandCatalog::standard().without(&["takeoff"]).unwrap();
        let mut dispatcher = ControlDispatcher::new(vehicle.clone(), Arc::new(catalog));

        dispatcher.on_flight_state(&FlightStateNotification::flying(Some(false)));
        let result = dispatcher.on_control_event(&ControlEvent::action("takeoffOrLand"));
        assert_eq!(
            result,
            DispatchResult::Rejected(DispatchError::InvalidAction("takeoff".into()))
        );
        assert!(vehicle.calls().is_empty());

        // landing is still enabled
        dispatcher.on_flight_state(&FlightStateNotification::flying(Some(true)));
        dispatcher.on_control_event(&ControlEvent::action("takeoffOrLand"));
        assert_eq!(vehicle.calls(), vec![VehicleCommand::Land]);
    }

    #[tokio::test]
    async fn test_run_keeps_last_state_after_feed_closes() {
        let (vehicle, dispatcher) = setup();
        let (tx, rx) = mpsc::channel(8);

        vehicle.report_flying(Some(true));
        vehicle.close_flight_state();
        tx.send(ControlEvent::action("takeoffOrLand")).await.unwrap();
        tx.send(ControlEvent::movement("left", 0.5)).await.unwrap();
        drop(tx);

        dispatcher.run(rx).await;

        assert_eq!(
            vehicle.calls(),
            vec![
                VehicleCommand::Land,
                VehicleCommand::Move {
                    movement: Movement::Left,
                    speed: 0.5
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_run_skips_to_newest_state_when_lagging() {
        let (vehicle, dispatcher) = setup();
        let (tx, rx) = mpsc::channel(8);

        // more notifications than the feed holds; the oldest are dropped
        for _ in 0..17 {
            vehicle.report_flying(Some(false));
        }
        vehicle.report_flying(Some(true));
        tx.send(ControlEvent::action("takeoffOrLand")).await.unwrap();
        drop(tx);

        dispatcher.run(rx).await;

        assert_eq!(vehicle.calls(), vec![VehicleCommand::Land]);
    }

    #[tokio::test]
    async fn test_run_applies_queued_flight_state_first() {
        let (vehicle, dispatcher) = setup();
        let (tx, rx) = mpsc::channel(8);

        vehicle.report_flying(Some(false));
        tx.send(ControlEvent::action("takeoffOrLand")).await.unwrap();
        tx.send(ControlEvent::action("bogus")).await.unwrap();
        tx.send(ControlEvent::movement("back", 0.4)).await.unwrap();
        drop(tx);

        dispatcher.run(rx).await;

        assert_eq!(
            vehicle.calls(),
            vec![
                VehicleCommand::Takeoff,
                VehicleCommand::Move {
                    movement: Movement::Back,
                    speed: 0.4
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_dispatchers_keep_independent_state() {
        let vehicle = Arc::new(RecordingVehicle::new());
        let catalog = Arc::new(CommandCatalog::standard());

        let (first_tx, first_rx) = mpsc::channel(8);
        let (second_tx, second_rx) = mpsc::channel(8);

        let first = ControlDispatcher::new(vehicle.clone(), catalog.clone());
        vehicle.report_flying(Some(true));
        // subscribed after the notification, so it never sees it
        let second = ControlDispatcher::new(vehicle.clone(), catalog);

        first_tx.send(ControlEvent::action("takeoffOrLand")).await.unwrap();
        second_tx.send(ControlEvent::action("takeoffOrLand")).await.unwrap();
        drop(first_tx);
        drop(second_tx);

        first.run(first_rx).await;
        second.run(second_rx).await;

        assert_eq!(vehicle.calls(), vec![VehicleCommand::Land]);
    }

    #[tokio::test]
    async fn test_init_spawns_dispatcher() {
        let vehicle = Arc::new(RecordingVehicle::new());
        let (tx, rx) = mpsc::channel(8);

        let handle = init(vehicle.clone(), Arc::new(CommandCatalog::standard()), rx);
        tx.send(ControlEvent::action("stop")).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(vehicle.calls(), vec![VehicleCommand::Stop]);
    }
}
