//! [`BinController`] – the bin state machine and control loop.
//!
//! A single logical task owns the machine: every mutable piece of bin state
//! (the [`BinState`], both compartments' fill estimates, the lid and buzzer
//! drivers) lives inside [`BinController`] and is only touched from
//! [`tick`][BinController::tick].  External components interact through two
//! narrow channels:
//!
//! * a `watch` channel carrying immutable [`StatusSnapshot`] copies, and
//! * an `mpsc` queue of [`ManualCommand`]s drained at the start of each tick
//!   — never a reentrant call into the controller mid-tick.
//!
//! Each tick performs, in order: (a) manual-command drain, (b) input
//! sampling (motion, fill levels), (c) the fullness interlock, (d) the
//! state-table evaluation, (e) timer bookkeeping for the buzzer sub-states,
//! (f) snapshot publication.  Nothing in the tick blocks: bus traffic is
//! polled, backend reports are spawned, and fixed-duration actuations
//! (acknowledgment chirp, full alert) are deadlines checked on later ticks.
//!
//! Timeouts are the only way out of every waiting state; the absence of a
//! classification response is not an error but the designed fallback to the
//! default compartment.

use std::cmp;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use binos_bus::BusEndpoint;
use binos_hal::hardware::CompartmentHardware;
use binos_hal::BinHardware;
use binos_types::{
    BinError, BinState, CompartmentId, FillReport, LidPosition, ManualCommand, Material,
    RejectReason, StatusSnapshot,
};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::level::{LevelConfig, LevelEstimator};
use crate::protocol::ClassificationClient;
use crate::report::BackendReporter;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Timing and policy bundle for [`BinController`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ControllerConfig {
    /// Dwell in `DetectingMotion` before an active motion reading counts as
    /// confirmed.
    pub motion_confirm: Duration,
    /// Maximum dwell in `DetectingMotion` without confirmation.
    pub motion_timeout: Duration,
    /// Maximum wait for a classification response.
    pub classify_timeout: Duration,
    /// How long motion must be absent before an open lid closes.
    pub close_delay: Duration,
    /// Duration of the audible full alert.
    pub full_alert: Duration,
    /// Duration of the short acknowledgment chirp on open.
    pub ack_chirp: Duration,
    /// Compartment selected for an `Unknown` verdict.
    pub default_compartment: CompartmentId,
    /// Fill calibration applied to both compartments.
    pub level: LevelConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            motion_confirm: Duration::from_millis(500),
            motion_timeout: Duration::from_secs(5),
            classify_timeout: Duration::from_secs(5),
            close_delay: Duration::from_secs(3),
            full_alert: Duration::from_secs(2),
            ack_chirp: Duration::from_millis(100),
            default_compartment: CompartmentId::Organic,
            level: LevelConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// External handle
// ─────────────────────────────────────────────────────────────────────────────

/// A queued manual command plus an optional reply slot.
pub struct CommandRequest {
    pub command: ManualCommand,
    pub reply: Option<oneshot::Sender<Result<BinState, BinError>>>,
}

/// Cheap cloneable handle for external components (status surface, CLI).
///
/// Carries read-only snapshots out and manual commands in; never a mutable
/// reference into the controller.
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<CommandRequest>,
    status: watch::Receiver<StatusSnapshot>,
}

impl ControllerHandle {
    /// The most recently published snapshot.  Callable at any time, no side
    /// effects.
    pub fn status(&self) -> StatusSnapshot {
        *self.status.borrow()
    }

    /// A watch receiver that resolves whenever a fresh snapshot is published.
    pub fn watch(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Submit a manual command and wait for the controller to honor or
    /// reject it on its next tick.
    ///
    /// # Errors
    ///
    /// - [`BinError::Rejected`] with the validation reason.
    /// - [`BinError::HardwareFault`] if the commanded driver failed.
    /// - [`BinError::Channel`] if the controller has shut down.
    pub async fn submit(&self, command: ManualCommand) -> Result<BinState, BinError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(CommandRequest {
                command,
                reply: Some(tx),
            })
            .await
            .map_err(|_| BinError::Channel("controller has shut down".to_string()))?;
        rx.await
            .map_err(|_| BinError::Channel("controller dropped the command".to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BinController
// ─────────────────────────────────────────────────────────────────────────────

/// The bin state machine.  Owns every driver and every mutable field; see
/// the module docs for the tick contract.
pub struct BinController {
    config: ControllerConfig,
    hardware: BinHardware,
    classifier: ClassificationClient,
    reporter: Option<BackendReporter>,
    state: BinState,
    organic_level: LevelEstimator,
    non_organic_level: LevelEstimator,
    /// Target compartment of the current deposit cycle.
    selected: CompartmentId,
    /// Entry time of the current motion event (`DetectingMotion`).
    motion_started: Option<Instant>,
    /// Most recent tick at which the motion sensor read active.
    last_motion: Option<Instant>,
    /// When the lid of `selected` was commanded open.
    lid_opened: Option<Instant>,
    /// Acknowledgment-chirp deadline (buzzer sub-state).
    chirp_until: Option<Instant>,
    /// Full-alert deadline (buzzer sub-state).
    alert_until: Option<Instant>,
    commands_rx: mpsc::Receiver<CommandRequest>,
    status_tx: watch::Sender<StatusSnapshot>,
}

impl BinController {
    /// Build a controller owning `hardware` and the bus `endpoint`, plus the
    /// external handle for snapshots and manual commands.
    pub fn new(
        config: ControllerConfig,
        hardware: BinHardware,
        endpoint: BusEndpoint,
    ) -> (Self, ControllerHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let organic_level = LevelEstimator::new(config.level);
        let non_organic_level = LevelEstimator::new(config.level);
        let (status_tx, status_rx) = watch::channel(StatusSnapshot {
            state: BinState::Idle,
            organic_fill: 0.0,
            organic_full: false,
            non_organic_fill: 0.0,
            non_organic_full: false,
        });

        let selected = config.default_compartment;
        let controller = Self {
            config,
            hardware,
            classifier: ClassificationClient::new(endpoint),
            reporter: None,
            state: BinState::Idle,
            organic_level,
            non_organic_level,
            selected,
            motion_started: None,
            last_motion: None,
            lid_opened: None,
            chirp_until: None,
            alert_until: None,
            commands_rx,
            status_tx,
        };
        let handle = ControllerHandle {
            commands: commands_tx,
            status: status_rx,
        };
        (controller, handle)
    }

    /// Attach a backend reporter (builder-style).
    pub fn with_reporter(mut self, reporter: BackendReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Current machine state.
    pub fn state(&self) -> BinState {
        self.state
    }

    /// Last commanded lid position of `compartment`.
    pub fn lid_position(&self, compartment: CompartmentId) -> LidPosition {
        match compartment {
            CompartmentId::Organic => self.hardware.organic.lid.position(),
            CompartmentId::NonOrganic => self.hardware.non_organic.lid.position(),
        }
    }

    /// Produce an immutable status copy.  Callable at any time, no side
    /// effects.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state,
            organic_fill: self.organic_level.fill(),
            organic_full: self.organic_level.is_full(),
            non_organic_fill: self.non_organic_level.fill(),
            non_organic_full: self.non_organic_level.is_full(),
        }
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Execute one control-loop iteration at time `now`.
    pub fn tick(&mut self, now: Instant) {
        // (a) Manual commands queued since the last tick.
        self.drain_commands(now);

        // (b) Input sampling.
        let motion_active = self.hardware.motion.active();
        if motion_active {
            self.last_motion = Some(now);
        }
        self.sample_levels();

        // Outside `AnalyzingMaterial` the endpoint is drained so responses
        // arriving after a resolution or a maintenance toggle are dropped
        // rather than read by a future request.
        if self.state != BinState::AnalyzingMaterial {
            let _ = self.classifier.poll();
        }

        // (c) Fullness interlock — overrides the transition table.
        let interlocked = self.check_interlock();

        // (d) State-table evaluation.
        if !interlocked {
            self.step(now, motion_active);
        }

        // (e) Buzzer sub-state bookkeeping.
        self.expire_timers(now);

        // (f) Publish a fresh snapshot for external readers.
        self.status_tx.send_replace(self.snapshot());
    }

    /// Drive the controller on a fixed interval until `shutdown` is set.
    pub async fn run(mut self, tick_interval: Duration, shutdown: Arc<AtomicBool>) {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(tick_ms = tick_interval.as_millis() as u64, "bin controller running");
        while !shutdown.load(Ordering::Acquire) {
            interval.tick().await;
            self.tick(Instant::now());
        }
        info!("bin controller stopped");
    }

    // -------------------------------------------------------------------------
    // Manual command surface
    // -------------------------------------------------------------------------

    /// Validate and apply a manual command.
    ///
    /// # Errors
    ///
    /// - [`BinError::Rejected`] with the [`RejectReason`] when validation
    ///   fails; the machine and the actuators are left untouched.
    /// - [`BinError::HardwareFault`] when the commanded driver fails.
    pub fn handle_command(
        &mut self,
        command: ManualCommand,
        now: Instant,
    ) -> Result<BinState, BinError> {
        match command {
            ManualCommand::ToggleMaintenance => {
                if self.state == BinState::Maintenance {
                    info!("maintenance mode cleared");
                    self.transition(BinState::Idle);
                } else {
                    info!(from = ?self.state, "maintenance mode engaged");
                    // Entering Maintenance discards the in-flight
                    // classification correlation and every timed sub-state.
                    self.classifier.abandon();
                    self.chirp_until = None;
                    self.alert_until = None;
                    self.motion_started = None;
                    self.lid_opened = None;
                    self.buzzer_off();
                    self.transition(BinState::Maintenance);
                }
                Ok(self.state)
            }

            ManualCommand::Open(compartment) => {
                if matches!(self.state, BinState::OpeningBin | BinState::ClosingBin) {
                    return Err(BinError::Rejected(RejectReason::CycleActive));
                }
                if self.compartment_full(compartment) {
                    return Err(BinError::Rejected(RejectReason::CompartmentFull));
                }
                if self.lid_position(compartment) == LidPosition::Open {
                    return Err(BinError::Rejected(RejectReason::AlreadyOpen));
                }
                self.lid_set(compartment, LidPosition::Open)?;
                info!(compartment = compartment.label(), "lid opened (manual)");
                self.buzzer_on();
                self.chirp_until = Some(now + self.config.ack_chirp);
                Ok(self.state)
            }

            ManualCommand::Close(compartment) => {
                if self.lid_position(compartment) == LidPosition::Closed {
                    // Idempotent: state and actuator remain untouched.
                    return Err(BinError::Rejected(RejectReason::NotOpen));
                }
                self.lid_set(compartment, LidPosition::Closed)?;
                info!(compartment = compartment.label(), "lid closed (manual)");
                if self.state == BinState::BinOpen && self.selected == compartment {
                    // A manual close preempts the automatic cycle; the close
                    // event still produces its fill report.
                    self.emit_report();
                    self.motion_started = None;
                    self.lid_opened = None;
                    self.transition(BinState::Idle);
                }
                Ok(self.state)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Tick phases
    // -------------------------------------------------------------------------

    fn drain_commands(&mut self, now: Instant) {
        while let Ok(request) = self.commands_rx.try_recv() {
            let result = self.handle_command(request.command, now);
            if let Err(e) = &result {
                debug!(command = ?request.command, error = %e, "manual command rejected");
            }
            if let Some(reply) = request.reply {
                let _ = reply.send(result);
            }
        }
    }

    fn sample_levels(&mut self) {
        Self::sample_compartment(&mut self.hardware.organic, &mut self.organic_level);
        Self::sample_compartment(&mut self.hardware.non_organic, &mut self.non_organic_level);
    }

    fn sample_compartment(hw: &mut CompartmentHardware, level: &mut LevelEstimator) {
        if let Some(scale) = hw.weight.as_mut() {
            match scale.weight_kg() {
                Ok(kg) => level.update_weight(kg),
                Err(e) => debug!(error = %e, "weight sample unavailable"),
            }
        }
        // Applied after weight: on this hardware the time-of-flight estimate
        // drives the fill figure (substitution, not fusion).
        match hw.range.distance_cm() {
            Ok(cm) => level.update_distance(cm),
            Err(e) => debug!(error = %e, "range sample unavailable; estimate retained"),
        }
    }

    /// The per-tick fullness interlock.  Returns `true` when it forced the
    /// machine into `BinFull` this tick.
    ///
    /// `OpeningBin` with a full *target* is left to that state's own guard,
    /// which additionally sounds the full alert; every other operating state
    /// is overridden here.
    fn check_interlock(&mut self) -> bool {
        if matches!(self.state, BinState::Maintenance | BinState::BinFull) {
            return false;
        }
        if !self.organic_level.is_full() && !self.non_organic_level.is_full() {
            return false;
        }
        if self.state == BinState::OpeningBin && self.compartment_full(self.selected) {
            return false;
        }
        info!(from = ?self.state, "fullness interlock tripped");
        self.classifier.abandon();
        self.transition(BinState::BinFull);
        true
    }

    fn step(&mut self, now: Instant, motion_active: bool) {
        match self.state {
            BinState::Idle => {
                if motion_active {
                    info!("motion detected");
                    self.motion_started = Some(now);
                    self.transition(BinState::DetectingMotion);
                }
            }

            BinState::DetectingMotion => {
                let started = self.motion_started.unwrap_or(now);
                if motion_active && now.duration_since(started) >= self.config.motion_confirm {
                    // Confirmed: exactly one classification request per
                    // motion event.
                    self.classifier.request(now);
                    self.transition(BinState::AnalyzingMaterial);
                } else if now.duration_since(started) >= self.config.motion_timeout {
                    debug!("motion not confirmed; event cleared");
                    self.motion_started = None;
                    self.transition(BinState::Idle);
                }
            }

            BinState::AnalyzingMaterial => {
                if let Some(material) = self.classifier.poll() {
                    self.selected = self.target_for(material);
                    self.transition(BinState::OpeningBin);
                } else if self
                    .classifier
                    .timed_out(now, self.config.classify_timeout)
                {
                    info!(
                        default = self.config.default_compartment.label(),
                        "no classification response; falling back"
                    );
                    self.classifier.abandon();
                    self.selected = self.target_for(Material::Unknown);
                    self.transition(BinState::OpeningBin);
                }
            }

            BinState::OpeningBin => {
                if self.compartment_full(self.selected) {
                    warn!(
                        compartment = self.selected.label(),
                        "target compartment full; refusing to open"
                    );
                    self.buzzer_on();
                    self.alert_until = Some(now + self.config.full_alert);
                    self.transition(BinState::BinFull);
                } else {
                    match self.lid_set(self.selected, LidPosition::Open) {
                        Ok(()) => {
                            info!(compartment = self.selected.label(), "lid opened");
                            self.buzzer_on();
                            self.chirp_until = Some(now + self.config.ack_chirp);
                            self.lid_opened = Some(now);
                            self.transition(BinState::BinOpen);
                        }
                        Err(e) => {
                            error!(error = %e, "lid open failed; aborting cycle");
                            self.motion_started = None;
                            self.transition(BinState::Idle);
                        }
                    }
                }
            }

            BinState::BinOpen => {
                // Motion presence already refreshed `last_motion` during
                // sampling — the table's self-transition.
                if !motion_active {
                    let reference = match (self.lid_opened, self.last_motion) {
                        (Some(o), Some(m)) => cmp::max(o, m),
                        (Some(o), None) => o,
                        (None, Some(m)) => m,
                        (None, None) => now,
                    };
                    if now.duration_since(reference) >= self.config.close_delay {
                        self.transition(BinState::ClosingBin);
                    }
                }
            }

            BinState::ClosingBin => {
                if let Err(e) = self.lid_set(self.selected, LidPosition::Closed) {
                    error!(error = %e, "lid close failed");
                } else {
                    info!(compartment = self.selected.label(), "lid closed");
                }
                self.emit_report();
                self.motion_started = None;
                self.lid_opened = None;
                self.transition(BinState::Idle);
            }

            BinState::BinFull => {
                let alert_done = self.alert_until.map_or(true, |t| now >= t);
                let any_full =
                    self.organic_level.is_full() || self.non_organic_level.is_full();
                if alert_done && !any_full {
                    self.transition(BinState::Idle);
                }
            }

            BinState::Maintenance => {
                // Automatic transitions suspended; manual commands were
                // drained at the top of the tick.
            }
        }
    }

    fn expire_timers(&mut self, now: Instant) {
        if let Some(t) = self.chirp_until
            && now >= t
        {
            self.chirp_until = None;
        }
        if let Some(t) = self.alert_until
            && now >= t
        {
            self.alert_until = None;
        }
        if self.chirp_until.is_none() && self.alert_until.is_none() && self.hardware.buzzer.state()
        {
            self.buzzer_off();
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn target_for(&self, material: Material) -> CompartmentId {
        match material {
            Material::Organic => CompartmentId::Organic,
            Material::NonOrganic => CompartmentId::NonOrganic,
            Material::Unknown => self.config.default_compartment,
        }
    }

    fn compartment_full(&self, compartment: CompartmentId) -> bool {
        match compartment {
            CompartmentId::Organic => self.organic_level.is_full(),
            CompartmentId::NonOrganic => self.non_organic_level.is_full(),
        }
    }

    fn lid_set(&mut self, compartment: CompartmentId, target: LidPosition) -> Result<(), BinError> {
        let lid = match compartment {
            CompartmentId::Organic => self.hardware.organic.lid.as_mut(),
            CompartmentId::NonOrganic => self.hardware.non_organic.lid.as_mut(),
        };
        lid.set_position(target)
    }

    fn buzzer_on(&mut self) {
        if let Err(e) = self.hardware.buzzer.set_state(true) {
            warn!(error = %e, "buzzer fault");
        }
    }

    fn buzzer_off(&mut self) {
        if let Err(e) = self.hardware.buzzer.set_state(false) {
            warn!(error = %e, "buzzer fault");
        }
    }

    fn emit_report(&mut self) {
        let report = FillReport {
            report_id: Uuid::new_v4(),
            bin_organic_id: CompartmentId::Organic.backend_id().to_string(),
            bin_non_organic_id: CompartmentId::NonOrganic.backend_id().to_string(),
            organic_weight: self.organic_level.weight_kg(),
            non_organic_weight: self.non_organic_level.weight_kg(),
            organic_full: self.organic_level.is_full(),
            non_organic_full: self.non_organic_level.is_full(),
            timestamp: Utc::now(),
        };
        match &self.reporter {
            Some(reporter) => reporter.dispatch(report),
            None => debug!("no backend reporter configured; fill report skipped"),
        }
    }

    fn transition(&mut self, to: BinState) {
        if self.state != to {
            debug!(from = ?self.state, to = ?to, "state transition");
            self.state = to;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
