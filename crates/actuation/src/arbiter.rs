//! Async actuator arbiter.
//!
//! The evaluator and the command router talk to [`ActuatorArbiter`]
//! through non-blocking calls that only update a `watch` channel. Two
//! workers own the hardware:
//!
//! - the alert worker diffs the requested status against what it last
//!   applied and runs the driver calls on the blocking pool;
//! - the switch worker performs one move at a time. Requests arriving
//!   mid-move are coalesced, and the latest one is acted on once the
//!   move settles.
//!
//! A command the hardware rejected leaves the outputs unconfirmed; the
//! next [`ActuatorArbiter::apply`] then wakes the alert worker even if the
//! status is unchanged, so the command is reissued on the following tick.
//!
//! [`ActuatorArbiter::shutdown`] lets an in-flight move finish, then
//! forces the indicator and alarm off.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use vigil_core::config::ActuatorConfig;
use vigil_core::SafetyStatus;

use crate::alert::{AlertArbiter, AlertOutputs};
use crate::error::{ActuatorError, ActuatorResult};
use crate::ports::{AlertPort, SwitchPort, SwitchPosition};

/// Last applied actuator outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorState {
    /// Indicator lit
    pub indicator_on: bool,
    /// Alarm sounding
    pub alarm_on: bool,
    /// Intensity used when the alarm sounds
    pub alarm_intensity: u8,
    /// Switch actuator position
    pub switch_position: SwitchPosition,
}

#[derive(Debug, Clone, Copy)]
struct AlertRequest {
    status: SafetyStatus,
    enabled: bool,
    seq: u64,
}

impl AlertRequest {
    fn outputs(&self) -> AlertOutputs {
        if self.enabled {
            AlertOutputs::for_status(self.status)
        } else {
            AlertOutputs::SAFE
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SwitchRequest {
    position: SwitchPosition,
    seq: u64,
}

/// Handle to the actuator workers.
pub struct ActuatorArbiter {
    alert: Arc<Mutex<AlertArbiter>>,
    alert_tx: watch::Sender<AlertRequest>,
    alert_done: watch::Receiver<u64>,
    // Set by the alert worker while applied outputs differ from the request.
    alert_retry: Arc<AtomicBool>,
    switch_tx: watch::Sender<SwitchRequest>,
    switch_done: watch::Receiver<u64>,
    state: Arc<Mutex<ActuatorState>>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ActuatorArbiter {
    /// Start the workers. Must be called from within a tokio runtime.
    ///
    /// The alert worker forces the indicator and alarm off before it
    /// accepts any request. The switch is assumed to rest at `Off`.
    pub fn spawn(
        alert_port: Box<dyn AlertPort>,
        switch_port: Box<dyn SwitchPort>,
        config: &ActuatorConfig,
    ) -> Self {
        let alert = Arc::new(Mutex::new(AlertArbiter::new(
            alert_port,
            config.alarm_intensity,
        )));
        let state = Arc::new(Mutex::new(ActuatorState {
            indicator_on: false,
            alarm_on: false,
            alarm_intensity: config.alarm_intensity.min(100),
            switch_position: SwitchPosition::Off,
        }));
        let cancel = CancellationToken::new();
        let alert_retry = Arc::new(AtomicBool::new(false));

        // seq 1 is the startup request; `settled` waits for it.
        let (alert_tx, alert_rx) = watch::channel(AlertRequest {
            status: SafetyStatus::Normal,
            enabled: true,
            seq: 1,
        });
        let (alert_done_tx, alert_done) = watch::channel(0);
        let (switch_tx, switch_rx) = watch::channel(SwitchRequest {
            position: SwitchPosition::Off,
            seq: 0,
        });
        let (switch_done_tx, switch_done) = watch::channel(0);

        let alert_worker = tokio::spawn(run_alert_worker(
            Arc::clone(&alert),
            alert_rx,
            alert_done_tx,
            Arc::clone(&alert_retry),
            Arc::clone(&state),
            cancel.clone(),
        ));
        let switch_worker = tokio::spawn(run_switch_worker(
            Arc::new(Mutex::new(switch_port)),
            switch_rx,
            switch_done_tx,
            Arc::clone(&state),
            cancel.clone(),
        ));

        Self {
            alert,
            alert_tx,
            alert_done,
            alert_retry,
            switch_tx,
            switch_done,
            state,
            cancel,
            workers: Mutex::new(vec![alert_worker, switch_worker]),
        }
    }

    /// Request the outputs for a held status. Non-blocking.
    ///
    /// Repeating the current status is a no-op unless the last attempt left
    /// an output unconfirmed, in which case the worker tries again.
    pub fn apply(&self, status: SafetyStatus) {
        let retry = self.alert_retry.load(Ordering::Acquire);
        self.alert_tx.send_if_modified(|req| {
            if req.status == status && !retry {
                return false;
            }
            req.status = status;
            req.seq += 1;
            true
        });
    }

    /// Enable or disable status-driven outputs. Disabled means indicator
    /// and alarm off whatever the status.
    pub fn set_enabled(&self, enabled: bool) {
        self.alert_tx.send_if_modified(|req| {
            if req.enabled == enabled {
                return false;
            }
            req.enabled = enabled;
            req.seq += 1;
            true
        });
    }

    /// True while status-driven outputs are enabled.
    pub fn enabled(&self) -> bool {
        self.alert_tx.borrow().enabled
    }

    /// Request a switch position. Non-blocking; the latest request wins.
    pub fn request_switch(&self, position: SwitchPosition) {
        self.switch_tx.send_modify(|req| {
            req.position = position;
            req.seq += 1;
        });
    }

    /// Last applied outputs.
    pub fn state(&self) -> ActuatorState {
        *lock(&self.state)
    }

    /// Wait until both workers have handled every request made so far.
    pub async fn settled(&self) {
        let alert_target = self.alert_tx.borrow().seq;
        let switch_target = self.switch_tx.borrow().seq;

        let mut alert_done = self.alert_done.clone();
        let _ = alert_done.wait_for(|seq| *seq >= alert_target).await;
        let mut switch_done = self.switch_done.clone();
        let _ = switch_done.wait_for(|seq| *seq >= switch_target).await;
    }

    /// Stop the workers and leave the indicator and alarm off.
    ///
    /// An in-flight switch move completes first. Further requests are ignored.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let workers: Vec<_> = std::mem::take(&mut *lock(&self.workers));
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "actuator worker ended abnormally");
            }
        }

        match with_alert(&self.alert, |arbiter| {
            let report = arbiter.force_safe();
            (report, arbiter.applied())
        })
        .await
        {
            Ok((report, applied)) => {
                if report.failures > 0 {
                    error!(failures = report.failures, "safe state not confirmed on shutdown");
                }
                if let Some(applied) = applied {
                    store_outputs(&self.state, applied);
                }
                info!("actuators in safe state");
            }
            Err(e) => error!(error = %e, "failed to force safe state on shutdown"),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn store_outputs(state: &Mutex<ActuatorState>, outputs: AlertOutputs) {
    let mut state = lock(state);
    state.indicator_on = outputs.indicator_on;
    state.alarm_on = outputs.alarm_on;
}

async fn with_alert<R, F>(alert: &Arc<Mutex<AlertArbiter>>, f: F) -> ActuatorResult<R>
where
    R: Send + 'static,
    F: FnOnce(&mut AlertArbiter) -> R + Send + 'static,
{
    let alert = Arc::clone(alert);
    tokio::task::spawn_blocking(move || {
        let mut guard = lock(&alert);
        f(&mut *guard)
    })
        .await
        .map_err(|e| ActuatorError::Worker(e.to_string()))
}

async fn run_alert_worker(
    alert: Arc<Mutex<AlertArbiter>>,
    mut requests: watch::Receiver<AlertRequest>,
    done: watch::Sender<u64>,
    retry: Arc<AtomicBool>,
    state: Arc<Mutex<ActuatorState>>,
    cancel: CancellationToken,
) {
    match with_alert(&alert, |arbiter| arbiter.force_safe()).await {
        Ok(report) if report.failures == 0 => info!("actuators forced to safe state"),
        Ok(report) => warn!(failures = report.failures, "startup safe state not confirmed"),
        Err(e) => error!(error = %e, "startup safe state failed"),
    }

    loop {
        let request = *requests.borrow_and_update();
        let desired = request.outputs();

        match with_alert(&alert, move |arbiter| (arbiter.apply(desired), arbiter.applied())).await {
            Ok((report, applied)) => {
                if report.commands > 0 {
                    info!(
                        status = %request.status,
                        enabled = request.enabled,
                        indicator = desired.indicator_on,
                        alarm = desired.alarm_on,
                        "alert outputs changed"
                    );
                }
                if let Some(applied) = applied {
                    store_outputs(&state, applied);
                }
                retry.store(applied != Some(desired), Ordering::Release);
            }
            Err(e) => {
                error!(error = %e, "alert worker call failed");
                retry.store(true, Ordering::Release);
            }
        }
        done.send_replace(request.seq);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = requests.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("alert worker stopped");
}

async fn run_switch_worker(
    port: Arc<Mutex<Box<dyn SwitchPort>>>,
    mut requests: watch::Receiver<SwitchRequest>,
    done: watch::Sender<u64>,
    state: Arc<Mutex<ActuatorState>>,
    cancel: CancellationToken,
) {
    let mut position = lock(&state).switch_position;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = requests.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }

        let request = *requests.borrow_and_update();
        let target = request.position;
        if target == position {
            debug!(position = %position, "switch already in position");
        } else {
            info!(from = %position, to = %target, "switch moving");
            let port = Arc::clone(&port);
            let result = tokio::task::spawn_blocking(move || lock(&port).move_to(target))
                .await
                .map_err(|e| ActuatorError::Worker(e.to_string()))
                .and_then(|r| r);

            match result {
                Ok(()) => position = target,
                Err(e) if e.may_have_applied() => {
                    warn!(error = %e, to = %target, "switch move failed; assuming moved");
                    position = target;
                }
                Err(e) => warn!(error = %e, to = %target, "switch move rejected"),
            }
            lock(&state).switch_position = position;
        }
        done.send_replace(request.seq);
    }
    debug!("switch worker stopped");
}
