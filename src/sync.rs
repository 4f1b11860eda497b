//! Per-device sync loop.
//!
//! Every tick decides between flushing a settled write, refreshing cached
//! state, or doing nothing. Writes always win over refreshes. In push mode
//! the device reports its own state through the listener, so active
//! refreshes back off to a low-frequency fallback.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::DeviceClient;

pub const TICK: Duration = Duration::from_secs(1);
/// Refresh delay after a successful write.
pub const WRITE_SETTLE: Duration = Duration::from_secs(5);
/// Refresh delay after a successful refresh.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(15);
/// Added to every re-armed refresh deadline in push mode.
pub const PUSH_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Poll,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Write,
    Refresh,
    Idle,
}

#[derive(Debug, Clone)]
pub struct Schedule {
    mode: SyncMode,
    next_refresh: Instant,
}

impl Schedule {
    /// The first refresh is due immediately.
    pub fn new(mode: SyncMode, now: Instant) -> Self {
        Self {
            mode,
            next_refresh: now,
        }
    }

    pub fn next_refresh(&self) -> Instant {
        self.next_refresh
    }

    pub fn next_action(&self, pending_write: bool, in_flight: bool, now: Instant) -> SyncAction {
        if in_flight {
            SyncAction::Idle
        } else if pending_write {
            SyncAction::Write
        } else if now >= self.next_refresh {
            SyncAction::Refresh
        } else {
            SyncAction::Idle
        }
    }

    /// Re-arms the refresh deadline. Failures never call this, so a failed
    /// refresh is retried on the next tick.
    pub fn record_success(&mut self, action: SyncAction, now: Instant) {
        let delay = match action {
            SyncAction::Write => WRITE_SETTLE,
            SyncAction::Refresh => REFRESH_INTERVAL,
            SyncAction::Idle => return,
        };
        self.next_refresh = match self.mode {
            SyncMode::Poll => now + delay,
            SyncMode::Push => now + delay + PUSH_BACKOFF,
        };
    }
}

/// Runs one decision against `client` and performs the chosen exchange.
pub async fn tick(client: &DeviceClient, schedule: &mut Schedule) -> SyncAction {
    let action = schedule.next_action(
        client.has_pending_write(),
        client.is_exchange_in_flight(),
        Instant::now(),
    );

    let result = match action {
        SyncAction::Write => client.exchange().await,
        SyncAction::Refresh => client.refresh().await,
        SyncAction::Idle => {
            trace!(ip = %client.ip(), "idle tick");
            return action;
        }
    };

    match result {
        Ok(_) => {
            schedule.record_success(action, Instant::now());
            debug!(ip = %client.ip(), ?action, "sync complete");
        }
        Err(e) => warn!(ip = %client.ip(), ?action, error = %e, "sync failed, retrying next tick"),
    }
    action
}

/// Ticks forever; ends only when the task is aborted.
pub async fn run(client: DeviceClient, mode: SyncMode) {
    let mut schedule = Schedule::new(mode, Instant::now());
    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(ip = %client.ip(), ?mode, "sync loop started");
    loop {
        interval.tick().await;
        tick(&client, &mut schedule).await;
    }
}

pub fn spawn(client: DeviceClient, mode: SyncMode) -> JoinHandle<()> {
    tokio::spawn(run(client, mode))
}
