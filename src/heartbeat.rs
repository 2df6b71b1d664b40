use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::display::{Display, DisplayUpdate};
use crate::oracle::StatusOracle;

/// Longest accepted heartbeat period.
pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Periodic status refresh for the lifetime of a view. Aborted on drop.
pub struct Heartbeat {
    handle: JoinHandle<()>,
}

impl Heartbeat {
    /// First poll fires one `period` from now; the view already has a fresh reading.
    pub fn spawn(oracle: StatusOracle, display: Display, period: Duration) -> Self {
        let period = period.clamp(Duration::from_millis(1), MAX_PERIOD);
        let handle = tokio::spawn(async move {
            let now = Instant::now();
            let first = now.checked_add(period).unwrap_or(now);
            let mut ticker = time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if display.is_locked() {
                    tracing::trace!("cycle in flight; skipping heartbeat");
                    continue;
                }

                let cycle = display.cycle();
                let state = oracle.query_state().await;
                if display.apply(DisplayUpdate::Observed { state, cycle }) {
                    tracing::info!(service = oracle.service(), %state, "service state changed");
                }
            }
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{LifecycleAction, ServiceState};
    use crate::testing::{INSTANCE, Reply, SERVICE, ScriptedSource};

    const PERIOD: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn picks_up_out_of_band_changes() {
        let source = ScriptedSource::new([Reply::Running]);
        let display = Display::new(ServiceState::NotRunning);
        let _heartbeat = Heartbeat::spawn(
            StatusOracle::new(source.clone(), SERVICE, INSTANCE),
            display.clone(),
            PERIOD,
        );

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(source.queries(), 0, "first poll waits a full period");

        time::sleep(PERIOD).await;
        assert_eq!(source.queries(), 1);
        assert_eq!(display.state(), ServiceState::Running);

        source.set(Reply::Fail);
        time::sleep(PERIOD).await;
        assert_eq!(source.queries(), 2);
        assert_eq!(display.state(), ServiceState::NotRunning);
    }

    #[tokio::test(start_paused = true)]
    async fn stays_quiet_while_controls_are_locked() {
        let source = ScriptedSource::new([Reply::Running]);
        let display = Display::new(ServiceState::NotRunning);
        display.apply(DisplayUpdate::Begin(LifecycleAction::Start));
        let _heartbeat = Heartbeat::spawn(
            StatusOracle::new(source.clone(), SERVICE, INSTANCE),
            display.clone(),
            PERIOD,
        );

        time::sleep(PERIOD * 3 + Duration::from_secs(1)).await;
        assert_eq!(source.queries(), 0);
        assert_eq!(display.state(), ServiceState::NotRunning);

        display.apply(DisplayUpdate::Finish {
            state: ServiceState::NotRunning,
            error: None,
        });
        time::sleep(PERIOD).await;
        assert_eq!(source.queries(), 1);
        assert_eq!(display.state(), ServiceState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_period_is_clamped() {
        let source = ScriptedSource::new([Reply::Running]);
        let display = Display::new(ServiceState::NotRunning);
        let heartbeat = Heartbeat::spawn(
            StatusOracle::new(source.clone(), SERVICE, INSTANCE),
            display.clone(),
            Duration::MAX,
        );

        time::sleep(Duration::from_secs(1)).await;
        assert!(heartbeat.is_running());
        assert_eq!(source.queries(), 0);

        time::sleep(MAX_PERIOD).await;
        assert!(heartbeat.is_running());
        assert_eq!(source.queries(), 1);
        assert_eq!(display.state(), ServiceState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_dropped() {
        let source = ScriptedSource::new([Reply::Stopped]);
        let display = Display::new(ServiceState::NotRunning);
        let heartbeat = Heartbeat::spawn(
            StatusOracle::new(source.clone(), SERVICE, INSTANCE),
            display,
            PERIOD,
        );

        time::sleep(PERIOD + Duration::from_secs(1)).await;
        assert!(heartbeat.is_running());
        let seen = source.queries();
        drop(heartbeat);

        time::sleep(PERIOD * 4).await;
        assert_eq!(source.queries(), seen);
    }
}
