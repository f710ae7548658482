//! Fixed-interval background loops.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, trace};

/// Handle to a spawned polling loop.
///
/// Stopping (or dropping the handle) ends the loop before its next tick; a
/// tick already running is allowed to finish and write its results. Each tick
/// runs as its own task, so a panicking tick is logged and the loop goes on.
#[derive(Debug)]
pub struct PollHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Spawn `tick` on the current runtime, running it now and then every `period`.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, mut stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let mut clock = interval(period);
            clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = clock.tick() => {}
                    _ = &mut stop_rx => break,
                }
                trace!(poller = name, "tick");
                if let Err(err) = tokio::spawn(tick()).await {
                    error!(poller = name, %err, "poll tick panicked");
                }
            }
            debug!(poller = name, "poller stopped");
        });

        Self { stop, task }
    }

    pub fn stop(self) {
        let _ = self.stop.send(());
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
