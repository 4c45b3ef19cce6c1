//! Repeating tick sources.
//!
//! [`ChargeTimer`] drives the progress counter: it calls back with a
//! signed step once per interval until cancelled or until the callback
//! asks it to stop. The cue fade reuses the same loop through
//! [`spawn_repeating`].

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Runs `on_tick` every `period`, starting one period from now, until
/// `cancel` fires or `on_tick` returns [`ControlFlow::Break`].
pub fn spawn_repeating<F>(period: Duration, cancel: CancellationToken, mut on_tick: F) -> JoinHandle<()>
where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if on_tick().is_break() {
                        break;
                    }
                }
            }
        }
    })
}

#[derive(Debug)]
struct Running {
    step: i16,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Single-slot repeating timer applying a signed step.
///
/// At most one tick loop is outstanding: [`start`](Self::start) cancels the
/// previous one first. A tick already dequeued when the timer is cancelled
/// may still invoke its callback, so callbacks must check that they are
/// still current before mutating shared state.
#[derive(Debug)]
pub struct ChargeTimer {
    interval: Duration,
    running: Option<Running>,
}

impl ChargeTimer {
    /// Creates an idle timer ticking every `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: None,
        }
    }

    /// Tick interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts ticking with `step`, replacing any running loop.
    pub fn start<F>(&mut self, step: i16, mut on_tick: F)
    where
        F: FnMut(i16) -> ControlFlow<()> + Send + 'static,
    {
        self.cancel();
        let cancel = CancellationToken::new();
        let task = spawn_repeating(self.interval, cancel.clone(), move || on_tick(step));
        self.running = Some(Running { step, cancel, task });
    }

    /// Stops ticking. Safe to call when not running.
    pub fn cancel(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
        }
    }

    /// Whether a tick loop is outstanding and has not finished on its own.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|r| !r.task.is_finished())
    }

    /// Step of the outstanding loop, if any.
    #[must_use]
    pub fn step(&self) -> Option<i16> {
        self.running.as_ref().map(|r| r.step)
    }
}

impl Drop for ChargeTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI32, Ordering};

    use super::*;

    const TICK: Duration = Duration::from_millis(20);

    fn counter_timer(counter: &Arc<AtomicI32>, timer: &mut ChargeTimer, step: i16) {
        let counter = Arc::clone(counter);
        timer.start(step, move |s| {
            counter.fetch_add(i32::from(s), Ordering::SeqCst);
            ControlFlow::Continue(())
        });
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_after_one_interval() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut timer = ChargeTimer::new(TICK);
        counter_timer(&counter, &mut timer, 2);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 10, "ticks at 20..=100ms");
        timer.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks_and_is_idempotent() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut timer = ChargeTimer::new(TICK);
        counter_timer(&counter, &mut timer, 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_running());
        let at_cancel = counter.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), at_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_loop() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut timer = ChargeTimer::new(TICK);
        counter_timer(&counter, &mut timer, 2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        counter_timer(&counter, &mut timer, -1);
        assert_eq!(timer.step(), Some(-1));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2, "only the decay loop ran");
        timer.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn break_ends_loop() {
        let counter = Arc::new(AtomicI32::new(0));
        let mut timer = ChargeTimer::new(TICK);
        let c = Arc::clone(&counter);
        timer.start(1, move |s| {
            let now = c.fetch_add(i32::from(s), Ordering::SeqCst) + 1;
            if now >= 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(!timer.is_running());
    }

    #[test]
    fn cancel_when_idle_is_noop() {
        let mut timer = ChargeTimer::new(TICK);
        timer.cancel();
        assert!(!timer.is_running());
        assert_eq!(timer.step(), None);
        assert_eq!(timer.interval(), TICK);
    }
}
