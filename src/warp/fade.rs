//! Sound cue release fade.
//!
//! On an early release the cue is faded out in fixed steps rather than cut
//! off. Once the volume is at or below the floor the cue is stopped and
//! rewound, and only then may background music come back.

use std::ops::ControlFlow;

use tokio_util::sync::CancellationToken;

use crate::config::{CueSettings, Volume};
use crate::warp::timer::spawn_repeating;

/// Outcome of one fade tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeStep {
    /// Lower the cue to this volume and keep going
    Lower(Volume),
    /// The floor has been reached; stop the cue
    Finished,
}

/// Computes the next fade step from the cue's current volume.
///
/// A zero step could never reach the floor, so it finishes at once.
#[must_use]
pub fn next_step(current: Volume, settings: &CueSettings) -> FadeStep {
    if current > settings.fade_floor && settings.fade_step > Volume::MUTE {
        FadeStep::Lower(current.saturating_sub(settings.fade_step))
    } else {
        FadeStep::Finished
    }
}

/// Handle on a running fade. Dropping it cancels the fade.
#[derive(Debug, Default)]
pub struct CueFade {
    cancel: Option<CancellationToken>,
}

impl CueFade {
    /// Starts calling `on_tick` every `settings.fade_interval`, replacing
    /// any fade already running.
    pub fn begin<F>(&mut self, settings: &CueSettings, on_tick: F)
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        self.cancel();
        let cancel = CancellationToken::new();
        drop(spawn_repeating(settings.fade_interval, cancel.clone(), on_tick));
        self.cancel = Some(cancel);
    }

    /// Abandons the fade. Returns `true` if one was running.
    pub fn cancel(&mut self) -> bool {
        self.cancel.take().is_some_and(|token| {
            token.cancel();
            true
        })
    }

    /// Marks the fade as complete without cancelling its task.
    pub fn finish(&mut self) {
        self.cancel = None;
    }

    /// Whether a fade is in progress.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for CueFade {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn full_volume_takes_ten_steps() {
        let settings = CueSettings::default();
        let mut volume = Volume::FULL;
        let mut ticks = 0;
        loop {
            ticks += 1;
            match next_step(volume, &settings) {
                FadeStep::Lower(v) => volume = v,
                FadeStep::Finished => break,
            }
        }
        assert_eq!(ticks, 10);
        assert_eq!(volume.percent(), 10);
    }

    #[test]
    fn at_floor_finishes_immediately() {
        let settings = CueSettings::default();
        assert_eq!(
            next_step(Volume::from_percent(10), &settings),
            FadeStep::Finished
        );
        assert_eq!(
            next_step(Volume::from_percent(15), &settings),
            FadeStep::Lower(Volume::from_percent(5))
        );
    }

    #[test]
    fn zero_step_finishes_instead_of_stalling() {
        let settings = CueSettings {
            fade_step: Volume::MUTE,
            ..CueSettings::default()
        };
        assert_eq!(next_step(Volume::FULL, &settings), FadeStep::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks() {
        let ticks = Arc::new(AtomicU32::new(0));
        let mut fade = CueFade::default();
        let t = Arc::clone(&ticks);
        fade.begin(&CueSettings::default(), move || {
            t.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        });
        assert!(fade.is_running());

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(fade.cancel());
        assert!(!fade.cancel());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }
}
