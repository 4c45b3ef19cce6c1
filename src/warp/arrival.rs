//! Entry animation on the destination page.
//!
//! When the visitor lands on a page through a warp, the scene switches to
//! warping-in for the arrival window and then settles back to idle. The
//! `warped` flag is consumed as soon as the arrival starts, so a reload
//! does not replay it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ArrivalSettings;
use crate::navigation::MemoryHistory;
use crate::observability::{Event, EventEmitter};
use crate::scene::{SceneHandle, SceneMode};

/// Watches the history and plays the entry animation on warped arrivals.
#[derive(Debug)]
pub struct ArrivalSequence {
    history: Arc<MemoryHistory>,
    scene: SceneHandle,
    window: Duration,
    events: Arc<EventEmitter>,
}

impl ArrivalSequence {
    /// Creates a sequence bound to `history` and `scene`.
    #[must_use]
    pub fn new(
        history: Arc<MemoryHistory>,
        scene: SceneHandle,
        settings: ArrivalSettings,
        events: Arc<EventEmitter>,
    ) -> Self {
        Self {
            history,
            scene,
            window: settings.window,
            events,
        }
    }

    /// Starts the entry animation if the current location was reached by a
    /// warp. Returns whether it did.
    pub fn begin_if_warped(&self) -> bool {
        if !self.history.take_warped() {
            return false;
        }
        let path = self.history.current().path;
        info!(path = %path, "warped arrival");
        self.scene.update(SceneMode::WarpingIn, 0);
        self.events.emit(Event::ArrivalPlayed {
            timestamp: Utc::now(),
            path,
        });
        true
    }

    /// Ends the entry animation, unless something else already took over
    /// the scene.
    pub fn settle(&self) {
        if self.scene.mode() == SceneMode::WarpingIn {
            self.scene.set_mode(SceneMode::Idle);
        }
        debug!("arrival complete");
    }

    /// Follows location changes until `cancel` fires. The task returns the
    /// number of entry animations played.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<u64> {
        let mut locations = self.history.subscribe();
        tokio::spawn(async move {
            let mut played = 0;
            let mut deadline = None;
            if self.begin_if_warped() {
                played += 1;
                deadline = Some(Instant::now() + self.window);
            }

            loop {
                let window_end = async move {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                };
                tokio::select! {
                    () = cancel.cancelled() => break,
                    changed = locations.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if self.begin_if_warped() {
                            played += 1;
                            deadline = Some(Instant::now() + self.window);
                        }
                    }
                    () = window_end => {
                        deadline = None;
                        self.settle();
                    }
                }
            }
            played
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{NavigationRequest, Navigator};

    fn sequence() -> (Arc<MemoryHistory>, SceneHandle, ArrivalSequence) {
        let history = Arc::new(MemoryHistory::new("/project/alpha"));
        let scene = SceneHandle::new();
        let seq = ArrivalSequence::new(
            history.clone(),
            scene.clone(),
            ArrivalSettings::default(),
            Arc::new(EventEmitter::noop()),
        );
        (history, scene, seq)
    }

    fn warp_to(history: &MemoryHistory, path: &str) {
        history.navigate(NavigationRequest {
            target: path.to_string(),
            warped: true,
        });
    }

    #[test]
    fn plain_location_plays_nothing() {
        let (_history, scene, seq) = sequence();
        assert!(!seq.begin_if_warped());
        assert_eq!(scene.mode(), SceneMode::Idle);
    }

    #[test]
    fn warped_location_plays_once() {
        let (history, scene, seq) = sequence();
        warp_to(&history, "/project/beta");
        assert!(seq.begin_if_warped());
        assert_eq!(scene.mode(), SceneMode::WarpingIn);
        assert!(!seq.begin_if_warped(), "flag already consumed");
        assert!(!history.current().warped);
    }

    #[test]
    fn settle_leaves_foreign_modes_alone() {
        let (_history, scene, seq) = sequence();
        scene.set_mode(SceneMode::Charging);
        seq.settle();
        assert_eq!(scene.mode(), SceneMode::Charging);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_lasts_arrival_window() {
        let (history, scene, seq) = sequence();
        let cancel = CancellationToken::new();
        let t0 = Instant::now();
        let handle = seq.spawn(cancel.clone());

        warp_to(&history, "/project/beta");
        tokio::time::sleep_until(t0 + Duration::from_millis(10)).await;
        assert_eq!(scene.mode(), SceneMode::WarpingIn);

        tokio::time::sleep_until(t0 + Duration::from_millis(1990)).await;
        assert_eq!(scene.mode(), SceneMode::WarpingIn);

        tokio::time::sleep_until(t0 + Duration::from_millis(2010)).await;
        assert_eq!(scene.mode(), SceneMode::Idle);

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), 1);
    }
}
