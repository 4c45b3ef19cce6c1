//! Star-field simulation.
//!
//! Stars fly toward the viewer at the current scene speed and are
//! recycled to the far plane once they pass it. Each frame projects them
//! to screen space as dots at cruising speed or as streaks at warp speed.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::observability::metrics;
use crate::scene::{SceneHandle, SceneMode, SceneParams};

/// Number of stars in a default field.
pub const DEFAULT_STAR_COUNT: usize = 1000;

/// Above this speed stars are drawn as streaks.
pub const STREAK_SPEED: f32 = 5.0;

/// One star in view space. `z` is the distance from the viewer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    /// Horizontal offset from the centre
    pub x: f32,
    /// Vertical offset from the centre
    pub y: f32,
    /// Depth, in `(0, width]`
    pub z: f32,
}

/// A projected star ready to draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StarSprite {
    /// Round point
    Dot {
        /// Screen x
        x: f32,
        /// Screen y
        y: f32,
        /// Radius in pixels
        radius: f32,
        /// Opacity
        alpha: f32,
    },
    /// Line from the star's previous apparent position
    Streak {
        /// Tail x
        from_x: f32,
        /// Tail y
        from_y: f32,
        /// Head x
        to_x: f32,
        /// Head y
        to_y: f32,
        /// Opacity
        alpha: f32,
    },
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    /// Parameters after easing
    pub params: SceneParams,
    /// Darkening overlay alpha, if drawn
    pub overlay_alpha: Option<f32>,
    /// Visible stars
    pub sprites: Vec<StarSprite>,
}

/// Totals reported when a render loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RenderStats {
    /// Frames rendered
    pub frames: u64,
    /// Highest speed reached
    pub peak_speed: f32,
}

/// A field of stars and the eased scene parameters driving it.
#[derive(Debug)]
pub struct Starfield {
    width: f32,
    height: f32,
    stars: Vec<Star>,
    params: SceneParams,
    last_mode: Option<SceneMode>,
    rng: StdRng,
}

impl Starfield {
    /// Creates a field of `count` stars on a `width`×`height` viewport,
    /// seeded for reproducible runs.
    #[must_use]
    pub fn new(width: f32, height: f32, count: usize, seed: u64) -> Self {
        let mut field = Self {
            width: width.max(1.0),
            height: height.max(1.0),
            stars: Vec::with_capacity(count),
            params: SceneParams::IDLE,
            last_mode: None,
            rng: StdRng::seed_from_u64(seed),
        };
        for _ in 0..count {
            let mut star = field.respawn();
            star.z = field.rng.random_range(0.0..field.width);
            field.stars.push(star);
        }
        field
    }

    /// Current eased parameters.
    #[must_use]
    pub const fn params(&self) -> SceneParams {
        self.params
    }

    /// The stars in view space.
    #[must_use]
    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    /// Changes the viewport. Existing stars keep their positions.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
    }

    /// Advances one frame in `mode` at `progress` and projects the result.
    pub fn advance(&mut self, mode: SceneMode, progress: u8) -> Frame {
        if self.last_mode != Some(mode) {
            if self.last_mode.is_none() || mode == SceneMode::WarpingIn {
                self.params = SceneParams::initial(mode);
            }
            self.last_mode = Some(mode);
        }
        self.params.ease_toward(SceneParams::target(mode, progress));

        let speed = self.params.speed;
        for i in 0..self.stars.len() {
            self.stars[i].z -= speed;
            if self.stars[i].z <= 0.0 {
                self.stars[i] = self.respawn();
            }
        }

        let sprites = self
            .stars
            .iter()
            .filter_map(|star| self.project(*star))
            .collect();

        Frame {
            params: self.params,
            overlay_alpha: self.params.overlay_alpha(),
            sprites,
        }
    }

    fn respawn(&mut self) -> Star {
        Star {
            x: self.rng.random_range(0.0..self.width) - self.width / 2.0,
            y: self.rng.random_range(0.0..self.height) - self.height / 2.0,
            z: self.width,
        }
    }

    fn project(&self, star: Star) -> Option<StarSprite> {
        let (w, h) = (self.width, self.height);
        let depth = 1.0 - star.z / w;
        let alpha = depth * self.params.opacity;
        if alpha <= 0.0 {
            return None;
        }

        let to_x = w / 2.0 + star.x / star.z * w;
        let to_y = h / 2.0 + star.y / star.z * h;

        if self.params.speed > STREAK_SPEED {
            let tail_z = self.params.speed.mul_add(2.0, star.z);
            Some(StarSprite::Streak {
                from_x: w / 2.0 + star.x / tail_z * w,
                from_y: h / 2.0 + star.y / tail_z * h,
                to_x,
                to_y,
                alpha,
            })
        } else {
            Some(StarSprite::Dot {
                x: to_x,
                y: to_y,
                radius: depth * 2.0,
                alpha,
            })
        }
    }
}

/// Renders frames at `fps` from the shared scene slot until `cancel`
/// fires, handing the field back along with the totals.
pub fn spawn_render_loop(
    scene: SceneHandle,
    mut field: Starfield,
    fps: u32,
    cancel: CancellationToken,
) -> JoinHandle<(Starfield, RenderStats)> {
    let period = Duration::from_secs(1) / fps.max(1);
    tokio::spawn(async move {
        let mut stats = RenderStats::default();
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(frames = stats.frames, "render loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let (mode, progress) = scene.read();
                    let frame = field.advance(mode, progress);
                    stats.frames += 1;
                    stats.peak_speed = stats.peak_speed.max(frame.params.speed);
                    metrics::set_scene_speed(frame.params.speed);
                }
            }
        }
        (field, stats)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_has_requested_star_count_within_bounds() {
        let field = Starfield::new(800.0, 600.0, DEFAULT_STAR_COUNT, 7);
        assert_eq!(field.stars().len(), 1000);
        for star in field.stars() {
            assert!((-400.0..400.0).contains(&star.x));
            assert!((-300.0..300.0).contains(&star.y));
            assert!((0.0..800.0).contains(&star.z));
        }
    }

    #[test]
    fn idle_scene_draws_nothing() {
        let mut field = Starfield::new(800.0, 600.0, 100, 1);
        let frame = field.advance(SceneMode::Idle, 0);
        assert!(frame.sprites.is_empty(), "opacity 0 hides every star");
        assert_eq!(frame.overlay_alpha, None);
    }

    #[test]
    fn warping_in_starts_with_streaks() {
        let mut field = Starfield::new(800.0, 600.0, 200, 2);
        let frame = field.advance(SceneMode::WarpingIn, 0);
        assert!(frame.params.speed > 90.0);
        assert!(!frame.sprites.is_empty());
        assert!(
            frame
                .sprites
                .iter()
                .all(|s| matches!(s, StarSprite::Streak { .. }))
        );
    }

    #[test]
    fn warping_in_decelerates_toward_idle() {
        let mut field = Starfield::new(800.0, 600.0, 10, 3);
        let first = field.advance(SceneMode::WarpingIn, 0).params.speed;
        for _ in 0..200 {
            field.advance(SceneMode::WarpingIn, 0);
        }
        assert!(field.params().speed < first);
        assert!(field.params().speed < STREAK_SPEED * 4.0);
    }

    #[test]
    fn charging_draws_dots_at_low_speed() {
        let mut field = Starfield::new(800.0, 600.0, 300, 4);
        let mut frame = field.advance(SceneMode::Charging, 20);
        for _ in 0..30 {
            frame = field.advance(SceneMode::Charging, 20);
        }
        assert!(frame.params.speed <= STREAK_SPEED);
        assert!(
            frame
                .sprites
                .iter()
                .all(|s| matches!(s, StarSprite::Dot { .. }))
        );
    }

    #[test]
    fn stars_passing_viewer_are_recycled() {
        let mut field = Starfield::new(100.0, 100.0, 50, 5);
        for _ in 0..50 {
            field.advance(SceneMode::WarpingOut, 100);
        }
        for star in field.stars() {
            assert!(star.z > 0.0 && star.z <= 100.0);
        }
    }

    #[test]
    fn same_seed_same_field() {
        let a = Starfield::new(640.0, 480.0, 20, 42);
        let b = Starfield::new(640.0, 480.0, 20, 42);
        assert_eq!(a.stars(), b.stars());
    }

    #[tokio::test(start_paused = true)]
    async fn render_loop_reads_shared_mode() {
        let scene = SceneHandle::new();
        scene.update(SceneMode::WarpingOut, 100);
        let cancel = CancellationToken::new();
        let handle = spawn_render_loop(
            scene.clone(),
            Starfield::new(320.0, 240.0, 10, 9),
            60,
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
        let (field, stats) = handle.await.unwrap();
        assert!(stats.frames >= 29);
        assert!(stats.peak_speed > 1.0);
        assert!(field.params().opacity > 0.5);
    }
}
