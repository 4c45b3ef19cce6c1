//! Navigation: the project ring and an in-memory router.
//!
//! The warp controller only needs a [`Navigator`]. [`MemoryHistory`] is
//! the router used by the simulation: it records every entry, broadcasts
//! the current [`Location`] and lets the destination page consume the
//! `warped` flag exactly once.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use crate::config::Project;
use crate::error::ConfigError;

/// Route prefix for project pages.
pub const PROJECT_ROUTE_PREFIX: &str = "/project/";

/// Returns the route of the project with `id`.
#[must_use]
pub fn project_route(id: &str) -> String {
    format!("{PROJECT_ROUTE_PREFIX}{id}")
}

/// A navigation issued by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationRequest {
    /// Destination route
    pub target: String,
    /// Whether the destination should play its warp entry
    pub warped: bool,
}

/// Receives navigation requests.
pub trait Navigator: Send + Sync + std::fmt::Debug {
    /// Moves to `request.target`. Must not block.
    fn navigate(&self, request: NavigationRequest);
}

/// Current page and its history state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Location {
    /// Route path
    pub path: String,
    /// Arrived through a warp and not yet consumed
    pub warped: bool,
}

/// In-memory history stack.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Mutex<Vec<Location>>,
    current: watch::Sender<Location>,
}

impl MemoryHistory {
    /// Creates a history positioned at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let initial = Location {
            path: path.into(),
            warped: false,
        };
        let (current, _) = watch::channel(initial.clone());
        Self {
            entries: Mutex::new(vec![initial]),
            current,
        }
    }

    /// Current location.
    #[must_use]
    pub fn current(&self) -> Location {
        self.current.borrow().clone()
    }

    /// Every location visited, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<Location> {
        self.lock().clone()
    }

    /// Number of navigations recorded (excluding the initial entry).
    #[must_use]
    pub fn navigation_count(&self) -> usize {
        self.lock().len().saturating_sub(1)
    }

    /// Watches the current location.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.current.subscribe()
    }

    /// Reads the `warped` flag of the current location and clears it, so a
    /// reload does not replay the entry.
    pub fn take_warped(&self) -> bool {
        let mut taken = false;
        self.current.send_if_modified(|loc| {
            taken = std::mem::take(&mut loc.warped);
            taken
        });
        if taken {
            if let Some(last) = self.lock().last_mut() {
                last.warped = false;
            }
        }
        taken
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Location>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for MemoryHistory {
    fn navigate(&self, request: NavigationRequest) {
        let location = Location {
            path: request.target,
            warped: request.warped,
        };
        tracing::info!(path = %location.path, warped = location.warped, "navigated");
        self.lock().push(location.clone());
        self.current.send_replace(location);
    }
}

/// Ordered, non-empty list of project pages that wraps around.
#[derive(Debug, Clone)]
pub struct ProjectRing {
    projects: Vec<Project>,
}

impl ProjectRing {
    /// Creates a ring.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `projects` is empty.
    pub fn new(projects: Vec<Project>) -> Result<Self, ConfigError> {
        if projects.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "projects".to_string(),
                value: "[]".to_string(),
                expected: "at least one project".to_string(),
            });
        }
        Ok(Self { projects })
    }

    /// Number of projects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Always `false`; rings are never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Position of the project with `id`.
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.projects.iter().position(|p| p.id == id)
    }

    /// Project at `index`, wrapping.
    #[must_use]
    pub fn get(&self, index: usize) -> &Project {
        &self.projects[index % self.projects.len()]
    }

    /// Index of the project after `index`, wrapping to the first.
    #[must_use]
    pub fn next_after(&self, index: usize) -> usize {
        (index + 1) % self.projects.len()
    }

    /// Projects in order.
    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(ids: &[&str]) -> ProjectRing {
        ProjectRing::new(ids.iter().map(|id| Project::new(*id)).collect()).unwrap()
    }

    #[test]
    fn next_wraps_around() {
        let r = ring(&["a", "b", "c"]);
        assert_eq!(r.next_after(0), 1);
        assert_eq!(r.next_after(2), 0);
        assert_eq!(r.get(r.next_after(2)).id, "a");
    }

    #[test]
    fn single_project_points_to_itself() {
        let r = ring(&["solo"]);
        assert_eq!(r.next_after(0), 0);
    }

    #[test]
    fn empty_ring_rejected() {
        assert!(ProjectRing::new(Vec::new()).is_err());
    }

    #[test]
    fn route_format() {
        assert_eq!(project_route("orbit"), "/project/orbit");
    }

    #[test]
    fn navigation_records_and_broadcasts() {
        let history = MemoryHistory::new("/project/a");
        let mut rx = history.subscribe();
        history.navigate(NavigationRequest {
            target: "/project/b".to_string(),
            warped: true,
        });

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().path, "/project/b");
        assert_eq!(history.navigation_count(), 1);
        assert_eq!(history.entries()[0].path, "/project/a");
    }

    #[test]
    fn warped_flag_is_read_once() {
        let history = MemoryHistory::new("/project/a");
        history.navigate(NavigationRequest {
            target: "/project/b".to_string(),
            warped: true,
        });

        assert!(history.take_warped());
        assert!(!history.take_warped());
        assert!(!history.current().warped);
        assert_eq!(history.current().path, "/project/b");
        assert!(!history.entries()[1].warped);
    }

    #[test]
    fn plain_navigation_is_not_warped() {
        let history = MemoryHistory::new("/");
        history.navigate(NavigationRequest {
            target: "/project/a".to_string(),
            warped: false,
        });
        assert!(!history.take_warped());
    }
}
