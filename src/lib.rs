//! `holdwarp`: hold-to-warp interaction controller
//!
//! A press-and-hold gesture charges a progress meter; releasing early lets
//! it decay, holding to full commits a warp that navigates to the next
//! project page after a fixed animation window. While the warp sound cue
//! plays, background music is ducked over a broadcast bus.

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod navigation;
pub mod observability;
pub mod scenarios;
pub mod scene;
pub mod script;
pub mod simulation;
pub mod warp;
