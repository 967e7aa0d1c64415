//! # Snake Arena Client
//!
//! The client never simulates the arena. It keeps a shadow of the last
//! snapshot the server sent and eases what it draws towards it, so snakes
//! glide smoothly even though snapshots arrive at 30 Hz and some are lost.
//!
//! ## Module Organization
//!
//! ### Reconciler Module (`reconciler`)
//! The shadow state: food diffs, snapshot targets, per-frame interpolation
//! with shortest-arc angle blending, reassembly of split ticks, and the
//! leaderboard.
//!
//! ### Network Module (`network`)
//! A tokio task reads the UDP socket into a channel that the frame loop
//! drains once per frame. Tracks our identity, repeats a join until its
//! replies arrive, notices our own death and keeps a short kill feed.
//!
//! ### Input Module (`input`)
//! Heading from the screen centre to the mouse, boost, respawn.
//!
//! ### Rendering Module (`rendering`)
//! Camera-follow drawing with macroquad plus the HUD.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::reconciler::ShadowState;
//! use shared::INTERPOLATION_FACTOR;
//!
//! let mut shadow = ShadowState::new();
//! shadow.apply_snapshot(1, vec![], &[], vec![]);
//! shadow.interpolate(INTERPOLATION_FACTOR);
//! ```

pub mod input;
pub mod network;
pub mod reconciler;
pub mod rendering;
