//! Soundscape Surface - control surface for spatial audio sound objects
//!
//! Keeps sound object parameters (position, reverb send gain, spread, delay
//! mode) in sync between host automation, the editor views and a remote
//! sound object processor reached over OSC.

pub mod bridge;
pub mod change;
pub mod config;
pub mod controller;
pub mod error;
pub mod params;
pub mod paths;
pub mod processor;
pub mod state_xml;

pub use error::{Result, SurfaceError};
