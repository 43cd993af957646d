//! Dream Garage: liked-vehicle favorites and inline image compression
//! for a dealership catalog.

pub mod config;
pub mod handoff;
pub mod media;
pub mod state;
