//! Collections shared by the tessera crates.

pub mod map;
