//! Shake-to-disconnect: watches the active node of a node editor and, when
//! the user shakes it in place, removes every link attached to it.

pub mod collector;
pub mod config;
pub mod controller;
pub mod detector;
pub mod executor;
pub mod history;
pub mod notifier;
pub mod protocol;
pub mod socket;
