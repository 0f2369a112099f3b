//! Decision core of the chargemon charging indicator.
//!
//! The binary wires these modules to the hardware crate; the modules
//! themselves are hardware-free so the whole display lifecycle can be
//! driven in tests with scripted battery samples and input events.

pub mod config;
pub mod frontend;
pub mod state;
