// crates/server/src/tools/mod.rs
//! Built-in tools shipped with the server binary.

pub mod simulate;

pub use simulate::SimulateWorkTool;
