// src/panel/drivers/mod.rs
//! Panel driver implementations.

pub mod headless;
#[cfg(test)]
pub mod mock;
pub mod st7789;

pub use headless::HeadlessPanelDriver;
pub use st7789::St7789;

#[cfg(target_os = "linux")]
pub use st7789::{open_linux, LinuxSt7789};
