pub mod config;
pub mod constants;
pub mod dbus;
pub mod drivers;
pub mod input;
