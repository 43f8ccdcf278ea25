pub mod client;
pub mod device;
pub mod manager;
pub mod mapping;
pub mod settings;
pub mod source;
pub mod target;
