pub mod buffer;
pub mod capture;
pub mod client;
pub mod config;
pub mod context;
pub mod platform;
pub mod player;
pub mod protocol;
pub mod session;
pub mod state;
pub mod voice;
