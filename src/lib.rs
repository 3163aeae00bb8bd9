pub mod analysis;
pub mod assets;
pub mod config;
pub mod net;
pub mod pose;
pub mod session;
