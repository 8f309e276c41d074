pub mod auction;
pub mod cache;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod event;
pub mod logging;
pub mod render;
