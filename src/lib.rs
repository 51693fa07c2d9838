pub mod bus;
pub mod config;
pub mod detector;
pub mod device;
pub mod error;
pub mod manager;
pub mod messages;
pub mod notifier;
pub mod poller;
pub mod sink;
pub mod status;
