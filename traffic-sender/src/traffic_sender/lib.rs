pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod generator;
pub mod http_util;

pub use config::SenderConfig;
pub use controller::{RateController, RateReader, RefreshMode};
pub use dispatcher::{Dispatcher, Pacing, WorkerClient};
pub use generator::WorkloadGenerator;
