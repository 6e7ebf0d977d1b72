pub mod constants;
pub mod engine;
pub mod error;
pub mod grid;
pub mod history;
pub mod pathfinder;
pub mod rng;
pub mod run;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
