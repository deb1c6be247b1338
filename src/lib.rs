pub mod config;
pub mod errors;
pub mod github;
pub mod lifecycle;
pub mod poll;
pub mod runner;
pub mod store;
pub mod util;
