// Library target shared by the binary, the integration tests in tests/ and the
// criterion benches. main.rs only wires the terminal and the CLI around it.

pub mod api;
pub mod app;
pub mod config;
pub mod engine;
pub mod event;
pub mod session;
pub mod store;
pub mod ui;
pub mod worker;
