#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod server_errors;
mod settings;
