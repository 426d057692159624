//! A small program resolving its configuration.
//!
//! Try running it with different arguments, environment and config files:
//!
//! ```sh
//! cargo run --example app -- --help
//! APP_LOG_LEVEL=info cargo run --example app -- -m hello -vv
//! ```
//!
//! Set `RUST_LOG=optfold=trace` to see where each value comes from.

use std::process;

use log::info;
use optfold::error;
use optfold::{AnyError, Configuration, Opt, Type};

fn run() -> Result<(), AnyError> {
    let mut config = Configuration::new()
        .with_name("app")
        .with_about("Shows the resolved configuration")
        .with_version(env!("CARGO_PKG_VERSION"));
    config.options(vec![
        Opt::new("myOption")
            .flag("myOption")
            .short('m')
            .description("I am a test option"),
        Opt::new("logLevel")
            .path("logging")
            .flag("log-level")
            .short('l')
            .env("APP_LOG_LEVEL")
            .choices(vec!["warn", "error", "info", "debug"])
            .default_value("warn")
            .description("The logging level"),
        Opt::new("verbosity")
            .path("logging")
            .flag("verbose")
            .short('v')
            .ty(Type::Count)
            .default_value(0)
            .description("More output, may be repeated"),
        Opt::new("include")
            .flag("include")
            .short('I')
            .ty(Type::Array)
            .env("APP_INCLUDE")
            .description("Additional paths to consider"),
    ])?;
    info!("Looking for config files in {:?}", config.config_files());
    config.load()?;
    for (key, value) in config.values() {
        println!("{} = {}", key, value);
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if error::log_errors("app", run).is_err() {
        process::exit(1);
    }
}
