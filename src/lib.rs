#![doc(test(attr(deny(warnings))))]
#![forbid(unsafe_code)]
//#![warn(missing_docs)]

//! Declarative options, resolved from defaults, configuration files, environment variables and the
//! command line.
//!
//! Most applications want to take their configuration from several places. There are defaults
//! built into the program, there's a configuration file (or several of them), some things are
//! more convenient to set through the environment and for a one-off change, the command line is
//! the most handy. Writing the code to merge all that by hand is boring and error prone.
//!
//! This crate lets the application *declare* its options instead. Each option says where it
//! lives in the configuration, what its default is and, optionally, which command line flag and
//! which environment variable may set it. The library then does the rest.
//!
//! # Precedence
//!
//! The sources are applied in a fixed order, each one overriding the former:
//!
//! 1. The defaults of the options.
//! 2. The configuration files. The files are taken from a search list (by default `config.yaml`,
//!    `config.json`, `config/config.yaml` and `config/config.json` in the current directory).
//!    Missing files are skipped, later files win. The files are merged only at their top level.
//! 3. The environment variables.
//! 4. The command line flags.
//!
//! A source that doesn't provide a value for an option (an unset variable, a flag not passed)
//! leaves the value from the previous step in place.
//!
//! The result is a tree of [`Value`]s. It can be read directly or decoded into the application's
//! own structures through [`serde`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use optfold::{Configuration, Opt, Type};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Server {
//!     host: String,
//!     port: u16,
//! }
//!
//! fn main() -> Result<(), optfold::AnyError> {
//!     let mut config = Configuration::new().with_name("hello");
//!     config.options(vec![
//!         Opt::new("host")
//!             .path("server")
//!             .flag("host")
//!             .env("HELLO_HOST")
//!             .default_value("localhost"),
//!         Opt::new("port")
//!             .path("server")
//!             .flag("port")
//!             .short('p')
//!             .env("HELLO_PORT")
//!             .ty(Type::Number)
//!             .default_value(8080)
//!             .description("Port to listen on"),
//!     ])?;
//!     config.load()?;
//!
//!     let server: Server = config.get_as("server")?.expect("Defaults are always there");
//!     println!("Listening on {}:{}", server.host, server.port);
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! * `yaml`: configuration files with the `.yaml` and `.yml` extension. On by default.
//! * `json`: configuration files with the `.json` extension. On by default.
//!
//! A configuration file of a format that is not enabled is treated as a file of unknown type.
//!
//! # Logging
//!
//! The library logs through the [`log`](https://crates.io/crates/log) facade. It never sets up a
//! logger on its own.

mod cli;
mod configuration;
pub mod env;
pub mod error;
pub mod files;
mod opt;
mod registry;
pub mod value;

pub use crate::configuration::Configuration;
pub use crate::env::{Environment, ProcessEnv};
pub use crate::error::AnyError;
pub use crate::opt::{Opt, Type};
pub use crate::registry::Registry;
pub use crate::value::{Map, Value};

pub mod prelude {
    //! The commonly used types, for glob imports.
    pub use super::{Configuration, Opt, Type, Value};
}
