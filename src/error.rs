//! Error handling utilities.
//!
//! All the fallible operations return [`AnyError`]. The conditions this crate detects on its own
//! have their own types, so they can be told apart with
//! [`downcast_ref`](https://doc.rust-lang.org/std/error/trait.Error.html#method.downcast_ref).
//! Errors of the file parsers are passed through as they are.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use err_context::prelude::*;
use log::{log, Level};

/// A wrapper type for any error.
///
/// This is just a type alias for boxed standard error. Any errors go and this is guaranteed to be
/// fully compatible.
pub type AnyError = Box<dyn Error + Send + Sync>;

/// Returned by [`load`][crate::Configuration::load] when the configuration is already loaded.
///
/// Call [`reset`][crate::Configuration::reset] first.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AlreadyLoaded;

impl Display for AlreadyLoaded {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "Configuration has already been loaded")
    }
}

impl Error for AlreadyLoaded {}

/// A file in the search list exists, but its extension isn't one of the known formats.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownFileType(pub PathBuf);

impl Display for UnknownFileType {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "Unknown configuration file type {}", self.0.display())
    }
}

impl Error for UnknownFileType {}

/// A configuration file doesn't contain a mapping at its top level.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotAMap(pub PathBuf);

impl Display for NotAMap {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(
            fmt,
            "Configuration file {} doesn't contain a map at the top level",
            self.0.display()
        )
    }
}

impl Error for NotAMap {}

/// An option refused by the registry because it is malformed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidOption {
    pub name: String,
    pub reason: &'static str,
}

impl Display for InvalidOption {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "Invalid option {:?}: {}", self.name, self.reason)
    }
}

impl Error for InvalidOption {}

/// What an option tried to claim that another one already owns.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Binding {
    Name,
    Flag,
    ShortFlag,
    EnvVar,
}

impl Display for Binding {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        let what = match self {
            Binding::Name => "name",
            Binding::Flag => "flag",
            Binding::ShortFlag => "short flag",
            Binding::EnvVar => "environment variable",
        };
        write!(fmt, "{}", what)
    }
}

/// Two options want the same name, flag or environment variable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DuplicateBinding {
    pub binding: Binding,
    pub key: String,
    /// The option registered first, which keeps the binding.
    pub existing: String,
    /// The option that was refused.
    pub refused: String,
}

impl Display for DuplicateBinding {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(
            fmt,
            "Option {:?} can't use {} {:?}, it already belongs to option {:?}",
            self.refused, self.binding, self.key, self.existing
        )
    }
}

impl Error for DuplicateBinding {}

/// How to format errors in logs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[non_exhaustive]
pub enum ErrorLogFormat {
    /// Multi-cause error will span multiple log messages.
    MultiLine,

    /// The error is formatted on a single line.
    ///
    /// The causes are separated by semicolons.
    SingleLine,
}

/// Log one error on given log level, with all its causes.
pub fn log_error(level: Level, target: &str, e: &AnyError, format: ErrorLogFormat) {
    match format {
        ErrorLogFormat::MultiLine => {
            for cause in e.chain() {
                log!(target: target, level, "{}", cause);
            }
        }
        ErrorLogFormat::SingleLine => {
            log!(target: target, level, "{}", e.display("; "));
        }
    }
}

/// A wrapper around a fallible function, logging any returned errors.
///
/// The errors will be logged in the provided target. You may want to provide `module_path!` as the
/// target.
///
/// # Examples
///
/// ```rust
/// use optfold::error;
/// use optfold::{Configuration, Opt};
///
/// let result = error::log_errors(module_path!(), || {
///     let mut config = Configuration::new();
///     config.option(Opt::new("verbose").flag("verbose"))?;
///     config.load_from(vec!["app"], &optfold::ProcessEnv)?;
///     Ok(config)
/// });
/// # let _result = result;
/// ```
pub fn log_errors<R, F>(target: &str, f: F) -> Result<R, AnyError>
where
    F: FnOnce() -> Result<R, AnyError>,
{
    let result = f();
    if let Err(ref e) = result {
        log_error(Level::Error, target, e, ErrorLogFormat::MultiLine);
    }
    result
}
