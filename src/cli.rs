//! The command line pass.
//!
//! There's no fixed set of command line options. Every registered option with a
//! [`flag`][crate::Opt::flag] contributes one argument to a clap application, described by its
//! type hint, help text, choices and so on. The application is built from the registry on each
//! load, the arguments are parsed and whatever the user actually passed is written into the tree.
//!
//! Flags the user didn't pass are absent and don't touch the tree at all, even if the option has a
//! default. The default got there first, and any file or environment value must not be overwritten
//! by it.

use std::ffi::OsString;

use log::trace;
use structopt::clap::{App, AppSettings, Arg, ArgMatches, Error as ClapError};

use crate::opt::{parse_number, Opt, Type};
use crate::registry::Registry;
use crate::value::{Map, Value};

/// What the command line application is called and how it presents itself in `--help`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct AppInfo {
    pub(crate) name: Option<String>,
    pub(crate) about: Option<String>,
    pub(crate) version: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum FlagKind {
    /// `--flag`, turns into `true`.
    Switch,
    /// `-vvv`, turns into the number of occurrences.
    Counter,
    /// `--flag` or `--flag value`; the former turns into `true`.
    OptionalValue,
    /// `--flag value`, possibly repeated.
    Value { number: bool, multiple: bool },
}

/// Description of one command line argument, derived from an option when it is registered.
#[derive(Clone, Debug)]
pub(crate) struct FlagSchema {
    /// Index of the option in the registry.
    idx: usize,
    flag: String,
    short: Option<char>,
    help: Option<String>,
    kind: FlagKind,
    required: bool,
    choices: Vec<String>,
}

fn validate_number(value: String) -> Result<(), String> {
    parse_number(&value)
        .map(|_| ())
        .ok_or_else(|| format!("{:?} is not a number", value))
}

impl FlagSchema {
    /// Describes the option's flag.
    ///
    /// The option is expected to have a flag.
    pub(crate) fn new(opt: &Opt, idx: usize) -> Self {
        let kind = match opt.ty {
            Some(Type::Boolean) => FlagKind::Switch,
            Some(Type::Count) => FlagKind::Counter,
            ty if opt.collects() => FlagKind::Value {
                number: ty == Some(Type::Number),
                multiple: true,
            },
            Some(Type::Number) => FlagKind::Value {
                number: true,
                multiple: false,
            },
            Some(Type::String) => FlagKind::Value {
                number: false,
                multiple: false,
            },
            _ if opt.required => FlagKind::Value {
                number: false,
                multiple: false,
            },
            _ => FlagKind::OptionalValue,
        };
        let default = opt
            .default
            .as_ref()
            .filter(|d| !d.is_null())
            .map(|d| format!("[default: {}]", d));
        let help = match (opt.description.as_ref(), default) {
            (Some(descr), Some(default)) => Some(format!("{} {}", descr, default)),
            (Some(descr), None) => Some(descr.clone()),
            (None, default) => default,
        };
        Self {
            idx,
            flag: opt.flag.clone().unwrap_or_default(),
            short: opt.short_flag,
            help,
            kind,
            required: opt.required,
            choices: opt.choices.clone(),
        }
    }

    fn arg(&self) -> Arg<'_, '_> {
        let mut arg = Arg::with_name(&self.flag).long(&self.flag);
        if let Some(short) = self.short {
            arg = arg.short(short.to_string());
        }
        if let Some(help) = self.help.as_ref() {
            arg = arg.help(help);
        }
        match self.kind {
            FlagKind::Switch => (),
            FlagKind::Counter => arg = arg.multiple(true),
            FlagKind::OptionalValue => arg = arg.takes_value(true).min_values(0).max_values(1),
            FlagKind::Value { number, multiple } => {
                arg = arg.takes_value(true);
                if multiple {
                    arg = arg.multiple(true).number_of_values(1);
                }
                if number {
                    arg = arg.validator(validate_number);
                }
                // Only flags taking a value can require one.
                if self.required {
                    arg = arg.empty_values(false);
                }
            }
        }
        if !self.choices.is_empty() {
            let choices = self.choices.iter().map(String::as_str).collect::<Vec<_>>();
            arg = arg.possible_values(&choices);
        }
        arg
    }

    /// The value the user passed, if any.
    fn extract(&self, matches: &ArgMatches) -> Option<Value> {
        let occurrences = matches.occurrences_of(&self.flag);
        if occurrences == 0 {
            return None;
        }
        match self.kind {
            FlagKind::Switch => Some(Value::Bool(true)),
            FlagKind::Counter => Some(Value::Integer(occurrences as i64)),
            FlagKind::OptionalValue => Some(
                matches
                    .value_of(&self.flag)
                    .map(Value::from)
                    .unwrap_or(Value::Bool(true)),
            ),
            FlagKind::Value { number, multiple } => {
                let convert = |raw: &str| {
                    if number {
                        parse_number(raw).unwrap_or_else(|| Value::from(raw))
                    } else {
                        Value::from(raw)
                    }
                };
                let mut values = matches.values_of(&self.flag)?;
                if multiple {
                    Some(Value::Array(values.map(convert).collect()))
                } else {
                    values.next().map(convert)
                }
            }
        }
    }
}

fn app<'a>(info: &'a AppInfo, schema: &'a [FlagSchema]) -> App<'a, 'a> {
    let mut app = App::new(info.name.clone().unwrap_or_default())
        .setting(AppSettings::StrictUtf8)
        .setting(AppSettings::AllowNegativeNumbers)
        .args(&schema.iter().map(FlagSchema::arg).collect::<Vec<_>>());
    if let Some(about) = info.about.as_ref() {
        app = app.about(about.as_str());
    }
    if let Some(version) = info.version.as_ref() {
        app = app.version(version.as_str());
    }
    app
}

/// Parses the arguments and writes the passed flags into the tree.
///
/// The first argument is the name of the binary, as with [`std::env::args_os`].
pub(crate) fn apply<I, T>(
    info: &AppInfo,
    registry: &Registry,
    args: I,
    tree: &mut Map,
) -> Result<(), ClapError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let schema = registry.schema();
    let matches = app(info, schema).get_matches_from_safe(args)?;
    for flag in schema {
        if let Some(value) = flag.extract(&matches) {
            let opt = registry.option_at(flag.idx);
            trace!("Command line --{} sets {} to {}", flag.flag, opt.location(), value);
            opt.set_value(tree, value);
        }
    }
    Ok(())
}
