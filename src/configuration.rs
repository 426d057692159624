//! The lifecycle of a configuration.
//!
//! A [`Configuration`] owns the registered options and the search list of files. Loading it runs
//! the passes in order of precedence and keeps the resolved tree until it is reset.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use log::{debug, trace, warn};
use serde::de::DeserializeOwned;
use structopt::clap::Error as ClapError;

use crate::cli::{self, AppInfo};
use crate::env::{self as env_pass, Environment, ProcessEnv};
use crate::error::{AlreadyLoaded, AnyError};
use crate::files;
use crate::opt::Opt;
use crate::registry::Registry;
use crate::value::{get_path, Map, Value};

/// The configuration of an application.
///
/// This is the central object of the library. The application declares its options on it, then
/// [`load`][Configuration::load]s it and reads the resolved values.
///
/// The value of each option is resolved from these sources, the later ones overriding the former:
///
/// 1. The default of the option.
/// 2. The configuration files, in the order of the [search list][Configuration::config_files].
/// 3. The environment variable of the option.
/// 4. The command line flag of the option.
///
/// The object is not global. The application creates one (usually in `main`) and passes it (or
/// the values read from it) to whoever needs it.
///
/// # Lifecycle
///
/// A fresh configuration is *unloaded* and holds no values. Loading it makes it *loaded*, loading
/// again is an error ([`AlreadyLoaded`]). [`reset`][Configuration::reset] throws all the values
/// away and makes it *unloaded* again, but keeps the registered options, so it can be loaded again
/// (possibly after registering more options or changing the search list).
///
/// # Examples
///
/// ```rust
/// use std::collections::HashMap;
///
/// use optfold::{Configuration, Opt, Type, Value};
///
/// # fn main() -> Result<(), optfold::AnyError> {
/// let mut config = Configuration::new();
/// config.set_config_files(Vec::<&str>::new());
/// config.options(vec![
///     Opt::new("port")
///         .path("server")
///         .flag("port")
///         .env("APP_PORT")
///         .ty(Type::Number)
///         .default_value(8080),
///     Opt::new("inDebt").env("IN_DEBT"),
/// ])?;
///
/// let mut env = HashMap::new();
/// env.insert("IN_DEBT".to_owned(), "ENVOverride".to_owned());
/// config.load_from(vec!["app", "--port", "1234"], &env)?;
///
/// assert_eq!(Some(&Value::Integer(1234)), config.get("server.port"));
/// assert_eq!(Some("ENVOverride"), config.value("inDebt").and_then(Value::as_str));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Configuration {
    registry: Registry,
    files: Vec<PathBuf>,
    info: AppInfo,
    values: Map,
    loaded: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

impl Configuration {
    /// Creates an empty configuration, with the default search list of files.
    ///
    /// See [`default_paths`][crate::files::default_paths] for the list.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            files: files::default_paths(),
            info: AppInfo::default(),
            values: Map::new(),
            loaded: false,
        }
    }

    /// The application name shown in the command line help.
    pub fn with_name<N: Into<String>>(self, name: N) -> Self {
        Self {
            info: AppInfo {
                name: Some(name.into()),
                ..self.info
            },
            ..self
        }
    }

    /// A description of the application shown in the command line help.
    pub fn with_about<A: Into<String>>(self, about: A) -> Self {
        Self {
            info: AppInfo {
                about: Some(about.into()),
                ..self.info
            },
            ..self
        }
    }

    /// Enables `--version` on the command line.
    pub fn with_version<V: Into<String>>(self, version: V) -> Self {
        Self {
            info: AppInfo {
                version: Some(version.into()),
                ..self.info
            },
            ..self
        }
    }

    /// Registers an option.
    ///
    /// See [`Registry::register`] for when it fails. Options registered after loading take part
    /// in the next load (after a [`reset`][Configuration::reset]).
    pub fn option(&mut self, opt: Opt) -> Result<(), AnyError> {
        self.registry.register(opt)
    }

    /// Registers multiple options.
    ///
    /// Stops on the first refused one. The ones before it stay registered.
    pub fn options<I: IntoIterator<Item = Opt>>(&mut self, opts: I) -> Result<(), AnyError> {
        opts.into_iter().try_for_each(|opt| self.option(opt))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The configuration files searched during load, in the order of increasing precedence.
    pub fn config_files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Replaces the search list of configuration files.
    ///
    /// The files need not exist, missing ones are skipped during load.
    pub fn set_config_files<I, P>(&mut self, files: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files = files.into_iter().map(Into::into).collect();
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Loads the configuration from the command line and environment of the process.
    ///
    /// If the command line can't be parsed (or if the user asks for `--help` or `--version`), the
    /// appropriate message is printed and the application terminates.
    ///
    /// Any other problem is returned as an error and the configuration stays unloaded.
    pub fn load(&mut self) -> Result<(), AnyError> {
        match self.load_from(env::args_os(), &ProcessEnv) {
            Ok(()) => Ok(()),
            Err(e) => match e.downcast::<ClapError>() {
                Ok(clap_err) => clap_err.exit(),
                Err(e) => Err(e),
            },
        }
    }

    /// Loads the configuration from the provided command line and environment.
    ///
    /// The first item of `args` is the name of the program, like in [`std::env::args_os`].
    ///
    /// Unlike [`load`][Configuration::load], this never terminates the application. Command
    /// line problems are returned as the clap error, including the requests for help.
    pub fn load_from<I, T, E>(&mut self, args: I, env: &E) -> Result<(), AnyError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
        E: Environment + ?Sized,
    {
        if self.loaded {
            return Err(AlreadyLoaded.into());
        }
        debug!(
            "Loading configuration of {} options from {} candidate files",
            self.registry.len(),
            self.files.len()
        );
        // Built aside, so a failure leaves nothing half-done behind.
        let mut tree = Map::new();
        self.apply_defaults(&mut tree);

        let from_files = files::load(&self.files)?;
        trace!("Files provided top-level keys {:?}", from_files.keys());
        tree.extend(from_files);
        // A file replacing a whole top-level map may have taken some defaults with it.
        self.fill_missing(&mut tree);

        env_pass::apply(&self.registry, env, &mut tree);
        cli::apply(&self.info, &self.registry, args, &mut tree)?;

        self.values = tree;
        self.loaded = true;
        debug!("Configuration loaded: {}", Value::Map(self.values.clone()));
        Ok(())
    }

    fn apply_defaults(&self, tree: &mut Map) {
        for opt in self.registry.iter() {
            opt.set_value(tree, opt.initial_value());
        }
    }

    /// Writes the default of every option whose location no longer exists.
    ///
    /// A scalar a file put where the option needs a map is replaced by the map.
    fn fill_missing(&self, tree: &mut Map) {
        for opt in self.registry.iter() {
            if get_path(tree, &opt.location()).is_none() {
                trace!("Restoring default of {} lost to a config file", opt.name);
                opt.set_value(tree, opt.initial_value());
            }
        }
    }

    /// Throws away all the resolved values.
    ///
    /// The registered options and the search list are kept. It is fine to reset an unloaded
    /// configuration.
    pub fn reset(&mut self) {
        debug!("Resetting configuration");
        self.values.clear();
        self.loaded = false;
    }

    /// The whole resolved tree.
    ///
    /// Empty when not loaded.
    pub fn values(&self) -> &Map {
        &self.values
    }

    /// The value at the dot-delimited path, like `server.listen.port`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.values, path)
    }

    /// The resolved value of the registered option.
    pub fn value(&self, name: &str) -> Option<&Value> {
        let opt = self.registry.get(name)?;
        get_path(&self.values, &opt.location())
    }

    /// Decodes the part of the tree at the path into a type.
    ///
    /// Returns `Ok(None)` if there's nothing at the path.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AnyError> {
        self.get(path)
            .map(|value| decode(value.clone(), path))
            .transpose()
    }

    /// Decodes the whole tree into a type.
    ///
    /// The error points to the place in the tree that failed to decode. Keys in the tree the type
    /// doesn't know are logged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::collections::HashMap;
    ///
    /// use optfold::{Configuration, Opt, Type};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// #[serde(rename_all = "camelCase")]
    /// struct Cfg {
    ///     log_level: String,
    ///     workers: u16,
    /// }
    ///
    /// # fn main() -> Result<(), optfold::AnyError> {
    /// let mut config = Configuration::new();
    /// config.set_config_files(Vec::<&str>::new());
    /// config.option(Opt::new("logLevel").flag("log-level").default_value("warn"))?;
    /// config.option(Opt::new("workers").env("WORKERS").ty(Type::Number).default_value(1))?;
    /// config.load_from(vec!["app", "--log-level", "debug"], &HashMap::<String, String>::new())?;
    ///
    /// let cfg: Cfg = config.extract()?;
    /// assert_eq!("debug", cfg.log_level);
    /// assert_eq!(1, cfg.workers);
    /// # Ok(())
    /// # }
    /// ```
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, AnyError> {
        decode(Value::Map(self.values.clone()), "")
    }
}

fn decode<T: DeserializeOwned>(value: Value, base: &str) -> Result<T, AnyError> {
    let mut ignored = Vec::new();
    let result = {
        let mut track = |path: serde_ignored::Path| ignored.push(path.to_string());
        let de = serde_ignored::Deserializer::new(value, &mut track);
        serde_path_to_error::deserialize(de)?
    };
    for path in ignored {
        if base.is_empty() {
            warn!("Unused configuration key {}", path);
        } else {
            warn!("Unused configuration key {}.{}", base, path);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use maplit::hashmap;
    use serde::Deserialize;

    use super::*;
    use crate::error::DuplicateBinding;
    use crate::opt::Type;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    fn configuration(opts: Vec<Opt>) -> Configuration {
        let mut config = Configuration::new();
        config.set_config_files(Vec::<PathBuf>::new());
        config.options(opts).unwrap();
        config
    }

    #[test]
    fn defaults_applied() {
        let mut config = configuration(vec![
            Opt::new("clitest").flag("ctest").default_value("rrrr"),
            Opt::new("port").path("server.listen").default_value(80),
            Opt::new("nothing"),
        ]);
        config.load_from(vec!["app"], &no_env()).unwrap();
        assert!(config.is_loaded());
        assert_eq!(Some(&Value::from("rrrr")), config.get("clitest"));
        assert_eq!(Some(&Value::Integer(80)), config.get("server.listen.port"));
        assert_eq!(Some(&Value::Integer(80)), config.value("port"));
        assert_eq!(Some(&Value::Null), config.value("nothing"));
    }

    #[test]
    fn env_over_default_cli_over_env() {
        let opts = || {
            vec![Opt::new("level")
                .flag("level")
                .env("LEVEL")
                .default_value("default")]
        };
        let env = hashmap! {
            "LEVEL".to_owned() => "env".to_owned(),
        };

        let mut config = configuration(opts());
        config.load_from(vec!["app"], &env).unwrap();
        assert_eq!(Some("env"), config.value("level").and_then(Value::as_str));

        let mut config = configuration(opts());
        config
            .load_from(vec!["app", "--level", "cli"], &env)
            .unwrap();
        assert_eq!(Some("cli"), config.value("level").and_then(Value::as_str));
    }

    #[test]
    fn double_load() {
        let mut config = configuration(vec![Opt::new("x").default_value(1)]);
        config.load_from(vec!["app"], &no_env()).unwrap();
        config
            .load_from(vec!["app"], &no_env())
            .unwrap_err()
            .downcast_ref::<AlreadyLoaded>()
            .expect("Different error returned");
        // Still loaded with the old values
        assert!(config.is_loaded());
        assert_eq!(Some(&Value::Integer(1)), config.get("x"));

        config.reset();
        config.load_from(vec!["app"], &no_env()).unwrap();
    }

    #[test]
    fn reset_clears_values_keeps_options() {
        let mut config = configuration(vec![Opt::new("x").default_value(1)]);
        config.reset();
        assert!(!config.is_loaded());
        config.load_from(vec!["app"], &no_env()).unwrap();
        config.reset();
        assert!(!config.is_loaded());
        assert!(config.values().is_empty());
        assert_eq!(1, config.registry().len());
    }

    #[test]
    fn reset_then_load_same_as_fresh() {
        let opts = || {
            vec![
                Opt::new("a").env("A").default_value("x"),
                Opt::new("b").path("deep.er").flag("bee").default_value(false),
            ]
        };
        let env = hashmap! {
            "A".to_owned() => "from env".to_owned(),
        };
        let args = vec!["app", "--bee", "yes"];

        let mut fresh = configuration(opts());
        fresh.load_from(args.clone(), &env).unwrap();

        let mut reused = configuration(opts());
        reused.load_from(vec!["app"], &no_env()).unwrap();
        reused.reset();
        reused.load_from(args, &env).unwrap();

        assert_eq!(fresh.values(), reused.values());
    }

    #[test]
    fn failed_load_stays_unloaded() {
        let mut config = configuration(vec![Opt::new("port").flag("port").ty(Type::Number)]);
        config
            .load_from(vec!["app", "--port", "many"], &no_env())
            .unwrap_err()
            .downcast_ref::<ClapError>()
            .expect("Different error returned");
        assert!(!config.is_loaded());
        assert!(config.values().is_empty());
        config.load_from(vec!["app", "--port", "1"], &no_env()).unwrap();
    }

    #[test]
    fn late_option_after_reset() {
        let mut config = configuration(vec![]);
        config.load_from(vec!["app"], &no_env()).unwrap();
        config.reset();
        config
            .option(Opt::new("clitest").flag("ctest").default_value("rrrr"))
            .unwrap();
        config.load_from(vec!["app"], &no_env()).unwrap();
        assert_eq!(Some(&Value::from("rrrr")), config.get("clitest"));
    }

    #[test]
    fn options_stop_at_first_refused() {
        let mut config = configuration(vec![]);
        let err = config
            .options(vec![
                Opt::new("a").env("SAME"),
                Opt::new("b").env("SAME"),
                Opt::new("c"),
            ])
            .unwrap_err();
        err.downcast_ref::<DuplicateBinding>()
            .expect("Different error returned");
        assert!(config.registry().get("a").is_some());
        assert!(config.registry().get("c").is_none());
    }

    #[test]
    fn config_files_replaced() {
        let mut config = Configuration::new();
        assert_eq!(4, config.config_files().len());
        config.set_config_files(vec!["./xxx/yyy.yml"]);
        assert_eq!(&[PathBuf::from("./xxx/yyy.yml")], config.config_files());
        config.load_from(vec!["app"], &no_env()).unwrap();
    }

    #[test]
    fn extract_typed() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Listen {
            host: String,
            port: u16,
        }

        #[derive(Debug, Deserialize, PartialEq)]
        struct Cfg {
            listen: Listen,
            verbose: u8,
        }

        let mut config = configuration(vec![
            Opt::new("host").path("listen").default_value("localhost"),
            Opt::new("port")
                .path("listen")
                .env("PORT")
                .ty(Type::Number)
                .default_value(80),
            Opt::new("verbose").flag("verbose").short('v').ty(Type::Count).default_value(0),
        ]);
        let env = hashmap! {
            "PORT".to_owned() => "8080".to_owned(),
        };
        config.load_from(vec!["app", "-vv"], &env).unwrap();
        let cfg: Cfg = config.extract().unwrap();
        assert_eq!(
            Cfg {
                listen: Listen {
                    host: "localhost".to_owned(),
                    port: 8080,
                },
                verbose: 2,
            },
            cfg
        );
        let listen: Listen = config.get_as("listen").unwrap().unwrap();
        assert_eq!(8080, listen.port);
        assert!(config.get_as::<Listen>("nowhere").unwrap().is_none());
    }

    #[test]
    fn extract_error_has_path() {
        #[derive(Debug, Deserialize)]
        struct Listen {
            #[allow(dead_code)]
            port: u16,
        }

        #[derive(Debug, Deserialize)]
        struct Cfg {
            #[allow(dead_code)]
            listen: Listen,
        }

        let mut config = configuration(vec![Opt::new("port")
            .path("listen")
            .default_value("not a port")]);
        config.load_from(vec!["app"], &no_env()).unwrap();
        let err = config.extract::<Cfg>().unwrap_err();
        assert!(err.to_string().starts_with("listen.port"));
    }
}
