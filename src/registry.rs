//! The table of declared options.
//!
//! Besides storing the options, the registry keeps indices from the command line flags and
//! environment variable names back to the owning option and it refuses any option that would
//! claim something already taken.

use std::collections::HashMap;
use std::hash::Hash;

use log::debug;

use crate::cli::FlagSchema;
use crate::error::{AnyError, Binding, DuplicateBinding, InvalidOption};
use crate::opt::Opt;

/// All the registered options, in the order of registration.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    options: Vec<Opt>,
    by_name: HashMap<String, usize>,
    by_flag: HashMap<String, usize>,
    by_short: HashMap<char, usize>,
    by_env: HashMap<String, usize>,
    schema: Vec<FlagSchema>,
}

fn invalid(opt: &Opt, reason: &'static str) -> AnyError {
    InvalidOption {
        name: opt.name.clone(),
        reason,
    }
    .into()
}

fn validate(opt: &Opt) -> Result<(), AnyError> {
    if opt.name.is_empty() {
        return Err(invalid(opt, "the name must not be empty"));
    }
    if opt.name.contains('.') {
        return Err(invalid(opt, "the name must not contain a dot, use the path"));
    }
    if !opt.path.is_empty() && opt.path.split('.').any(str::is_empty) {
        return Err(invalid(opt, "the path contains an empty segment"));
    }
    if let Some(flag) = opt.flag.as_ref() {
        if flag.starts_with('-') {
            return Err(invalid(opt, "the flag must be given without the leading dashes"));
        }
        if flag.chars().any(char::is_whitespace) {
            return Err(invalid(opt, "the flag must not contain whitespace"));
        }
        if flag == "help" || flag == "version" {
            return Err(invalid(opt, "the flag is reserved by the command line parser"));
        }
    }
    if let Some(short) = opt.short_flag {
        if opt.flag.is_none() {
            return Err(invalid(opt, "a short flag needs a long flag too"));
        }
        if !short.is_ascii_alphanumeric() {
            return Err(invalid(opt, "the short flag must be a letter or a digit"));
        }
        if short == 'h' || short == 'V' {
            return Err(invalid(opt, "the short flag is reserved by the command line parser"));
        }
    }
    Ok(())
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn claim<K>(
        &self,
        index: &HashMap<K, usize>,
        key: &K,
        binding: Binding,
        opt: &Opt,
    ) -> Result<(), AnyError>
    where
        K: Hash + Eq + ToString,
    {
        match index.get(key) {
            Some(&existing) => Err(DuplicateBinding {
                binding,
                key: key.to_string(),
                existing: self.options[existing].name.clone(),
                refused: opt.name.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Adds another option.
    ///
    /// The option is refused if it is malformed ([`InvalidOption`]) or if its name, flag, short
    /// flag or environment variable already belongs to another option ([`DuplicateBinding`]). A
    /// refused option leaves the registry unchanged.
    pub fn register(&mut self, opt: Opt) -> Result<(), AnyError> {
        validate(&opt)?;
        self.claim(&self.by_name, &opt.name, Binding::Name, &opt)?;
        if let Some(flag) = opt.flag.as_ref() {
            self.claim(&self.by_flag, flag, Binding::Flag, &opt)?;
        }
        if let Some(short) = opt.short_flag.as_ref() {
            self.claim(&self.by_short, short, Binding::ShortFlag, &opt)?;
        }
        if let Some(env) = opt.env_flag.as_ref() {
            self.claim(&self.by_env, env, Binding::EnvVar, &opt)?;
        }

        let idx = self.options.len();
        debug!(
            "Registered option {} at {} (flag: {:?}, env: {:?})",
            opt.name,
            opt.location(),
            opt.flag,
            opt.env_flag
        );
        self.by_name.insert(opt.name.clone(), idx);
        if let Some(flag) = opt.flag.as_ref() {
            self.by_flag.insert(flag.clone(), idx);
            self.schema.push(FlagSchema::new(&opt, idx));
        }
        if let Some(short) = opt.short_flag {
            self.by_short.insert(short, idx);
        }
        if let Some(env) = opt.env_flag.as_ref() {
            self.by_env.insert(env.clone(), idx);
        }
        self.options.push(opt);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Opt> {
        self.by_name.get(name).map(|&idx| &self.options[idx])
    }

    /// The option owning the long command line flag.
    pub fn by_flag(&self, flag: &str) -> Option<&Opt> {
        self.by_flag.get(flag).map(|&idx| &self.options[idx])
    }

    /// The option reading the environment variable.
    pub fn by_env(&self, var: &str) -> Option<&Opt> {
        self.by_env.get(var).map(|&idx| &self.options[idx])
    }

    /// Iterates the options in the order they were registered.
    pub fn iter(&self) -> impl Iterator<Item = &Opt> {
        self.options.iter()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub(crate) fn option_at(&self, idx: usize) -> &Opt {
        &self.options[idx]
    }

    /// The command line description of the options that have a flag.
    pub(crate) fn schema(&self) -> &[FlagSchema] {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dup(err: &AnyError) -> &DuplicateBinding {
        err.downcast_ref::<DuplicateBinding>()
            .expect("Different error returned")
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = Registry::new();
        registry
            .register(Opt::new("port").flag("port").env("PORT"))
            .unwrap();
        registry.register(Opt::new("quiet")).unwrap();

        assert_eq!(2, registry.len());
        assert_eq!("port", registry.by_flag("port").unwrap().name);
        assert_eq!("port", registry.by_env("PORT").unwrap().name);
        assert!(registry.get("quiet").is_some());
        assert!(registry.by_flag("quiet").is_none());
        assert_eq!(1, registry.schema().len());
        let names = registry.iter().map(|o| o.name.as_str()).collect::<Vec<_>>();
        assert_eq!(vec!["port", "quiet"], names);
    }

    #[test]
    fn empty_name() {
        Registry::new()
            .register(Opt::new(""))
            .unwrap_err()
            .downcast_ref::<InvalidOption>()
            .expect("Different error returned");
    }

    #[test]
    fn malformed() {
        let mut registry = Registry::new();
        for opt in vec![
            Opt::new("a.b"),
            Opt::new("x").path("a..b"),
            Opt::new("x").flag("--x"),
            Opt::new("x").flag("two words"),
            Opt::new("x").short('x'),
            Opt::new("x").flag("x").short('-'),
            Opt::new("x").flag("help"),
            Opt::new("x").flag("x").short('h'),
        ] {
            registry
                .register(opt)
                .unwrap_err()
                .downcast_ref::<InvalidOption>()
                .expect("Different error returned");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_name() {
        let mut registry = Registry::new();
        registry.register(Opt::new("x")).unwrap();
        let err = registry.register(Opt::new("x").path("other")).unwrap_err();
        assert_eq!(Binding::Name, dup(&err).binding);
    }

    #[test]
    fn duplicate_flag() {
        let mut registry = Registry::new();
        registry.register(Opt::new("a").flag("level")).unwrap();
        let err = registry.register(Opt::new("b").flag("level")).unwrap_err();
        let err = dup(&err);
        assert_eq!(Binding::Flag, err.binding);
        assert_eq!("a", err.existing);
        assert_eq!("b", err.refused);
        // The first one keeps it and the refused one is not there at all.
        assert_eq!("a", registry.by_flag("level").unwrap().name);
        assert!(registry.get("b").is_none());
    }

    #[test]
    fn duplicate_short() {
        let mut registry = Registry::new();
        registry.register(Opt::new("a").flag("aa").short('v')).unwrap();
        let err = registry
            .register(Opt::new("b").flag("bb").short('v'))
            .unwrap_err();
        assert_eq!(Binding::ShortFlag, dup(&err).binding);
    }

    #[test]
    fn duplicate_env() {
        let mut registry = Registry::new();
        registry.register(Opt::new("a").env("LEVEL")).unwrap();
        let err = registry.register(Opt::new("b").env("LEVEL")).unwrap_err();
        assert_eq!(Binding::EnvVar, dup(&err).binding);
        assert_eq!(1, registry.len());
    }
}
