use super::EnvError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::env;

/// Shell-session environment, shared between the parser, built-ins and every
/// spawned child.
///
/// Reads take the shared lock, so expansion never blocks behind another
/// reader. Nothing here touches the OS environment except
/// [`export_to_system`](Self::export_to_system) and
/// [`import_from_system`](Self::import_from_system).
#[derive(Debug, Default)]
pub struct Environment {
    vars: RwLock<HashMap<String, String>>,
}

impl Clone for Environment {
    fn clone(&self) -> Self {
        Self {
            vars: RwLock::new(self.vars.read().clone()),
        }
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment seeded from the current process.
    pub fn from_system() -> Self {
        let environment = Self::new();
        environment.import_from_system();
        environment
    }

    pub fn set(&self, name: &str, value: &str) -> Result<(), EnvError> {
        validate_name(name)?;
        self.vars.write().insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.vars.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.vars.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> bool {
        self.vars.write().remove(name).is_some()
    }

    /// All variables, ordered by name.
    pub fn get_all(&self) -> BTreeMap<String, String> {
        self.vars
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.vars.write().clear();
    }

    pub fn len(&self) -> usize {
        self.vars.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.read().is_empty()
    }

    /// Writes every variable into the process environment.
    ///
    /// The OS environment is process-global; callers must not race this
    /// against other threads reading or writing it.
    pub fn export_to_system(&self) {
        for (name, value) in self.vars.read().iter() {
            env::set_var(name, value);
        }
    }

    /// Merges the process environment in, overwriting duplicates. Entries
    /// that are not valid UTF-8 are skipped.
    pub fn import_from_system(&self) {
        let mut vars = self.vars.write();
        for (name, value) in env::vars_os() {
            if let (Ok(name), Ok(value)) = (name.into_string(), value.into_string()) {
                if validate_name(&name).is_ok() {
                    vars.insert(name, value);
                }
            }
        }
    }
}

fn validate_name(name: &str) -> Result<(), EnvError> {
    if name.is_empty() {
        return Err(EnvError::EmptyName);
    }
    if name.contains(['=', '\0']) {
        return Err(EnvError::InvalidName(name.to_owned()));
    }
    Ok(())
}
