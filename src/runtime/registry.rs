//! Name-keyed registry of available runtimes with role-based selection.

use super::{CliRuntime, PRIMARY_RUNTIME, Runtime, RuntimeKind};
use crate::config::{GateToml, RuntimesSection};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Role name for independent verification.
pub const AUDITOR_ROLE: &str = "auditor";

/// Selection order for [`AUDITOR_ROLE`]: independent runtimes first, the
/// primary runtime last.
pub const AUDITOR_FALLBACK: [&str; 3] = ["codex", "opencode", "claude"];

/// Available runtimes keyed by name.
///
/// Lookups take a shared read lock and `register` takes the write lock.
/// The lock is never held across an `.await`.
#[derive(Default)]
pub struct RuntimeRegistry {
    runtimes: RwLock<HashMap<String, Arc<dyn Runtime>>>,
}

impl fmt::Debug for RuntimeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeRegistry")
            .field("runtimes", &self.list())
            .finish()
    }
}

impl RuntimeRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Probe the built-in runtimes using default command names and any
    /// `*_CMD` environment overrides.
    pub fn discover() -> Self {
        let mut config = GateToml::default();
        config.apply_env();
        Self::discover_with(&config.runtimes)
    }

    /// Probe the built-in runtimes using the given commands, registering
    /// each one found on this system.
    pub fn discover_with(commands: &RuntimesSection) -> Self {
        let registry = Self::empty();
        for &kind in RuntimeKind::all() {
            let runtime = CliRuntime::with_command(kind, commands.command_for(kind));
            if runtime.available() {
                registry.register(Arc::new(runtime));
            } else {
                debug!(runtime = kind.name(), command = runtime.command(), "runtime not found");
            }
        }
        registry
    }

    /// A registry holding exactly `runtimes`, without probing.
    pub fn with_runtimes<I>(runtimes: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Runtime>>,
    {
        let registry = Self::empty();
        for runtime in runtimes {
            registry.register(runtime);
        }
        registry
    }

    /// Add or replace a runtime under its own name.
    pub fn register(&self, runtime: Arc<dyn Runtime>) {
        let name = runtime.name().to_string();
        debug!(runtime = %name, "registering runtime");
        self.runtimes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, runtime);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Runtime>> {
        self.runtimes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .runtimes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn has_runtime(&self, name: &str) -> bool {
        self.runtimes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// At least one runtime is registered.
    pub fn any_available(&self) -> bool {
        !self
            .runtimes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Pick the runtime for `role`.
    ///
    /// The auditor role takes the first present of [`AUDITOR_FALLBACK`];
    /// every other role gets the primary runtime. `None` when nothing
    /// suitable is registered.
    pub fn get_for_role(&self, role: &str) -> Option<Arc<dyn Runtime>> {
        let runtimes = self.runtimes.read().unwrap_or_else(PoisonError::into_inner);
        if role == AUDITOR_ROLE {
            AUDITOR_FALLBACK
                .iter()
                .find_map(|name| runtimes.get(*name).cloned())
        } else {
            runtimes.get(PRIMARY_RUNTIME).cloned()
        }
    }

    /// The auditor role resolves to a runtime other than the primary one.
    pub fn is_independent_verification(&self) -> bool {
        self.get_for_role(AUDITOR_ROLE)
            .is_some_and(|rt| super::is_independent(rt.name()))
    }
}
