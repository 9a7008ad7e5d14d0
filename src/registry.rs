//! Explicit application registration and contract validation.
//!
//! Each implementation registers a factory together with the set of base
//! methods it defines. At load time the registry keeps only registrations that
//! define `job` and leave the sealed `run` wrapper alone.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::ApiTable;
use crate::application::{AppHandle, Application};
use crate::error::CoreError;

/// Base methods an implementation can define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// The job body. Required.
    Job,
    /// The sealed execution wrapper. Must never be redefined.
    Run,
    /// The optional teardown hook.
    Shutdown,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Job => "job",
            Method::Run => "run",
            Method::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Factory = Box<dyn Fn() -> Box<dyn Application> + Send + Sync>;

/// One implementation: its name, the methods it defines and how to build it.
pub struct Registration {
    name: String,
    defines: HashSet<Method>,
    factory: Factory,
}

impl Registration {
    pub fn new<F, A>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
        A: Application,
    {
        Self {
            name: name.into(),
            defines: HashSet::new(),
            factory: Box::new(move || Box::new(factory()) as Box<dyn Application>),
        }
    }

    /// Declare the base methods this implementation defines itself.
    pub fn defines(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.defines.extend(methods);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check the override contract.
    pub fn validate(&self) -> Result<(), CoreError> {
        if is_method_overridden(self, Method::Run) {
            return Err(CoreError::Contract {
                name: self.name.clone(),
                reason: "overrides the run method, which is not allowed".to_string(),
            });
        }
        if !is_method_overridden(self, Method::Job) {
            return Err(CoreError::Contract {
                name: self.name.clone(),
                reason: "does not override the job method".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("defines", &self.defines)
            .finish()
    }
}

/// True iff `registration` defines `method` itself rather than inheriting the base one.
pub fn is_method_overridden(registration: &Registration, method: Method) -> bool {
    registration.defines.contains(&method)
}

/// Every known implementation, in registration order.
#[derive(Default)]
pub struct Registry {
    registrations: Vec<Registration>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registration: Registration) -> &mut Self {
        self.registrations.push(registration);
        self
    }

    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registrations paired with their contract verdict.
    pub fn verdicts(&self) -> Vec<(&Registration, Result<(), CoreError>)> {
        let mut seen = HashSet::new();
        self.registrations
            .iter()
            .map(|reg| {
                let verdict = reg.validate().and_then(|()| {
                    if seen.insert(reg.name.as_str()) {
                        Ok(())
                    } else {
                        Err(CoreError::Contract {
                            name: reg.name.clone(),
                            reason: "an application with this name is already registered".to_string(),
                        })
                    }
                });
                (reg, verdict)
            })
            .collect()
    }

    /// Build one instance per valid registration, bound to `apis`.
    ///
    /// Rejected registrations are logged and skipped. An empty result is not an error.
    pub fn load(&self, apis: Arc<ApiTable>) -> Vec<Arc<AppHandle>> {
        let mut applications = Vec::new();

        for (reg, verdict) in self.verdicts() {
            if let Err(e) = verdict {
                warn!(app = %reg.name, error = %e, "Skipping application");
                continue;
            }
            let app = (reg.factory)();
            applications.push(Arc::new(AppHandle::new(reg.name.as_str(), app, Arc::clone(&apis))));
            debug!(app = %reg.name, "Application loaded");
        }

        applications
    }
}
