//! The ordered, immutable step registry.

use super::Step;
use crate::error::ProvisionError;
use std::collections::HashSet;

/// Steps in a fixed total order.
///
/// Construction validates that names are unique and that every dependency
/// names an earlier step, so the run loop can resolve dependencies by
/// looking only at results already recorded.
#[derive(Debug, Clone)]
pub struct Registry {
    steps: Vec<Step>,
}

impl Registry {
    pub fn new(steps: Vec<Step>) -> Result<Self, ProvisionError> {
        let mut seen = HashSet::new();
        for step in &steps {
            for dep in &step.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(ProvisionError::Registry {
                        message: format!(
                            "step '{}' depends on '{}', which is not registered before it",
                            step.name, dep
                        ),
                        fix: "Register dependencies ahead of the steps that use them".to_string(),
                    });
                }
            }
            if !seen.insert(step.name.as_str()) {
                return Err(ProvisionError::Registry {
                    message: format!("step '{}' is registered twice", step.name),
                    fix: "Give every step a unique name".to_string(),
                });
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn get(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check `--skip` / `--only` names against the registry.
    pub fn validate_filter(&self, skip: &[String], only: &[String]) -> Result<(), ProvisionError> {
        if !skip.is_empty() && !only.is_empty() {
            return Err(ProvisionError::InvalidInvocation {
                message: "--skip and --only cannot be combined".to_string(),
                fix: "Use either --skip or --only".to_string(),
            });
        }
        let unknown: Vec<&str> = skip
            .iter()
            .chain(only)
            .map(String::as_str)
            .filter(|name| self.get(name).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(ProvisionError::InvalidInvocation {
                message: format!("unknown step(s): {}", unknown.join(", ")),
                fix: "Run with --list to see the registered steps".to_string(),
            });
        }
        Ok(())
    }
}
