//! Transformer registration and capability negotiation.
//!
//! The registry holds an ordered list of [`Transformer`]s, each with a
//! [`TransformerDescriptor`] (`name`, `priority`, `enabled`). Selecting a
//! transformer for an [`Action`]:
//!
//! 1. skip disabled transformers;
//! 2. ask every remaining one for its [`Capability`] and drop `Unable`;
//! 3. order by capability (`Preferred` before `Fallback`), then by priority,
//!    highest first; exact ties keep registration order;
//! 4. pick the first.
//!
//! The ordered list is for diagnostics only. Once a transformer is chosen, its
//! failure is final: the registry never cascades to the next candidate.
//!
//! The list lives in an immutable snapshot behind a lock. Writers build a new
//! snapshot and swap it in; readers clone the `Arc` and release the lock
//! before negotiating, so an in-flight dispatch always sees one consistent set.

use super::backend::{Action, Capability, Transformer};
use super::error::TransformError;
use log::{debug, trace};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("A transformer named {0:?} is already registered")]
    Duplicate(String),
    #[error("No transformer named {0:?} is registered")]
    Unknown(String),
}

/// Registration record of one transformer.
///
/// Only `enabled` can change after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerDescriptor {
    pub name: String,
    pub priority: i32,
    pub enabled: bool,
}

#[derive(Clone)]
struct Registration {
    descriptor: TransformerDescriptor,
    transformer: Arc<dyn Transformer>,
}

/// A transformer that declared itself capable of an action.
#[derive(Clone)]
pub struct Candidate {
    pub descriptor: TransformerDescriptor,
    pub capability: Capability,
    pub transformer: Arc<dyn Transformer>,
}

impl Candidate {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("descriptor", &self.descriptor)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct TransformerRegistry {
    snapshot: RwLock<Arc<Vec<Registration>>>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a transformer. Names must be unique.
    pub fn register(
        &self,
        transformer: Arc<dyn Transformer>,
        priority: i32,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        let name = transformer.name().to_string();
        self.update(|registrations| {
            if registrations.iter().any(|r| r.descriptor.name == name) {
                return Err(RegistryError::Duplicate(name));
            }
            debug!("Registered transformer {name} (priority {priority}, enabled {enabled})");
            registrations.push(Registration {
                descriptor: TransformerDescriptor {
                    name,
                    priority,
                    enabled,
                },
                transformer,
            });
            Ok(())
        })
    }

    /// Remove a transformer, returning it.
    pub fn deregister(&self, name: &str) -> Result<Arc<dyn Transformer>, RegistryError> {
        self.update(|registrations| {
            let index = position(registrations, name)?;
            Ok(registrations.remove(index).transformer)
        })
    }

    /// Operational kill-switch for one transformer.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), RegistryError> {
        self.update(|registrations| {
            let index = position(registrations, name)?;
            registrations[index].descriptor.enabled = enabled;
            debug!("Transformer {name} enabled: {enabled}");
            Ok(())
        })
    }

    pub fn descriptors(&self) -> Vec<TransformerDescriptor> {
        self.current()
            .iter()
            .map(|r| r.descriptor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    /// Every enabled transformer able to run `action`, best first.
    pub fn candidates(&self, action: &Action<'_>) -> Vec<Candidate> {
        let snapshot = self.current();
        let mut candidates: Vec<Candidate> = snapshot
            .iter()
            .filter(|r| r.descriptor.enabled)
            .filter_map(|r| {
                let capability = r.transformer.can_execute(action);
                trace!(
                    "{} for {} on {}: {capability}",
                    r.descriptor.name,
                    action.kind(),
                    action.source_type()
                );
                (capability != Capability::Unable).then(|| Candidate {
                    descriptor: r.descriptor.clone(),
                    capability,
                    transformer: Arc::clone(&r.transformer),
                })
            })
            .collect();
        // Stable sort: exact ties keep registration order
        candidates.sort_by(|a, b| {
            b.capability
                .cmp(&a.capability)
                .then_with(|| b.descriptor.priority.cmp(&a.descriptor.priority))
        });
        candidates
    }

    /// The single transformer that will run `action`.
    pub fn select(&self, action: &Action<'_>) -> Result<Candidate, TransformError> {
        let selected = self.candidates(action).into_iter().next().ok_or(
            TransformError::NoCapableTransformer {
                action: action.kind(),
                source_type: action.source_type(),
            },
        )?;
        debug!(
            "Selected {} ({}, priority {}) to {} a {} image",
            selected.name(),
            selected.capability,
            selected.descriptor.priority,
            action.kind(),
            action.source_type()
        );
        Ok(selected)
    }

    fn current(&self) -> Arc<Vec<Registration>> {
        Arc::clone(&*self.snapshot.read())
    }

    /// Copy, edit and swap in a new snapshot. Nothing is swapped on error.
    fn update<T>(
        &self,
        edit: impl FnOnce(&mut Vec<Registration>) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let mut guard = self.snapshot.write();
        let mut next = (**guard).clone();
        let result = edit(&mut next)?;
        *guard = Arc::new(next);
        Ok(result)
    }
}

fn position(registrations: &[Registration], name: &str) -> Result<usize, RegistryError> {
    registrations
        .iter()
        .position(|r| r.descriptor.name == name)
        .ok_or_else(|| RegistryError::Unknown(name.to_string()))
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformerRegistry")
            .field("transformers", &self.descriptors())
            .finish()
    }
}
