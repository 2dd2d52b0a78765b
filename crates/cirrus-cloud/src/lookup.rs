//! Ordered instance lookup and its error classification

use crate::error::{CloudError, Result};
use crate::instance::{Instance, InstanceId};
use std::collections::HashMap;

/// One entry per requested id, in request order, duplicates kept.
#[derive(Debug, Clone, Default)]
pub struct LookupResult {
    entries: Vec<(InstanceId, Option<Instance>)>,
}

impl LookupResult {
    /// Resolve `ids` against the backend's current instance set.
    ///
    /// The index is built per call and dropped with it.
    pub fn resolve(ids: &[InstanceId], current: impl IntoIterator<Item = Instance>) -> Self {
        let index: HashMap<InstanceId, Instance> = current
            .into_iter()
            .filter(|instance| !instance.id.is_empty())
            .map(|instance| (instance.id.clone(), instance))
            .collect();

        let entries = ids
            .iter()
            .map(|id| {
                let found = if id.is_empty() {
                    None
                } else {
                    index.get(id).cloned()
                };
                (id.clone(), found)
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of ids that resolved
    pub fn found(&self) -> usize {
        self.entries.iter().filter(|(_, i)| i.is_some()).count()
    }

    pub fn entries(&self) -> &[(InstanceId, Option<Instance>)] {
        &self.entries
    }

    /// Classify the lookup.
    ///
    /// - nothing requested: `Ok` with no instances
    /// - everything resolved: `Ok`, one instance per requested id
    /// - nothing resolved: [`CloudError::NoInstances`]
    /// - otherwise: [`CloudError::PartialInstances`] with absent markers
    pub fn into_result(self) -> Result<Vec<Instance>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let requested = self.entries.len();
        let found = self.found();
        if found == 0 {
            return Err(CloudError::NoInstances);
        }

        let instances = self.entries.into_iter().map(|(_, instance)| instance);
        if found < requested {
            return Err(CloudError::PartialInstances(instances.collect()));
        }

        Ok(instances.flatten().collect())
    }
}
