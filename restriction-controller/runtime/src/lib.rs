#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use rolebinding_restriction_core as core;
pub use rolebinding_restriction_k8s_api as k8s;
pub use rolebinding_restriction_k8s_index as index;

mod admission;
mod args;
mod metrics;

pub use self::{admission::Admission, args::Args, metrics::AdmissionMetrics};

use ahash::AHashSet as HashSet;

/// Serves the decision engine's reads from the watch-backed index.
#[derive(Clone, Debug)]
pub struct IndexLookup(index::SharedIndex);

impl IndexLookup {
    pub fn new(index: index::SharedIndex) -> Self {
        Self(index)
    }
}

#[async_trait::async_trait]
impl core::RestrictionSource for IndexLookup {
    async fn list(
        &self,
        namespace: &str,
    ) -> Result<Vec<core::RestrictionPolicy>, core::StoreError> {
        Ok(self.0.read().restrictions(namespace))
    }
}

#[async_trait::async_trait]
impl core::GroupResolver for IndexLookup {
    async fn groups_of(&self, user: &str) -> Result<HashSet<String>, core::StoreError> {
        Ok(self.0.read().groups_of(user))
    }
}

#[async_trait::async_trait]
impl core::LabelLookup for IndexLookup {
    async fn labels_of(&self, subject: &core::Subject) -> Result<core::Labels, core::LookupError> {
        self.0
            .read()
            .labels_of(subject)
            .ok_or_else(|| core::LookupError::NotFound(subject.clone()))
    }
}
