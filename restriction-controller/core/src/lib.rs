//! Decides whether a role binding may reference the subjects it adds.
//!
//! A namespace may declare any number of restrictions. Each restriction
//! authorizes one kind of subject (users, groups or service accounts) by
//! literal name, by group membership, or by label selector. A write that adds
//! subjects to a role binding is allowed only if every added subject is
//! authorized by at least one restriction in the binding's namespace. A
//! namespace without restrictions is unrestricted.
//!
//! ```text
//! [ old subjects ] -\
//!                    diff -> [ new subjects ] -> match each against [ restrictions ] -> verdict
//! [ new subjects ] -/
//! ```

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod diff;
mod error;
mod evaluator;
mod matcher;
pub mod restriction;
mod store;
mod subject;

#[cfg(test)]
mod tests;

pub use self::{
    diff::new_subjects,
    error::{ConfigurationError, LookupError, StoreError},
    evaluator::{Attributes, Denial, Evaluator, EvaluatorBuilder, Verdict},
    matcher::SubjectMatcher,
    restriction::{Restriction, RestrictionPolicy},
    store::{GroupResolver, LabelLookup, RestrictionSource},
    subject::{Binding, Subject, SubjectKind},
};
pub use rolebinding_restriction_k8s_api::labels::{Labels, Selector};

/// The only resource subject to restrictions.
pub const ROLE_BINDINGS: &str = "rolebindings";

/// The API group of [`ROLE_BINDINGS`].
pub const RBAC_GROUP: &str = "rbac.authorization.k8s.io";
