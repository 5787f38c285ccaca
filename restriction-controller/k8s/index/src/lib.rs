//! Role Binding Restriction Index
//!
//! Holds the cluster state that role binding decisions read. It watches the
//! following resources:
//!
//! - Each `Namespace` contributes its labels, which service account selectors
//!   match against.
//! - Each `User` contributes its labels and the groups it claims.
//! - Each `Group` contributes its labels and its member users.
//! - Each `RoleBindingRestriction` is converted into a restriction policy and
//!   indexed by namespace.
//!
//! ```text
//! [ Namespace ]  [ User ] <-> [ Group ]  [ RoleBindingRestriction ]
//! ```
//!
//! Lookups never reach the API server; they observe whatever the watches have
//! delivered so far.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod identity;
mod restriction;


pub use self::restriction::policy_from_resource;
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use parking_lot::RwLock;
use rolebinding_restriction_core::{Labels, RestrictionPolicy, Subject, SubjectKind};
use std::{collections::BTreeMap, sync::Arc};

pub type SharedIndex = Arc<RwLock<Index>>;

#[derive(Debug, Default)]
pub struct Index {
    /// Labels by namespace name.
    namespaces: HashMap<String, Labels>,

    users: HashMap<String, UserEntry>,

    groups: HashMap<String, GroupEntry>,

    /// Policies by namespace, then by name.
    restrictions: HashMap<String, BTreeMap<String, RestrictionPolicy>>,
}

#[derive(Debug, Default)]
struct UserEntry {
    labels: Labels,
    groups: HashSet<String>,
}

#[derive(Debug, Default)]
struct GroupEntry {
    labels: Labels,
    users: HashSet<String>,
}

// === impl Index ===

impl Index {
    pub fn shared() -> SharedIndex {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Returns the policies declared in `namespace`, ordered by name.
    pub fn restrictions(&self, namespace: &str) -> Vec<RestrictionPolicy> {
        self.restrictions
            .get(namespace)
            .map(|policies| policies.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the groups `user` belongs to, either because the group lists
    /// the user or because the user lists the group.
    pub fn groups_of(&self, user: &str) -> HashSet<String> {
        let mut groups = self
            .users
            .get(user)
            .map(|u| u.groups.clone())
            .unwrap_or_default();
        groups.extend(
            self.groups
                .iter()
                .filter(|(_, group)| group.users.contains(user))
                .map(|(name, _)| name.clone()),
        );
        groups
    }

    /// Returns the labels of the object behind `subject`, or `None` if that
    /// object is not known.
    pub fn labels_of(&self, subject: &Subject) -> Option<Labels> {
        match subject.kind {
            SubjectKind::User => self.users.get(&subject.name).map(|u| u.labels.clone()),
            SubjectKind::Group => self.groups.get(&subject.name).map(|g| g.labels.clone()),
            SubjectKind::ServiceAccount => {
                let ns = subject.namespace.as_deref()?;
                self.namespaces.get(ns).cloned()
            }
            SubjectKind::Unsupported(_) => None,
        }
    }
}
