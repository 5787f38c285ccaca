use crate::Index;
use rolebinding_restriction_core::{
    restriction::{
        GroupRestriction, ServiceAccountRef, ServiceAccountRestriction, UserRestriction,
    },
    Restriction, RestrictionPolicy,
};
use rolebinding_restriction_k8s_api::{
    restriction as api, ResourceExt, RoleBindingRestriction, RoleBindingRestrictionSpec,
};
use std::collections::hash_map::Entry;
use tracing::{debug, info_span, warn};

impl kubert::index::IndexNamespacedResource<RoleBindingRestriction> for Index {
    fn apply(&mut self, rbr: RoleBindingRestriction) {
        let ns = rbr
            .namespace()
            .expect("RoleBindingRestriction must have a namespace");
        let name = rbr.name_unchecked();
        let _span = info_span!("apply", %ns, %name).entered();

        let policy = policy_from_resource(ns.clone(), name.clone(), rbr.spec);
        if policy.restriction == Restriction::Malformed {
            warn!("RoleBindingRestriction must set exactly one restriction; it will match nothing");
        }

        debug!("Indexing RoleBindingRestriction");
        self.restrictions.entry(ns).or_default().insert(name, policy);
    }

    fn delete(&mut self, ns: String, name: String) {
        let _span = info_span!("delete", %ns, %name).entered();

        if let Entry::Occupied(mut entry) = self.restrictions.entry(ns) {
            debug!("Deleting RoleBindingRestriction");
            entry.get_mut().remove(&name);
            if entry.get().is_empty() {
                entry.remove();
            }
        } else {
            warn!("Namespace already deleted!");
        }
    }
}

/// Converts a stored restriction into a policy.
///
/// A spec that sets no restriction, or more than one, becomes
/// [`Restriction::Malformed`]. Service account references without a namespace
/// refer to `namespace`.
pub fn policy_from_resource(
    namespace: String,
    name: String,
    spec: RoleBindingRestrictionSpec,
) -> RestrictionPolicy {
    let restriction = match spec {
        RoleBindingRestrictionSpec {
            user_restriction: Some(r),
            group_restriction: None,
            service_account_restriction: None,
        } => Restriction::User(UserRestriction {
            users: r.users.into_iter().collect(),
            groups: r.groups.into_iter().collect(),
            selectors: r.labels,
        }),

        RoleBindingRestrictionSpec {
            user_restriction: None,
            group_restriction: Some(r),
            service_account_restriction: None,
        } => Restriction::Group(GroupRestriction {
            groups: r.groups.into_iter().collect(),
            selectors: r.labels,
        }),

        RoleBindingRestrictionSpec {
            user_restriction: None,
            group_restriction: None,
            service_account_restriction: Some(r),
        } => Restriction::ServiceAccount(ServiceAccountRestriction {
            service_accounts: r
                .service_accounts
                .into_iter()
                .map(|api::ServiceAccountReference { namespace: ns, name }| {
                    let ns = ns
                        .filter(|ns| !ns.is_empty())
                        .unwrap_or_else(|| namespace.clone());
                    ServiceAccountRef::new(ns, name)
                })
                .collect(),
            namespaces: r.namespaces.into_iter().collect(),
            selectors: r.labels,
        }),

        _ => Restriction::Malformed,
    };

    RestrictionPolicy {
        namespace,
        name,
        restriction,
    }
}
