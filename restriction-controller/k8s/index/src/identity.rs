use crate::{GroupEntry, Index, UserEntry};
use rolebinding_restriction_k8s_api::{Group, Labels, Namespace, ResourceExt, User};
use tracing::{debug, info_span};

impl kubert::index::IndexClusterResource<Namespace> for Index {
    fn apply(&mut self, ns: Namespace) {
        let name = ns.name_unchecked();
        let _span = info_span!("apply", ns = %name).entered();

        debug!("Indexing Namespace labels");
        self.namespaces
            .insert(name, Labels::from(ns.metadata.labels));
    }

    fn delete(&mut self, name: String) {
        let _span = info_span!("delete", ns = %name).entered();

        debug!("Deleting Namespace");
        self.namespaces.remove(&name);
    }
}

impl kubert::index::IndexClusterResource<User> for Index {
    fn apply(&mut self, user: User) {
        let name = user.name_unchecked();
        let _span = info_span!("apply", user = %name).entered();

        debug!(groups = user.groups.len(), "Indexing User");
        self.users.insert(
            name,
            UserEntry {
                labels: Labels::from(user.metadata.labels),
                groups: user.groups.into_iter().collect(),
            },
        );
    }

    fn delete(&mut self, name: String) {
        let _span = info_span!("delete", user = %name).entered();

        debug!("Deleting User");
        self.users.remove(&name);
    }
}

impl kubert::index::IndexClusterResource<Group> for Index {
    fn apply(&mut self, group: Group) {
        let name = group.name_unchecked();
        let _span = info_span!("apply", group = %name).entered();

        debug!(users = group.users.len(), "Indexing Group");
        self.groups.insert(
            name,
            GroupEntry {
                labels: Labels::from(group.metadata.labels),
                users: group.users.into_iter().collect(),
            },
        );
    }

    fn delete(&mut self, name: String) {
        let _span = info_span!("delete", group = %name).entered();

        debug!("Deleting Group");
        self.groups.remove(&name);
    }
}
