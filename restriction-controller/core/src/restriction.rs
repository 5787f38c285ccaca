use crate::Selector;
use ahash::AHashSet as HashSet;

/// A restriction declared in a namespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestrictionPolicy {
    pub namespace: String,
    pub name: String,
    pub restriction: Restriction,
}

/// The single kind of subject a policy authorizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Restriction {
    User(UserRestriction),
    Group(GroupRestriction),
    ServiceAccount(ServiceAccountRestriction),

    /// Stored data with no (or more than one) restriction set. Authorizes
    /// nothing.
    Malformed,
}

/// Authorizes users by name, by group membership, or by the labels of their
/// `User` object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserRestriction {
    pub users: HashSet<String>,
    pub groups: HashSet<String>,
    pub selectors: Vec<Selector>,
}

/// Authorizes groups by name or by the labels of their `Group` object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupRestriction {
    pub groups: HashSet<String>,
    pub selectors: Vec<Selector>,
}

/// Authorizes service accounts by reference, by namespace, or by the labels
/// of the namespace that owns them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceAccountRestriction {
    pub service_accounts: HashSet<ServiceAccountRef>,
    pub namespaces: HashSet<String>,
    pub selectors: Vec<Selector>,
}

/// A fully qualified service account. References stored without a namespace
/// are resolved against the policy's namespace before they land here.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ServiceAccountRef {
    pub namespace: String,
    pub name: String,
}

impl ServiceAccountRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl RestrictionPolicy {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        restriction: impl Into<Restriction>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            restriction: restriction.into(),
        }
    }
}

impl From<UserRestriction> for Restriction {
    fn from(r: UserRestriction) -> Self {
        Self::User(r)
    }
}

impl From<GroupRestriction> for Restriction {
    fn from(r: GroupRestriction) -> Self {
        Self::Group(r)
    }
}

impl From<ServiceAccountRestriction> for Restriction {
    fn from(r: ServiceAccountRestriction) -> Self {
        Self::ServiceAccount(r)
    }
}
