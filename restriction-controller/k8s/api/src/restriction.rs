use crate::labels::Selector;

/// Declares which subjects role bindings in a namespace may reference.
///
/// Exactly one of the restriction fields is expected to be set.
#[derive(
    Clone,
    Debug,
    Default,
    PartialEq,
    kube::CustomResource,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "authorization.openshift.io",
    version = "v1",
    kind = "RoleBindingRestriction",
    namespaced
)]
pub struct RoleBindingRestrictionSpec {
    #[serde(
        rename = "userrestriction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_restriction: Option<UserRestriction>,

    #[serde(
        rename = "grouprestriction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub group_restriction: Option<GroupRestriction>,

    #[serde(
        rename = "serviceaccountrestriction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_account_restriction: Option<ServiceAccountRestriction>,
}

#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct UserRestriction {
    #[serde(default)]
    pub users: Vec<String>,

    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub labels: Vec<Selector>,
}

#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct GroupRestriction {
    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub labels: Vec<Selector>,
}

#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct ServiceAccountRestriction {
    #[serde(rename = "serviceaccounts", default)]
    pub service_accounts: Vec<ServiceAccountReference>,

    #[serde(default)]
    pub namespaces: Vec<String>,

    /// Selects over the labels of the namespace that owns a service account.
    #[serde(default)]
    pub labels: Vec<Selector>,
}

/// Refers to a service account. An empty namespace refers to the namespace of
/// the restriction itself.
#[derive(
    Clone, Debug, Default, PartialEq, serde::Deserialize, serde::Serialize, schemars::JsonSchema,
)]
pub struct ServiceAccountReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl RoleBindingRestrictionSpec {
    /// Counts the populated restriction fields.
    pub fn populated(&self) -> usize {
        usize::from(self.user_restriction.is_some())
            + usize::from(self.group_restriction.is_some())
            + usize::from(self.service_account_restriction.is_some())
    }
}
