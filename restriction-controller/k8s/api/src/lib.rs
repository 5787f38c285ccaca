#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod identity;
pub mod labels;
pub mod restriction;

pub use self::{
    identity::{Group, User},
    labels::Labels,
    restriction::{RoleBindingRestriction, RoleBindingRestrictionSpec},
};
pub use k8s_openapi::api::{
    self,
    core::v1::Namespace,
    rbac::v1::{RoleBinding, Subject},
};
pub use kube::{
    api::{ObjectMeta, ResourceExt},
    Resource,
};
