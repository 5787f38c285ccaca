use crate::{
    new_subjects, Binding, ConfigurationError, GroupResolver, LabelLookup, RestrictionSource,
    StoreError, Subject, SubjectMatcher, RBAC_GROUP, ROLE_BINDINGS,
};
use std::{fmt, sync::Arc};
use tracing::debug;

/// Decides role binding writes against namespace restrictions.
///
/// Holds no state of its own; every decision reads fresh data from its
/// collaborators. Cheap to clone and safe to share between requests.
#[derive(Clone)]
pub struct Evaluator {
    restrictions: Arc<dyn RestrictionSource>,
    groups: Arc<dyn GroupResolver>,
    labels: Arc<dyn LabelLookup>,
}

/// Wires an [`Evaluator`]'s collaborators. [`EvaluatorBuilder::build`] fails
/// if any of them is missing.
#[derive(Clone, Default)]
pub struct EvaluatorBuilder {
    restrictions: Option<Arc<dyn RestrictionSource>>,
    groups: Option<Arc<dyn GroupResolver>>,
    labels: Option<Arc<dyn LabelLookup>>,
}

/// Describes a write request.
#[derive(Clone, Debug, Default)]
pub struct Attributes {
    /// The API group of the written resource.
    pub group: String,

    /// The plural resource name, e.g. `rolebindings`.
    pub resource: String,

    /// Set when the write targets a sub-resource rather than the object.
    pub subresource: Option<String>,

    /// The proposed binding. Its namespace is the request's namespace.
    pub binding: Binding,

    /// The current binding, absent on create.
    pub old_binding: Option<Binding>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(Denial),
}

/// Names the first subject that no restriction authorizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Denial {
    pub namespace: String,
    pub subject: Subject,
}

// === impl EvaluatorBuilder ===

impl EvaluatorBuilder {
    pub fn with_restrictions(mut self, source: Arc<dyn RestrictionSource>) -> Self {
        self.restrictions = Some(source);
        self
    }

    pub fn with_groups(mut self, resolver: Arc<dyn GroupResolver>) -> Self {
        self.groups = Some(resolver);
        self
    }

    pub fn with_labels(mut self, lookup: Arc<dyn LabelLookup>) -> Self {
        self.labels = Some(lookup);
        self
    }

    /// Validates that every collaborator is set.
    pub fn build(self) -> Result<Evaluator, ConfigurationError> {
        Ok(Evaluator {
            restrictions: self
                .restrictions
                .ok_or(ConfigurationError::MissingRestrictionSource)?,
            groups: self.groups.ok_or(ConfigurationError::MissingGroupResolver)?,
            labels: self.labels.ok_or(ConfigurationError::MissingLabelLookup)?,
        })
    }
}

// === impl Evaluator ===

impl Evaluator {
    pub fn builder() -> EvaluatorBuilder {
        EvaluatorBuilder::default()
    }

    pub fn matcher(&self) -> SubjectMatcher<'_> {
        SubjectMatcher::new(&*self.groups, &*self.labels)
    }

    /// Decides a write request. Only role bindings are restricted; writes to
    /// any other resource are allowed.
    pub async fn admit(&self, attrs: &Attributes) -> Result<Verdict, StoreError> {
        if attrs.group != RBAC_GROUP || attrs.resource != ROLE_BINDINGS {
            return Ok(Verdict::Allow);
        }

        self.decide(
            &attrs.binding,
            attrs.old_binding.as_ref(),
            attrs.is_subresource(),
        )
        .await
    }

    /// Returns true if a write described by `attrs` is subject to at least
    /// one restriction, regardless of the subjects it carries.
    ///
    /// Callers that cannot read a binding's subjects use this to decide
    /// whether that matters.
    pub async fn restricts(&self, attrs: &Attributes) -> Result<bool, StoreError> {
        if attrs.group != RBAC_GROUP
            || attrs.resource != ROLE_BINDINGS
            || attrs.is_subresource()
        {
            return Ok(false);
        }

        match attrs.binding.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => Ok(!self.restrictions.list(ns).await?.is_empty()),
            _ => Ok(false),
        }
    }

    /// Decides whether the subjects added by a write to `binding` are
    /// authorized by the restrictions of its namespace.
    ///
    /// Collaborator failures are returned as errors and never turned into a
    /// verdict.
    pub async fn decide(
        &self,
        binding: &Binding,
        old_binding: Option<&Binding>,
        is_subresource: bool,
    ) -> Result<Verdict, StoreError> {
        let namespace = match binding.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => return Ok(Verdict::Allow),
        };

        if is_subresource {
            return Ok(Verdict::Allow);
        }

        let normalize = |subjects: &[Subject]| {
            subjects
                .iter()
                .cloned()
                .map(|s| s.normalized(namespace))
                .collect::<Vec<_>>()
        };
        let old = old_binding
            .map(|b| normalize(&b.subjects))
            .unwrap_or_default();
        let added = new_subjects(&old, &normalize(&binding.subjects));
        if added.is_empty() {
            debug!(%namespace, "No new subjects");
            return Ok(Verdict::Allow);
        }

        let policies = self.restrictions.list(namespace).await?;
        if policies.is_empty() {
            debug!(%namespace, "Namespace is unrestricted");
            return Ok(Verdict::Allow);
        }

        let matcher = self.matcher();
        for subject in added {
            match matcher.matching_policy(&subject, &policies).await? {
                Some(policy) => {
                    debug!(%namespace, %subject, restriction = %policy.name, "Authorized");
                }
                None => {
                    return Ok(Verdict::Deny(Denial {
                        namespace: namespace.to_string(),
                        subject,
                    }));
                }
            }
        }

        Ok(Verdict::Allow)
    }
}

// === impl Attributes ===

impl Attributes {
    fn is_subresource(&self) -> bool {
        self.subresource.as_deref().is_some_and(|s| !s.is_empty())
    }
}

// === impl Denial ===

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rolebindings to {} {:?} are not allowed in project {:?}",
            self.subject.kind, self.subject.name, self.namespace
        )
    }
}
