use crate::{
    restriction::{GroupRestriction, ServiceAccountRestriction, UserRestriction},
    GroupResolver, LabelLookup, LookupError, Restriction, RestrictionPolicy, Selector,
    StoreError, Subject, SubjectKind,
};
use tracing::trace;

/// Checks a single subject against the restrictions of its namespace.
#[derive(Clone, Copy)]
pub struct SubjectMatcher<'a> {
    groups: &'a dyn GroupResolver,
    labels: &'a dyn LabelLookup,
}

impl<'a> SubjectMatcher<'a> {
    pub fn new(groups: &'a dyn GroupResolver, labels: &'a dyn LabelLookup) -> Self {
        Self { groups, labels }
    }

    /// Returns true if any policy authorizes `subject`.
    pub async fn matches(
        &self,
        subject: &Subject,
        policies: &[RestrictionPolicy],
    ) -> Result<bool, StoreError> {
        Ok(self.matching_policy(subject, policies).await?.is_some())
    }

    /// Returns the first policy that authorizes `subject`, if any.
    pub async fn matching_policy<'p>(
        &self,
        subject: &Subject,
        policies: &'p [RestrictionPolicy],
    ) -> Result<Option<&'p RestrictionPolicy>, StoreError> {
        for policy in policies {
            if self.authorizes(&policy.restriction, subject).await? {
                return Ok(Some(policy));
            }
        }
        Ok(None)
    }

    async fn authorizes(
        &self,
        restriction: &Restriction,
        subject: &Subject,
    ) -> Result<bool, StoreError> {
        match (restriction, &subject.kind) {
            (Restriction::User(r), SubjectKind::User) => self.authorizes_user(r, subject).await,
            (Restriction::Group(r), SubjectKind::Group) => self.authorizes_group(r, subject).await,
            (Restriction::ServiceAccount(r), SubjectKind::ServiceAccount) => {
                self.authorizes_service_account(r, subject).await
            }
            _ => Ok(false),
        }
    }

    async fn authorizes_user(
        &self,
        r: &UserRestriction,
        subject: &Subject,
    ) -> Result<bool, StoreError> {
        if r.users.contains(&subject.name) {
            return Ok(true);
        }

        if !r.groups.is_empty() {
            let groups = self.groups.groups_of(&subject.name).await?;
            if let Some(group) = groups.iter().find(|g| r.groups.contains(*g)) {
                trace!(user = %subject.name, %group, "Authorized by group membership");
                return Ok(true);
            }
        }

        self.selected(&r.selectors, subject).await
    }

    async fn authorizes_group(
        &self,
        r: &GroupRestriction,
        subject: &Subject,
    ) -> Result<bool, StoreError> {
        if r.groups.contains(&subject.name) {
            return Ok(true);
        }

        self.selected(&r.selectors, subject).await
    }

    async fn authorizes_service_account(
        &self,
        r: &ServiceAccountRestriction,
        subject: &Subject,
    ) -> Result<bool, StoreError> {
        let namespace = subject.namespace.as_deref().unwrap_or_default();

        if r.namespaces.contains(namespace) {
            return Ok(true);
        }

        if r
            .service_accounts
            .iter()
            .any(|sa| sa.namespace == namespace && sa.name == subject.name)
        {
            return Ok(true);
        }

        self.selected(&r.selectors, subject).await
    }

    /// Checks the subject's labels against `selectors`. Labels are only
    /// fetched when there is a selector to evaluate.
    async fn selected(&self, selectors: &[Selector], subject: &Subject) -> Result<bool, StoreError> {
        if selectors.is_empty() {
            return Ok(false);
        }

        let labels = match self.labels.labels_of(subject).await {
            Ok(labels) => labels,
            Err(LookupError::NotFound(_)) => {
                trace!(%subject, "No identity object; selectors cannot match");
                return Ok(false);
            }
            Err(LookupError::Store(error)) => return Err(error),
        };

        Ok(selectors.iter().any(|s| s.matches(&labels)))
    }
}
