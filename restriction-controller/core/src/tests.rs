use super::*;
use crate::restriction::{
    GroupRestriction, ServiceAccountRef, ServiceAccountRestriction, UserRestriction,
};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::sync::Arc;

/// An in-memory stand-in for the cluster's identity and restriction data.
#[derive(Default)]
struct Store {
    policies: Vec<RestrictionPolicy>,
    memberships: HashMap<String, HashSet<String>>,
    labels: HashMap<Subject, Labels>,
    unavailable: bool,
}

#[async_trait::async_trait]
impl RestrictionSource for Store {
    async fn list(&self, namespace: &str) -> Result<Vec<RestrictionPolicy>, StoreError> {
        if self.unavailable {
            return Err(StoreError::new("restrictions", anyhow::anyhow!("unavailable")));
        }
        Ok(self
            .policies
            .iter()
            .filter(|p| p.namespace == namespace)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl GroupResolver for Store {
    async fn groups_of(&self, user: &str) -> Result<HashSet<String>, StoreError> {
        if self.unavailable {
            return Err(StoreError::new("groups", anyhow::anyhow!("unavailable")));
        }
        Ok(self.memberships.get(user).cloned().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl LabelLookup for Store {
    async fn labels_of(&self, subject: &Subject) -> Result<Labels, LookupError> {
        if self.unavailable {
            return Err(StoreError::new("labels", anyhow::anyhow!("unavailable")).into());
        }
        self.labels
            .get(subject)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(subject.clone()))
    }
}

impl Store {
    fn with_policy(mut self, name: &str, restriction: impl Into<Restriction>) -> Self {
        self.policies
            .push(RestrictionPolicy::new("namespace", name, restriction));
        self
    }

    fn evaluator(self) -> Evaluator {
        let store = Arc::new(self);
        Evaluator::builder()
            .with_restrictions(store.clone())
            .with_groups(store.clone())
            .with_labels(store)
            .build()
            .expect("all collaborators are set")
    }
}

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn alice() -> Subject {
    Subject::user("Alice")
}

fn group() -> Subject {
    Subject::group("group")
}

fn serviceaccount() -> Subject {
    Subject::service_account("namespace", "serviceaccount")
}

fn attrs(subjects: Vec<Subject>, old: Option<Vec<Subject>>) -> Attributes {
    Attributes {
        group: RBAC_GROUP.to_string(),
        resource: ROLE_BINDINGS.to_string(),
        subresource: None,
        binding: Binding::new("namespace", subjects),
        old_binding: old.map(|s| Binding::new("namespace", s)),
    }
}

fn users(names: &[&str]) -> UserRestriction {
    UserRestriction {
        users: set(names),
        ..Default::default()
    }
}

async fn denied(evaluator: &Evaluator, attrs: &Attributes) -> Denial {
    match evaluator.admit(attrs).await.expect("decision must not fail") {
        Verdict::Deny(denial) => denial,
        Verdict::Allow => panic!("expected a denial"),
    }
}

async fn allowed(evaluator: &Evaluator, attrs: &Attributes) -> bool {
    evaluator.admit(attrs).await.expect("decision must not fail") == Verdict::Allow
}

#[tokio::test]
async fn ignores_subresource_writes() {
    let evaluator = Store::default()
        .with_policy("match-users-bob", users(&["Bob"]))
        .evaluator();

    let mut attrs = attrs(vec![alice()], Some(vec![]));
    attrs.subresource = Some("subresource".to_string());
    assert!(allowed(&evaluator, &attrs).await);
}

#[tokio::test]
async fn ignores_cluster_scoped_bindings() {
    let evaluator = Store::default()
        .with_policy("match-users-bob", users(&["Bob"]))
        .evaluator();

    let mut attrs = attrs(vec![alice()], Some(vec![]));
    attrs.binding = Binding::cluster(vec![alice()]);
    assert!(allowed(&evaluator, &attrs).await);

    attrs.binding.namespace = Some(String::new());
    assert!(allowed(&evaluator, &attrs).await);
}

#[tokio::test]
async fn ignores_other_resources() {
    let evaluator = Store::default()
        .with_policy("match-users-bob", users(&["Bob"]))
        .evaluator();

    let mut attrs = attrs(vec![alice()], None);
    attrs.resource = "clusterrolebindings".to_string();
    assert!(allowed(&evaluator, &attrs).await);
}

#[tokio::test]
async fn allows_unrestricted_namespace() {
    let evaluator = Store::default().evaluator();

    let attrs = attrs(
        vec![alice(), Subject::user("Bob"), group(), serviceaccount()],
        Some(vec![]),
    );
    assert!(allowed(&evaluator, &attrs).await);
}

#[tokio::test]
async fn ignores_restrictions_in_other_namespaces() {
    let mut store = Store::default();
    store.policies.push(RestrictionPolicy::new(
        "elsewhere",
        "match-users-bob",
        users(&["Bob"]),
    ));
    let evaluator = store.evaluator();

    assert!(allowed(&evaluator, &attrs(vec![alice()], None)).await);
}

#[tokio::test]
async fn allows_existing_subjects_despite_malformed_restriction() {
    // No new subjects, so restrictions are never consulted (nor is the store,
    // which would fail).
    let mut store = Store::default().with_policy("bogus-matcher", Restriction::Malformed);
    store.unavailable = true;
    let evaluator = store.evaluator();

    let subjects = vec![alice(), group(), serviceaccount()];
    let attrs = attrs(subjects.clone(), Some(subjects));
    assert!(allowed(&evaluator, &attrs).await);
}

#[tokio::test]
async fn allows_reordered_subjects() {
    let evaluator = Store::default()
        .with_policy("match-users-bob", users(&["Bob"]))
        .evaluator();

    let attrs = attrs(
        vec![serviceaccount(), alice(), group()],
        Some(vec![alice(), group(), serviceaccount()]),
    );
    assert!(allowed(&evaluator, &attrs).await);
}

#[tokio::test]
async fn allows_literal_matches() {
    let evaluator = Store::default()
        .with_policy("match-users", users(&["Alice"]))
        .with_policy(
            "match-groups",
            GroupRestriction {
                groups: set(&["group"]),
                ..Default::default()
            },
        )
        .with_policy(
            "match-serviceaccounts",
            ServiceAccountRestriction {
                service_accounts: Some(ServiceAccountRef::new("namespace", "serviceaccount"))
                    .into_iter()
                    .collect(),
                ..Default::default()
            },
        )
        .evaluator();

    let attrs = attrs(vec![alice(), serviceaccount(), group()], Some(vec![]));
    assert!(allowed(&evaluator, &attrs).await);
}

#[tokio::test]
async fn denies_user_without_matching_literal() {
    let evaluator = Store::default()
        .with_policy("match-users-bob", users(&["Bob"]))
        .evaluator();

    let denial = denied(&evaluator, &attrs(vec![alice()], Some(vec![]))).await;
    assert_eq!(denial.subject, alice());
    assert!(
        denial
            .to_string()
            .contains(r#"rolebindings to User "Alice" are not allowed"#),
        "{denial}"
    );
    assert_eq!(
        denial.to_string(),
        r#"rolebindings to User "Alice" are not allowed in project "namespace""#
    );
}

#[tokio::test]
async fn denies_first_unauthorized_subject() {
    let evaluator = Store::default()
        .with_policy("match-users-bob", users(&["Bob"]))
        .evaluator();

    let attrs = attrs(
        vec![Subject::user("Bob"), group(), alice()],
        Some(vec![]),
    );
    assert_eq!(denied(&evaluator, &attrs).await.subject, group());
}

#[tokio::test]
async fn denies_only_new_subjects() {
    let evaluator = Store::default()
        .with_policy("match-users-bob", users(&["Bob"]))
        .evaluator();

    // Alice was already bound; only Carol is new.
    let attrs = attrs(
        vec![alice(), Subject::user("Carol")],
        Some(vec![alice()]),
    );
    assert_eq!(
        denied(&evaluator, &attrs).await.subject,
        Subject::user("Carol")
    );
}

#[tokio::test]
async fn malformed_restriction_matches_nothing() {
    let evaluator = Store::default()
        .with_policy("bogus-matcher", Restriction::Malformed)
        .evaluator();

    let denial = denied(&evaluator, &attrs(vec![alice()], None)).await;
    assert_eq!(denial.subject, alice());
}

#[tokio::test]
async fn empty_restriction_matches_nothing() {
    let evaluator = Store::default()
        .with_policy("empty", UserRestriction::default())
        .evaluator();

    assert_eq!(
        denied(&evaluator, &attrs(vec![alice()], None)).await.subject,
        alice()
    );
}

#[tokio::test]
async fn restrictions_only_apply_to_their_kind() {
    // A user restriction naming "group" does not authorize the group "group".
    let evaluator = Store::default()
        .with_policy("match-users", users(&["group", "serviceaccount"]))
        .evaluator();

    assert_eq!(
        denied(&evaluator, &attrs(vec![group()], None)).await.subject,
        group()
    );
    assert_eq!(
        denied(&evaluator, &attrs(vec![serviceaccount()], None))
            .await
            .subject,
        serviceaccount()
    );
}

#[tokio::test]
async fn allows_user_by_group_membership() {
    let mut store = Store::default().with_policy(
        "match-group-members",
        UserRestriction {
            groups: set(&["group"]),
            ..Default::default()
        },
    );
    store
        .memberships
        .insert("Bob".to_string(), set(&["group"]));
    let evaluator = store.evaluator();

    assert!(allowed(&evaluator, &attrs(vec![Subject::user("Bob")], None)).await);
    assert_eq!(
        denied(&evaluator, &attrs(vec![alice()], None)).await.subject,
        alice()
    );
}

#[tokio::test]
async fn allows_user_by_selector() {
    let mut store = Store::default().with_policy(
        "match-labels",
        UserRestriction {
            selectors: vec![Selector::from_iter(Some(("foo", "bar")))],
            ..Default::default()
        },
    );
    store
        .labels
        .insert(alice(), Labels::from_iter(Some(("foo", "bar"))));
    store
        .labels
        .insert(Subject::user("Bob"), Labels::from_iter(Some(("foo", "baz"))));
    let evaluator = store.evaluator();

    assert!(allowed(&evaluator, &attrs(vec![alice()], None)).await);
    assert_eq!(
        denied(&evaluator, &attrs(vec![Subject::user("Bob")], None))
            .await
            .subject,
        Subject::user("Bob")
    );
}

#[tokio::test]
async fn missing_identity_object_has_no_labels() {
    // An empty selector matches any labels, but not a missing object.
    let evaluator = Store::default()
        .with_policy(
            "match-anything-labelled",
            GroupRestriction {
                selectors: vec![Selector::default()],
                ..Default::default()
            },
        )
        .evaluator();

    assert_eq!(
        denied(&evaluator, &attrs(vec![group()], None)).await.subject,
        group()
    );
}

#[tokio::test]
async fn allows_group_by_selector() {
    let mut store = Store::default().with_policy(
        "match-labels",
        GroupRestriction {
            selectors: vec![Selector::from_iter(Some(("baz", "quux")))],
            ..Default::default()
        },
    );
    store
        .labels
        .insert(group(), Labels::from_iter(Some(("baz", "quux"))));
    let evaluator = store.evaluator();

    assert!(allowed(&evaluator, &attrs(vec![group()], None)).await);
}

#[tokio::test]
async fn allows_service_accounts_by_namespace() {
    let evaluator = Store::default()
        .with_policy(
            "match-namespaces",
            ServiceAccountRestriction {
                namespaces: set(&["ci"]),
                ..Default::default()
            },
        )
        .evaluator();

    let sa = Subject::service_account("ci", "builder");
    assert!(allowed(&evaluator, &attrs(vec![sa], None)).await);
    assert_eq!(
        denied(&evaluator, &attrs(vec![serviceaccount()], None))
            .await
            .subject,
        serviceaccount()
    );
}

#[tokio::test]
async fn service_account_without_namespace_is_in_binding_namespace() {
    let evaluator = Store::default()
        .with_policy(
            "match-serviceaccounts",
            ServiceAccountRestriction {
                service_accounts: Some(ServiceAccountRef::new("namespace", "serviceaccount"))
                    .into_iter()
                    .collect(),
                ..Default::default()
            },
        )
        .evaluator();

    let sa = Subject {
        kind: SubjectKind::ServiceAccount,
        namespace: None,
        name: "serviceaccount".to_string(),
    };
    assert!(allowed(&evaluator, &attrs(vec![sa.clone()], None)).await);

    // The same account, spelled with and without its namespace, is not new.
    let attrs = attrs(vec![sa], Some(vec![serviceaccount()]));
    let evaluator = Store::default()
        .with_policy("bogus-matcher", Restriction::Malformed)
        .evaluator();
    assert!(allowed(&evaluator, &attrs).await);
}

#[tokio::test]
async fn allows_service_accounts_by_namespace_labels() {
    let mut store = Store::default().with_policy(
        "match-namespace-labels",
        ServiceAccountRestriction {
            selectors: vec![Selector::from_iter(Some(("xyzzy", "thud")))],
            ..Default::default()
        },
    );
    store
        .labels
        .insert(serviceaccount(), Labels::from_iter(Some(("xyzzy", "thud"))));
    let evaluator = store.evaluator();

    assert!(allowed(&evaluator, &attrs(vec![serviceaccount()], None)).await);
}

#[tokio::test]
async fn any_policy_may_authorize() {
    let evaluator = Store::default()
        .with_policy("match-users-bob", users(&["Bob"]))
        .with_policy("bogus-matcher", Restriction::Malformed)
        .with_policy("match-users-alice", users(&["Alice"]))
        .evaluator();

    assert!(allowed(&evaluator, &attrs(vec![alice(), Subject::user("Bob")], None)).await);
}

fn system_user() -> Subject {
    Subject {
        kind: SubjectKind::from("SystemUser"),
        namespace: None,
        name: "node".to_string(),
    }
}

#[tokio::test]
async fn unsupported_kinds_only_matter_in_restricted_namespaces() {
    let evaluator = Store::default().evaluator();
    assert!(allowed(&evaluator, &attrs(vec![system_user()], None)).await);

    let evaluator = Store::default()
        .with_policy("match-users-alice", users(&["Alice"]))
        .evaluator();
    let denial = denied(&evaluator, &attrs(vec![alice(), system_user()], None)).await;
    assert_eq!(denial.subject, system_user());
    assert_eq!(
        denial.to_string(),
        r#"rolebindings to SystemUser "node" are not allowed in project "namespace""#
    );

    // Already bound subjects are never reconsidered.
    let attrs = attrs(vec![system_user()], Some(vec![system_user()]));
    assert!(allowed(&evaluator, &attrs).await);
}

#[tokio::test]
async fn restricts_only_guarded_writes_to_restricted_namespaces() {
    let evaluator = Store::default()
        .with_policy("match-users-alice", users(&["Alice"]))
        .evaluator();

    assert!(evaluator
        .restricts(&attrs(vec![], None))
        .await
        .expect("listing must succeed"));

    let mut subresource = attrs(vec![], None);
    subresource.subresource = Some("status".to_string());
    assert!(!evaluator
        .restricts(&subresource)
        .await
        .expect("listing must succeed"));

    let mut cluster = attrs(vec![], None);
    cluster.binding.namespace = Some(String::new());
    assert!(!evaluator
        .restricts(&cluster)
        .await
        .expect("listing must succeed"));

    let mut other = attrs(vec![], None);
    other.binding.namespace = Some("other".to_string());
    assert!(!evaluator
        .restricts(&other)
        .await
        .expect("listing must succeed"));
}

#[tokio::test]
async fn store_failures_are_not_verdicts() {
    let mut store = Store::default().with_policy("match-users-bob", users(&["Bob"]));
    store.unavailable = true;
    let evaluator = store.evaluator();

    evaluator
        .admit(&attrs(vec![alice()], None))
        .await
        .expect_err("listing restrictions must fail");
}

#[tokio::test]
async fn lookup_failures_are_not_verdicts() {
    struct Flaky;

    #[async_trait::async_trait]
    impl GroupResolver for Flaky {
        async fn groups_of(&self, _: &str) -> Result<HashSet<String>, StoreError> {
            Err(StoreError::new("groups", anyhow::anyhow!("timed out")))
        }
    }

    #[async_trait::async_trait]
    impl LabelLookup for Flaky {
        async fn labels_of(&self, _: &Subject) -> Result<Labels, LookupError> {
            Err(StoreError::new("labels", anyhow::anyhow!("timed out")).into())
        }
    }

    let store = Arc::new(
        Store::default()
            .with_policy(
                "match-group-members",
                UserRestriction {
                    groups: set(&["group"]),
                    ..Default::default()
                },
            )
            .with_policy(
                "match-group-labels",
                GroupRestriction {
                    selectors: vec![Selector::from_iter(Some(("baz", "quux")))],
                    ..Default::default()
                },
            ),
    );
    let flaky = Arc::new(Flaky);
    let evaluator = Evaluator::builder()
        .with_restrictions(store)
        .with_groups(flaky.clone())
        .with_labels(flaky)
        .build()
        .expect("all collaborators are set");

    evaluator
        .admit(&attrs(vec![alice()], None))
        .await
        .expect_err("group lookup must fail");
    evaluator
        .admit(&attrs(vec![group()], None))
        .await
        .expect_err("label lookup must fail");
}

#[tokio::test]
async fn reports_matching_policy() {
    let policies = vec![
        RestrictionPolicy::new("namespace", "bogus-matcher", Restriction::Malformed),
        RestrictionPolicy::new("namespace", "match-users", users(&["Alice"])),
    ];
    let store = Store::default();
    let matcher = SubjectMatcher::new(&store, &store);

    let policy = matcher
        .matching_policy(&alice(), &policies)
        .await
        .expect("lookup must succeed")
        .expect("a policy must match");
    assert_eq!(policy.name, "match-users");
    assert!(!matcher
        .matches(&Subject::user("Bob"), &policies)
        .await
        .expect("lookup must succeed"));
}

#[test]
fn readiness_requires_all_collaborators() {
    let store = Arc::new(Store::default());

    let err = Evaluator::builder()
        .with_groups(store.clone())
        .with_labels(store.clone())
        .build()
        .err()
        .expect("restrictions are missing");
    assert_eq!(err, ConfigurationError::MissingRestrictionSource);

    let err = Evaluator::builder()
        .with_restrictions(store.clone())
        .with_labels(store.clone())
        .build()
        .err()
        .expect("groups are missing");
    assert_eq!(err, ConfigurationError::MissingGroupResolver);

    let err = Evaluator::builder()
        .with_restrictions(store.clone())
        .with_groups(store)
        .build()
        .err()
        .expect("labels are missing");
    assert_eq!(err, ConfigurationError::MissingLabelLookup);
}
