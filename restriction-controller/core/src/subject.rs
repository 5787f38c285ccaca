use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,

    /// A kind no restriction can authorize, e.g. `SystemUser`.
    Unsupported(String),
}

/// An identity referenced by a role binding.
///
/// Two subjects are the same identity iff their kind, namespace and name are
/// equal. Only service accounts carry a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subject {
    pub kind: SubjectKind,
    pub namespace: Option<String>,
    pub name: String,
}

/// The subjects of a role binding, as seen by a single write.
///
/// `namespace` is unset for cluster-scoped bindings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Binding {
    pub namespace: Option<String>,
    pub subjects: Vec<Subject>,
}

// === impl SubjectKind ===

impl SubjectKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "User",
            Self::Group => "Group",
            Self::ServiceAccount => "ServiceAccount",
            Self::Unsupported(kind) => kind,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SubjectKind {
    fn from(kind: &str) -> Self {
        match kind {
            "User" => Self::User,
            "Group" => Self::Group,
            "ServiceAccount" => Self::ServiceAccount,
            kind => Self::Unsupported(kind.to_string()),
        }
    }
}

// === impl Subject ===

impl Subject {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::User,
            namespace: None,
            name: name.into(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Group,
            namespace: None,
            name: name.into(),
        }
    }

    pub fn service_account(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::ServiceAccount,
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Puts the subject in canonical form for identity comparison.
    ///
    /// A service account without a namespace lives in `default_ns`; users and
    /// groups never carry one.
    pub fn normalized(mut self, default_ns: &str) -> Self {
        match self.kind {
            SubjectKind::ServiceAccount => {
                if self.namespace.as_deref().map_or(true, str::is_empty) {
                    self.namespace = Some(default_ns.to_string());
                }
            }
            SubjectKind::User | SubjectKind::Group | SubjectKind::Unsupported(_) => {
                self.namespace = None;
            }
        }
        self
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace.as_deref() {
            Some(ns) => write!(f, "{} \"{}/{}\"", self.kind, ns, self.name),
            None => write!(f, "{} \"{}\"", self.kind, self.name),
        }
    }
}

// === impl Binding ===

impl Binding {
    pub fn new(namespace: impl Into<String>, subjects: impl IntoIterator<Item = Subject>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            subjects: subjects.into_iter().collect(),
        }
    }

    pub fn cluster(subjects: impl IntoIterator<Item = Subject>) -> Self {
        Self {
            namespace: None,
            subjects: subjects.into_iter().collect(),
        }
    }
}
