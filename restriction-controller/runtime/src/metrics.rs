use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

/// Counts admission decisions by resource kind and outcome.
#[derive(Clone, Debug, Default)]
pub struct AdmissionMetrics {
    decisions: Family<DecisionLabels, Counter>,
}

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub(crate) enum Outcome {
    Allow,
    Deny,
    Invalid,
    Error,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct DecisionLabels {
    kind: String,
    result: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let decisions = Family::default();
        prom.register(
            "decisions",
            "Count of admission decisions by kind and result",
            decisions.clone(),
        );
        Self { decisions }
    }

    pub(crate) fn record(&self, kind: &str, outcome: Outcome) {
        self.decisions
            .get_or_create(&DecisionLabels {
                kind: kind.to_string(),
                result: outcome.as_str(),
            })
            .inc();
    }

    #[cfg(test)]
    pub(crate) fn count(&self, kind: &str, outcome: Outcome) -> u64 {
        self.decisions
            .get_or_create(&DecisionLabels {
                kind: kind.to_string(),
                result: outcome.as_str(),
            })
            .get()
    }
}

// === impl Outcome ===

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }
}
