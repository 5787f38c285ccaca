use crate::{
    core::{Attributes, Binding, Evaluator, StoreError, Subject, Verdict},
    k8s::{self, Resource, RoleBinding, RoleBindingRestriction, RoleBindingRestrictionSpec},
    metrics::{AdmissionMetrics, Outcome},
};
use anyhow::{anyhow, bail, ensure, Result};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::{core::DynamicObject, ResourceExt};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Validates role binding writes against namespace restrictions, and the
/// restrictions themselves.
#[derive(Clone)]
pub struct Admission {
    evaluator: Evaluator,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type Review = kube::core::admission::AdmissionReview<DynamicObject>;
type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

// === impl AdmissionService ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ok(
                Response::builder()
                    .status(http::StatusCode::NOT_FOUND)
                    .body(Body::default())
                    .expect("not found response must be valid"),
            ));
        }

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req.into_body().collect().await?.to_bytes();
            admission.handle(bytes).await
        })
    }
}

impl Admission {
    pub fn new(evaluator: Evaluator, metrics: AdmissionMetrics) -> Self {
        Self { evaluator, metrics }
    }

    async fn handle(self, bytes: bytes::Bytes) -> Result<Response<Body>, Error> {
        let review: Review = match serde_json::from_slice(&bytes) {
            Ok(review) => review,
            Err(error) => {
                warn!(%error, "Failed to parse request body");
                return json_response(AdmissionResponse::invalid(error).into_review());
            }
        };
        trace!(?review);

        let rsp = match review.try_into() {
            Ok(req) => {
                debug!(?req);
                match self.admit(req).await {
                    Ok(rsp) => rsp,
                    Err(error) => {
                        warn!(%error, "Responding with an error; restrictions could not be read");
                        return Ok(unavailable());
                    }
                }
            }
            Err(error) => {
                warn!(%error, "Invalid admission request");
                AdmissionResponse::invalid(error)
            }
        };
        debug!(?rsp);
        json_response(rsp.into_review())
    }

    async fn admit(&self, req: AdmissionRequest) -> Result<AdmissionResponse, StoreError> {
        let kind = req.kind.kind.clone();

        if is_kind::<RoleBinding>(&req) {
            let outcome = self.admit_role_binding(req).await;
            let result = match &outcome {
                Ok(rsp) if rsp.allowed => Outcome::Allow,
                Ok(_) => Outcome::Deny,
                Err(_) => Outcome::Error,
            };
            self.metrics.record(&kind, result);
            return outcome;
        }

        if is_kind::<RoleBindingRestriction>(&req) {
            let rsp = self.admit_restriction(req);
            let result = if rsp.allowed {
                Outcome::Allow
            } else {
                Outcome::Deny
            };
            self.metrics.record(&kind, result);
            return Ok(rsp);
        }

        self.metrics.record(&kind, Outcome::Invalid);
        Ok(AdmissionResponse::invalid(format_args!(
            "unsupported resource type: {}.{}.{}",
            req.kind.group, req.kind.version, req.kind.kind
        )))
    }

    async fn admit_role_binding(
        &self,
        req: AdmissionRequest,
    ) -> Result<AdmissionResponse, StoreError> {
        let rsp = AdmissionResponse::from(&req);

        let mut attrs = role_binding_attributes(&req);
        match role_binding_subjects(&req) {
            Ok((binding, old_binding)) => {
                attrs.binding.subjects = binding;
                attrs.old_binding = old_binding;
            }
            Err(error) => {
                // Unreadable subjects only matter where a restriction applies.
                if self.evaluator.restricts(&attrs).await? {
                    info!(%error, ns = ?req.namespace, name = %req.name, "Denied");
                    return Ok(rsp.deny(error));
                }
                debug!(%error, ns = ?req.namespace, name = %req.name, "Unrestricted");
                return Ok(rsp);
            }
        }

        match self.evaluator.admit(&attrs).await {
            Ok(Verdict::Allow) => Ok(rsp),
            Ok(Verdict::Deny(denial)) => {
                info!(ns = %denial.namespace, name = %req.name, subject = %denial.subject, "Denied");
                Ok(rsp.deny(denial))
            }
            Err(error) => {
                error!(%error, ns = ?req.namespace, name = %req.name, "Failed to evaluate restrictions");
                Err(error)
            }
        }
    }

    fn admit_restriction(&self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);

        let (obj, spec) = match parse_spec::<RoleBindingRestrictionSpec>(req) {
            Ok(spec) => spec,
            Err(error) => {
                info!(%error, "Failed to parse RoleBindingRestriction spec");
                return rsp.deny(error);
            }
        };

        if let Err(error) = validate_restriction(&spec) {
            let ns = obj.namespace().unwrap_or_default();
            let name = obj.name_any();
            info!(%error, %ns, %name, "Denied");
            return rsp.deny(error);
        }

        rsp
    }
}

fn is_kind<T>(req: &AdmissionRequest) -> bool
where
    T: Resource,
    T::DynamicType: Default,
{
    let dt = Default::default();
    req.kind.group.eq_ignore_ascii_case(&T::group(&dt))
        && req.kind.kind.eq_ignore_ascii_case(&T::kind(&dt))
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}

fn unavailable() -> Response<Body> {
    Response::builder()
        .status(http::StatusCode::INTERNAL_SERVER_ERROR)
        .body(Body::default())
        .expect("error response must be valid")
}

fn parse_spec<T: DeserializeOwned>(req: AdmissionRequest) -> Result<(DynamicObject, T)> {
    let obj = req
        .object
        .ok_or_else(|| anyhow!("admission request missing 'object"))?;

    let spec = {
        let data = obj
            .data
            .get("spec")
            .cloned()
            .ok_or_else(|| anyhow!("admission request missing 'spec'"))?;
        serde_json::from_value(data)?
    };

    Ok((obj, spec))
}

/// Reads the scope of a role binding request. Subjects are left empty.
///
/// The request's namespace, not the object's, scopes the binding.
fn role_binding_attributes(req: &AdmissionRequest) -> Attributes {
    Attributes {
        group: req.resource.group.clone(),
        resource: req.resource.resource.clone(),
        subresource: req.sub_resource.clone(),
        binding: Binding {
            namespace: req.namespace.clone(),
            subjects: vec![],
        },
        old_binding: None,
    }
}

/// Reads the new and prior subjects of a role binding request.
fn role_binding_subjects(req: &AdmissionRequest) -> Result<(Vec<Subject>, Option<Binding>)> {
    let subjects = parse_subjects(req.object.as_ref())?;
    let old_binding = match req.old_object.as_ref() {
        Some(old) => Some(Binding {
            namespace: req.namespace.clone(),
            subjects: parse_subjects(Some(old))?,
        }),
        None => None,
    };
    Ok((subjects, old_binding))
}

fn parse_subjects(obj: Option<&DynamicObject>) -> Result<Vec<Subject>> {
    let subjects: Vec<k8s::Subject> = match obj.and_then(|o| o.data.get("subjects")) {
        None | Some(serde_json::Value::Null) => return Ok(vec![]),
        Some(subjects) => serde_json::from_value(subjects.clone())?,
    };
    Ok(subjects.into_iter().map(subject_from_api).collect())
}

fn subject_from_api(subject: k8s::Subject) -> Subject {
    Subject {
        kind: subject.kind.as_str().into(),
        namespace: subject.namespace,
        name: subject.name,
    }
}

fn validate_restriction(spec: &RoleBindingRestrictionSpec) -> Result<()> {
    ensure!(
        spec.populated() == 1,
        "exactly one of userrestriction, grouprestriction, or serviceaccountrestriction must be set"
    );

    if let Some(sas) = spec.service_account_restriction.as_ref() {
        for sa in sas.service_accounts.iter() {
            if sa.name.is_empty() {
                bail!("serviceaccounts must specify a name");
            }
        }
    }

    Ok(())
}
