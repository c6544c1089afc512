use crate::{
    core::{
        admission::{default_access, validate_create},
        AccessIndex,
    },
    k8s::{Namespace, Project, ProjectAccessSpec, ProjectAccessStatus, ProjectSpec},
    store::Store,
};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::{
    admission::{self, Operation},
    DynamicObject, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Decides whether project writes are admitted, and fills in a project's
/// default access and a `ProjectAccess`'s visible projects.
#[derive(Clone)]
pub struct Admission<S> {
    store: S,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type AdmissionRequest = admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = admission::AdmissionResponse;
type AdmissionReview = admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

#[derive(Copy, Clone, Debug)]
enum Route {
    ValidateProject,
    CreateProject,
    ProjectAccess,
}

/// A request that could not be admitted or denied. It is answered with a
/// non-200 status and a JSON object describing the error.
#[derive(Debug)]
struct Failure {
    status: http::StatusCode,
    context: &'static str,
    detail: String,
}

// === impl Admission ===

impl<S, B> tower::Service<Request<B>> for Admission<S>
where
    S: Store,
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        trace!(method = %req.method(), path = %req.uri().path());
        let route = match (req.method(), req.uri().path()) {
            (&http::Method::POST, "/project") => Route::ValidateProject,
            (&http::Method::POST, "/project-create") => Route::CreateProject,
            (&http::Method::POST, "/projectaccess") => Route::ProjectAccess,
            _ => {
                return Box::pin(future::ok(
                    Response::builder()
                        .status(http::StatusCode::NOT_FOUND)
                        .body(Body::default())
                        .expect("not found response must be valid"),
                ))
            }
        };

        let admission = self.clone();
        Box::pin(async move {
            let bytes = req
                .into_body()
                .collect()
                .await
                .map_err(|error| Error::Request(error.into()))?
                .to_bytes();

            let req = match parse_request(&bytes) {
                Ok(req) => req,
                Err(error) => {
                    return failure_response(Failure::bad_request(
                        "error unmarshalling request body",
                        error,
                    ));
                }
            };
            debug!(uid = %req.uid, operation = ?req.operation, user = ?req.user_info.username);

            let rsp = match route {
                Route::ValidateProject => admission.validate_project(req).await,
                Route::CreateProject => admission.create_project(req),
                Route::ProjectAccess => admission.project_access(req).await,
            };
            match rsp {
                Ok(rsp) => {
                    debug!(allowed = rsp.allowed);
                    json_response(rsp.into_review())
                }
                Err(failure) => failure_response(failure),
            }
        })
    }
}

impl<S: Store> Admission<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Denies creating a project over an existing namespace.
    async fn validate_project(self, req: AdmissionRequest) -> Result<AdmissionResponse, Failure> {
        let rsp = AdmissionResponse::from(&req);
        if req.operation != Operation::Create {
            return Ok(rsp);
        }

        let (obj, _) = parse_spec::<ProjectSpec>(&req)
            .map_err(|error| Failure::bad_request("error unmarshalling Project", error))?;
        let name = obj.name_any();

        let namespaces = self
            .store
            .list::<Namespace>()
            .await
            .map_err(|error| Failure::internal("error fetching namespaces", error))?;

        if let Err(denied) = validate_create(&name, &namespaces) {
            info!(project = %name, %denied, "Denied");
            return Ok(rsp.deny(denied));
        }
        Ok(rsp)
    }

    /// Grants a new project's creator access to it when it declares no access.
    fn create_project(&self, req: AdmissionRequest) -> Result<AdmissionResponse, Failure> {
        let rsp = AdmissionResponse::from(&req);
        if req.operation != Operation::Create {
            return Ok(rsp);
        }

        let (obj, spec) = parse_spec::<ProjectSpec>(&req)
            .map_err(|error| Failure::bad_request("error unmarshalling Project", error))?;
        let username = req.user_info.username.as_deref().unwrap_or_default();
        let Some(access) = default_access(&spec, username) else {
            return Ok(rsp);
        };
        info!(project = %obj.name_any(), %username, "Granting creator access");

        // The object may have no spec at all, in which case it is added whole.
        let op = if obj.data.get("spec").is_some_and(|s| s.is_object()) {
            patch_add("/spec/access", &access)
        } else {
            patch_add("/spec", &ProjectSpec { access })
        };
        with_patch(rsp, op)
    }

    /// Sets a `ProjectAccess`'s status to the projects its requester may access.
    async fn project_access(self, req: AdmissionRequest) -> Result<AdmissionResponse, Failure> {
        let rsp = AdmissionResponse::from(&req);
        parse_spec::<ProjectAccessSpec>(&req)
            .map_err(|error| Failure::bad_request("error unmarshalling ProjectAccess", error))?;

        let projects = self
            .store
            .list::<Project>()
            .await
            .map_err(|error| Failure::internal("error fetching projects", error))?;

        let projects = AccessIndex::new(&projects).visible_projects(&req.user_info);
        debug!(user = ?req.user_info.username, ?projects);
        with_patch(
            rsp,
            patch_add("/status", &ProjectAccessStatus { projects }),
        )
    }
}

fn parse_request(
    bytes: &[u8],
) -> Result<AdmissionRequest, Box<dyn std::error::Error + Send + Sync>> {
    let review = serde_json::from_slice::<AdmissionReview>(bytes)?;
    let req: AdmissionRequest = review.try_into()?;
    Ok(req)
}

/// Decodes the object's spec, which defaults when absent.
fn parse_spec<T>(req: &AdmissionRequest) -> Result<(&DynamicObject, T), String>
where
    T: DeserializeOwned + Default,
{
    let obj = req
        .object
        .as_ref()
        .ok_or("admission request missing 'object'")?;
    let spec = match obj.data.get("spec") {
        Some(spec) => serde_json::from_value(spec.clone()).map_err(|e| e.to_string())?,
        None => T::default(),
    };
    Ok((obj, spec))
}

fn patch_add<T: Serialize>(path: &str, value: &T) -> Result<serde_json::Value, serde_json::Error> {
    Ok(serde_json::json!({
        "op": "add",
        "path": path,
        "value": serde_json::to_value(value)?,
    }))
}

fn with_patch(
    rsp: AdmissionResponse,
    op: Result<serde_json::Value, serde_json::Error>,
) -> Result<AdmissionResponse, Failure> {
    let patch = op
        .and_then(|op| serde_json::from_value::<json_patch::Patch>(serde_json::Value::Array(vec![op])))
        .map_err(|error| Failure::internal("error creating patch", error))?;
    rsp.with_patch(patch)
        .map_err(|error| Failure::internal("error creating patch", error))
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    Ok(Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("admission review response must be valid"))
}

fn failure_response(failure: Failure) -> Result<Response<Body>, Error> {
    let mut body = serde_json::Map::new();
    body.insert(failure.context.to_string(), failure.detail.into());
    let bytes = serde_json::to_vec(&body)?;
    Ok(Response::builder()
        .status(failure.status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(bytes))
        .expect("error response must be valid"))
}

// === impl Failure ===

impl Failure {
    fn bad_request(context: &'static str, detail: impl ToString) -> Self {
        let detail = detail.to_string();
        warn!(error = %detail, "{context}");
        Self {
            status: http::StatusCode::BAD_REQUEST,
            context,
            detail,
        }
    }

    fn internal(context: &'static str, detail: impl ToString) -> Self {
        let detail = detail.to_string();
        error!(error = %detail, "{context}");
        Self {
            status: http::StatusCode::INTERNAL_SERVER_ERROR,
            context,
            detail,
        }
    }
}
