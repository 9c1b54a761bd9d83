//! reqwest-backed [`SimulationClient`].

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::SubjectRef,
    error::ApiError,
    protocol::{
        AssignmentSnapshot, CommitMetadata, CommitRequest, CommitResponse, DiffPayload,
        ImpactType, SimulateRequest, SimulateResponse, StartSessionRequest, StartSessionResponse,
        StepSaveRequest, TargetRef,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{CommitError, RemoteFailure, SessionStartError, SimulationError, StepSaveError},
    types::{CommitResult, ImpactEntry, ImpactKind, ImpactReport, SessionContext},
    SimulationClient,
};

pub const DEFAULT_API_PREFIX: &str = "/api/access";
pub const DEFAULT_CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Connection settings handed to the client at construction time.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub api_prefix: String,
    pub csrf_header: String,
    pub csrf_token: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            csrf_header: DEFAULT_CSRF_HEADER.to_string(),
            csrf_token: None,
        })
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn with_csrf(mut self, header: impl Into<String>, token: impl Into<String>) -> Self {
        self.csrf_header = header.into();
        self.csrf_token = Some(token.into());
        self
    }

    fn endpoint_root(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{prefix}")
        }
    }
}

pub struct HttpSimulationClient {
    http: Client,
    root: String,
    config: ClientConfig,
}

impl HttpSimulationClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http_client(Client::new(), config)
    }

    pub fn with_http_client(http: Client, config: ClientConfig) -> Self {
        Self {
            http,
            root: config.endpoint_root(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Read-only assignment view shown before edit mode.
    pub async fn fetch_snapshot(
        &self,
        subject: &SubjectRef,
    ) -> Result<AssignmentSnapshot, RemoteFailure> {
        let path = format!(
            "/subjects/{}/{}/assignments",
            subject.subject_type.as_str(),
            subject.subject_id
        );
        let body = self.send(Method::GET, &path, None::<&()>).await?;
        decode_required(&body, "assignment snapshot")
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Vec<u8>, RemoteFailure> {
        let url = format!("{}{path}", self.root);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = &self.config.csrf_token {
            request = request.header(self.config.csrf_header.as_str(), token.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let res = request.send().await?;
        let status = res.status();
        let bytes = res.bytes().await?.to_vec();
        debug!(%method, path, status = status.as_u16(), "access api call");

        if status.is_success() {
            return Ok(bytes);
        }

        let failure = rejection(status, &bytes);
        warn!(%method, path, status = status.as_u16(), error = %failure, "access api rejected call");
        Err(failure)
    }
}

fn rejection(status: StatusCode, body: &[u8]) -> RemoteFailure {
    let message = serde_json::from_slice::<ApiError>(body)
        .map(|err| err.message)
        .unwrap_or_else(|_| status.to_string());
    RemoteFailure::Rejected {
        status: status.as_u16(),
        message,
    }
}

fn is_empty_body(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

fn decode_required<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<T, RemoteFailure> {
    if is_empty_body(body) {
        return Err(RemoteFailure::Malformed(format!("empty {what} response")));
    }
    serde_json::from_slice(body)
        .map_err(|err| RemoteFailure::Malformed(format!("invalid {what} response: {err}")))
}

fn decode_optional<T: DeserializeOwned + Default>(
    body: &[u8],
    what: &str,
) -> Result<T, RemoteFailure> {
    if is_empty_body(body) {
        return Ok(T::default());
    }
    decode_required(body, what)
}

/// Validates a simulate payload into the domain report.
pub fn impact_report_from_wire(response: SimulateResponse) -> Result<ImpactReport, RemoteFailure> {
    let entries = response
        .impact_details
        .into_iter()
        .enumerate()
        .map(|(index, detail)| {
            let kind = match detail.impact_type {
                ImpactType::PermissionGained => ImpactKind::Gained,
                ImpactType::PermissionLost => ImpactKind::Lost,
            };
            let label = detail
                .permission_name
                .or(detail.permission_description)
                .filter(|label| !label.trim().is_empty())
                .ok_or_else(|| {
                    RemoteFailure::Malformed(format!("impact detail {index} has no permission label"))
                })?;
            Ok(ImpactEntry {
                kind,
                label,
                reason: detail.reason,
            })
        })
        .collect::<Result<Vec<_>, RemoteFailure>>()?;

    Ok(ImpactReport {
        summary: response.summary,
        entries,
    })
}

#[async_trait]
impl SimulationClient for HttpSimulationClient {
    async fn start_session(&self, subject: &SubjectRef) -> Result<SessionContext, SessionStartError> {
        let request = StartSessionRequest {
            subject_id: subject.subject_id.clone(),
            subject_type: subject.subject_type,
        };
        let body = self
            .send(Method::POST, "/sessions/start", Some(&request))
            .await?;
        let response: StartSessionResponse = decode_required(&body, "session start")?;
        Ok(SessionContext {
            id: response.session_context_id,
            subject: subject.clone(),
        })
    }

    async fn simulate(
        &self,
        context: &SessionContext,
        diff: &DiffPayload,
    ) -> Result<ImpactReport, SimulationError> {
        let request = SimulateRequest {
            session_context_id: context.id.clone(),
            diff: diff.clone(),
        };
        let body = self
            .send(Method::POST, "/sessions/simulate", Some(&request))
            .await?;
        let response: SimulateResponse = decode_required(&body, "simulation")?;
        Ok(impact_report_from_wire(response)?)
    }

    async fn commit(
        &self,
        context: &SessionContext,
        diff: &DiffPayload,
        metadata: &CommitMetadata,
    ) -> Result<CommitResult, CommitError> {
        let request = CommitRequest {
            session_context_id: context.id.clone(),
            diff: diff.clone(),
            metadata: metadata.clone(),
        };
        let body = self
            .send(Method::POST, "/sessions/commit", Some(&request))
            .await?;
        let response: CommitResponse = decode_optional(&body, "commit")?;
        Ok(CommitResult { id: response.id })
    }

    async fn save_step(
        &self,
        context: &SessionContext,
        step: &str,
        selected: &[TargetRef],
    ) -> Result<(), StepSaveError> {
        let request = StepSaveRequest {
            session_context_id: context.id.clone(),
            step: step.to_string(),
            selected: selected.to_vec(),
        };
        self.send(Method::POST, "/sessions/steps", Some(&request))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
