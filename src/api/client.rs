use std::sync::Arc;

use reqwest::Method;

use crate::cancel::CancelToken;
use crate::error::Error;

use super::transport::{ApiRequest, ApiResponse, HttpTransport, LogSink, RetryPolicy, Transport};
use super::types::{
    HeaderIdentity, Identity, Profile, ValueEnvelope, WiqlRequest, WiqlResponse, WorkItem,
    WorkItemBatchRequest, WorkItemType,
};

pub const API_VERSION: &str = "6.0";

const JSON: &str = "application/json";
const JSON_PATCH: &str = "application/json-patch+json";
const USERDATA_HEADER: &str = "x-vss-userdata";

/// Connection settings for a [`Client`]. Immutable once the client is built;
/// a project override goes through [`Client::with_project`] and produces a
/// new client value.
#[derive(Default)]
pub struct ClientOptions {
    pub base_url: String,
    pub project: String,
    pub pat: String,
    pub insecure: bool,
    pub log: Option<LogSink>,
}

/// Typed gateway over the transport. Owns no mutable state, so one client
/// can serve any number of sequential calls.
pub struct Client {
    base_url: String,
    project: String,
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        if options.base_url.is_empty() {
            return Err(Error::ConfigMissing("base URL is required".into()));
        }
        if options.pat.is_empty() {
            return Err(Error::ConfigMissing("PAT is required".into()));
        }
        let transport = HttpTransport::new(
            &options.pat,
            options.insecure,
            options.log,
            RetryPolicy::default(),
        )?;
        Ok(Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            project: options.project,
            transport: Arc::new(transport),
        })
    }

    #[cfg(test)]
    pub fn with_transport(
        base_url: &str,
        project: &str,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            transport,
        }
    }

    /// New client for another project; everything else is shared. The
    /// original client is left untouched.
    pub fn with_project(&self, project: &str) -> Self {
        Self {
            base_url: self.base_url.clone(),
            project: project.to_string(),
            transport: self.transport.clone(),
        }
    }

    pub fn work_item_url(&self, id: i64) -> String {
        join_url(&self.base_url, &format!("_apis/wit/workItems/{id}"))
    }

    pub async fn wiql(
        &self,
        query: &str,
        top: u32,
        cancel: &CancelToken,
    ) -> Result<WiqlResponse, Error> {
        let mut params = versioned();
        if top > 0 {
            params.push(("$top".into(), top.to_string()));
        }
        let body = serde_json::to_vec(&WiqlRequest {
            query: query.to_string(),
        })?;
        let response = self
            .send(
                Method::POST,
                &self.project_path("_apis/wit/wiql"),
                params,
                Some(body),
                Some(JSON),
                cancel,
            )
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn get_work_item(
        &self,
        id: i64,
        fields: &[String],
        expand: &str,
        cancel: &CancelToken,
    ) -> Result<WorkItem, Error> {
        let mut params = versioned();
        if !fields.is_empty() {
            params.push(("fields".into(), fields.join(",")));
        }
        if !expand.is_empty() {
            params.push(("$expand".into(), expand.to_string()));
        }
        let response = self
            .send(
                Method::GET,
                &self.project_path(&format!("_apis/wit/workitems/{id}")),
                params,
                None,
                None,
                cancel,
            )
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn work_items_batch(
        &self,
        ids: &[i64],
        fields: &[String],
        cancel: &CancelToken,
    ) -> Result<Vec<WorkItem>, Error> {
        let body = serde_json::to_vec(&WorkItemBatchRequest {
            ids: ids.to_vec(),
            fields: fields.to_vec(),
        })?;
        let response = self
            .send(
                Method::POST,
                &self.project_path("_apis/wit/workitemsbatch"),
                versioned(),
                Some(body),
                Some(JSON),
                cancel,
            )
            .await?;
        // Older servers answer with a bare array, newer ones with a
        // {count, value} envelope.
        match serde_json::from_slice::<Vec<WorkItem>>(&response.body) {
            Ok(items) => Ok(items),
            Err(err) => match serde_json::from_slice::<ValueEnvelope<WorkItem>>(&response.body) {
                Ok(wrapped) => Ok(wrapped.value),
                Err(_) => Err(Error::Decode(err)),
            },
        }
    }

    pub async fn update_work_item(
        &self,
        id: i64,
        patch: &impl serde::Serialize,
        cancel: &CancelToken,
    ) -> Result<WorkItem, Error> {
        let body = serde_json::to_vec(patch)?;
        let response = self
            .send(
                Method::PATCH,
                &self.project_path(&format!("_apis/wit/workitems/{id}")),
                versioned(),
                Some(body),
                Some(JSON_PATCH),
                cancel,
            )
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn create_work_item(
        &self,
        work_item_type: &str,
        patch: &impl serde::Serialize,
        cancel: &CancelToken,
    ) -> Result<WorkItem, Error> {
        let body = serde_json::to_vec(patch)?;
        let escaped = urlencoding::encode(work_item_type);
        let response = self
            .send(
                Method::POST,
                &self.project_path(&format!("_apis/wit/workitems/${escaped}")),
                versioned(),
                Some(body),
                Some(JSON_PATCH),
                cancel,
            )
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    pub async fn list_work_item_types(
        &self,
        cancel: &CancelToken,
    ) -> Result<Vec<WorkItemType>, Error> {
        let response = self
            .send(
                Method::GET,
                &self.project_path("_apis/wit/workitemtypes"),
                versioned(),
                None,
                None,
                cancel,
            )
            .await?;
        let wrapped: ValueEnvelope<WorkItemType> = serde_json::from_slice(&response.body)?;
        Ok(wrapped.value)
    }

    /// Fetch the token owner's profile from the profile service. Cloud-hosted
    /// deployments use a dedicated host; anything else falls back to the
    /// configured base URL.
    pub async fn profile_me(&self, cancel: &CancelToken) -> Result<Profile, Error> {
        let url = join_url(&self.profile_base_url(), "_apis/profile/profiles/me");
        let response = self
            .send_url(Method::GET, url, versioned(), None, None, cancel)
            .await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Recover the acting identity from the `X-Vss-Userdata` header of an
    /// authenticated call. Needs a project, since the probe request targets
    /// the project's work-item-type listing.
    pub async fn whoami_from_headers(
        &self,
        cancel: &CancelToken,
    ) -> Result<HeaderIdentity, Error> {
        if self.project.is_empty() {
            return Err(Error::ConfigMissing("project is required".into()));
        }
        let response = self
            .send(
                Method::GET,
                &self.project_path("_apis/wit/workitemtypes"),
                versioned(),
                None,
                None,
                cancel,
            )
            .await?;
        let raw = response
            .headers
            .get(USERDATA_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if raw.is_empty() {
            return Err(Error::WhoamiUnavailable(
                "X-Vss-Userdata header missing".into(),
            ));
        }
        Ok(match raw.split_once(':') {
            Some((id, unique_name)) => HeaderIdentity {
                id: id.to_string(),
                unique_name: unique_name.to_string(),
            },
            None => HeaderIdentity {
                id: String::new(),
                unique_name: raw.to_string(),
            },
        })
    }

    pub async fn resolve_identity_by_id(
        &self,
        id: &str,
        cancel: &CancelToken,
    ) -> Result<Identity, Error> {
        if id.is_empty() {
            return Err(Error::invalid_args("identity id is required"));
        }
        let mut params = versioned();
        params.push(("identityIds".into(), id.to_string()));
        let response = self
            .send(Method::GET, "_apis/identities", params, None, None, cancel)
            .await?;
        let wrapped: ValueEnvelope<Identity> = serde_json::from_slice(&response.body)?;
        wrapped
            .value
            .into_iter()
            .next()
            .ok_or_else(|| Error::IdentityNotFound { id: id.to_string() })
    }

    fn project_path(&self, suffix: &str) -> String {
        if self.project.is_empty() {
            suffix.to_string()
        } else {
            format!("{}/{}", self.project, suffix)
        }
    }

    fn profile_base_url(&self) -> String {
        let lower = self.base_url.to_lowercase();
        if lower.contains("dev.azure.com") || lower.contains("visualstudio.com") {
            "https://app.vssps.visualstudio.com".to_string()
        } else {
            self.base_url.clone()
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Vec<u8>>,
        content_type: Option<&'static str>,
        cancel: &CancelToken,
    ) -> Result<ApiResponse, Error> {
        let url = join_url(&self.base_url, path);
        self.send_url(method, url, query, body, content_type, cancel)
            .await
    }

    async fn send_url(
        &self,
        method: Method,
        url: String,
        query: Vec<(String, String)>,
        body: Option<Vec<u8>>,
        content_type: Option<&'static str>,
        cancel: &CancelToken,
    ) -> Result<ApiResponse, Error> {
        self.transport
            .request(
                ApiRequest {
                    method,
                    url,
                    query,
                    body,
                    content_type,
                },
                cancel,
            )
            .await
    }
}

fn versioned() -> Vec<(String, String)> {
    vec![("api-version".into(), API_VERSION.into())]
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
