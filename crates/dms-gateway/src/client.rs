use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dms_core::{
    ConstructionError, FleetGateway, GatewayError, StartMode, TableStatRecord, TaskRecord,
};
use reqwest::{header, StatusCode, Url};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::{debug, warn};

use crate::session::{error_chain, Session, SessionOptions};
use crate::signing::{sign, SigningRequest};
use crate::wire::{
    DescribeTasksRequest, DescribeTasksResponse, ErrorBody, Filter, StartTaskRequest,
    StopTaskRequest, TableStatsRequest, TableStatsResponse, TASK_ARN_FILTER,
};

pub const TARGET_PREFIX: &str = "AmazonDMSv20160101";
pub const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const SERVICE: &str = "dms";
const DEFAULT_PAGE_SIZE: u32 = 100;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// JSON-1.1 client for the replication control plane.
#[derive(Clone)]
pub struct DmsClient {
    http: reqwest::Client,
    session: Session,
    url: Url,
    host: String,
    page_size: u32,
}

impl DmsClient {
    /// Loads the session and checks credentials before any request is made.
    pub async fn connect(options: &SessionOptions) -> Result<Self, ConstructionError> {
        let mut session = Session::load(options).await?;
        session.verify_credentials().await?;
        Self::new(session)
    }

    pub fn new(session: Session) -> Result<Self, ConstructionError> {
        let url = Url::parse(&session.endpoint).map_err(|err| {
            ConstructionError::Client(format!("invalid endpoint '{}': {err}", session.endpoint))
        })?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ConstructionError::Client(format!(
                    "endpoint '{}' has no host",
                    session.endpoint
                )))
            }
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| ConstructionError::Client(err.to_string()))?;

        Ok(Self {
            http,
            session,
            url,
            host,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn region(&self) -> &str {
        &self.session.region
    }

    pub fn profile(&self) -> &str {
        &self.session.profile
    }

    async fn call<Req, Resp>(&self, action: &str, request: &Req) -> Result<Resp, GatewayError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request)
            .map_err(|err| GatewayError::Decode(format!("failed to encode {action}: {err}")))?;
        let target = format!("{TARGET_PREFIX}.{action}");

        let mut builder = self
            .http
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", &target);

        let credentials = self.session.credentials().await.map_err(|err| {
            GatewayError::Auth(format!(
                "failed to load credentials for profile '{}': {}",
                self.session.profile,
                error_chain(&err)
            ))
        })?;
        if let Some(credentials) = &credentials {
            let signed = sign(
                &SigningRequest {
                    credentials,
                    region: &self.session.region,
                    service: SERVICE,
                    host: &self.host,
                    path: self.url.path(),
                    headers: &[("content-type", CONTENT_TYPE), ("x-amz-target", target.as_str())],
                    time: Utc::now(),
                },
                &payload,
            )
            .map_err(|err| GatewayError::Auth(format!("request signing failed: {err}")))?;
            builder = builder
                .header("X-Amz-Date", signed.amz_date)
                .header(header::AUTHORIZATION, signed.authorization);
            if let Some(token) = signed.security_token {
                builder = builder.header("X-Amz-Security-Token", token);
            }
        }

        debug!(action, "sending request");
        let response = builder
            .body(payload)
            .send()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| GatewayError::Network(err.to_string()))?;

        if !status.is_success() {
            let err = map_error(status, &body);
            warn!(action, status = status.as_u16(), "request failed: {err}");
            return Err(err);
        }

        serde_json::from_slice(&body).map_err(|err| GatewayError::Decode(format!("{action}: {err}")))
    }
}

/// Maps a failed response onto the gateway taxonomy, using the `__type`
/// shape name first and the HTTP status second.
pub fn map_error(status: StatusCode, body: &[u8]) -> GatewayError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let code = parsed.code().to_string();
    let message = if !parsed.message.is_empty() {
        parsed.message
    } else {
        let text = String::from_utf8_lossy(body).trim().to_string();
        if text.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            text
        }
    };

    let auth_code =
        code.starts_with("AccessDenied") || code.contains("Signature") || code.contains("Token");
    match code.as_str() {
        "ResourceNotFoundFault" => GatewayError::NotFound(message),
        "InvalidResourceStateFault" => GatewayError::InvalidState(message),
        _ if auth_code => GatewayError::Auth(message),
        _ if status == StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        _ if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
            GatewayError::Auth(message)
        }
        "" => GatewayError::Remote {
            code: format!("HTTP {}", status.as_u16()),
            message,
        },
        _ => GatewayError::Remote { code, message },
    }
}

#[async_trait]
impl FleetGateway for DmsClient {
    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, GatewayError> {
        let mut tasks = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let request = DescribeTasksRequest {
                marker: marker.as_deref(),
                max_records: Some(self.page_size),
                ..Default::default()
            };
            let page: DescribeTasksResponse =
                self.call("DescribeReplicationTasks", &request).await?;
            tasks.extend(page.replication_tasks.into_iter().map(TaskRecord::from));
            match page.marker.filter(|next| !next.is_empty()) {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        debug!(count = tasks.len(), "listed tasks");
        Ok(tasks)
    }

    async fn describe_task(&self, arn: &str) -> Result<TaskRecord, GatewayError> {
        let request = DescribeTasksRequest {
            filters: vec![Filter {
                name: TASK_ARN_FILTER,
                values: vec![arn],
            }],
            ..Default::default()
        };
        let page: DescribeTasksResponse = self.call("DescribeReplicationTasks", &request).await?;
        page.replication_tasks
            .into_iter()
            .next()
            .map(TaskRecord::from)
            .ok_or_else(|| GatewayError::NotFound(format!("task not found: {arn}")))
    }

    async fn table_statistics(&self, arn: &str) -> Result<Vec<TableStatRecord>, GatewayError> {
        let mut stats = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let request = TableStatsRequest {
                replication_task_arn: arn,
                marker: marker.as_deref(),
                max_records: Some(self.page_size),
            };
            let page: TableStatsResponse = self.call("DescribeTableStatistics", &request).await?;
            stats.extend(page.table_statistics.into_iter().map(TableStatRecord::from));
            match page.marker.filter(|next| !next.is_empty()) {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(stats)
    }

    async fn start_task(&self, arn: &str, mode: StartMode) -> Result<(), GatewayError> {
        let request = StartTaskRequest {
            replication_task_arn: arn,
            start_replication_task_type: mode.as_str(),
        };
        let _: IgnoredAny = self.call("StartReplicationTask", &request).await?;
        Ok(())
    }

    async fn stop_task(&self, arn: &str) -> Result<(), GatewayError> {
        let request = StopTaskRequest {
            replication_task_arn: arn,
        };
        let _: IgnoredAny = self.call("StopReplicationTask", &request).await?;
        Ok(())
    }
}
