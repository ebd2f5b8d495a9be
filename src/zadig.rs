use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ZtaskError};
use crate::fetcher::{ListFetcher, ListScope, PagedResult};
use crate::types::{
    LaunchedTask, ParamKind, TaskDetail, TaskStatus, WorkflowParam, WorkflowSpec, WorkflowTask,
};

pub struct Zadig {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for Zadig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zadig")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Zadig {
    pub fn new(base_url: &str, token: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ztask/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/openapi{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    async fn check(response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(ZtaskError::Api(format!("Zadig API {}: {}", status, text)))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.authed(self.client.get(url)).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .authed(self.client.post(url))
            .json(body)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Browser link for a workflow, or one of its tasks.
    pub fn web_url(&self, project_key: &str, workflow_key: &str, task_id: Option<u64>) -> String {
        let base = format!(
            "{}/v1/projects/detail/{}/pipelines/custom/{}",
            self.base_url,
            urlencoding::encode(project_key),
            urlencoding::encode(workflow_key)
        );
        match task_id {
            Some(id) => format!("{}/{}", base, id),
            None => base,
        }
    }

    pub async fn list_tasks(
        &self,
        scope: &ListScope,
        page_num: u32,
        page_size: u32,
    ) -> Result<PagedResult<WorkflowTask>> {
        let url = self.api_url(&format!(
            "/workflows/custom/{}/tasks?projectKey={}&pageNum={}&pageSize={}",
            urlencoding::encode(&scope.workflow_key),
            urlencoding::encode(&scope.project_key),
            page_num,
            page_size
        ));
        let list: ZdTaskList = self.get_json(&url).await?;
        Ok(list.into_page(&scope.workflow_key))
    }

    pub async fn get_workflow(&self, scope: &ListScope) -> Result<WorkflowSpec> {
        let url = self.api_url(&format!(
            "/workflows/custom/{}/detail?projectKey={}",
            urlencoding::encode(&scope.workflow_key),
            urlencoding::encode(&scope.project_key)
        ));
        let workflow: ZdWorkflow = self.get_json(&url).await?;
        Ok(workflow.into_spec(scope))
    }

    pub async fn get_task(&self, workflow_key: &str, task_id: u64) -> Result<TaskDetail> {
        let url = self.api_url(&format!(
            "/workflows/custom/task?taskId={}&workflowKey={}",
            task_id,
            urlencoding::encode(workflow_key)
        ));
        let task: ZdTaskDetail = self.get_json(&url).await?;
        Ok(task.into_detail(workflow_key))
    }

    /// Start a new task of the scoped workflow with the given parameters.
    pub async fn launch(&self, scope: &ListScope, params: &[WorkflowParam]) -> Result<LaunchedTask> {
        let url = self.api_url("/workflows/custom/task");
        let body = ZdLaunchRequest::new(scope, params);
        let mut launched: LaunchedTask = self.post_json(&url, &body).await?;
        if launched.workflow_key.is_empty() {
            launched.workflow_key = scope.workflow_key.clone();
        }
        if launched.project_key.is_empty() {
            launched.project_key = scope.project_key.clone();
        }
        info!(scope = %scope, task_id = launched.task_id, "launched workflow task");
        Ok(launched)
    }

    /// Re-run an existing task with the parameters it originally ran with.
    pub async fn clone_task(&self, scope: &ListScope, task_id: u64) -> Result<LaunchedTask> {
        let detail = self.get_task(&scope.workflow_key, task_id).await?;
        let launched = self.launch(scope, &detail.params).await?;
        info!(scope = %scope, source = task_id, task_id = launched.task_id, "cloned workflow task");
        Ok(launched)
    }
}

#[async_trait]
impl ListFetcher<WorkflowTask> for Zadig {
    async fn fetch(
        &self,
        scope: &ListScope,
        page_num: u32,
        page_size: u32,
    ) -> Result<PagedResult<WorkflowTask>> {
        self.list_tasks(scope, page_num, page_size).await
    }
}

// Zadig API response types

#[derive(Deserialize)]
struct ZdTaskList {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    workflows: Vec<ZdTask>,
}

impl ZdTaskList {
    fn into_page(self, workflow_key: &str) -> PagedResult<WorkflowTask> {
        PagedResult {
            items: self
                .workflows
                .into_iter()
                .map(|t| t.into_task(workflow_key))
                .collect(),
            total: self.total,
        }
    }
}

#[derive(Deserialize)]
struct ZdTask {
    task_id: u64,
    #[serde(default, alias = "workflow_name")]
    workflow_key: String,
    #[serde(default)]
    display_name: Option<String>,
    status: Option<TaskStatus>,
    #[serde(default)]
    task_creator: String,
    #[serde(default)]
    create_time: i64,
    #[serde(default)]
    start_time: i64,
    #[serde(default)]
    end_time: i64,
}

impl ZdTask {
    fn into_task(self, workflow_key: &str) -> WorkflowTask {
        let key = if self.workflow_key.is_empty() {
            workflow_key.to_string()
        } else {
            self.workflow_key
        };
        WorkflowTask {
            task_id: self.task_id,
            workflow_display_name: self
                .display_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| key.clone()),
            workflow_key: key,
            status: self.status.unwrap_or(TaskStatus::Unknown),
            creator: self.task_creator,
            create_time: parse_timestamp(self.create_time).unwrap_or_else(Utc::now),
            start_time: parse_timestamp(self.start_time),
            end_time: parse_timestamp(self.end_time),
        }
    }
}

#[derive(Deserialize)]
struct ZdTaskDetail {
    #[serde(flatten)]
    task: ZdTask,
    #[serde(default)]
    params: Vec<ZdParam>,
}

impl ZdTaskDetail {
    fn into_detail(self, workflow_key: &str) -> TaskDetail {
        TaskDetail {
            task: self.task.into_task(workflow_key),
            params: self.params.into_iter().map(ZdParam::into_param).collect(),
        }
    }
}

#[derive(Deserialize)]
struct ZdWorkflow {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    params: Vec<ZdParam>,
}

impl ZdWorkflow {
    fn into_spec(self, scope: &ListScope) -> WorkflowSpec {
        WorkflowSpec {
            key: scope.workflow_key.clone(),
            display_name: if self.display_name.is_empty() {
                scope.workflow_key.clone()
            } else {
                self.display_name
            },
            project_key: scope.project_key.clone(),
            params: self.params.into_iter().map(ZdParam::into_param).collect(),
        }
    }
}

#[derive(Deserialize)]
struct ZdParam {
    name: String,
    #[serde(rename = "type")]
    kind: Option<ParamKind>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    choice_option: Vec<String>,
    #[serde(default)]
    is_credential: bool,
}

impl ZdParam {
    fn into_param(self) -> WorkflowParam {
        WorkflowParam {
            name: self.name,
            kind: self.kind.unwrap_or(ParamKind::String),
            value: self.value.unwrap_or_default(),
            choices: self.choice_option,
            is_credential: self.is_credential,
        }
    }
}

#[derive(Serialize)]
struct ZdLaunchRequest<'a> {
    project_key: &'a str,
    workflow_key: &'a str,
    parameters: Vec<ZdParamValue<'a>>,
}

#[derive(Serialize)]
struct ZdParamValue<'a> {
    name: &'a str,
    value: &'a str,
}

impl<'a> ZdLaunchRequest<'a> {
    fn new(scope: &'a ListScope, params: &'a [WorkflowParam]) -> Self {
        Self {
            project_key: &scope.project_key,
            workflow_key: &scope.workflow_key,
            parameters: params
                .iter()
                .map(|p| ZdParamValue {
                    name: &p.name,
                    value: &p.value,
                })
                .collect(),
        }
    }
}

/// Zadig reports times as unix seconds, with 0 meaning "not yet".
fn parse_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    Utc.timestamp_opt(secs, 0).single()
}
