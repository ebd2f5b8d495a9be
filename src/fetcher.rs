use async_trait::async_trait;

use crate::error::Result;

/// Identifies which list a fetcher should read: a workflow inside a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListScope {
    pub project_key: String,
    pub workflow_key: String,
}

impl ListScope {
    pub fn new(project_key: impl Into<String>, workflow_key: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            workflow_key: workflow_key.into(),
        }
    }

    /// Both keys must be present before anything is fetched.
    pub fn is_complete(&self) -> bool {
        !self.project_key.trim().is_empty() && !self.workflow_key.trim().is_empty()
    }
}

impl std::fmt::Display for ListScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project_key, self.workflow_key)
    }
}

/// One page of a remote list plus the total number of items on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Source of paged list data. Implementations must not retry internally.
#[async_trait]
pub trait ListFetcher<T>: Send + Sync {
    async fn fetch(&self, scope: &ListScope, page_num: u32, page_size: u32)
        -> Result<PagedResult<T>>;
}
