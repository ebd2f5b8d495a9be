use crate::error::ZtaskError;
use crate::types::{TaskDetail, WorkflowSpec};

#[derive(Debug, Clone)]
pub enum Action {
    Quit,
    Back,
    ScrollUp,
    ScrollDown,
    GoToTop,
    GoToBottom,
    Select,

    // Task list
    Mount,
    Refresh,
    NextPage,
    PrevPage,
    ToggleAutoRefresh,
    TasksLoaded(u64),
    TaskDetailLoaded(Box<TaskDetail>),

    // Terminal focus stands in for widget visibility
    FocusChanged(bool),

    // Launch form
    ShowLaunchForm,
    LaunchFormLoaded(Box<WorkflowSpec>),
    FormUp,
    FormDown,
    FormInput(char),
    FormBackspace,
    FormCycle(bool),
    SubmitLaunch,

    // Clone
    ShowCloneConfirm,
    ConfirmYes,
    ConfirmNo,

    OpenInBrowser,
    YankUrl,

    Notice(String),
    Error(String),
    None,
}

impl Action {
    /// Actions that come straight from a keypress; these dismiss a shown
    /// error or notice.
    pub fn is_user_input(&self) -> bool {
        !matches!(
            self,
            Action::Mount
                | Action::TasksLoaded(_)
                | Action::TaskDetailLoaded(_)
                | Action::LaunchFormLoaded(_)
                | Action::FocusChanged(_)
                | Action::Notice(_)
                | Action::Error(_)
                | Action::None
        )
    }
}

impl From<ZtaskError> for Action {
    fn from(err: ZtaskError) -> Self {
        Action::Error(err.to_string())
    }
}
