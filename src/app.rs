use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use tokio::sync::mpsc;
use tracing::debug;

use crate::action::Action;
use crate::config::DashboardConfig;
use crate::event::Event;
use crate::fetcher::{ListFetcher, ListScope};
use crate::notify::{ChannelNotifier, Notifier};
use crate::poller::{ListSnapshot, PollerOptions, PollingListController};
use crate::types::{ParamKind, TaskDetail, WorkflowParam, WorkflowSpec, WorkflowTask};
use crate::zadig::Zadig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    TaskList,
    TaskDetail,
}

/// Launch form state: the workflow's parameters, edited in place.
#[derive(Debug, Clone)]
pub struct LaunchForm {
    pub spec: WorkflowSpec,
    pub selected: usize,
}

impl LaunchForm {
    pub fn new(spec: WorkflowSpec) -> Self {
        Self { spec, selected: 0 }
    }

    fn selected_mut(&mut self) -> Option<&mut WorkflowParam> {
        self.spec.params.get_mut(self.selected)
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.spec.params.len() {
            self.selected += 1;
        }
    }

    /// Space toggles bools and steps choices; other kinds take free text.
    pub fn input(&mut self, c: char) {
        let Some(param) = self.selected_mut() else {
            return;
        };
        match param.kind {
            ParamKind::Bool if c == ' ' => param.toggle_bool(),
            ParamKind::Choice if c == ' ' => param.cycle_choice(true),
            ParamKind::Bool | ParamKind::Choice => {}
            ParamKind::String | ParamKind::Text | ParamKind::Other => param.value.push(c),
        }
    }

    pub fn backspace(&mut self) {
        if let Some(param) = self.selected_mut() {
            if !matches!(param.kind, ParamKind::Bool | ParamKind::Choice) {
                param.value.pop();
            }
        }
    }

    pub fn cycle(&mut self, forward: bool) {
        if let Some(param) = self.selected_mut() {
            param.cycle_choice(forward);
        }
    }
}

#[derive(Debug, Clone)]
pub enum Popup {
    Launch(LaunchForm),
    ConfirmClone { task_id: u64 },
}

pub struct App {
    pub screen: Screen,
    pub popup: Option<Popup>,
    pub scope: ListScope,
    pub tasks: PollingListController<WorkflowTask>,
    pub task_index: usize,
    pub current_detail: Option<TaskDetail>,
    pub scroll_offset: usize,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub should_quit: bool,
    zadig: Arc<Zadig>,
    notifier: Arc<ChannelNotifier>,
    action_tx: mpsc::UnboundedSender<Action>,
}

impl App {
    pub fn new(
        zadig: Arc<Zadig>,
        scope: ListScope,
        dashboard: &DashboardConfig,
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        let notifier = Arc::new(ChannelNotifier::new(action_tx.clone()));
        let loaded_tx = action_tx.clone();
        let options: PollerOptions<WorkflowTask> = PollerOptions {
            auto_load: dashboard.auto_load,
            auto_refresh: dashboard.auto_refresh,
            refresh_interval: dashboard.refresh_interval(),
            page_size: dashboard.page_size,
            on_items_loaded: Some(Box::new(move |_: &[WorkflowTask], total: u64| {
                loaded_tx.send(Action::TasksLoaded(total)).ok();
            })),
        };
        let tasks = PollingListController::new(
            scope.clone(),
            Arc::clone(&zadig) as Arc<dyn ListFetcher<WorkflowTask>>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            options,
        );

        Self {
            screen: Screen::TaskList,
            popup: None,
            scope,
            tasks,
            task_index: 0,
            current_detail: None,
            scroll_offset: 0,
            error: None,
            notice: None,
            should_quit: false,
            zadig,
            notifier,
            action_tx,
        }
    }

    pub fn snapshot(&self) -> ListSnapshot<WorkflowTask> {
        self.tasks.snapshot()
    }

    pub fn handle_event(&self, event: Event) -> Action {
        match event {
            Event::Init => Action::Mount,
            Event::Key(key) => self.handle_key(key),
            Event::Focus(visible) => Action::FocusChanged(visible),
            Event::Tick | Event::Render => Action::None,
        }
    }

    fn handle_key(&self, key: KeyEvent) -> Action {
        if let Some(popup) = &self.popup {
            return Self::handle_popup_key(popup, key);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => match self.screen {
                Screen::TaskList => Action::Quit,
                Screen::TaskDetail => Action::Back,
            },
            KeyCode::Char('j') | KeyCode::Down => Action::ScrollDown,
            KeyCode::Char('k') | KeyCode::Up => Action::ScrollUp,
            KeyCode::Char('g') | KeyCode::Home => Action::GoToTop,
            KeyCode::Char('G') | KeyCode::End => Action::GoToBottom,
            KeyCode::Enter => Action::Select,
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Char(']') | KeyCode::PageDown => Action::NextPage,
            KeyCode::Char('[') | KeyCode::PageUp => Action::PrevPage,
            KeyCode::Char('a') => Action::ToggleAutoRefresh,
            KeyCode::Char('n') => Action::ShowLaunchForm,
            KeyCode::Char('c') => Action::ShowCloneConfirm,
            KeyCode::Char('o') => Action::OpenInBrowser,
            KeyCode::Char('y') => Action::YankUrl,
            _ => Action::None,
        }
    }

    fn handle_popup_key(popup: &Popup, key: KeyEvent) -> Action {
        match popup {
            Popup::Launch(_) => match key.code {
                KeyCode::Esc => Action::ConfirmNo,
                KeyCode::Enter => Action::SubmitLaunch,
                KeyCode::Up | KeyCode::BackTab => Action::FormUp,
                KeyCode::Down | KeyCode::Tab => Action::FormDown,
                KeyCode::Left => Action::FormCycle(false),
                KeyCode::Right => Action::FormCycle(true),
                KeyCode::Backspace => Action::FormBackspace,
                KeyCode::Char(c) => Action::FormInput(c),
                _ => Action::None,
            },
            Popup::ConfirmClone { .. } => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Action::ConfirmYes,
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Action::ConfirmNo,
                _ => Action::None,
            },
        }
    }

    /// The task under the cursor, or the one on the detail screen.
    pub fn selected_task(&self) -> Option<WorkflowTask> {
        match self.screen {
            Screen::TaskDetail => self.current_detail.as_ref().map(|d| d.task.clone()),
            Screen::TaskList => self.snapshot().page.items.get(self.task_index).cloned(),
        }
    }

    fn selected_url(&self) -> String {
        let task_id = self.selected_task().map(|t| t.task_id);
        self.zadig
            .web_url(&self.scope.project_key, &self.scope.workflow_key, task_id)
    }

    /// List navigation counts as reading: hold off polling until the user
    /// has been idle for a moment.
    fn note_interaction(&self) {
        self.tasks.interaction_began();
        self.tasks.interaction_ended();
    }

    fn clamp_index(&mut self) {
        let len = self.snapshot().page.items.len();
        self.task_index = self.task_index.min(len.saturating_sub(1));
    }

    pub fn update(&mut self, action: Action) {
        if action.is_user_input() {
            self.error = None;
            self.notice = None;
        }

        match action {
            Action::Quit => {
                self.tasks.destroy();
                self.should_quit = true;
            }
            Action::Back => match self.screen {
                Screen::TaskList => {
                    self.tasks.destroy();
                    self.should_quit = true;
                }
                Screen::TaskDetail => {
                    self.screen = Screen::TaskList;
                    self.current_detail = None;
                    self.scroll_offset = 0;
                }
            },
            Action::ScrollUp => match self.screen {
                Screen::TaskList => {
                    self.task_index = self.task_index.saturating_sub(1);
                    self.note_interaction();
                }
                Screen::TaskDetail => {
                    self.scroll_offset = self.scroll_offset.saturating_sub(1);
                }
            },
            Action::ScrollDown => match self.screen {
                Screen::TaskList => {
                    let len = self.snapshot().page.items.len();
                    if len > 0 && self.task_index < len - 1 {
                        self.task_index += 1;
                    }
                    self.note_interaction();
                }
                Screen::TaskDetail => {
                    self.scroll_offset += 1;
                }
            },
            Action::GoToTop => match self.screen {
                Screen::TaskList => {
                    self.task_index = 0;
                    self.note_interaction();
                }
                Screen::TaskDetail => self.scroll_offset = 0,
            },
            Action::GoToBottom => {
                if self.screen == Screen::TaskList {
                    self.task_index = self.snapshot().page.items.len().saturating_sub(1);
                    self.note_interaction();
                }
            }
            Action::Select => {
                if self.screen == Screen::TaskList {
                    if let Some(task) = self.selected_task() {
                        self.spawn_load_detail(task.task_id);
                    }
                }
            }

            Action::Mount => self.spawn_mount(),
            Action::Refresh => self.spawn_refresh(),
            Action::NextPage => {
                self.task_index = 0;
                let tasks = self.tasks.clone();
                tokio::spawn(async move { tasks.next_page().await });
            }
            Action::PrevPage => {
                self.task_index = 0;
                let tasks = self.tasks.clone();
                tokio::spawn(async move { tasks.prev_page().await });
            }
            Action::ToggleAutoRefresh => {
                let enabled = !self.snapshot().auto_refresh;
                self.tasks.set_enabled(enabled);
                self.notice = Some(if enabled {
                    "Auto-refresh on".to_string()
                } else {
                    "Auto-refresh off".to_string()
                });
            }
            Action::TasksLoaded(total) => {
                debug!(total, "tasks loaded");
                self.clamp_index();
            }
            Action::TaskDetailLoaded(detail) => {
                self.current_detail = Some(*detail);
                self.scroll_offset = 0;
                self.screen = Screen::TaskDetail;
            }

            Action::FocusChanged(visible) => {
                let tasks = self.tasks.clone();
                tokio::spawn(async move { tasks.set_visible(visible).await });
            }

            Action::ShowLaunchForm => self.spawn_load_launch_form(),
            Action::LaunchFormLoaded(spec) => {
                if self.popup.is_none() {
                    self.tasks.interaction_began();
                    self.popup = Some(Popup::Launch(LaunchForm::new(*spec)));
                }
            }
            Action::FormUp => {
                if let Some(Popup::Launch(form)) = &mut self.popup {
                    form.move_up();
                }
            }
            Action::FormDown => {
                if let Some(Popup::Launch(form)) = &mut self.popup {
                    form.move_down();
                }
            }
            Action::FormInput(c) => {
                if let Some(Popup::Launch(form)) = &mut self.popup {
                    form.input(c);
                }
            }
            Action::FormBackspace => {
                if let Some(Popup::Launch(form)) = &mut self.popup {
                    form.backspace();
                }
            }
            Action::FormCycle(forward) => {
                if let Some(Popup::Launch(form)) = &mut self.popup {
                    form.cycle(forward);
                }
            }
            Action::SubmitLaunch => match self.popup.take() {
                Some(Popup::Launch(form)) => {
                    self.tasks.interaction_ended();
                    self.spawn_launch(form.spec.params);
                }
                other => self.popup = other,
            },

            Action::ShowCloneConfirm => {
                if let Some(task) = self.selected_task() {
                    self.tasks.interaction_began();
                    self.popup = Some(Popup::ConfirmClone {
                        task_id: task.task_id,
                    });
                }
            }
            Action::ConfirmYes => match self.popup.take() {
                Some(Popup::ConfirmClone { task_id }) => {
                    self.tasks.interaction_ended();
                    self.spawn_clone(task_id);
                }
                other => self.popup = other,
            },
            Action::ConfirmNo => {
                if self.popup.take().is_some() {
                    self.tasks.interaction_ended();
                }
            }

            Action::OpenInBrowser => {
                let url = self.selected_url();
                if let Err(e) = open::that(&url) {
                    self.error = Some(format!("Failed to open browser: {}", e));
                }
            }
            Action::YankUrl => {
                let url = self.selected_url();
                match arboard::Clipboard::new().and_then(|mut c| c.set_text(url.clone())) {
                    Ok(()) => self.notice = Some(format!("Copied {}", url)),
                    Err(e) => self.error = Some(format!("Clipboard error: {}", e)),
                }
            }

            Action::Notice(msg) => {
                self.notice = Some(msg);
            }
            Action::Error(msg) => {
                self.error = Some(msg);
            }
            Action::None => {}
        }
    }

    fn spawn_mount(&self) {
        let tasks = self.tasks.clone();
        tokio::spawn(async move { tasks.mount().await });
    }

    fn spawn_refresh(&self) {
        let tasks = self.tasks.clone();
        tokio::spawn(async move { tasks.refresh().await });
    }

    fn spawn_load_detail(&self, task_id: u64) {
        let tx = self.action_tx.clone();
        let zadig = Arc::clone(&self.zadig);
        let workflow_key = self.scope.workflow_key.clone();
        tokio::spawn(async move {
            match zadig.get_task(&workflow_key, task_id).await {
                Ok(detail) => {
                    tx.send(Action::TaskDetailLoaded(Box::new(detail))).ok();
                }
                Err(e) => {
                    tx.send(Action::from(e)).ok();
                }
            }
        });
    }

    fn spawn_load_launch_form(&self) {
        let tx = self.action_tx.clone();
        let zadig = Arc::clone(&self.zadig);
        let scope = self.scope.clone();
        tokio::spawn(async move {
            match zadig.get_workflow(&scope).await {
                Ok(spec) => {
                    tx.send(Action::LaunchFormLoaded(Box::new(spec))).ok();
                }
                Err(e) => {
                    tx.send(Action::from(e)).ok();
                }
            }
        });
    }

    fn spawn_launch(&self, params: Vec<WorkflowParam>) {
        let zadig = Arc::clone(&self.zadig);
        let notifier = Arc::clone(&self.notifier);
        let tasks = self.tasks.clone();
        let scope = self.scope.clone();
        tokio::spawn(async move {
            match zadig.launch(&scope, &params).await {
                Ok(launched) => {
                    notifier.notify_success(&format!("Task #{} launched", launched.task_id));
                    tasks.refresh().await;
                }
                Err(e) => notifier.notify_error(&format!("Launch failed: {}", e)),
            }
        });
    }

    fn spawn_clone(&self, task_id: u64) {
        let zadig = Arc::clone(&self.zadig);
        let notifier = Arc::clone(&self.notifier);
        let tasks = self.tasks.clone();
        let scope = self.scope.clone();
        tokio::spawn(async move {
            match zadig.clone_task(&scope, task_id).await {
                Ok(launched) => {
                    notifier.notify_success(&format!(
                        "Task #{} cloned as #{}",
                        task_id, launched.task_id
                    ));
                    tasks.refresh().await;
                }
                Err(e) => notifier.notify_error(&format!("Clone failed: {}", e)),
            }
        });
    }
}
