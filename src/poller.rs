use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::fetcher::{ListFetcher, ListScope};
use crate::notify::Notifier;

/// Minimum spacing between two background loads.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(1000);

/// How long auto-refresh stays suspended after a forced refresh settles.
pub const FORCE_REFRESH_GRACE: Duration = Duration::from_millis(3000);

/// Delay before an ended interaction lets auto-refresh resume.
pub const INTERACTION_RELEASE_DELAY: Duration = Duration::from_millis(1000);

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(3000);

pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub type OnItemsLoaded<T> = Box<dyn Fn(&[T], u64) + Send + Sync>;

/// Initialization-time options for a controller.
pub struct PollerOptions<T> {
    /// Perform a foreground load when the controller is mounted.
    pub auto_load: bool,
    /// Run the self-renewing background refresh chain.
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    pub page_size: u32,
    pub on_items_loaded: Option<OnItemsLoaded<T>>,
}

impl<T> Default for PollerOptions<T> {
    fn default() -> Self {
        Self {
            auto_load: true,
            auto_refresh: true,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
            on_items_loaded: None,
        }
    }
}

/// The page currently on display. Replaced wholesale by every applied fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page_num: u32,
    pub page_size: u32,
}

impl<T> ListPage<T> {
    fn empty(page_num: u32, page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page_num,
            page_size,
        }
    }

    pub fn page_count(&self) -> u32 {
        if self.total == 0 {
            return 1;
        }
        let size = u64::from(self.page_size.max(1));
        u32::try_from(self.total.div_ceil(size)).unwrap_or(u32::MAX)
    }

    pub fn has_next(&self) -> bool {
        self.page_num < self.page_count()
    }

    pub fn has_prev(&self) -> bool {
        self.page_num > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    /// Explicit user action or initial mount; shown with a spinner.
    Foreground,
    /// Timer or visibility driven; silent.
    Background,
}

/// Which loading indicator the view should show. Foreground wins when both
/// kinds of fetch overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingState {
    #[default]
    Idle,
    Foreground,
    Background,
}

/// Whether the refresh chain may be armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Active,
    Suspended,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Idle,
    Scheduled,
    Fetching,
}

#[derive(Debug, Clone, Copy)]
struct Gate {
    enabled: bool,
    visible: bool,
    user_interacting: bool,
    destroyed: bool,
}

impl Gate {
    fn phase(&self) -> Phase {
        if self.destroyed {
            Phase::Destroyed
        } else if self.enabled && self.visible && !self.user_interacting {
            Phase::Active
        } else {
            Phase::Suspended
        }
    }
}

/// Render-time copy of the controller state.
#[derive(Debug, Clone)]
pub struct ListSnapshot<T> {
    pub page: ListPage<T>,
    pub loading: LoadingState,
    pub phase: Phase,
    pub schedule: ScheduleState,
    pub auto_refresh: bool,
}

struct Inner<T> {
    scope: ListScope,
    page: ListPage<T>,
    gate: Gate,
    interval: Duration,
    last_fetch_at: Option<Instant>,
    foreground_in_flight: usize,
    background_in_flight: usize,
    // Monotonic request numbers; responses older than the last applied one are dropped.
    next_request: u64,
    applied_request: u64,
    timer: Option<JoinHandle<()>>,
    timer_generation: u64,
    release: Option<JoinHandle<()>>,
    release_generation: u64,
    // Deadline of the latest pending release; survives a cancel so a short
    // release never undercuts a longer one already promised.
    release_at: Option<Instant>,
}

impl<T> Inner<T> {
    fn loading(&self) -> LoadingState {
        if self.foreground_in_flight > 0 {
            LoadingState::Foreground
        } else if self.background_in_flight > 0 {
            LoadingState::Background
        } else {
            LoadingState::Idle
        }
    }

    fn in_flight(&self) -> bool {
        self.foreground_in_flight + self.background_in_flight > 0
    }

    fn schedule(&self) -> ScheduleState {
        if self.timer.is_some() {
            ScheduleState::Scheduled
        } else if self.background_in_flight > 0 {
            ScheduleState::Fetching
        } else {
            ScheduleState::Idle
        }
    }

    fn begin(&mut self, kind: LoadKind) {
        match kind {
            LoadKind::Foreground => self.foreground_in_flight += 1,
            LoadKind::Background => self.background_in_flight += 1,
        }
    }

    fn finish(&mut self, kind: LoadKind) {
        match kind {
            LoadKind::Foreground => {
                self.foreground_in_flight = self.foreground_in_flight.saturating_sub(1)
            }
            LoadKind::Background => {
                self.background_in_flight = self.background_in_flight.saturating_sub(1)
            }
        }
    }

    fn cancel_timer(&mut self) {
        self.timer_generation += 1;
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    fn cancel_release(&mut self) {
        self.release_generation += 1;
        if let Some(handle) = self.release.take() {
            handle.abort();
        }
    }
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    fetcher: Arc<dyn ListFetcher<T>>,
    notifier: Arc<dyn Notifier>,
    on_items_loaded: Option<OnItemsLoaded<T>>,
    auto_load: bool,
}

/// Keeps an eventually-fresh page of items from a [`ListFetcher`].
///
/// Background refreshes run as a self-renewing chain: each tick is armed only
/// after the previous fetch settled, so fetches never overlap. The chain is
/// armed only while the controller is enabled, visible, and the user is not
/// interacting with the list. All state lives behind one mutex that is never
/// held across an await; after the fetch resumes, liveness is re-checked
/// before anything is mutated.
///
/// The handle is cheap to clone. Timers hold clones too, so call
/// [`destroy`](Self::destroy) when the owning view goes away.
pub struct PollingListController<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for PollingListController<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> PollingListController<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(
        scope: ListScope,
        fetcher: Arc<dyn ListFetcher<T>>,
        notifier: Arc<dyn Notifier>,
        options: PollerOptions<T>,
    ) -> Self {
        let interval = if options.refresh_interval.is_zero() {
            warn!("refresh interval must be positive, using default");
            DEFAULT_REFRESH_INTERVAL
        } else {
            options.refresh_interval
        };

        let inner = Inner {
            scope,
            page: ListPage::empty(1, options.page_size.max(1)),
            gate: Gate {
                enabled: options.auto_refresh,
                visible: true,
                user_interacting: false,
                destroyed: false,
            },
            interval,
            last_fetch_at: None,
            foreground_in_flight: 0,
            background_in_flight: 0,
            next_request: 0,
            applied_request: 0,
            timer: None,
            timer_generation: 0,
            release: None,
            release_generation: 0,
            release_at: None,
        };

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                fetcher,
                notifier,
                on_items_loaded: options.on_items_loaded,
                auto_load: options.auto_load,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs the on-mount effects: the initial foreground load (if enabled),
    /// then the first link of the refresh chain.
    pub async fn mount(&self) {
        if self.shared.auto_load {
            self.load(None, None, LoadKind::Foreground).await;
        }
        self.start_auto_refresh();
    }

    pub fn snapshot(&self) -> ListSnapshot<T> {
        let inner = self.lock();
        ListSnapshot {
            page: inner.page.clone(),
            loading: inner.loading(),
            phase: inner.gate.phase(),
            schedule: inner.schedule(),
            auto_refresh: inner.gate.enabled,
        }
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.lock().gate.phase()
    }

    #[cfg(test)]
    pub fn schedule_state(&self) -> ScheduleState {
        self.lock().schedule()
    }

    #[cfg(test)]
    pub fn loading(&self) -> LoadingState {
        self.lock().loading()
    }

    /// Fetches one page and replaces the current one.
    ///
    /// `None` keeps the current page number / size. Background loads are
    /// skipped inside the debounce window or while another fetch is in
    /// flight; foreground loads always proceed. Errors never escape: a failed
    /// foreground load notifies the user and empties the list, a failed
    /// background load keeps what is on screen.
    pub async fn load(&self, page_num: Option<u32>, page_size: Option<u32>, kind: LoadKind) {
        let (scope, page_num, page_size, request) = {
            let mut inner = self.lock();
            if inner.gate.destroyed {
                debug!("load skipped: controller destroyed");
                return;
            }
            if !inner.scope.is_complete() {
                debug!(scope = %inner.scope, "load skipped: incomplete scope");
                return;
            }

            let now = Instant::now();
            if kind == LoadKind::Background {
                if let Some(last) = inner.last_fetch_at {
                    if now.duration_since(last) < DEBOUNCE_WINDOW {
                        debug!("background load debounced");
                        return;
                    }
                }
                if inner.in_flight() {
                    debug!("background load skipped: fetch in flight");
                    return;
                }
            }

            inner.last_fetch_at = Some(now);
            inner.next_request += 1;
            inner.begin(kind);
            (
                inner.scope.clone(),
                page_num.unwrap_or(inner.page.page_num).max(1),
                page_size.unwrap_or(inner.page.page_size).max(1),
                inner.next_request,
            )
        };

        let result = self
            .shared
            .fetcher
            .fetch(&scope, page_num, page_size)
            .await;

        let mut loaded = None;
        let mut failure = None;
        {
            let mut inner = self.lock();
            if inner.gate.destroyed {
                debug!(request, "discarding response: controller destroyed");
                return;
            }
            inner.finish(kind);
            let stale = request < inner.applied_request;

            match result {
                Ok(_) if stale => {
                    debug!(request, applied = inner.applied_request, "discarding stale response");
                }
                Ok(page) => {
                    inner.applied_request = request;
                    inner.page = ListPage {
                        items: page.items,
                        total: page.total,
                        page_num,
                        page_size,
                    };
                    if self.shared.on_items_loaded.is_some() {
                        loaded = Some((inner.page.items.clone(), inner.page.total));
                    }
                }
                Err(err) => match kind {
                    LoadKind::Foreground => {
                        warn!(scope = %scope, error = %err, "failed to load list");
                        if !stale {
                            inner.applied_request = request;
                            inner.page = ListPage::empty(page_num, page_size);
                        }
                        failure = Some(err.to_string());
                    }
                    LoadKind::Background => {
                        debug!(scope = %scope, error = %err, "background refresh failed");
                    }
                },
            }
        }

        if let (Some(callback), Some((items, total))) = (&self.shared.on_items_loaded, loaded) {
            callback(&items, total);
        }
        if let Some(message) = failure {
            self.shared.notifier.notify_error(&message);
        }
    }

    /// Foreground load of an explicit page.
    pub async fn load_tasks(&self, page_num: Option<u32>, page_size: Option<u32>) {
        self.load(page_num, page_size, LoadKind::Foreground).await;
    }

    pub async fn next_page(&self) {
        let next = {
            let inner = self.lock();
            inner.page.has_next().then_some(inner.page.page_num + 1)
        };
        if let Some(page_num) = next {
            self.load_tasks(Some(page_num), None).await;
        }
    }

    pub async fn prev_page(&self) {
        let prev = {
            let inner = self.lock();
            inner.page.has_prev().then_some(inner.page.page_num - 1)
        };
        if let Some(page_num) = prev {
            self.load_tasks(Some(page_num), None).await;
        }
    }

    /// Arms the next link of the refresh chain, replacing any pending one.
    pub fn start_auto_refresh(&self) {
        let mut inner = self.lock();
        inner.cancel_timer();
        if inner.gate.phase() != Phase::Active {
            return;
        }

        let generation = inner.timer_generation;
        let interval = inner.interval;
        let this = self.clone();
        inner.timer = Some(tokio::spawn(async move {
            this.tick(generation, interval).await;
        }));
    }

    async fn tick(self, generation: u64, interval: Duration) {
        tokio::time::sleep(interval).await;
        {
            let mut inner = self.lock();
            if inner.timer_generation != generation {
                return;
            }
            // The handle refers to this task; drop it without aborting.
            inner.timer = None;
            if inner.gate.phase() != Phase::Active {
                return;
            }
        }

        self.load(None, None, LoadKind::Background).await;

        let still_armed = self.lock().timer_generation == generation;
        if still_armed {
            self.start_auto_refresh();
        }
    }

    /// Cancels the pending tick, if any. A tick already fetching completes but
    /// does not re-arm.
    pub fn stop_auto_refresh(&self) {
        self.lock().cancel_timer();
    }

    /// Explicit refresh: suspends auto-refresh, loads in the foreground, and
    /// resumes the chain after [`FORCE_REFRESH_GRACE`].
    pub async fn force_refresh(&self) {
        {
            let mut inner = self.lock();
            if inner.gate.destroyed {
                return;
            }
            inner.gate.user_interacting = true;
            inner.cancel_timer();
            inner.cancel_release();
        }

        self.load(None, None, LoadKind::Foreground).await;
        self.schedule_release(FORCE_REFRESH_GRACE);
    }

    pub async fn refresh(&self) {
        self.force_refresh().await;
    }

    /// Visibility changes. Becoming visible triggers one immediate background
    /// load before the chain resumes; becoming hidden stops the chain.
    pub async fn set_visible(&self, visible: bool) {
        let was_visible = {
            let mut inner = self.lock();
            if inner.gate.destroyed {
                return;
            }
            let was_visible = inner.gate.visible;
            inner.gate.visible = visible;
            was_visible
        };

        if !visible {
            self.stop_auto_refresh();
        } else if !was_visible {
            self.load(None, None, LoadKind::Background).await;
            self.start_auto_refresh();
        }
    }

    pub fn interaction_began(&self) {
        let mut inner = self.lock();
        if inner.gate.destroyed {
            return;
        }
        inner.cancel_release();
        inner.gate.user_interacting = true;
        inner.cancel_timer();
    }

    /// Releases the interaction after [`INTERACTION_RELEASE_DELAY`] so a brief
    /// pause does not resume polling mid-read. A longer release already
    /// pending (the force-refresh grace) keeps its deadline.
    pub fn interaction_ended(&self) {
        if !self.lock().gate.user_interacting {
            return;
        }
        self.schedule_release(INTERACTION_RELEASE_DELAY);
    }

    fn schedule_release(&self, delay: Duration) {
        let mut inner = self.lock();
        if inner.gate.destroyed {
            return;
        }
        inner.cancel_release();

        let deadline = match inner.release_at {
            Some(held) => held.max(Instant::now() + delay),
            None => Instant::now() + delay,
        };
        inner.release_at = Some(deadline);

        let generation = inner.release_generation;
        let this = self.clone();
        inner.release = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            {
                let mut inner = this.lock();
                if inner.gate.destroyed || inner.release_generation != generation {
                    return;
                }
                inner.release = None;
                inner.release_at = None;
                inner.gate.user_interacting = false;
            }
            this.start_auto_refresh();
        }));
    }

    /// Turns the auto-refresh option on or off at runtime.
    pub fn set_enabled(&self, enabled: bool) {
        {
            let mut inner = self.lock();
            if inner.gate.destroyed {
                return;
            }
            inner.gate.enabled = enabled;
        }
        if enabled {
            self.start_auto_refresh();
        } else {
            self.stop_auto_refresh();
        }
    }

    /// Terminal state: cancels timers and makes every later call a no-op.
    /// Fetches still in flight finish but their results are dropped.
    pub fn destroy(&self) {
        let mut inner = self.lock();
        inner.gate.destroyed = true;
        inner.cancel_timer();
        inner.cancel_release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::error::{Result, ZtaskError};
    use crate::fetcher::PagedResult;

    enum Step {
        Ok(Vec<&'static str>, u64, Duration),
        Err(Duration),
    }

    fn ok(items: &[&'static str], total: u64) -> Step {
        Step::Ok(items.to_vec(), total, Duration::ZERO)
    }

    fn ok_after(items: &[&'static str], total: u64, ms: u64) -> Step {
        Step::Ok(items.to_vec(), total, Duration::from_millis(ms))
    }

    /// Plays back scripted responses; the last step repeats once the script
    /// runs out.
    struct ScriptedFetcher {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicUsize,
        pages: Mutex<Vec<(u32, u32)>>,
    }

    impl ScriptedFetcher {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
                pages: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ListFetcher<String> for ScriptedFetcher {
        async fn fetch(
            &self,
            _scope: &ListScope,
            page_num: u32,
            page_size: u32,
        ) -> Result<PagedResult<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.lock().unwrap().push((page_num, page_size));

            let (outcome, delay) = {
                let mut steps = self.steps.lock().unwrap();
                let step = if steps.len() > 1 {
                    steps.pop_front().unwrap()
                } else {
                    match steps.front() {
                        Some(Step::Ok(items, total, delay)) => {
                            Step::Ok(items.clone(), *total, *delay)
                        }
                        Some(Step::Err(delay)) => Step::Err(*delay),
                        None => Step::Ok(Vec::new(), 0, Duration::ZERO),
                    }
                };
                match step {
                    Step::Ok(items, total, delay) => (
                        Ok(PagedResult {
                            items: items.into_iter().map(String::from).collect(),
                            total,
                        }),
                        delay,
                    ),
                    Step::Err(delay) => (Err(ZtaskError::Api("server unavailable".into())), delay),
                }
            };

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            outcome
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        errors: Mutex<Vec<String>>,
        successes: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }

        fn notify_success(&self, message: &str) {
            self.successes.lock().unwrap().push(message.to_string());
        }
    }

    struct Harness {
        controller: PollingListController<String>,
        fetcher: Arc<ScriptedFetcher>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness(steps: Vec<Step>, options: PollerOptions<String>) -> Harness {
        harness_with_scope(ListScope::new("proj", "build"), steps, options)
    }

    fn harness_with_scope(
        scope: ListScope,
        steps: Vec<Step>,
        options: PollerOptions<String>,
    ) -> Harness {
        let fetcher = ScriptedFetcher::new(steps);
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = PollingListController::new(
            scope,
            fetcher.clone() as Arc<dyn ListFetcher<String>>,
            notifier.clone() as Arc<dyn Notifier>,
            options,
        );
        Harness {
            controller,
            fetcher,
            notifier,
        }
    }

    fn manual() -> PollerOptions<String> {
        PollerOptions {
            auto_load: false,
            auto_refresh: false,
            ..PollerOptions::default()
        }
    }

    fn polling() -> PollerOptions<String> {
        PollerOptions {
            auto_load: false,
            ..PollerOptions::default()
        }
    }

    fn items(controller: &PollingListController<String>) -> Vec<String> {
        controller.snapshot().page.items
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[tokio::test(start_paused = true)]
    async fn background_loads_are_debounced() {
        let h = harness(vec![ok(&["a"], 1)], manual());

        h.controller.load(None, None, LoadKind::Background).await;
        tokio::time::advance(ms(400)).await;
        h.controller.load(None, None, LoadKind::Background).await;
        tokio::time::advance(ms(400)).await;
        h.controller.load(None, None, LoadKind::Background).await;
        assert_eq!(h.fetcher.calls(), 1);

        tokio::time::advance(ms(300)).await;
        h.controller.load(None, None, LoadKind::Background).await;
        assert_eq!(h.fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn foreground_load_ignores_debounce_and_in_flight_background() {
        let h = harness(vec![ok_after(&["a"], 1, 500)], manual());

        let background = h.controller.clone();
        let task = tokio::spawn(async move {
            background.load(None, None, LoadKind::Background).await;
        });
        tokio::task::yield_now().await;
        assert_eq!(h.controller.loading(), LoadingState::Background);

        h.controller.load(None, None, LoadKind::Foreground).await;
        task.await.unwrap();

        assert_eq!(h.fetcher.calls(), 2);
        assert_eq!(h.controller.loading(), LoadingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn background_load_skipped_while_fetch_in_flight() {
        let h = harness(vec![ok_after(&["a"], 1, 2000)], manual());

        let background = h.controller.clone();
        let task = tokio::spawn(async move {
            background.load(None, None, LoadKind::Background).await;
        });
        tokio::task::yield_now().await;

        tokio::time::sleep(ms(1500)).await;
        h.controller.load(None, None, LoadKind::Background).await;
        assert_eq!(h.fetcher.calls(), 1);

        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn loading_flag_prefers_foreground() {
        let h = harness(vec![ok_after(&["a"], 1, 1000)], manual());

        let background = h.controller.clone();
        let bg = tokio::spawn(async move {
            background.load(None, None, LoadKind::Background).await;
        });
        tokio::task::yield_now().await;
        let foreground = h.controller.clone();
        let fg = tokio::spawn(async move {
            foreground.load(None, None, LoadKind::Foreground).await;
        });
        tokio::task::yield_now().await;

        assert_eq!(h.controller.loading(), LoadingState::Foreground);
        bg.await.unwrap();
        fg.await.unwrap();
        assert_eq!(h.controller.loading(), LoadingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_foreground_load_clears_list_and_notifies() {
        let h = harness(vec![ok(&["a", "b"], 2), Step::Err(Duration::ZERO)], manual());

        h.controller.load_tasks(None, None).await;
        assert_eq!(items(&h.controller), vec!["a", "b"]);

        h.controller.load_tasks(None, None).await;
        let snapshot = h.controller.snapshot();
        assert!(snapshot.page.items.is_empty());
        assert_eq!(snapshot.page.total, 0);
        assert_eq!(h.notifier.errors.lock().unwrap().len(), 1);
        assert!(h.notifier.errors.lock().unwrap()[0].contains("server unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_background_load_keeps_previous_page() {
        let h = harness(vec![ok(&["a", "b"], 2), Step::Err(Duration::ZERO)], manual());

        h.controller.load_tasks(None, None).await;
        let before = h.controller.snapshot().page;

        tokio::time::advance(ms(1100)).await;
        h.controller.load(None, None, LoadKind::Background).await;

        assert_eq!(h.fetcher.calls(), 2);
        assert_eq!(h.controller.snapshot().page, before);
        assert!(h.notifier.errors.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn incomplete_scope_is_a_silent_no_op() {
        let h = harness_with_scope(ListScope::new("proj", ""), vec![ok(&["a"], 1)], manual());

        h.controller.load_tasks(None, None).await;

        assert_eq!(h.fetcher.calls(), 0);
        assert!(h.notifier.errors.lock().unwrap().is_empty());
        assert_eq!(h.controller.loading(), LoadingState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_auto_refresh_leaves_no_dangling_timer() {
        let h = harness(vec![ok(&["a"], 1)], polling());

        h.controller.start_auto_refresh();
        assert_eq!(h.controller.schedule_state(), ScheduleState::Scheduled);
        h.controller.stop_auto_refresh();
        h.controller.stop_auto_refresh();
        assert_eq!(h.controller.schedule_state(), ScheduleState::Idle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_mid_fetch_does_not_rearm() {
        let h = harness(vec![ok_after(&["a"], 1, 500)], polling());

        h.controller.mount().await;
        tokio::time::sleep(ms(3100)).await;
        assert_eq!(h.controller.schedule_state(), ScheduleState::Fetching);

        h.controller.stop_auto_refresh();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(h.fetcher.calls(), 1);
        assert_eq!(items(&h.controller), vec!["a"]);
        assert_eq!(h.controller.schedule_state(), ScheduleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn destroyed_controller_discards_late_response() {
        let loaded = Arc::new(AtomicUsize::new(0));
        let counter = loaded.clone();
        let options: PollerOptions<String> = PollerOptions {
            on_items_loaded: Some(Box::new(move |_: &[String], _: u64| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            ..manual()
        };
        let h = harness(vec![ok_after(&["late"], 1, 1000)], options);

        let foreground = h.controller.clone();
        let task = tokio::spawn(async move { foreground.load_tasks(None, None).await });
        tokio::task::yield_now().await;

        h.controller.destroy();
        task.await.unwrap();

        assert_eq!(h.fetcher.calls(), 1);
        assert!(items(&h.controller).is_empty());
        assert_eq!(loaded.load(Ordering::SeqCst), 0);
        assert_eq!(h.controller.phase(), Phase::Destroyed);
    }

    #[tokio::test(start_paused = true)]
    async fn destroyed_controller_absorbs_calls() {
        let h = harness(vec![ok(&["a"], 1)], polling());

        h.controller.destroy();
        h.controller.load_tasks(None, None).await;
        h.controller.start_auto_refresh();
        h.controller.force_refresh().await;
        h.controller.set_visible(false).await;
        h.controller.set_visible(true).await;
        h.controller.interaction_began();
        h.controller.interaction_ended();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(h.fetcher.calls(), 0);
        assert_eq!(h.controller.phase(), Phase::Destroyed);
        assert_eq!(h.controller.schedule_state(), ScheduleState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_chain_renders_each_interval() {
        let renders = Arc::new(Mutex::new(Vec::new()));
        let log = renders.clone();
        let options: PollerOptions<String> = PollerOptions {
            auto_load: true,
            refresh_interval: ms(3000),
            on_items_loaded: Some(Box::new(move |items: &[String], total: u64| {
                log.lock().unwrap().push((items.len(), total, Instant::now()));
            })),
            ..PollerOptions::default()
        };
        let h = harness(vec![ok(&["A", "B"], 2), ok(&["A", "B", "C"], 3)], options);

        h.controller.mount().await;
        tokio::time::sleep(ms(3500)).await;

        let renders = renders.lock().unwrap().clone();
        assert_eq!(renders.len(), 2);
        assert_eq!((renders[0].0, renders[0].1), (2, 2));
        assert_eq!((renders[1].0, renders[1].1), (3, 3));
        assert!(renders[1].2.duration_since(renders[0].2) >= ms(3000));
        assert_eq!(h.controller.snapshot().page.total, 3);
        h.controller.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn failing_background_fetch_still_rearms_chain() {
        let h = harness(vec![Step::Err(Duration::ZERO)], polling());

        h.controller.mount().await;
        tokio::time::sleep(ms(3100)).await;
        assert_eq!(h.fetcher.calls(), 1);
        tokio::time::sleep(ms(3000)).await;
        assert_eq!(h.fetcher.calls(), 2);

        assert!(h.notifier.errors.lock().unwrap().is_empty());
        assert_eq!(h.controller.schedule_state(), ScheduleState::Scheduled);
        h.controller.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn force_refresh_wins_over_background_and_suspends_for_grace_period() {
        let h = harness(
            vec![ok_after(&["bg"], 1, 500), ok_after(&["fg", "fg2"], 2, 800)],
            polling(),
        );

        let background = h.controller.clone();
        let task = tokio::spawn(async move {
            background.load(None, None, LoadKind::Background).await;
        });
        tokio::task::yield_now().await;

        h.controller.force_refresh().await;
        task.await.unwrap();

        assert_eq!(h.fetcher.calls(), 2);
        assert_eq!(items(&h.controller), vec!["fg", "fg2"]);
        assert_eq!(h.controller.phase(), Phase::Suspended);

        tokio::time::sleep(ms(2999)).await;
        assert_eq!(h.controller.phase(), Phase::Suspended);
        assert_eq!(h.controller.schedule_state(), ScheduleState::Idle);

        tokio::time::sleep(ms(2)).await;
        assert_eq!(h.controller.phase(), Phase::Active);
        assert_eq!(h.controller.schedule_state(), ScheduleState::Scheduled);
        h.controller.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn regaining_visibility_triggers_one_background_load() {
        let h = harness(vec![ok(&["a"], 1)], polling());

        h.controller.mount().await;
        assert_eq!(h.controller.schedule_state(), ScheduleState::Scheduled);

        h.controller.set_visible(false).await;
        assert_eq!(h.controller.phase(), Phase::Suspended);
        assert_eq!(h.controller.schedule_state(), ScheduleState::Idle);

        tokio::time::sleep(ms(5000)).await;
        assert_eq!(h.fetcher.calls(), 0);

        h.controller.set_visible(true).await;
        assert_eq!(h.fetcher.calls(), 1);
        assert_eq!(h.controller.schedule_state(), ScheduleState::Scheduled);

        // Repeated "visible" signals are not transitions.
        h.controller.set_visible(true).await;
        assert_eq!(h.fetcher.calls(), 1);
        h.controller.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn interaction_release_is_delayed() {
        let h = harness(vec![ok(&["a"], 1)], polling());

        h.controller.start_auto_refresh();
        h.controller.interaction_began();
        assert_eq!(h.controller.phase(), Phase::Suspended);
        assert_eq!(h.controller.schedule_state(), ScheduleState::Idle);

        h.controller.interaction_ended();
        tokio::time::sleep(ms(999)).await;
        assert_eq!(h.controller.phase(), Phase::Suspended);

        tokio::time::sleep(ms(2)).await;
        assert_eq!(h.controller.phase(), Phase::Active);
        assert_eq!(h.controller.schedule_state(), ScheduleState::Scheduled);
        h.controller.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn new_interaction_cancels_pending_release() {
        let h = harness(vec![ok(&["a"], 1)], polling());

        h.controller.interaction_began();
        h.controller.interaction_ended();
        tokio::time::sleep(ms(500)).await;
        h.controller.interaction_began();
        tokio::time::sleep(ms(2000)).await;

        assert_eq!(h.controller.phase(), Phase::Suspended);
        assert_eq!(h.fetcher.calls(), 0);
        h.controller.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn short_interaction_keeps_force_refresh_grace() {
        let h = harness(vec![ok(&["a"], 1)], polling());

        h.controller.force_refresh().await;
        tokio::time::sleep(ms(500)).await;
        h.controller.interaction_began();
        h.controller.interaction_ended();

        // 1500ms after the refresh: the short release alone would have fired.
        tokio::time::sleep(ms(1000)).await;
        assert_eq!(h.controller.phase(), Phase::Suspended);

        tokio::time::sleep(ms(1499)).await;
        assert_eq!(h.controller.phase(), Phase::Suspended);

        tokio::time::sleep(ms(2)).await;
        assert_eq!(h.controller.phase(), Phase::Active);
        assert_eq!(h.controller.schedule_state(), ScheduleState::Scheduled);
        h.controller.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn long_interaction_after_grace_uses_short_release() {
        let h = harness(vec![ok(&["a"], 1)], polling());

        h.controller.force_refresh().await;
        h.controller.interaction_began();
        tokio::time::sleep(ms(5000)).await;
        h.controller.interaction_ended();

        tokio::time::sleep(ms(999)).await;
        assert_eq!(h.controller.phase(), Phase::Suspended);
        tokio::time::sleep(ms(2)).await;
        assert_eq!(h.controller.phase(), Phase::Active);
        h.controller.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_does_not_overwrite_newer_page() {
        let h = harness(
            vec![ok_after(&["old"], 1, 1000), ok_after(&["new"], 1, 100)],
            manual(),
        );

        let slow = h.controller.clone();
        let task = tokio::spawn(async move { slow.load_tasks(None, None).await });
        tokio::task::yield_now().await;

        h.controller.load_tasks(None, None).await;
        task.await.unwrap();

        assert_eq!(items(&h.controller), vec!["new"]);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_auto_refresh_stops_the_chain() {
        let h = harness(vec![ok(&["a"], 1)], polling());

        h.controller.start_auto_refresh();
        h.controller.set_enabled(false);
        assert_eq!(h.controller.phase(), Phase::Suspended);
        tokio::time::sleep(ms(10_000)).await;
        assert_eq!(h.fetcher.calls(), 0);

        h.controller.set_enabled(true);
        assert!(h.controller.snapshot().auto_refresh);
        assert_eq!(h.controller.schedule_state(), ScheduleState::Scheduled);
        h.controller.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn page_navigation_uses_total() {
        let h = harness(
            vec![
                ok(&["a", "b"], 5),
                ok(&["c", "d"], 5),
                ok(&["e"], 5),
                ok(&["c", "d"], 5),
            ],
            PollerOptions {
                page_size: 2,
                ..manual()
            },
        );

        h.controller.load_tasks(None, None).await;
        h.controller.next_page().await;
        h.controller.next_page().await;
        let page = h.controller.snapshot().page;
        assert_eq!(page.page_num, 3);
        assert!(!page.has_next());

        h.controller.next_page().await;
        assert_eq!(h.fetcher.calls(), 3);

        h.controller.prev_page().await;
        assert_eq!(h.controller.snapshot().page.page_num, 2);
        assert_eq!(
            *h.fetcher.pages.lock().unwrap(),
            vec![(1, 2), (2, 2), (3, 2), (2, 2)]
        );
    }

    #[test]
    fn page_count_rounds_up() {
        let page: ListPage<String> = ListPage {
            items: Vec::new(),
            total: 41,
            page_num: 1,
            page_size: 20,
        };
        assert_eq!(page.page_count(), 3);
        assert!(page.has_next());
        assert!(!page.has_prev());
        assert_eq!(ListPage::<String>::empty(1, 20).page_count(), 1);
    }
}
