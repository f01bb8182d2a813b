use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use shared::domain::{Cursor, Product};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    error::{FetchError, StoreError},
    options::{map_records, CommitPolicy, ControllerOptions},
    state::{FetchState, StateStream},
    store::{PageQuery, PrefixRange, ProductStore},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCommand {
    LoadMore,
    Search(String),
}

/// Single-slot guard for the pagination path.
#[derive(Debug, Default)]
pub(crate) struct InFlightSlot {
    busy: Arc<AtomicBool>,
}

impl InFlightSlot {
    pub(crate) fn try_acquire(&self) -> Option<InFlightToken> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(InFlightToken {
            busy: Arc::clone(&self.busy),
        })
    }

    pub(crate) fn is_held(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Held for the lifetime of one page fetch; dropping it frees the slot.
#[derive(Debug)]
pub(crate) struct InFlightToken {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

struct SharedState {
    current: FetchState,
    cursor: Option<Cursor>,
    // `None` once disposed
    events: Option<broadcast::Sender<FetchState>>,
}

impl SharedState {
    fn publish(&mut self, state: FetchState) {
        self.current = state.clone();
        if let Some(events) = &self.events {
            let _ = events.send(state);
        }
    }
}

struct PageRequest {
    token: InFlightToken,
    generation: u64,
    previous: Vec<Product>,
    after: Option<Cursor>,
}

struct MappedPage {
    products: Vec<Product>,
    raw_count: usize,
    next_cursor: Option<Cursor>,
}

struct ControllerCore {
    store: Arc<dyn ProductStore>,
    options: ControllerOptions,
    page_slot: InFlightSlot,
    generation: AtomicU64,
    shared: Mutex<SharedState>,
}

impl ControllerCore {
    fn lock_shared(&self) -> MutexGuard<'_, SharedState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn may_commit(&self, shared: &SharedState, generation: u64) -> bool {
        if shared.events.is_none() {
            return false;
        }
        match self.options.commit_policy {
            CommitPolicy::LastCompletion => true,
            CommitPolicy::LatestRequest => generation == self.generation.load(Ordering::Acquire),
        }
    }

    fn begin_page(&self) -> Option<PageRequest> {
        let Some(token) = self.page_slot.try_acquire() else {
            debug!("load_more ignored: a page fetch is already in flight");
            return None;
        };

        let shared = self.lock_shared();
        if shared.events.is_none() {
            debug!("load_more ignored: controller disposed");
            return None;
        }
        let generation = self.next_generation();
        Some(PageRequest {
            token,
            generation,
            previous: shared.current.items().to_vec(),
            after: shared.cursor.clone(),
        })
    }

    fn begin_search(&self, query: &str) -> Option<u64> {
        let shared = self.lock_shared();
        if shared.events.is_none() {
            debug!(query, "search ignored: controller disposed");
            return None;
        }
        Some(self.next_generation())
    }

    async fn complete_page(&self, request: PageRequest) {
        let PageRequest {
            token,
            generation,
            previous,
            after,
        } = request;
        let query = PageQuery {
            order_by: self.options.order_field.clone(),
            descending: true,
            limit: self.options.page_size,
            after,
        };
        let outcome = self.fetch_page(&query).await;

        let mut shared = self.lock_shared();
        if !self.may_commit(&shared, generation) {
            debug!(generation, "discarding superseded page result");
            return;
        }

        match outcome {
            Ok(page) => {
                if page.raw_count > 0 {
                    if let Some(next_cursor) = page.next_cursor {
                        shared.cursor = Some(next_cursor);
                    }
                }
                let fetched = page.products.len();
                let mut items = previous;
                items.extend(page.products);
                debug!(generation, fetched, total = items.len(), "page committed");
                shared.publish(FetchState::Loaded(items));
            }
            Err(err) => {
                warn!(
                    generation,
                    transient = err.is_transient(),
                    error = %err,
                    "page fetch failed"
                );
                shared.publish(FetchState::Error(self.options.error_message.clone()));
            }
        }
        drop(shared);
        drop(token);
    }

    async fn complete_search(&self, generation: u64, query: String) {
        let range = PrefixRange::starts_with(self.options.search_field.as_str(), &query);
        let outcome = self.fetch_prefix(&range).await;

        let mut shared = self.lock_shared();
        if !self.may_commit(&shared, generation) {
            debug!(generation, query = %query, "discarding superseded search result");
            return;
        }

        match outcome {
            Ok(products) => {
                debug!(generation, query = %query, matches = products.len(), "search committed");
                shared.publish(FetchState::Loaded(products));
            }
            Err(err) => {
                warn!(
                    generation,
                    query = %query,
                    transient = err.is_transient(),
                    error = %err,
                    "search failed"
                );
                shared.publish(FetchState::Error(self.options.error_message.clone()));
            }
        }
    }

    async fn fetch_page(&self, query: &PageQuery) -> Result<MappedPage, FetchError> {
        let page = self.bounded(self.store.query_page(query)).await?;
        let products = map_records(&page.records, self.options.batch_policy)?;
        Ok(MappedPage {
            products,
            raw_count: page.records.len(),
            next_cursor: page.next_cursor,
        })
    }

    async fn fetch_prefix(&self, range: &PrefixRange) -> Result<Vec<Product>, FetchError> {
        let records = self.bounded(self.store.query_prefix(range)).await?;
        Ok(map_records(&records, self.options.batch_policy)?)
    }

    async fn bounded<T>(
        &self,
        query: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match self.options.query_timeout {
            Some(limit) => tokio::time::timeout(limit, query)
                .await
                .map_err(|_elapsed| StoreError::Timeout(limit))?,
            None => query.await,
        }
    }
}

/// Drives paginated loading and prefix search of the product collection and
/// broadcasts the resulting [`FetchState`] to every observer.
///
/// Commands are fire-and-forget: each accepted command runs on its own tokio
/// task and the returned handle may be dropped. `load_more` is coalesced
/// through a single in-flight slot; `search` is never guarded.
pub struct FetchController {
    core: Arc<ControllerCore>,
}

impl FetchController {
    /// Must be called inside a tokio runtime; the initial page load is
    /// spawned immediately.
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self::with_options(store, ControllerOptions::default())
    }

    /// Must be called inside a tokio runtime when `options.initial_load` is set.
    pub fn with_options(store: Arc<dyn ProductStore>, options: ControllerOptions) -> Self {
        let (events, _) = broadcast::channel(options.state_capacity.max(1));
        let initial_load = options.initial_load;
        info!(
            page_size = options.page_size,
            commit_policy = %options.commit_policy,
            batch_policy = %options.batch_policy,
            "fetch controller created"
        );

        let controller = Self {
            core: Arc::new(ControllerCore {
                store,
                options,
                page_slot: InFlightSlot::default(),
                generation: AtomicU64::new(0),
                shared: Mutex::new(SharedState {
                    current: FetchState::Initial,
                    cursor: None,
                    events: Some(events),
                }),
            }),
        };
        if initial_load {
            let _ = controller.load_more();
        }
        controller
    }

    pub fn dispatch(&self, command: FetchCommand) -> Option<JoinHandle<()>> {
        match command {
            FetchCommand::LoadMore => self.load_more(),
            FetchCommand::Search(query) => self.search(query),
        }
    }

    /// Fetches the next page and appends it. Returns `None` when the call was
    /// dropped because a page fetch is already running or the controller is
    /// disposed. Must be called inside a tokio runtime.
    pub fn load_more(&self) -> Option<JoinHandle<()>> {
        let request = self.core.begin_page()?;
        let core = Arc::clone(&self.core);
        Some(tokio::spawn(async move {
            core.complete_page(request).await;
        }))
    }

    /// Replaces the displayed list with products whose name starts with
    /// `query`. Leaves the pagination cursor untouched. Must be called inside
    /// a tokio runtime.
    pub fn search(&self, query: impl Into<String>) -> Option<JoinHandle<()>> {
        let query = query.into();
        let generation = self.core.begin_search(&query)?;
        let core = Arc::clone(&self.core);
        Some(tokio::spawn(async move {
            core.complete_search(generation, query).await;
        }))
    }

    pub fn state(&self) -> FetchState {
        self.core.lock_shared().current.clone()
    }

    pub fn observe_state(&self) -> StateStream {
        let shared = self.core.lock_shared();
        let updates = shared.events.as_ref().map(broadcast::Sender::subscribe);
        StateStream::new(shared.current.clone(), updates)
    }

    pub fn is_loading_page(&self) -> bool {
        self.core.page_slot.is_held()
    }

    /// Ends every observer stream; completions arriving later are discarded.
    pub fn dispose(&self) {
        let mut shared = self.core.lock_shared();
        if shared.events.take().is_some() {
            info!("fetch controller disposed");
        }
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> Option<Cursor> {
        self.core.lock_shared().cursor.clone()
    }
}

impl Drop for FetchController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
