//! Queries
//!
//! A query is a server-side list with paging, sorting, text search, column filters and its own
//! action bar. Rows are cached sparsely by absolute index (see [`cache::RowCache`]); range
//! requests fetch only the pages that are missing, one request at a time per query.
//!
//! Searches are numbered. A result is only applied when no newer search started after it was
//! sent, so a slow answer to an old search text never overwrites a newer one.

use crate::action::{build_actions, Action};
use crate::client::Client;
use crate::events::{EventBus, QueryEvent};
use crate::notification::{Notification, NotificationType};
use crate::object::BusinessObject;
use crate::payload::{QueryPayload, QueryResultPayload};
use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub mod cache;
pub mod column;
pub mod row;
mod selection;

pub use cache::{FetchPlan, RowCache};
pub use column::Column;
pub use row::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchMode {
    /// Clear everything and fetch from the start
    Reset,
    /// Fetch one window into the existing rows
    Window { skip: usize, top: Option<usize> },
}

struct QueryState {
    label: Option<String>,
    sort_options: Option<String>,
    text_search: Option<String>,
    skip: Option<usize>,
    top: Option<usize>,
    columns: Vec<Column>,
    cache: RowCache<Arc<Row>>,
    selected: Vec<Arc<Row>>,
    notification: Option<Notification>,
    semantic_zoom_owner: Weak<Query>,
    generation: u64,
}

/// Decrements the in-flight search count when dropped.
struct InFlight<'a>(&'a watch::Sender<usize>);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a watch::Sender<usize>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

pub struct Query {
    id: String,
    name: String,
    auto_query: bool,
    can_read: bool,
    is_hidden: bool,
    offset: i32,
    as_lookup: bool,
    can_filter: bool,
    persistent_object: Option<Arc<BusinessObject>>,
    parent: Weak<BusinessObject>,
    actions: Vec<Arc<Action>>,
    pinned_actions: Vec<Arc<Action>>,
    state: RwLock<QueryState>,
    fetch_gate: Mutex<()>,
    in_flight: watch::Sender<usize>,
    events: EventBus<QueryEvent>,
    self_ref: Weak<Query>,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("count", &self.count())
            .finish()
    }
}

fn to_usize(value: i64) -> Option<usize> {
    usize::try_from(value).ok()
}

impl Query {
    pub fn from_payload(
        client: &Client,
        payload: QueryPayload,
        parent: Weak<BusinessObject>,
        parent_is_new: bool,
        as_lookup: bool,
    ) -> Arc<Self> {
        let persistent_object = payload
            .persistent_object
            .map(|po| client.construct_object(*po));
        let notification = Notification::new(
            payload.notification.as_deref(),
            NotificationType::from_wire(payload.notification_type.as_deref()),
        );
        let page_size = payload.page_size.and_then(to_usize);
        let can_filter = payload.actions.iter().any(|a| a == "Filter");
        let mut columns: Vec<Column> = payload.columns.into_iter().map(Column::from_payload).collect();
        columns.sort_by_key(|c| c.offset);

        let query = Arc::new_cyclic(|weak: &Weak<Query>| {
            let (pinned_actions, actions) =
                build_actions(client, &payload.actions, &parent, Some(weak), parent_is_new)
                    .into_iter()
                    .partition(|a| a.is_pinned());

            Query {
                id: payload.id,
                name: payload.name,
                auto_query: payload.auto_query,
                can_read: payload.can_read,
                is_hidden: payload.is_hidden,
                offset: payload.offset,
                as_lookup,
                can_filter,
                persistent_object,
                parent,
                actions,
                pinned_actions,
                state: RwLock::new(QueryState {
                    label: payload.label,
                    sort_options: payload.sort_options,
                    text_search: payload.text_search,
                    skip: payload.skip.and_then(to_usize),
                    top: payload.top.and_then(to_usize),
                    columns,
                    cache: RowCache::new(page_size),
                    selected: Vec::new(),
                    notification,
                    semantic_zoom_owner: Weak::new(),
                    generation: 0,
                }),
                fetch_gate: Mutex::new(()),
                in_flight: watch::channel(0).0,
                events: EventBus::default(),
                self_ref: weak.clone(),
            }
        });

        if let Some(result) = payload.result {
            let skip = query.state.read().skip.unwrap_or(0);
            let mut state = query.state.write();
            query.store_result(&mut state, result, skip);
        }
        query
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<String> {
        self.state.read().label.clone()
    }

    pub fn auto_query(&self) -> bool {
        self.auto_query
    }

    pub fn can_read(&self) -> bool {
        self.can_read
    }

    pub fn can_filter(&self) -> bool {
        self.can_filter
    }

    pub fn is_hidden(&self) -> bool {
        self.is_hidden
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }

    pub fn as_lookup(&self) -> bool {
        self.as_lookup
    }

    /// Template object describing the rows' type.
    pub fn persistent_object(&self) -> Option<&Arc<BusinessObject>> {
        self.persistent_object.as_ref()
    }

    /// Object this query belongs to.
    pub fn parent(&self) -> Option<Arc<BusinessObject>> {
        self.parent.upgrade()
    }

    pub fn actions(&self) -> &[Arc<Action>] {
        &self.actions
    }

    pub fn pinned_actions(&self) -> &[Arc<Action>] {
        &self.pinned_actions
    }

    pub fn action(&self, name: &str) -> Option<Arc<Action>> {
        self.actions
            .iter()
            .chain(&self.pinned_actions)
            .find(|a| a.name() == name)
            .cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.events.subscribe()
    }

    pub fn columns(&self) -> Vec<Column> {
        self.state.read().columns.clone()
    }

    pub fn column(&self, name: &str) -> Option<Column> {
        self.state
            .read()
            .columns
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn sort_options(&self) -> Option<String> {
        self.state.read().sort_options.clone()
    }

    pub fn set_sort_options(&self, sort_options: Option<&str>) {
        self.state.write().sort_options = sort_options.map(str::to_string);
    }

    pub fn text_search(&self) -> Option<String> {
        self.state.read().text_search.clone()
    }

    pub fn page_size(&self) -> Option<usize> {
        self.state.read().cache.page_size()
    }

    pub fn total_items(&self) -> usize {
        self.state.read().cache.total_items()
    }

    pub fn has_searched(&self) -> bool {
        self.state.read().cache.has_searched()
    }

    /// One past the highest resident row index.
    pub fn count(&self) -> usize {
        self.state.read().cache.count()
    }

    pub fn row(&self, index: usize) -> Option<Arc<Row>> {
        self.state.read().cache.get(index).cloned()
    }

    /// Every resident row, in index order.
    pub fn rows(&self) -> Vec<Arc<Row>> {
        self.state.read().cache.rows()
    }

    pub fn is_page_fetched(&self, page: usize) -> bool {
        self.state.read().cache.is_page_fetched(page)
    }

    pub fn notification(&self) -> Option<Notification> {
        self.state.read().notification.clone()
    }

    pub fn has_error_notification(&self) -> bool {
        self.state
            .read()
            .notification
            .as_ref()
            .is_some_and(Notification::is_error)
    }

    pub fn set_notification(&self, message: Option<&str>, kind: NotificationType) {
        let notification = Notification::new(message, kind);
        {
            let mut state = self.state.write();
            if state.notification == notification {
                return;
            }
            state.notification = notification.clone();
        }
        self.events.emit(QueryEvent::NotificationChanged(notification));
    }

    pub fn semantic_zoom_owner(&self) -> Option<Arc<Query>> {
        self.state.read().semantic_zoom_owner.upgrade()
    }

    /// Link a grouped overview query that must refresh along with this one.
    pub fn set_semantic_zoom_owner(&self, owner: &Arc<Query>) {
        self.state.write().semantic_zoom_owner = Arc::downgrade(owner);
    }

    /// Number of searches currently waiting for the server.
    pub fn searches_in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Whether the query wants its first search to run automatically.
    pub fn needs_auto_search(&self) -> bool {
        self.auto_query && !self.has_searched() && self.count() == 0 && self.searches_in_flight() == 0
    }

    pub fn to_service_object(&self) -> Value {
        let state = self.state.read();
        self.service_object(&state)
    }

    fn service_object(&self, state: &QueryState) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "label": state.label,
            "pageSize": state.cache.page_size(),
            "skip": state.skip,
            "top": state.top,
            "sortOptions": state.sort_options,
            "textSearch": state.text_search,
            "persistentObject": self.persistent_object.as_ref().map(|po| po.to_service_object()),
            "columns": state.columns.iter().map(Column::to_service_object).collect::<Vec<_>>(),
        })
    }

    /// Apply a result to `state`; returns the stored window.
    fn store_result(
        &self,
        state: &mut QueryState,
        result: QueryResultPayload,
        requested_skip: usize,
    ) -> (usize, usize) {
        if let Some(columns) = result.columns {
            state.columns = column::merge_columns(&state.columns, columns);
        }
        state.cache.apply_paging(
            result.total_items.and_then(to_usize),
            result.page_size.and_then(to_usize),
        );
        if result.notification.is_some() {
            state.notification = Notification::new(
                result.notification.as_deref(),
                NotificationType::from_wire(result.notification_type.as_deref()),
            );
        }

        let skip = result.skip.and_then(to_usize).unwrap_or(requested_skip);
        let rows = result
            .items
            .into_iter()
            .map(|item| Arc::new(Row::from_payload(item, self.self_ref.clone())));
        let count = state.cache.store(skip, rows);
        (skip, count)
    }

    async fn search(&self, client: &Client, mode: SearchMode) -> bool {
        let (generation, payload, requested_skip) = {
            let mut state = self.state.write();
            state.generation += 1;
            match mode {
                SearchMode::Reset => {
                    state.cache.reset();
                    state.selected.clear();
                    state.notification = None;
                    state.skip = Some(0);
                    state.top = state.cache.page_size().filter(|p| *p > 0);
                }
                SearchMode::Window { skip, top } => {
                    state.skip = Some(skip);
                    state.top = top;
                }
            }
            let requested_skip = state.skip.unwrap_or(0);
            (state.generation, self.service_object(&state), requested_skip)
        };

        if mode == SearchMode::Reset {
            self.selection_changed(0);
            self.events.emit(QueryEvent::Reset);
        }
        debug!(query = %self.name, generation, ?mode, "Searching");

        let result = {
            let _in_flight = InFlight::enter(&self.in_flight);
            client
                .execute_query_payload(payload, self.parent().as_ref(), None, self.as_lookup)
                .await
        };

        let applied = {
            let mut state = self.state.write();
            if state.generation != generation {
                None
            } else {
                Some(match result {
                    Ok(Some(result)) => Ok(self.store_result(&mut state, result, requested_skip)),
                    Ok(None) => Err("The query returned no result".to_string()),
                    Err(e) => Err(e.to_string()),
                })
            }
        };

        match applied {
            None => {
                warn!(query = %self.name, generation, "Discarding stale search result");
                false
            }
            Some(Ok((start, count))) => {
                self.events.emit(QueryEvent::RowsAdded { start, count });
                self.events
                    .emit(QueryEvent::NotificationChanged(self.notification()));
                true
            }
            Some(Err(message)) => {
                self.set_notification(Some(&message), NotificationType::Error);
                false
            }
        }
    }

    /// Re-run the query from the start.
    pub fn refresh<'a>(&'a self, client: &'a Client) -> BoxFuture<'a, bool> {
        self.search(client, SearchMode::Reset).boxed()
    }

    /// Search for `text` (cleared when empty) from the start.
    pub async fn search_text(&self, client: &Client, text: Option<&str>) -> bool {
        self.state.write().text_search = text.filter(|t| !t.is_empty()).map(str::to_string);
        self.search(client, SearchMode::Reset).await
    }

    /// Search unless a result is already present; joins a search that is in flight.
    pub async fn ensure_searched(&self, client: &Client) -> bool {
        if self.has_searched() {
            return true;
        }
        if self.searches_in_flight() > 0 {
            self.wait_idle().await;
            return self.has_searched();
        }
        self.search(client, SearchMode::Reset).await
    }

    /// Start the automatic first search in the background.
    pub fn spawn_auto_search(self: &Arc<Self>, client: Arc<Client>) -> Option<JoinHandle<bool>> {
        if !self.needs_auto_search() {
            return None;
        }
        let query = Arc::clone(self);
        Some(tokio::spawn(async move {
            let searched = query.ensure_searched(&client).await;
            query.events.emit(QueryEvent::Changed);
            searched
        }))
    }

    async fn wait_idle(&self) {
        let mut in_flight = self.in_flight.subscribe();
        // The sender lives as long as self
        let _ = in_flight.wait_for(|n| *n == 0).await;
    }

    /// Make rows `skip..skip + count` resident and return the ones that exist.
    ///
    /// Range requests on one query run one at a time and wait for running searches to finish.
    pub async fn ensure_range(&self, client: &Client, skip: usize, count: usize) -> Vec<Arc<Row>> {
        if count == 0 {
            return Vec::new();
        }

        let _gate = self.fetch_gate.lock().await;
        self.wait_idle().await;

        let plan = self.state.read().cache.plan(skip, count);
        if let FetchPlan::Fetch { skip: window, top } = plan {
            debug!(query = %self.name, skip, count, window, ?top, "Fetching rows");
            if !self.search(client, SearchMode::Window { skip: window, top }).await {
                return Vec::new();
            }
        }

        self.state.read().cache.rows_in(skip, count)
    }
}
