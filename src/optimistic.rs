//! Local lists that change before the backend confirms.
//!
//! An [`OptimisticList`] mirrors one collection held by the backend.  Updates
//! and deletes are applied to the local copy first and then sent; if the
//! backend rejects them the whole list is fetched again, which discards the
//! local change.  There is no per-field undo.  Creates wait for the backend
//! and insert the entity it returns.
//!
//! A mutation runs in three steps so the local change can be shown while the
//! request is in flight:
//!
//! ```ignore
//! let pending = tasks.begin_update(id, &TaskUpdate::status(TaskStatus::Done));
//! show(tasks.items());
//! let settlement = pending.send().await;
//! let outcome = tasks.settle(settlement).await;
//! ```
//!
//! Failures are reported as a [`MutationOutcome`] and never disturb anything
//! outside the list.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::client::{ApiClient, SessionApi};
use crate::error::{Error, Result};
use crate::observability::{MUTATION_ATTEMPTS, MUTATION_RESYNC_FAILURES, MUTATION_ROLLBACKS};
use crate::provision::SessionProvisioner;
use crate::types::{
    ChatSession, Event, EventCreate, EventId, EventUpdate, SessionId, Task, TaskCreate, TaskId,
    TaskStatus, TaskUpdate,
};

/// A partial update that can be applied to a local entity.
pub trait Patch<E> {
    /// Overwrites the fields this patch carries.
    fn apply_to(&self, entity: &mut E);
}

/// The backend side of an optimistic list.
#[async_trait]
pub trait Remote: Send + Sync {
    /// The listed entity.
    type Entity: Clone + Send + Sync;
    /// Its identifier.
    type Id: Copy + Eq + fmt::Display + Send + Sync;
    /// Payload for creating an entity.
    type Create: Send + Sync;
    /// Payload for a partial update.
    type Patch: Patch<Self::Entity> + Clone + Send + Sync;

    /// Name used in logs.
    const KIND: &'static str;

    /// Whether new entities go to the front of the list.
    const NEWEST_FIRST: bool = false;

    /// The identifier of `entity`.
    fn id_of(entity: &Self::Entity) -> Self::Id;

    /// The authoritative list.
    async fn list(&self) -> Result<Vec<Self::Entity>>;

    /// Creates an entity and returns the stored version.
    async fn create(&self, payload: &Self::Create) -> Result<Self::Entity>;

    /// Updates an entity and returns the stored version.
    async fn update(&self, id: Self::Id, patch: &Self::Patch) -> Result<Self::Entity>;

    /// Deletes an entity.
    async fn delete(&self, id: Self::Id) -> Result<()>;
}

/// How an optimistic mutation ended.
#[derive(Debug, Clone)]
pub enum MutationOutcome {
    /// The backend accepted the change.
    Confirmed,
    /// The backend rejected the change and the list was reloaded.
    Reverted {
        /// Why the backend rejected it.
        error: Error,
    },
    /// The backend rejected the change and reloading failed too, so the list
    /// still shows the rejected change.
    Unsynced {
        /// Why the backend rejected it.
        error: Error,
        /// Why the reload failed.
        resync_error: Error,
    },
}

impl MutationOutcome {
    /// True if the backend accepted the change.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, MutationOutcome::Confirmed)
    }

    /// The rejection, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            MutationOutcome::Confirmed => None,
            MutationOutcome::Reverted { error } | MutationOutcome::Unsynced { error, .. } => {
                Some(error)
            }
        }
    }
}

/// A local mirror of a backend collection with optimistic updates and deletes.
pub struct OptimisticList<R: Remote> {
    remote: Arc<R>,
    items: Vec<R::Entity>,
}

impl<R: Remote> OptimisticList<R> {
    /// An empty list; call [`refresh`](Self::refresh) to load it.
    pub fn new(remote: R) -> Self {
        Self {
            remote: Arc::new(remote),
            items: Vec::new(),
        }
    }

    /// The backend this list mirrors.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The entities as currently shown.
    pub fn items(&self) -> &[R::Entity] {
        &self.items
    }

    /// The entity with `id`, if shown.
    pub fn get(&self, id: R::Id) -> Option<&R::Entity> {
        self.items.iter().find(|e| R::id_of(e) == id)
    }

    /// Replaces the list with the authoritative one.
    pub async fn refresh(&mut self) -> Result<()> {
        self.items = self.remote.list().await?;
        Ok(())
    }

    /// Creates an entity and, once the backend returns it, shows it.
    pub async fn create(&mut self, payload: &R::Create) -> Result<R::Entity> {
        MUTATION_ATTEMPTS.click();
        let created = self.remote.create(payload).await.inspect_err(|err| {
            warn!(kind = R::KIND, error = %err, "create rejected");
        })?;
        if R::NEWEST_FIRST {
            self.items.insert(0, created.clone());
        } else {
            self.items.push(created.clone());
        }
        Ok(created)
    }

    /// Applies `patch` locally and returns the request that sends it.
    ///
    /// The list shows the patched entity until the request is
    /// [settled](Self::settle).
    pub fn begin_update(&mut self, id: R::Id, patch: &R::Patch) -> PendingMutation<R> {
        MUTATION_ATTEMPTS.click();
        if let Some(entity) = self.items.iter_mut().find(|e| R::id_of(e) == id) {
            patch.apply_to(entity);
        }
        PendingMutation {
            remote: Arc::clone(&self.remote),
            id,
            change: Change::Update(patch.clone()),
        }
    }

    /// Removes the entity locally and returns the request that deletes it.
    pub fn begin_delete(&mut self, id: R::Id) -> PendingMutation<R> {
        MUTATION_ATTEMPTS.click();
        self.items.retain(|e| R::id_of(e) != id);
        PendingMutation {
            remote: Arc::clone(&self.remote),
            id,
            change: Change::Delete,
        }
    }

    /// Reconciles the list with the backend's answer to a pending mutation.
    ///
    /// An accepted update replaces the local entity with the stored one; a
    /// rejection reloads the whole list.
    pub async fn settle(&mut self, settlement: Settlement<R>) -> MutationOutcome {
        let Settlement { id, result } = settlement;
        match result {
            Ok(Some(stored)) => {
                if let Some(entity) = self.items.iter_mut().find(|e| R::id_of(e) == id) {
                    *entity = stored;
                }
                debug!(kind = R::KIND, %id, "update confirmed");
                MutationOutcome::Confirmed
            }
            Ok(None) => {
                debug!(kind = R::KIND, %id, "delete confirmed");
                MutationOutcome::Confirmed
            }
            Err(error) => {
                warn!(kind = R::KIND, %id, error = %error, "change rejected; reloading");
                self.roll_back(error).await
            }
        }
    }

    /// Applies `patch` locally, sends it and settles.
    pub async fn update(&mut self, id: R::Id, patch: &R::Patch) -> MutationOutcome {
        let settlement = self.begin_update(id, patch).send().await;
        self.settle(settlement).await
    }

    /// Removes the entity locally, deletes it on the backend and settles.
    pub async fn delete(&mut self, id: R::Id) -> MutationOutcome {
        let settlement = self.begin_delete(id).send().await;
        self.settle(settlement).await
    }

    async fn roll_back(&mut self, error: Error) -> MutationOutcome {
        MUTATION_ROLLBACKS.click();
        match self.refresh().await {
            Ok(()) => MutationOutcome::Reverted { error },
            Err(resync_error) => {
                MUTATION_RESYNC_FAILURES.click();
                warn!(kind = R::KIND, error = %resync_error, "reload after rejected change failed");
                MutationOutcome::Unsynced {
                    error,
                    resync_error,
                }
            }
        }
    }
}

enum Change<P> {
    Update(P),
    Delete,
}

/// A mutation already applied locally and not yet sent.
///
/// Holds only the backend handle, so the list stays readable while
/// [`send`](Self::send) is awaited.
#[must_use = "the local change stays unconfirmed until sent and settled"]
pub struct PendingMutation<R: Remote> {
    remote: Arc<R>,
    id: R::Id,
    change: Change<R::Patch>,
}

impl<R: Remote> PendingMutation<R> {
    /// The entity being changed.
    pub fn id(&self) -> R::Id {
        self.id
    }

    /// Sends the change to the backend.
    pub async fn send(self) -> Settlement<R> {
        let result = match &self.change {
            Change::Update(patch) => self.remote.update(self.id, patch).await.map(Some),
            Change::Delete => self.remote.delete(self.id).await.map(|()| None),
        };
        Settlement {
            id: self.id,
            result,
        }
    }
}

impl<R: Remote> fmt::Debug for PendingMutation<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let change = match self.change {
            Change::Update(_) => "update",
            Change::Delete => "delete",
        };
        f.debug_struct("PendingMutation")
            .field("kind", &R::KIND)
            .field("id", &self.id.to_string())
            .field("change", &change)
            .finish()
    }
}

/// The backend's answer to a [`PendingMutation`].
#[must_use = "pass to OptimisticList::settle"]
pub struct Settlement<R: Remote> {
    id: R::Id,
    result: Result<Option<R::Entity>>,
}

impl<R: Remote> Settlement<R> {
    /// True if the backend accepted the change.
    pub fn is_accepted(&self) -> bool {
        self.result.is_ok()
    }
}

impl<R: Remote> fmt::Debug for OptimisticList<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisticList")
            .field("kind", &R::KIND)
            .field("len", &self.items.len())
            .finish()
    }
}

impl Patch<Task> for TaskUpdate {
    fn apply_to(&self, task: &mut Task) {
        TaskUpdate::apply_to(self, task)
    }
}

impl Patch<Event> for EventUpdate {
    fn apply_to(&self, event: &mut Event) {
        EventUpdate::apply_to(self, event)
    }
}

/// New title for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRename {
    /// The title to set.
    pub title: String,
}

impl Patch<ChatSession> for SessionRename {
    fn apply_to(&self, session: &mut ChatSession) {
        session.title = self.title.clone();
    }
}

/// The task board.
#[derive(Debug, Clone)]
pub struct TaskRemote {
    api: Arc<ApiClient>,
}

impl TaskRemote {
    /// Tasks held by the backend behind `api`.
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Remote for TaskRemote {
    type Entity = Task;
    type Id = TaskId;
    type Create = TaskCreate;
    type Patch = TaskUpdate;

    const KIND: &'static str = "task";

    fn id_of(task: &Task) -> TaskId {
        task.id
    }

    async fn list(&self) -> Result<Vec<Task>> {
        self.api.list_tasks().await
    }

    async fn create(&self, payload: &TaskCreate) -> Result<Task> {
        self.api.create_task(payload).await
    }

    async fn update(&self, id: TaskId, patch: &TaskUpdate) -> Result<Task> {
        self.api.update_task(id, patch).await
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        self.api.delete_task(id).await
    }
}

/// Optimistic task board.
pub type Tasks = OptimisticList<TaskRemote>;

impl<R: Remote<Entity = Task, Id = TaskId, Patch = TaskUpdate>> OptimisticList<R> {
    /// Moves a task to another column.
    pub async fn set_status(&mut self, id: TaskId, status: TaskStatus) -> MutationOutcome {
        self.update(id, &TaskUpdate::status(status)).await
    }
}

/// The calendar.
#[derive(Debug, Clone)]
pub struct EventRemote {
    api: Arc<ApiClient>,
}

impl EventRemote {
    /// Events held by the backend behind `api`.
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Remote for EventRemote {
    type Entity = Event;
    type Id = EventId;
    type Create = EventCreate;
    type Patch = EventUpdate;

    const KIND: &'static str = "event";

    fn id_of(event: &Event) -> EventId {
        event.id
    }

    async fn list(&self) -> Result<Vec<Event>> {
        self.api.list_events().await
    }

    async fn create(&self, payload: &EventCreate) -> Result<Event> {
        self.api.create_event(payload).await
    }

    async fn update(&self, id: EventId, patch: &EventUpdate) -> Result<Event> {
        self.api.update_event(id, patch).await
    }

    async fn delete(&self, id: EventId) -> Result<()> {
        self.api.delete_event(id).await
    }
}

/// Optimistic calendar.
pub type Events = OptimisticList<EventRemote>;

/// The sessions of one conversation scope.
#[derive(Clone)]
pub struct SessionRemote {
    api: Arc<dyn SessionApi>,
    provisioner: Arc<dyn SessionProvisioner>,
}

impl SessionRemote {
    /// Sessions of `provisioner`'s scope, held by `api`.
    pub fn new(api: Arc<dyn SessionApi>, provisioner: Arc<dyn SessionProvisioner>) -> Self {
        Self { api, provisioner }
    }

    /// The scope's provisioning strategy.
    pub fn provisioner(&self) -> &dyn SessionProvisioner {
        self.provisioner.as_ref()
    }

    /// The session operations.
    pub fn api(&self) -> &dyn SessionApi {
        self.api.as_ref()
    }
}

impl fmt::Debug for SessionRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRemote")
            .field("provisioner", &self.provisioner)
            .finish()
    }
}

#[async_trait]
impl Remote for SessionRemote {
    type Entity = ChatSession;
    type Id = SessionId;
    /// Optional title; the scope may impose its own.
    type Create = Option<String>;
    type Patch = SessionRename;

    const KIND: &'static str = "session";
    const NEWEST_FIRST: bool = true;

    fn id_of(session: &ChatSession) -> SessionId {
        session.id
    }

    async fn list(&self) -> Result<Vec<ChatSession>> {
        self.provisioner.sessions(self.api.as_ref()).await
    }

    async fn create(&self, title: &Option<String>) -> Result<ChatSession> {
        self.provisioner
            .create(self.api.as_ref(), title.as_deref())
            .await
    }

    async fn update(&self, id: SessionId, patch: &SessionRename) -> Result<ChatSession> {
        self.api.rename_session(id, &patch.title).await
    }

    async fn delete(&self, id: SessionId) -> Result<()> {
        self.api.delete_session(id).await
    }
}

/// Optimistic session list of one conversation scope.
pub type Sessions = OptimisticList<SessionRemote>;
