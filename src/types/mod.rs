// Public modules
pub mod backend_config;
pub mod chat_session;
pub mod event;
pub mod memory;
pub mod project;
pub mod role;
pub mod stored_message;
pub mod task;

// Re-exports
pub use backend_config::{
    BackendConfig, DatabaseSettings, LlmSettings, StorageSettings, VectorDbSettings,
};
pub use chat_session::{ChatSession, SessionDetail, SessionId};
pub use event::{Event, EventCreate, EventId, EventUpdate};
pub use memory::{Memory, MemoryCreate};
pub use project::{Project, ProjectCreate, ProjectId, StoredFile};
pub use role::Role;
pub use stored_message::StoredMessage;
pub use task::{Priority, Task, TaskCreate, TaskId, TaskStatus, TaskUpdate};
