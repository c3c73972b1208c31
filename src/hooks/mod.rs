//! Data hooks: per-entity reads and writes composed from the remote client
//! and the query cache.

pub mod context;
pub mod entity;
pub mod leads;
pub mod meetings;
pub mod notifications;
pub mod saved_views;

pub use context::HookContext;
pub use entity::EntityHooks;
pub use leads::LeadHooks;
pub use meetings::MeetingHooks;
pub use notifications::NotificationHooks;
pub use saved_views::SavedViewHooks;
