//! Credit-account sync: provider selection, the per-account state machine,
//! UTC schedules and the timer tasks that run them.

mod providers;
mod schedule;
mod scheduler;
mod sync_model;
mod sync_service;
mod sync_traits;


pub use providers::{CreditProvider, ProviderRegistry};
pub use schedule::{next_fire_after, ScheduleTimezone, TimeOfDay};
pub use scheduler::{SchedulerConfig, SyncScheduler};
pub use sync_model::*;
pub use sync_service::{SyncConfig, SyncService};
pub use sync_traits::{SyncAccountRepositoryTrait, SyncRunner, SyncServiceTrait};
