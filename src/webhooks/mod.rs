pub mod delivery;
pub mod events;
pub mod manager;

pub use events::{Event, EventType};
pub use manager::{Subscription, WebhookManager};
