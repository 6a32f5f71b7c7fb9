pub mod veris_client;

pub use veris_client::{AnalyticsView, VerisClient, VALID_CONTEXT_TYPES};
