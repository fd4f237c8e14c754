pub mod handlers;
pub mod router;
pub mod models;
pub mod events;
pub mod repository;
pub mod services;

pub use models::*;
pub use events::{AppointmentEvent, EventSink, LogEventSink};
pub use services::*;
