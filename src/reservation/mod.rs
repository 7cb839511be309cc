pub mod date;
pub mod event;
pub mod extract;
pub mod models;
pub mod ports;
pub mod processor;

pub use event::create_reservation_event;
pub use extract::{ExtractError, FieldExtractor, extract_reservation};
pub use models::*;
pub use ports::{EventSink, MessageSource};
pub use processor::ReservationProcessor;
