//! HTTP API for recap-pp

pub mod health;
pub mod process;
pub mod queue;
pub mod recordings;
pub mod recover;
pub mod sse;

pub use health::health_routes;
pub use process::process_routes;
pub use queue::queue_routes;
pub use recordings::recording_routes;
pub use recover::recover_routes;
pub use sse::event_stream;
