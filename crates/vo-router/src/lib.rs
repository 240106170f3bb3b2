//! The event router: one consumer task over an unbounded queue, fanning each
//! event out to its matching handlers as independent turn tasks.

pub mod error;
pub mod queue;
pub mod router;
pub mod source;

pub use error::RouterError;
pub use queue::EventQueue;
pub use router::Router;
pub use source::EventSource;
