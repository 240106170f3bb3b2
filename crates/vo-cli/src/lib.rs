//! Runtime assembly and the interactive REPL surface.

pub mod providers;
pub mod repl;
pub mod runtime;

pub use repl::{ReplChannel, ReplEventSource};
pub use runtime::Runtime;
