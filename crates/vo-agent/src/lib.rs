//! The agent turn loop and its provider contract.
//!
//! Providers normalise their wire formats into [`StreamEvent`]s; the loop in
//! [`turn`] accumulates them, executes tool calls, persists each turn to the
//! session log, and decides what (if anything) the channel receives.

pub mod error;
pub mod guard;
pub mod mock;
pub mod prompt;
pub mod provider;
pub mod stream;
pub mod turn;

pub use error::AgentError;
pub use mock::{MockProvider, MockTurn};
pub use prompt::{AgentSpec, SkillSummary};
pub use provider::{AgentProvider, InputGuardrail, ProviderError, ProviderRequest};
pub use stream::StreamEvent;
pub use turn::{Agent, TurnContent, TurnInput, TurnOutcome};
