//! App layer - central state management and command processing
//!
//! The App actor receives UI events and broker events, runs them through
//! the session state machine, and emits broker commands and render state.

pub mod session;
pub mod state;
pub mod actor;
pub mod commands;

pub use session::{Session, SessionEvent};
pub use state::AppState;
pub use actor::AppActor;
