//! # deskpilot
//!
//! A computer-use agent loop: show a model a screenshot of a desktop sandbox,
//! run the action it asks for, show it the result, repeat until it is done.
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │             Session              │
//!        │  (context, turns, termination)   │
//!        └───────┬──────────────────┬───────┘
//!                │                  │
//!                ▼                  ▼
//!       ┌────────────────┐  ┌────────────────┐
//!       │  ModelClient   │  │  TurnExecutor  │──► settle strategy
//!       │ (Responses API)│  └───────┬────────┘
//!       └────────────────┘          │ translate
//!                                   ▼
//!                          ┌────────────────┐
//!                          │    Sandbox     │
//!                          │ (X11 / fakes)  │
//!                          └────────────────┘
//! ```
//!
//! ## Turn Flow
//! 1. Capture the initial screenshot and send it with the task
//! 2. Receive a computer call from the model
//! 3. Translate the action into sandbox primitives and run them in order
//! 4. Let the screen settle, capture a new screenshot
//! 5. Send the screenshot back keyed by the call id; repeat until completion
//!
//! ## Modules
//! - `session`: the control loop and its state machine
//! - `executor` / `translator` / `keys`: action execution
//! - `sandbox`: the desktop capability trait and the X11 adapter
//! - `llm`: the model client trait and the OpenAI Responses client
//! - `safety`: gates for provider safety checks
//! - `testing`: in-memory sandbox and model fakes (`testing` feature)

pub mod action;
pub mod config;
pub mod error;
pub mod executor;
pub mod keys;
pub mod llm;
pub mod observation;
pub mod safety;
pub mod sandbox;
pub mod session;
pub mod settle;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod translator;

pub use action::{Action, MouseButton};
pub use config::{Config, ConfigError, MultiActionPolicy};
pub use error::{AgentError, AgentResult};
pub use llm::{ModelClient, OpenAiResponsesClient};
pub use observation::Observation;
pub use sandbox::{Sandbox, SandboxError, X11Sandbox};
pub use session::{Session, SessionReport, SessionState, Termination, Turn};
