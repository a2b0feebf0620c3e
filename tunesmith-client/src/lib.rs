//! tunesmith-client library interface
//!
//! Client for music/lyrics generation APIs: credential handling, the
//! two-dialect API adapter, the task registry and the status poller. The
//! `tunesmith` binary is a thin command-line layer over [`Studio`].

pub mod api;
pub mod auth;
pub mod credits;
pub mod error;
pub mod polling;
pub mod studio;
pub mod tasks;

pub use crate::auth::AuthStore;
pub use crate::error::{ApiError, ApiResult};
pub use crate::polling::{PollOutcome, PollState, Poller};
pub use crate::studio::{ClientConfig, SharedRegistry, Studio};
pub use crate::tasks::{NewTask, Task, TaskKind, TaskRegistry, TaskStatus, TaskUpdate};
