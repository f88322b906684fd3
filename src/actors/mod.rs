//! Actor-based monitoring scheduler
//!
//! Each monitored identity gets its own `MonitorActor` running as an
//! independent Tokio task. Cycles for different identities proceed fully
//! in parallel and share no per-identity state; within one actor, cycles
//! are strictly sequential — the actor loop cannot start cycle N+1 while
//! cycle N is still awaiting anything.
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel for control
//!    messages (run now, change interval, shutdown)
//! 2. **Request/Response**: oneshot channels carry the typed cycle report
//!    back to callers that want to know *why* a cycle produced no alerts
//!
//! The `MonitorSupervisor` (see `crate::supervisor`) owns the handles and
//! enforces the one-actor-per-identity invariant.

pub mod messages;
pub mod monitor;
