//! Progress, log and list-changed channels
//!
//! Each call gets its own `CallEmitter` / `CallEvents` pair: progress and
//! log records travel on two independent ordered streams, so there is no
//! ordering guarantee between a progress event and a log record.
//! List-changed notifications are not tied to a call and go through the
//! broadcast `ListChangedNotifier`.

mod emitter;
mod notify;

pub use emitter::{call_channel, CallEmitter, CallEvents};
pub use notify::{ListChanged, ListChangedNotifier, ListChangedReceiver};
