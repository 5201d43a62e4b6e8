//! Panic logging.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, PanicHookInfo};
use std::thread;

/// Installs a global panic hook that logs panics via `tracing`, then defers
/// to the previous hook.
///
/// Panics in per-event and per-update tasks are isolated by their `JoinSet`;
/// this hook adds the location and backtrace to the log.
pub fn install() {
    let previous_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        // A panicking subscriber must not turn this into an abort.
        let _ = panic::catch_unwind(panic::AssertUnwindSafe(|| log_panic(info)));
        previous_hook(info);
    }));
}

fn log_panic(info: &PanicHookInfo<'_>) {
    let location = info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "<unknown>".to_string());
    let thread = thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_string();

    tracing::error!(
        target: "frigate_relay::panic",
        thread = %thread,
        location = %location,
        payload = %caught_payload_to_string(info.payload()),
        "PANIC\nBacktrace:\n{}",
        Backtrace::capture()
    );
}

/// Text of a panic payload, from the hook, a `JoinError` or `catch_unwind`.
pub fn caught_payload_to_string(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "<non-string panic payload>".to_string()
}
