//! Supervised tasks: restart a loop whenever it panics
//!
//! The supervisor owns the restart policy. Only the task is replaced; any
//! queue the loop reads from lives outside the task and survives the crash.

use std::any::Any;
use std::future::Future;

use tracing::{debug, warn};

/// Run `spawn_loop` as a task until it returns normally.
///
/// Each panic is reported through `on_panic` with the panic message, then a
/// fresh instance is spawned. Cancellation ends supervision.
pub(crate) async fn supervise<L, LFut, P, PFut>(name: &str, mut spawn_loop: L, mut on_panic: P)
where
    L: FnMut() -> LFut,
    LFut: Future<Output = ()> + Send + 'static,
    P: FnMut(String) -> PFut,
    PFut: Future<Output = ()>,
{
    let mut restarts: u64 = 0;
    loop {
        let handle = tokio::spawn(spawn_loop());
        match handle.await {
            Ok(()) => {
                debug!(task = name, restarts, "Supervised loop exited");
                return;
            }
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                restarts += 1;
                warn!(task = name, restarts, panic = %message, "Loop panicked, restarting");
                on_panic(message).await;
            }
            Err(_) => {
                debug!(task = name, "Supervised loop cancelled");
                return;
            }
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}
