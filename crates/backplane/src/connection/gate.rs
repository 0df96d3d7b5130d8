//! In-flight command tracking used by `close`.

use std::future::Future;

use tokio::sync::{watch, Semaphore};

use backplane_core::connection::{ConnectionError, Result};

/// Permits handed out to commands. Large enough to never limit concurrency.
const GATE_PERMITS: u32 = u32::MAX >> 4;

/// Tracks running commands so a close can either wait for them or cancel them.
pub(crate) struct CommandGate {
    permits: Semaphore,
    cancel: watch::Sender<bool>,
}

impl CommandGate {
    pub(crate) fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            permits: Semaphore::new(GATE_PERMITS as usize),
            cancel,
        }
    }

    /// Runs `command` while holding a permit.
    ///
    /// Resolves with `ConnectionError::Closed` if the gate is closed before
    /// the command starts or aborted while it runs.
    pub(crate) async fn run<F, T>(&self, command: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ConnectionError::Closed)?;

        let mut cancel = self.cancel.subscribe();

        tokio::select! {
            result = command => result,
            _ = cancelled(&mut cancel) => Err(ConnectionError::Closed),
        }
    }

    /// Waits for every running command, then rejects new ones.
    pub(crate) async fn drain(&self) {
        let permit = self.permits.acquire_many(GATE_PERMITS).await;
        self.permits.close();
        drop(permit);
    }

    /// Rejects new commands and cancels running ones.
    pub(crate) fn abort(&self) {
        self.permits.close();
        self.cancel.send_replace(true);
    }

    /// Number of commands currently holding a permit.
    pub(crate) fn in_flight(&self) -> usize {
        if self.permits.is_closed() {
            return 0;
        }
        GATE_PERMITS as usize - self.permits.available_permits()
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_run_returns_command_result() {
        let gate = CommandGate::new();
        let result = gate.run(async { Ok::<_, ConnectionError>(7) }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_abort_cancels_running_command() {
        let gate = Arc::new(CommandGate::new());

        let running = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.run(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok::<_, ConnectionError>(())
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gate.in_flight(), 1);

        gate.abort();

        let result = running.await.unwrap();
        assert_eq!(result, Err(ConnectionError::Closed));
    }

    #[tokio::test]
    async fn test_drain_waits_for_running_command() {
        let gate = Arc::new(CommandGate::new());
        let finished = Arc::new(AtomicBool::new(false));

        let running = {
            let gate = Arc::clone(&gate);
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                gate.run(async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    finished.store(true, Ordering::SeqCst);
                    Ok::<_, ConnectionError>("done")
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.drain().await;

        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(running.await.unwrap(), Ok("done"));
    }

    #[tokio::test]
    async fn test_closed_gate_rejects_new_commands() {
        let gate = CommandGate::new();
        gate.drain().await;

        let result = gate.run(async { Ok::<_, ConnectionError>(()) }).await;
        assert_eq!(result, Err(ConnectionError::Closed));
    }
}
