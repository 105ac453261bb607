use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use basketbot_core::{ConversationRuntime, InboundEvent, UserId};

/// Consumer of normalized events. Errors are the handler's business: by the time `handle`
/// returns, the user has been answered and the failure logged.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent);
}

#[async_trait]
impl UpdateHandler for ConversationRuntime {
    async fn handle(&self, event: InboundEvent) {
        // Failures were already replied to and logged inside the runtime.
        let _ = ConversationRuntime::handle(self, event).await;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// A worker with nothing to do for this long exits; the next event respawns it.
    pub idle_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self { idle_timeout: Duration::from_secs(300), shutdown_timeout: Duration::from_secs(15) }
    }
}

struct Worker {
    generation: u64,
    sender: mpsc::UnboundedSender<InboundEvent>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Workers {
    by_user: HashMap<UserId, Worker>,
    closed: bool,
}

struct Shared {
    handler: Arc<dyn UpdateHandler>,
    settings: DispatcherSettings,
    workers: Mutex<Workers>,
    generations: AtomicU64,
}

impl Shared {
    fn workers(&self) -> MutexGuard<'_, Workers> {
        match self.workers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Routes events to one worker task per user. Events of a user are handled one at a time in
/// arrival order; different users run in parallel.
#[derive(Clone)]
pub struct UserDispatcher {
    shared: Arc<Shared>,
}

impl UserDispatcher {
    pub fn new(handler: Arc<dyn UpdateHandler>, settings: DispatcherSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                handler,
                settings,
                workers: Mutex::new(Workers::default()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Queues the event on the user's worker, spawning one if none is alive.
    /// Returns `false` once the dispatcher has been shut down.
    pub fn dispatch(&self, event: InboundEvent) -> bool {
        let user_id = event.user_id;
        let mut workers = self.shared.workers();
        if workers.closed {
            warn!(
                event_name = "ingress.telegram.dispatch_rejected",
                correlation_id = %event.correlation_id,
                user_id = %user_id,
                "dispatcher is shut down; event dropped"
            );
            return false;
        }

        let event = match workers.by_user.get(&user_id) {
            Some(worker) => match worker.sender.send(event) {
                Ok(()) => return true,
                Err(mpsc::error::SendError(event)) => {
                    warn!(
                        event_name = "ingress.telegram.worker_respawned",
                        user_id = %user_id,
                        "user worker stopped unexpectedly; respawning"
                    );
                    event
                }
            },
            None => event,
        };

        let worker = self.spawn_worker(user_id);
        // A fresh receiver is alive, so this send cannot fail.
        let _ = worker.sender.send(event);
        workers.by_user.insert(user_id, worker);
        true
    }

    pub fn active_workers(&self) -> usize {
        self.shared.workers().by_user.len()
    }

    /// Stops accepting events, lets every worker drain its queue and waits for them up to the
    /// configured shutdown timeout.
    pub async fn shutdown(&self) {
        let drained: Vec<(UserId, JoinHandle<()>)> = {
            let mut workers = self.shared.workers();
            workers.closed = true;
            workers.by_user.drain().map(|(user_id, worker)| (user_id, worker.task)).collect()
        };
        let pending = drained.len();

        let deadline = tokio::time::Instant::now() + self.shared.settings.shutdown_timeout;
        for (user_id, mut task) in drained {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                warn!(
                    event_name = "ingress.telegram.worker_abandoned",
                    user_id = %user_id,
                    "user worker did not finish before the shutdown timeout"
                );
                task.abort();
            }
        }
        info!(
            event_name = "ingress.telegram.dispatcher_stopped",
            workers = pending,
            "dispatcher stopped"
        );
    }

    fn spawn_worker(&self, user_id: UserId) -> Worker {
        let generation = self.shared.generations.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(run_worker(shared, user_id, generation, receiver));
        debug!(
            event_name = "ingress.telegram.worker_spawned",
            user_id = %user_id,
            generation,
            "user worker spawned"
        );
        Worker { generation, sender, task }
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    user_id: UserId,
    generation: u64,
    mut receiver: mpsc::UnboundedReceiver<InboundEvent>,
) {
    loop {
        match tokio::time::timeout(shared.settings.idle_timeout, receiver.recv()).await {
            Ok(Some(event)) => shared.handler.handle(event).await,
            Ok(None) => return,
            Err(_elapsed) => {
                // Senders only push while holding the map lock, so an empty queue observed
                // under the lock stays empty until the entry is gone.
                let mut workers = shared.workers();
                if !receiver.is_empty() {
                    continue;
                }
                let owns_entry = workers
                    .by_user
                    .get(&user_id)
                    .is_some_and(|worker| worker.generation == generation);
                if owns_entry {
                    workers.by_user.remove(&user_id);
                }
                debug!(
                    event_name = "ingress.telegram.worker_idle_exit",
                    user_id = %user_id,
                    generation,
                    "user worker went idle"
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use basketbot_core::{InboundEvent, UserId};

    use super::{DispatcherSettings, UpdateHandler, UserDispatcher};

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<(UserId, String)>>,
        delay: Duration,
    }

    #[async_trait]
    impl UpdateHandler for RecordingHandler {
        async fn handle(&self, event: InboundEvent) {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.seen.lock().await.push((event.user_id, event.payload));
        }
    }

    fn settings(idle_ms: u64) -> DispatcherSettings {
        DispatcherSettings {
            idle_timeout: Duration::from_millis(idle_ms),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn events_of_one_user_keep_arrival_order() {
        let handler =
            Arc::new(RecordingHandler { delay: Duration::from_millis(2), ..Default::default() });
        let dispatcher = UserDispatcher::new(handler.clone(), settings(1_000));

        for index in 0..20 {
            assert!(dispatcher.dispatch(InboundEvent::text(UserId(1), index.to_string())));
        }
        dispatcher.shutdown().await;

        let seen = handler.seen.lock().await;
        let payloads: Vec<String> = seen.iter().map(|(_, payload)| payload.clone()).collect();
        let expected: Vec<String> = (0..20).map(|index: i32| index.to_string()).collect();
        assert_eq!(payloads, expected);
    }

    #[tokio::test]
    async fn each_user_gets_a_dedicated_worker() {
        let handler =
            Arc::new(RecordingHandler { delay: Duration::from_millis(50), ..Default::default() });
        let dispatcher = UserDispatcher::new(handler.clone(), settings(1_000));

        for user in 1..=3 {
            dispatcher.dispatch(InboundEvent::text(UserId(user), "hi"));
        }
        assert_eq!(dispatcher.active_workers(), 3);

        dispatcher.shutdown().await;
        assert_eq!(handler.seen.lock().await.len(), 3);
        assert_eq!(dispatcher.active_workers(), 0);
    }

    #[tokio::test]
    async fn idle_worker_exits_and_is_respawned_on_next_event() {
        let handler = Arc::new(RecordingHandler::default());
        let dispatcher = UserDispatcher::new(handler.clone(), settings(20));

        dispatcher.dispatch(InboundEvent::text(UserId(9), "first"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(dispatcher.active_workers(), 0);

        dispatcher.dispatch(InboundEvent::text(UserId(9), "second"));
        dispatcher.shutdown().await;

        let seen = handler.seen.lock().await;
        let payloads: Vec<&str> = seen.iter().map(|(_, payload)| payload.as_str()).collect();
        assert_eq!(payloads, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn dispatch_after_shutdown_is_rejected() {
        let handler = Arc::new(RecordingHandler::default());
        let dispatcher = UserDispatcher::new(handler.clone(), settings(1_000));
        dispatcher.shutdown().await;

        assert!(!dispatcher.dispatch(InboundEvent::text(UserId(1), "late")));
        assert!(handler.seen.lock().await.is_empty());
    }
}
