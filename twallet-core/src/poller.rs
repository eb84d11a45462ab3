//! Detection of card activation.
//!
//! Once an instance has been created, its holder activates it by scanning the QR code
//! at an arbitrary later time. The service offers no push notification, so activation
//! is detected by polling the instance status at a fixed interval until either the
//! activation correlation id (`vcCid`) appears or the polling budget is spent.
//!
//! A session ends in exactly one terminal [`PollState`]. The completion callback runs
//! only on [`PollState::Activated`], at most once, and only after the status fetch that
//! observed the id. A failed fetch ends the session instead of being retried.
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::PollConfig;
use crate::error::TwalletError;

/// Notification invoked with the activation correlation id.
///
/// It runs on tokio's blocking pool, so it may block. A panic inside it is logged and
/// does not change the outcome of the session.
pub type ActivationCallback = Box<dyn FnOnce(String) + Send + 'static>;

/// Anything that can report whether an instance has been activated.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    /// Returns the activation correlation id, or `None` while the instance has not
    /// been activated yet.
    async fn fetch_status(&self, instance_id: i64) -> Result<Option<String>, TwalletError>;
}

/// State of an activation polling session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Still polling.
    Running,
    /// The holder activated the card; carries the activation correlation id.
    Activated(String),
    /// The polling budget was spent without observing an activation.
    TimedOut,
    /// A status fetch failed; carries the error message.
    Failed(String),
    /// The session was cancelled through its handle.
    Cancelled,
}

impl PollState {
    /// Whether the session has ended.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Handle on a detached polling session.
///
/// Dropping the handle leaves the session running.
#[derive(Debug)]
pub struct ActivationHandle {
    instance_id: i64,
    cancel: CancellationToken,
    state: watch::Receiver<PollState>,
    task: JoinHandle<PollState>,
}

impl ActivationHandle {
    /// The instance being watched.
    #[must_use]
    pub const fn instance_id(&self) -> i64 {
        self.instance_id
    }

    /// Asks the session to stop. Takes effect at the next tick boundary at the latest;
    /// a status fetch in flight is abandoned.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The current state of the session.
    #[must_use]
    pub fn status(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Whether the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the session to reach its terminal state.
    pub async fn wait(self) -> PollState {
        match self.task.await {
            Ok(state) => state,
            Err(err) => {
                log::error!("activation session {} aborted: {err}", self.instance_id);
                let published = self.state.borrow().clone();
                if published.is_terminal() {
                    published
                } else {
                    PollState::Failed(err.to_string())
                }
            }
        }
    }
}

/// One polling session for one instance.
pub struct ActivationPoller<S> {
    source: Arc<S>,
    instance_id: i64,
    config: PollConfig,
}

impl<S: StatusSource> ActivationPoller<S> {
    /// Prepares a session for `instance_id`.
    #[must_use]
    pub const fn new(source: Arc<S>, instance_id: i64, config: PollConfig) -> Self {
        Self {
            source,
            instance_id,
            config,
        }
    }

    /// Starts the session on the current tokio runtime and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TwalletError::Runtime`] when called outside a tokio runtime.
    pub fn spawn(self, on_activated: ActivationCallback) -> Result<ActivationHandle, TwalletError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            TwalletError::Runtime {
                error: err.to_string(),
            }
        })?;

        let instance_id = self.instance_id;
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(PollState::Running);
        let task = runtime.spawn(self.run(cancel.clone(), state_tx, on_activated));

        Ok(ActivationHandle {
            instance_id,
            cancel,
            state: state_rx,
            task,
        })
    }

    async fn run(
        self,
        cancel: CancellationToken,
        state_tx: watch::Sender<PollState>,
        on_activated: ActivationCallback,
    ) -> PollState {
        let state = self.poll(&cancel, &state_tx, on_activated).await;
        state_tx.send_replace(state.clone());
        state
    }

    async fn poll(
        &self,
        cancel: &CancellationToken,
        state_tx: &watch::Sender<PollState>,
        on_activated: ActivationCallback,
    ) -> PollState {
        let interval = self.config.interval();
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut remaining = self.config.ceiling();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return self.cancelled(),
                _ = ticker.tick() => {}
            }

            if remaining.is_zero() {
                log::error!(
                    "CreateVCItemData id={} timeout={}s",
                    self.instance_id,
                    self.config.ceiling().as_secs()
                );
                return PollState::TimedOut;
            }
            remaining = remaining.saturating_sub(interval);

            let status = tokio::select! {
                biased;
                () = cancel.cancelled() => return self.cancelled(),
                status = self.source.fetch_status(self.instance_id) => status,
            };

            match status {
                Err(err) => {
                    log::error!("GetVCItemData id={} error={err}", self.instance_id);
                    return PollState::Failed(err.to_string());
                }
                Ok(None) => {
                    log::debug!(
                        "GetVCItemData id={} not activated, remaining={}s",
                        self.instance_id,
                        remaining.as_secs()
                    );
                }
                Ok(Some(vc_cid)) => {
                    log::info!("CreateVCItemData id={} vcCid={vc_cid}", self.instance_id);
                    state_tx.send_replace(PollState::Activated(vc_cid.clone()));
                    let notified = vc_cid.clone();
                    if let Err(err) =
                        tokio::task::spawn_blocking(move || on_activated(notified)).await
                    {
                        log::error!(
                            "activation callback for {} failed: {err}",
                            self.instance_id
                        );
                    }
                    return PollState::Activated(vc_cid);
                }
            }
        }
    }

    fn cancelled(&self) -> PollState {
        log::info!("activation session {} cancelled", self.instance_id);
        PollState::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Answers each fetch from a script indexed by the (1-based) attempt number.
    struct ScriptedSource<F> {
        calls: AtomicUsize,
        script: F,
    }

    impl<F> ScriptedSource<F>
    where
        F: Fn(usize) -> Result<Option<String>, TwalletError> + Send + Sync + 'static,
    {
        fn new(script: F) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                script,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<F> StatusSource for ScriptedSource<F>
    where
        F: Fn(usize) -> Result<Option<String>, TwalletError> + Send + Sync + 'static,
    {
        async fn fetch_status(&self, _instance_id: i64) -> Result<Option<String>, TwalletError> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            (self.script)(attempt)
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, ActivationCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ActivationCallback = Box::new(move |vc_cid| {
            sink.lock().unwrap().push(vc_cid);
        });
        (seen, callback)
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_sixty_attempts() {
        let source = ScriptedSource::new(|_| Ok(None));
        let (seen, callback) = recorder();
        let started = Instant::now();

        let handle = ActivationPoller::new(Arc::clone(&source), 7, PollConfig::default())
            .spawn(callback)
            .unwrap();
        assert_eq!(handle.status(), PollState::Running);

        assert_eq!(handle.wait().await, PollState::TimedOut);
        assert_eq!(source.calls(), 60);
        assert!(seen.lock().unwrap().is_empty());
        // the 61st tick only observes the exhausted budget
        assert_eq!(started.elapsed(), Duration::from_secs(305));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_on_fourth_tick() {
        let source = ScriptedSource::new(|attempt| {
            Ok((attempt > 3).then(|| "vc-cid-123".to_string()))
        });
        let (seen, callback) = recorder();
        let started = Instant::now();

        let handle = ActivationPoller::new(Arc::clone(&source), 7, PollConfig::default())
            .spawn(callback)
            .unwrap();

        assert_eq!(
            handle.wait().await,
            PollState::Activated("vc-cid-123".to_string())
        );
        assert_eq!(started.elapsed(), Duration::from_secs(20));
        assert_eq!(*seen.lock().unwrap(), vec!["vc-cid-123".to_string()]);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_ends_session() {
        let source = ScriptedSource::new(|attempt| {
            if attempt == 2 {
                Err(TwalletError::Transport {
                    url: "http://localhost/api/vc-item-data/7".to_string(),
                    error: "connection refused".to_string(),
                })
            } else {
                Ok(None)
            }
        });
        let (seen, callback) = recorder();

        let handle = ActivationPoller::new(Arc::clone(&source), 7, PollConfig::default())
            .spawn(callback)
            .unwrap();

        assert!(matches!(handle.wait().await, PollState::Failed(msg) if msg.contains("connection refused")));

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls(), 2);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let source = ScriptedSource::new(|_| Ok(None));
        let (seen, callback) = recorder();

        let handle = ActivationPoller::new(Arc::clone(&source), 7, PollConfig::default())
            .spawn(callback)
            .unwrap();

        time::sleep(Duration::from_millis(12_500)).await;
        assert_eq!(source.calls(), 2);
        handle.cancel();

        assert_eq!(handle.wait().await, PollState::Cancelled);
        assert_eq!(source.calls(), 2);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reports_terminal_state() {
        let source = ScriptedSource::new(|_| Ok(Some("abc".to_string())));
        let (_seen, callback) = recorder();

        let handle = ActivationPoller::new(source, 7, PollConfig::default())
            .spawn(callback)
            .unwrap();
        assert_eq!(handle.instance_id(), 7);

        time::sleep(Duration::from_secs(6)).await;
        assert!(handle.is_finished());
        assert_eq!(handle.status(), PollState::Activated("abc".to_string()));
        assert!(handle.status().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_callback_keeps_activated_state() {
        let source = ScriptedSource::new(|_| Ok(Some("cid".to_string())));
        let callback: ActivationCallback = Box::new(|_: String| panic!("host callback failed"));

        let handle = ActivationPoller::new(Arc::clone(&source), 7, PollConfig::default())
            .spawn(callback)
            .unwrap();

        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(handle.status(), PollState::Activated("cid".to_string()));
        assert_eq!(handle.wait().await, PollState::Activated("cid".to_string()));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_blocking_callback_does_not_stall_runtime() {
        let source = ScriptedSource::new(|_| Ok(Some("cid".to_string())));
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let (seen, record) = recorder();
        let callback: ActivationCallback = Box::new(move |vc_cid: String| {
            release_rx.recv().unwrap();
            record(vc_cid);
        });
        let config =
            PollConfig::new(Duration::from_millis(10), Duration::from_secs(1)).unwrap();

        let handle = ActivationPoller::new(source, 7, config)
            .spawn(callback)
            .unwrap();

        // the callback is parked, yet this single-threaded runtime keeps running
        time::timeout(Duration::from_secs(5), async {
            while handle.status() == PollState::Running {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(handle.status(), PollState::Activated("cid".to_string()));
        assert!(seen.lock().unwrap().is_empty());

        release_tx.send(()).unwrap();
        assert_eq!(handle.wait().await, PollState::Activated("cid".to_string()));
        assert_eq!(*seen.lock().unwrap(), vec!["cid".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_bounds() {
        let source = ScriptedSource::new(|_| Ok(None));
        let (_seen, callback) = recorder();
        let config =
            PollConfig::new(Duration::from_secs(1), Duration::from_secs(3)).unwrap();

        let handle = ActivationPoller::new(Arc::clone(&source), 7, config)
            .spawn(callback)
            .unwrap();

        assert_eq!(handle.wait().await, PollState::TimedOut);
        assert_eq!(source.calls(), 3);
        assert_eq!(u32::try_from(source.calls()).unwrap(), config.max_attempts());
    }

    #[test]
    fn test_spawn_outside_runtime_fails() {
        let source = ScriptedSource::new(|_| Ok(None));
        let err = ActivationPoller::new(source, 7, PollConfig::default())
            .spawn(Box::new(|_: String| {}))
            .unwrap_err();
        assert!(matches!(err, TwalletError::Runtime { .. }));
    }
}
