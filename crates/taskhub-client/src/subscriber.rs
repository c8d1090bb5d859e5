//! Reconnecting live-update subscription.

use std::sync::Arc;

use parking_lot::Mutex;
use taskhub_core::Envelope;
use taskhub_core::events::UPDATE_TASK_NOTICE;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;
use crate::dispatch::EventDispatcher;
use crate::errors::{ClientError, TransportError};
use crate::state::ConnectionState;
use crate::transport::{Connector, Link, LinkEvent};

const TRANSITION_BUFFER: usize = 64;

struct Inner {
    connector: Arc<dyn Connector>,
    config: ReconnectConfig,
    dispatcher: Arc<EventDispatcher>,
    state: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
}

impl Inner {
    fn set_state(&self, next: ConnectionState) {
        debug!(state = %next, "subscription state");
        let _ = self.state.send_replace(next.clone());
        let _ = self.transitions.send(next);
    }

    fn handle_text(&self, text: &str) {
        match Envelope::parse(text) {
            Ok(envelope) => {
                let _ = self.dispatcher.dispatch(envelope);
            }
            Err(e) => warn!(error = %e, "discarding malformed event"),
        }
    }

    /// Pump one open link until it ends. Returns `None` when cancelled.
    async fn run_link(&self, mut link: Link, cancel: &CancellationToken) -> Option<String> {
        *self.outbound.lock() = Some(link.outbound.clone());
        self.set_state(ConnectionState::Open);
        info!("subscription open");

        let reason = loop {
            tokio::select! {
                event = link.inbound.recv() => match event {
                    Some(LinkEvent::Text(text)) => self.handle_text(&text),
                    Some(LinkEvent::Closed) | None => break Some(TransportError::Closed.to_string()),
                    Some(LinkEvent::Error(e)) => break Some(e),
                },
                () = cancel.cancelled() => break None,
            }
        };
        *self.outbound.lock() = None;
        reason
    }

    async fn supervise(self: Arc<Self>, cancel: CancellationToken) {
        let mut failures: u32 = 0;
        loop {
            let attempt = tokio::select! {
                result = self.connector.connect() => result,
                () = cancel.cancelled() => return,
            };

            let reason = match attempt {
                Ok(link) => {
                    failures = 0;
                    match self.run_link(link, &cancel).await {
                        Some(reason) => reason,
                        None => return,
                    }
                }
                Err(e) => e.to_string(),
            };

            warn!(%reason, "subscription interrupted");
            self.set_state(ConnectionState::Error { reason });

            failures += 1;
            if failures > self.config.max_retries {
                warn!(attempts = failures, "reconnection budget exhausted");
                self.set_state(ConnectionState::Failed);
                return;
            }
            let delay = self.config.delay_for(failures);
            info!(attempt = failures, ?delay, "scheduling reconnect");
            self.set_state(ConnectionState::Reconnecting {
                attempt: failures,
                delay,
            });
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return,
            }
            self.set_state(ConnectionState::Connecting);
        }
    }
}

/// A live subscription to the server's mutation channel.
///
/// `connect` starts a supervisor task that opens the transport, dispatches
/// inbound events, and reconnects on failure with delays of `base × n` for
/// the nth consecutive failure. After `max_retries` failed reconnections the
/// subscription parks in [`ConnectionState::Failed`].
pub struct LiveSubscription {
    inner: Arc<Inner>,
    session: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl LiveSubscription {
    /// Create an idle subscription.
    pub fn new<C>(connector: C, config: ReconnectConfig, dispatcher: Arc<EventDispatcher>) -> Self
    where
        C: Connector + 'static,
    {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            inner: Arc::new(Inner {
                connector: Arc::new(connector),
                config,
                dispatcher,
                state,
                transitions,
                outbound: Mutex::new(None),
            }),
            session: Mutex::new(None),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Watch the latest state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Receive every state transition.
    pub fn transitions(&self) -> broadcast::Receiver<ConnectionState> {
        self.inner.transitions.subscribe()
    }

    /// The event dispatcher.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.inner.dispatcher
    }

    /// Start connecting. Allowed from `Idle` or `Failed`; resets the retry
    /// counter.
    pub fn connect(&self) -> Result<(), ClientError> {
        let mut session = self.session.lock();
        let current = self.state();
        if !current.can_connect() {
            return Err(ClientError::AlreadyActive(current));
        }
        if let Some((token, handle)) = session.take() {
            token.cancel();
            handle.abort();
        }
        self.inner.set_state(ConnectionState::Connecting);
        let token = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.inner).supervise(token.clone()));
        *session = Some((token, handle));
        Ok(())
    }

    /// Send an envelope. Only succeeds while `Open`; nothing is queued
    /// otherwise.
    pub fn send(&self, envelope: &Envelope) -> bool {
        if !self.state().is_open() {
            debug!(kind = %envelope.kind, "send while not open, dropping");
            return false;
        }
        let Some(tx) = self.inner.outbound.lock().clone() else {
            return false;
        };
        match envelope.to_json() {
            Ok(json) => tx.try_send(json).is_ok(),
            Err(e) => {
                warn!(error = %e, "failed to encode envelope");
                false
            }
        }
    }

    /// Ask the server to relay a task change to every viewer.
    pub fn notify_task_update(&self, data: serde_json::Value) -> bool {
        self.send(&Envelope::new(UPDATE_TASK_NOTICE, data))
    }

    /// Close the link, cancel any pending reconnect, and return to `Idle`.
    pub async fn disconnect(&self) {
        let session = self.session.lock().take();
        let Some((token, handle)) = session else {
            if self.state() == ConnectionState::Failed {
                self.inner.set_state(ConnectionState::Idle);
            }
            return;
        };
        token.cancel();
        let _ = handle.await;

        let session = self.session.lock();
        if session.is_some() {
            debug!("subscription restarted while closing, keeping the new session");
            return;
        }
        self.inner.set_state(ConnectionState::Closing);
        *self.inner.outbound.lock() = None;
        self.inner.set_state(ConnectionState::Idle);
        drop(session);
        info!("subscription closed");
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        if let Some((token, handle)) = self.session.lock().take() {
            token.cancel();
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use taskhub_core::events::TASK_UPDATE;
    use tokio::time::Instant;


    /// Far ends of a link handed to the test.
    struct Remote {
        outbound: mpsc::Receiver<String>,
        inbound: mpsc::Sender<LinkEvent>,
    }

    struct Scripted {
        plan: Mutex<VecDeque<bool>>,
        calls: Mutex<Vec<Instant>>,
        remotes: mpsc::UnboundedSender<Remote>,
    }

    impl Scripted {
        fn new(plan: &[bool]) -> (Arc<Self>, mpsc::UnboundedReceiver<Remote>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let this = Arc::new(Self {
                plan: Mutex::new(plan.iter().copied().collect()),
                calls: Mutex::new(Vec::new()),
                remotes: tx,
            });
            (this, rx)
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Connector for Scripted {
        async fn connect(&self) -> Result<Link, TransportError> {
            self.calls.lock().push(Instant::now());
            if !self.plan.lock().pop_front().unwrap_or(false) {
                return Err(TransportError::Connect("refused".into()));
            }
            let (out_tx, out_rx) = mpsc::channel(16);
            let (in_tx, in_rx) = mpsc::channel(16);
            let _ = self.remotes.send(Remote {
                outbound: out_rx,
                inbound: in_tx,
            });
            Ok(Link {
                outbound: out_tx,
                inbound: in_rx,
            })
        }
    }

    fn config() -> ReconnectConfig {
        ReconnectConfig {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
        }
    }

    async fn wait_until(sub: &LiveSubscription, want: ConnectionState) {
        let mut rx = sub.watch_state();
        let _ = rx.wait_for(|s| *s == want).await.unwrap();
    }

    fn gaps(calls: &[Instant]) -> Vec<Duration> {
        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_four_failures_with_linear_delays() {
        let (connector, _remotes) = Scripted::new(&[false, false, false, false, true]);
        let sub = LiveSubscription::new(Arc::clone(&connector), config(), Arc::default());
        let mut transitions = sub.transitions();

        sub.connect().unwrap();
        wait_until(&sub, ConnectionState::Open).await;

        let calls = connector.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(
            gaps(&calls),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
                Duration::from_secs(4),
            ]
        );

        let mut delays = Vec::new();
        while let Ok(state) = transitions.try_recv() {
            if let ConnectionState::Reconnecting { delay, .. } = state {
                delays.push(delay.as_secs());
            }
        }
        assert_eq!(delays, vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_fifth_failed_reconnect() {
        let (connector, _remotes) = Scripted::new(&[]);
        let sub = LiveSubscription::new(Arc::clone(&connector), config(), Arc::default());

        sub.connect().unwrap();
        wait_until(&sub, ConnectionState::Failed).await;
        assert_eq!(connector.calls().len(), 6);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(connector.calls().len(), 6);
        assert_eq!(sub.state(), ConnectionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_from_failed_resets_budget() {
        let (connector, _remotes) = Scripted::new(&[]);
        let sub = LiveSubscription::new(
            Arc::clone(&connector),
            ReconnectConfig {
                max_retries: 1,
                base_delay: Duration::from_millis(10),
            },
            Arc::default(),
        );
        sub.connect().unwrap();
        wait_until(&sub, ConnectionState::Failed).await;
        assert_eq!(connector.calls().len(), 2);

        sub.connect().unwrap();
        wait_until(&sub, ConnectionState::Failed).await;
        assert_eq!(connector.calls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn open_resets_failure_counter() {
        let (connector, mut remotes) = Scripted::new(&[false, true, true]);
        let sub = LiveSubscription::new(Arc::clone(&connector), config(), Arc::default());
        sub.connect().unwrap();
        wait_until(&sub, ConnectionState::Open).await;

        let remote = remotes.recv().await.unwrap();
        let mut transitions = sub.transitions();
        remote.inbound.send(LinkEvent::Closed).await.unwrap();
        assert_eq!(
            transitions.recv().await.unwrap(),
            ConnectionState::Error {
                reason: TransportError::Closed.to_string()
            }
        );
        while transitions.recv().await.unwrap() != ConnectionState::Open {}

        let calls = connector.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(gaps(&calls)[1], Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_json_is_discarded() {
        let (connector, mut remotes) = Scripted::new(&[true]);
        let dispatcher = Arc::new(EventDispatcher::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        dispatcher.on(TASK_UPDATE, move |_| {
            let _ = s.fetch_add(1, Ordering::SeqCst);
        });
        let sub = LiveSubscription::new(connector, config(), dispatcher);
        let mut transitions = sub.transitions();
        sub.connect().unwrap();
        wait_until(&sub, ConnectionState::Open).await;
        while transitions.try_recv().is_ok() {}

        let remote = remotes.recv().await.unwrap();
        remote.inbound.send(LinkEvent::Text("{oops".into())).await.unwrap();
        remote
            .inbound
            .send(LinkEvent::Text(r#"{"kind":"task_update","data":{"id":"t1"}}"#.into()))
            .await
            .unwrap();

        for _ in 0..50 {
            if seen.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(sub.state(), ConnectionState::Open);
        assert!(transitions.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn send_only_while_open() {
        let (connector, mut remotes) = Scripted::new(&[true]);
        let sub = LiveSubscription::new(connector, config(), Arc::default());
        assert!(!sub.notify_task_update(json!({"id": "t1"})));

        sub.connect().unwrap();
        wait_until(&sub, ConnectionState::Open).await;
        let mut remote = remotes.recv().await.unwrap();

        assert!(sub.notify_task_update(json!({"id": "t1"})));
        let sent: serde_json::Value =
            serde_json::from_str(&remote.outbound.recv().await.unwrap()).unwrap();
        assert_eq!(sent, json!({"kind": "update_task", "data": {"id": "t1"}}));

        sub.disconnect().await;
        assert!(!sub.notify_task_update(json!({"id": "t2"})));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let (connector, _remotes) = Scripted::new(&[]);
        let sub = LiveSubscription::new(
            Arc::clone(&connector),
            ReconnectConfig {
                max_retries: 5,
                base_delay: Duration::from_secs(10),
            },
            Arc::default(),
        );
        sub.connect().unwrap();
        let mut rx = sub.watch_state();
        let _ = rx
            .wait_for(|s| matches!(s, ConnectionState::Reconnecting { .. }))
            .await
            .unwrap();

        sub.disconnect().await;
        assert_eq!(sub.state(), ConnectionState::Idle);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_releases_transport() {
        let (connector, mut remotes) = Scripted::new(&[true]);
        let sub = LiveSubscription::new(connector, config(), Arc::default());
        let mut transitions = sub.transitions();
        sub.connect().unwrap();
        wait_until(&sub, ConnectionState::Open).await;
        let mut remote = remotes.recv().await.unwrap();

        sub.disconnect().await;
        assert!(remote.outbound.recv().await.is_none());

        let mut seen = Vec::new();
        while let Ok(state) = transitions.try_recv() {
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Open,
                ConnectionState::Closing,
                ConnectionState::Idle,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connect_twice_is_rejected() {
        let (connector, _remotes) = Scripted::new(&[true]);
        let sub = LiveSubscription::new(connector, config(), Arc::default());
        sub.connect().unwrap();
        wait_until(&sub, ConnectionState::Open).await;
        assert_matches!(sub.connect(), Err(ClientError::AlreadyActive(ConnectionState::Open)));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_during_disconnect_keeps_new_session() {
        let (connector, _remotes) = Scripted::new(&[true]);
        let sub = LiveSubscription::new(connector, config(), Arc::default());

        let token = CancellationToken::new();
        let stopping = token.clone();
        let old = tokio::spawn(async move {
            stopping.cancelled().await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        });
        *sub.session.lock() = Some((token, old));
        sub.inner.set_state(ConnectionState::Failed);

        let mut closing = Box::pin(sub.disconnect());
        assert!(futures::poll!(&mut closing).is_pending());

        sub.connect().unwrap();
        closing.await;
        wait_until(&sub, ConnectionState::Open).await;
        tokio::task::yield_now().await;
        assert_eq!(sub.state(), ConnectionState::Open);
        assert!(sub.session.lock().is_some());
    }
}
