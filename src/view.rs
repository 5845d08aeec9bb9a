use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ViewConfig;
use crate::kernel::event::{Command, ConnectionStatus, Event, Reading, SENSOR_UPDATE};
use crate::kernel::history::HistoryOutcome;
use crate::kernel::phase::Phase;
use crate::kernel::reactor::Reactor;
use crate::kernel::scheduler::SideEffect;
use crate::kernel::state::DashboardSnapshot;
use crate::services::api::{ApiError, Backend};
use crate::services::poller::SummaryPoller;
use crate::stream::{ConnectionManager, Subscription, Transport};

/// Cheap, cloneable remote for the selection UI and renderers.
#[derive(Clone)]
pub struct ViewHandle {
    tx: mpsc::UnboundedSender<Event>,
    snapshots: watch::Receiver<DashboardSnapshot>,
    shutdown: CancellationToken,
}

impl ViewHandle {
    /// Queue a command behind everything already delivered. False once the
    /// view is gone.
    pub fn send(&self, cmd: Command) -> bool {
        self.tx.send(Event::Command(cmd)).is_ok()
    }

    pub fn set_phase(&self, phase: Phase) -> bool {
        self.send(Command::SetPhase(phase))
    }

    pub fn set_patch(&self, patch_id: u32) -> bool {
        self.send(Command::SetPatch(patch_id))
    }

    pub fn load_history(&self) -> bool {
        self.send(Command::LoadHistory)
    }

    pub fn reset(&self) -> bool {
        self.send(Command::Reset)
    }

    pub fn start(&self) -> bool {
        self.send(Command::Start)
    }

    pub fn stop(&self) -> bool {
        self.send(Command::Stop)
    }

    pub fn refresh_overview(&self) -> bool {
        self.send(Command::RefreshOverview)
    }

    pub fn reconnect(&self) -> bool {
        self.send(Command::Reconnect)
    }

    pub fn snapshots(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> DashboardSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Ask the driver to tear down. `run` returns once everything stopped.
    pub fn unmount(&self) {
        self.shutdown.cancel();
    }
}

/// Result of a background close+open cycle: the manager and its fresh handlers.
type Reattached<T> = (ConnectionManager<T>, Vec<Subscription>);

/// One mounted dashboard: owns the reactor, the stream subscription, the
/// summary poller and every in-flight fetch. Nothing it spawned outlives
/// [`FreshnessView::run`].
pub struct FreshnessView<T: Transport, B: Backend> {
    reactor: Reactor,
    backend: B,
    /// `None` while a reconnect task holds the manager.
    connection: Option<ConnectionManager<T>>,
    subscriptions: Vec<Subscription>,
    status: watch::Receiver<ConnectionStatus>,
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
    snapshots: watch::Sender<DashboardSnapshot>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    poller: Option<SummaryPoller>,
    history_task: Option<JoinHandle<()>>,
    aux: JoinSet<()>,
    reconnecting: Option<JoinHandle<Reattached<T>>>,
}

impl<T: Transport, B: Backend> FreshnessView<T, B> {
    /// Explicit init: subscribe, connect, start polling.
    ///
    /// A stream that cannot connect is reported and leaves the view mounted
    /// with a `Failed` status; history and summary keep working.
    pub async fn mount(transport: T, backend: B, config: &ViewConfig) -> (Self, ViewHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reactor = Reactor::new(config.reactor());
        let (snapshots, snapshot_rx) = watch::channel(reactor.snapshot());
        let shutdown = CancellationToken::new();

        let mut connection = ConnectionManager::new(transport, config.reconnect);
        let status = connection.status();
        let subscriptions = attach(&connection, tx.clone());
        if let Err(e) = connection.open().await {
            error!("live stream unavailable: {}", e);
        }

        let mut view = Self {
            reactor,
            backend,
            connection: Some(connection),
            subscriptions,
            status,
            tx: tx.clone(),
            rx,
            snapshots,
            shutdown: shutdown.clone(),
            poll_interval: config.poll_interval,
            poller: None,
            history_task: None,
            aux: JoinSet::new(),
            reconnecting: None,
        };

        let effects = view.reactor.mount();
        view.execute(effects);
        // Pick up whatever status the connect attempt left behind
        let initial = *view.status.borrow_and_update();
        view.dispatch(Event::Connection(initial));
        info!(patch = view.reactor.current().patch_id, phase = %view.reactor.current().phase, "view mounted");

        let handle = ViewHandle {
            tx,
            snapshots: snapshot_rx,
            shutdown,
        };
        (view, handle)
    }

    pub fn reactor(&self) -> &Reactor {
        &self.reactor
    }

    /// Driver loop. One event at a time, in arrival order, until unmount.
    pub async fn run(mut self) -> Reactor {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Ok(()) = self.status.changed() => {
                    let status = *self.status.borrow_and_update();
                    self.dispatch(Event::Connection(status));
                }
                Some(event) = self.rx.recv() => self.dispatch(event),
                Some(joined) = self.aux.join_next(), if !self.aux.is_empty() => {
                    if let Err(e) = joined {
                        if !e.is_cancelled() {
                            warn!("background request task failed: {}", e);
                        }
                    }
                }
                joined = join_reconnect(&mut self.reconnecting), if self.reconnecting.is_some() => {
                    self.reconnecting = None;
                    self.finish_reconnect(joined);
                }
            }
        }

        self.teardown().await;
        self.reactor
    }

    /// Process one event and publish a snapshot if anything changed.
    pub fn dispatch(&mut self, event: Event) {
        let before = self.reactor.state.version;
        let effects = self.reactor.step(event);
        self.execute(effects);
        if self.reactor.state.version != before {
            self.snapshots.send_replace(self.reactor.snapshot());
        }
    }

    fn execute(&mut self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::FetchHistory(ticket) => {
                    self.abort_history();
                    let backend = self.backend.clone();
                    let tx = self.tx.clone();
                    self.history_task = Some(tokio::spawn(async move {
                        let outcome = match backend.history(ticket.selection).await {
                            Ok(body) => HistoryOutcome::classify(body),
                            Err(ApiError::Decode(e)) => HistoryOutcome::Malformed(e.to_string()),
                            Err(e) => HistoryOutcome::Failed(e.to_string()),
                        };
                        let _ = tx.send(Event::HistoryResolved { ticket, outcome });
                    }));
                }
                SideEffect::CancelHistory => self.abort_history(),
                SideEffect::RestartPoller(ticket) => {
                    if let Some(mut old) = self.poller.take() {
                        old.cancel();
                    }
                    self.poller = Some(SummaryPoller::spawn(
                        self.backend.clone(),
                        ticket,
                        self.poll_interval,
                        self.tx.clone(),
                    ));
                }
                SideEffect::StopPoller => {
                    if let Some(mut old) = self.poller.take() {
                        old.cancel();
                    }
                }
                SideEffect::Simulation { phase, action } => {
                    let backend = self.backend.clone();
                    self.aux.spawn(async move {
                        match backend.simulation(phase, action).await {
                            Ok(body) => debug!(%phase, action = action.path(), %body, "simulation command accepted"),
                            Err(e) => warn!(%phase, action = action.path(), "simulation command failed: {}", e),
                        }
                    });
                }
                SideEffect::FetchOverview => {
                    let backend = self.backend.clone();
                    let tx = self.tx.clone();
                    self.aux.spawn(async move {
                        let result = backend.phase_overview().await.map_err(|e| e.to_string());
                        let _ = tx.send(Event::OverviewResolved(result));
                    });
                }
                SideEffect::Reconnect => self.start_reconnect(),
            }
        }
    }

    fn abort_history(&mut self) {
        if let Some(task) = self.history_task.take() {
            task.abort();
        }
    }

    /// Explicit reconnect: tear the channel down and attach fresh handlers.
    ///
    /// CRITICAL: the retry loop runs in its own task. The driver keeps
    /// draining events and honours unmount while it is in progress.
    fn start_reconnect(&mut self) {
        if self.reconnecting.is_some() {
            debug!("reconnect already in progress");
            return;
        }
        let Some(mut connection) = self.connection.take() else {
            warn!("no stream to reconnect");
            return;
        };
        info!("explicit stream reconnect");
        self.subscriptions.clear();
        let tx = self.tx.clone();
        self.reconnecting = Some(tokio::spawn(async move {
            connection.close().await;
            let subscriptions = attach(&connection, tx);
            if let Err(e) = connection.open().await {
                error!("stream reconnect failed: {}", e);
            }
            (connection, subscriptions)
        }));
    }

    fn finish_reconnect(&mut self, joined: Result<Reattached<T>, JoinError>) {
        match joined {
            Ok((connection, subscriptions)) => {
                self.connection = Some(connection);
                self.subscriptions = subscriptions;
            }
            Err(e) => error!("stream reconnect task failed: {}", e),
        }
    }

    async fn teardown(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
        let effects = self.reactor.unmount();
        self.execute(effects);
        self.aux.abort_all();
        while self.aux.join_next().await.is_some() {}
        if let Some(task) = self.reconnecting.take() {
            // An aborted task drops the manager, which releases its handlers
            task.abort();
            if let Ok((connection, subscriptions)) = task.await {
                self.connection = Some(connection);
                self.subscriptions = subscriptions;
            }
        }
        self.subscriptions.clear();
        if let Some(connection) = self.connection.as_mut() {
            connection.close().await;
        }
        info!("view unmounted");
    }
}

async fn join_reconnect<T: Transport>(task: &mut Option<JoinHandle<Reattached<T>>>) -> Result<Reattached<T>, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Register the view's stream handlers. Readings go straight onto the
/// event queue so they interleave with commands in arrival order.
fn attach<T: Transport>(connection: &ConnectionManager<T>, tx: mpsc::UnboundedSender<Event>) -> Vec<Subscription> {
    let sensor = connection.subscribe(SENSOR_UPDATE, move |data| match Reading::deserialize(data) {
        Ok(reading) => {
            let _ = tx.send(Event::Stream(reading));
        }
        Err(e) => warn!("dropping malformed {}: {}", SENSOR_UPDATE, e),
    });
    let welcome = connection.subscribe("welcome", |data| info!(%data, "feed welcome"));
    vec![sensor, welcome]
}
