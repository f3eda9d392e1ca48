//! Discovery controller: background worker, state machine, follow-up
//! query set, and the `services_discovered`/`browsing_state_changed`
//! callbacks.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::socket::{self, Socket, MDNS_PORT};
use crate::wire::{self, Frame};

const DEFAULT_MAX_SOCKETS: usize = 32;
const DEFAULT_QUERY_INTERVAL: Duration = Duration::from_millis(2500);
const DEFAULT_SELECT_TIMEOUT: Duration = Duration::from_millis(100);
const DEFAULT_WORKER_SLEEP: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub port: u16,
    pub max_sockets: usize,
    pub query_interval: Duration,
    pub select_timeout: Duration,
    pub worker_sleep: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            port: MDNS_PORT,
            max_sockets: DEFAULT_MAX_SOCKETS,
            query_interval: DEFAULT_QUERY_INTERVAL,
            select_timeout: DEFAULT_SELECT_TIMEOUT,
            worker_sleep: DEFAULT_WORKER_SLEEP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum State {
    Idle = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

struct HandleInner {
    follow_up: Mutex<Vec<String>>,
    last_query_time: Mutex<Instant>,
    query_interval: Duration,
}

/// Shared handle into the controller's follow-up query set and query
/// scheduler. Cloning is cheap; every clone refers to the same state.
/// Handed to the aggregator so it can promote PTR targets into queries
/// without the controller needing to know about the aggregator.
#[derive(Clone)]
pub struct DiscoveryHandle {
    inner: Arc<HandleInner>,
}

impl DiscoveryHandle {
    pub(crate) fn new(query_interval: Duration) -> Self {
        DiscoveryHandle {
            inner: Arc::new(HandleInner {
                follow_up: Mutex::new(vec!["_services._dns-sd._udp.local".to_string()]),
                last_query_time: Mutex::new(Instant::now() - query_interval),
                query_interval,
            }),
        }
    }

    pub fn add_follow_up(&self, name: &str) {
        let mut set = self.inner.follow_up.lock().unwrap();
        if !set.iter().any(|n| n == name) {
            set.push(name.to_string());
        }
    }

    pub fn remove_follow_up(&self, name: &str) {
        let mut set = self.inner.follow_up.lock().unwrap();
        set.retain(|n| n != name);
    }

    pub fn follow_up_set(&self) -> Vec<String> {
        self.inner.follow_up.lock().unwrap().clone()
    }

    pub fn schedule_query_now(&self) {
        let mut t = self.inner.last_query_time.lock().unwrap();
        *t = Instant::now() - self.inner.query_interval;
    }

    pub(crate) fn due_for_query(&self) -> bool {
        let t = self.inner.last_query_time.lock().unwrap();
        t.elapsed() >= self.inner.query_interval
    }

    pub(crate) fn mark_queried(&self) {
        *self.inner.last_query_time.lock().unwrap() = Instant::now();
    }
}

type ServicesCallback = Box<dyn Fn(Vec<Frame>) + Send + Sync>;
type StateCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Owns the background worker thread for one browse session: the
/// periodic query / receive / dispatch cycle, the follow-up query set,
/// and the `Idle -> Starting -> Running -> Stopping -> Idle` state
/// machine.
pub struct DiscoveryController {
    config: DiscoveryConfig,
    state: AtomicU8,
    handle: DiscoveryHandle,
    cancel: Mutex<CancellationToken>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
    services_cb: Arc<Mutex<Option<ServicesCallback>>>,
    state_cb: Mutex<Option<StateCallback>>,
}

impl DiscoveryController {
    pub fn new(config: DiscoveryConfig) -> Self {
        DiscoveryController {
            handle: DiscoveryHandle::new(config.query_interval),
            config,
            state: AtomicU8::new(State::Idle as u8),
            cancel: Mutex::new(CancellationToken::new()),
            worker: Mutex::new(None),
            services_cb: Arc::new(Mutex::new(None)),
            state_cb: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> DiscoveryHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == State::Running as u8
    }

    pub fn subscribe_services<F>(&self, cb: F)
    where
        F: Fn(Vec<Frame>) + Send + Sync + 'static,
    {
        *self.services_cb.lock().unwrap() = Some(Box::new(cb));
    }

    pub fn subscribe_state<F>(&self, cb: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        *self.state_cb.lock().unwrap() = Some(Box::new(cb));
    }

    pub fn add_follow_up(&self, name: &str) {
        self.handle.add_follow_up(name);
    }

    pub fn remove_follow_up(&self, name: &str) {
        self.handle.remove_follow_up(name);
    }

    pub fn follow_up_set(&self) -> Vec<String> {
        self.handle.follow_up_set()
    }

    pub fn schedule_query_now(&self) {
        self.handle.schedule_query_now();
    }

    fn fire_state(&self, running: bool) {
        if let Some(cb) = self.state_cb.lock().unwrap().as_ref() {
            cb(running);
        }
    }

    pub fn start(&self) {
        if self
            .state
            .compare_exchange(
                State::Idle as u8,
                State::Starting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            log::info!("start_browse called while not idle; ignoring");
            return;
        }

        match socket::open_per_interface(self.config.max_sockets, self.config.port) {
            Ok(sockets) => {
                let fresh = CancellationToken::new();
                *self.cancel.lock().unwrap() = fresh;
                self.state.store(State::Running as u8, Ordering::SeqCst);
                self.fire_state(true);
                self.spawn_worker(sockets);
            }
            Err(err) => {
                log::error!("start_browse failed: {err}");
                self.state.store(State::Idle as u8, Ordering::SeqCst);
                self.fire_state(false);
            }
        }
    }

    pub fn stop(&self) {
        if self
            .state
            .compare_exchange(
                State::Running as u8,
                State::Stopping as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            log::info!("stop_browse called while not running; ignoring");
            return;
        }

        self.cancel.lock().unwrap().cancel();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.state.store(State::Idle as u8, Ordering::SeqCst);
        self.fire_state(false);
    }

    fn spawn_worker(&self, sockets: Vec<Socket>) {
        let cancel = self.cancel.lock().unwrap().clone();
        let handle = self.handle.clone();
        let config = self.config;
        let services_cb = self.services_cb.clone();

        let join = std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build mdns worker runtime");
            rt.block_on(worker_loop(sockets, cancel, handle, config, services_cb));
        });

        *self.worker.lock().unwrap() = Some(join);
    }
}

async fn worker_loop(
    sockets: Vec<Socket>,
    cancel: CancellationToken,
    handle: DiscoveryHandle,
    config: DiscoveryConfig,
    services_cb: Arc<Mutex<Option<ServicesCallback>>>,
) {
    loop {
        if handle.due_for_query() {
            let names = handle.follow_up_set();
            let query = wire::build_query(&names);
            for sock in &sockets {
                if let Err(err) = socket::send_multicast(sock, &query).await {
                    log::warn!("send_multicast failed: {err}");
                }
            }
            handle.mark_queried();
        }

        let datagrams = socket::receive_once(&sockets, config.select_timeout).await;

        let mut frames = Vec::with_capacity(datagrams.len());
        for (_idx, bytes, source) in datagrams {
            match wire::decode_frame(&bytes, source, Instant::now()) {
                Ok(frame) => frames.push(frame),
                Err(err) => log::warn!("dropping malformed frame from {source}: {err}"),
            }
        }

        if let Some(cb) = services_cb.lock().unwrap().as_ref() {
            cb(frames);
        }

        tokio::time::sleep(config.worker_sleep).await;

        if cancel.is_cancelled() {
            break;
        }
    }

    for sock in sockets {
        socket::close(sock);
    }
}

impl Drop for DiscoveryController {
    fn drop(&mut self) {
        if self.is_running() {
            self.cancel.lock().unwrap().cancel();
            if let Some(handle) = self.worker.lock().unwrap().take() {
                let _ = handle.join();
            }
        }
    }
}
