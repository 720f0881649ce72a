// Server loop module
// Single-threaded readiness loop: admits connections into the slot table,
// answers readable slots, and reacts to shutdown/reload requests

use std::io;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use super::connection::{self, Connection};
use super::control::ControlBridge;
use super::host::HostProbe;
use super::listener;
use super::slots::{Rejected, SlotIndex, SlotTable};
use super::stats::ServerStats;
use crate::config::{Config, ConfigSource, ListenSettings};
use crate::error::StartupError;
use crate::logger;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
/// Slot `i` is registered as `Token(SLOT_BASE + i)`
const SLOT_BASE: usize = 2;

const EVENTS_CAPACITY: usize = 1024;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// `request_shutdown()` was observed at the top of a tick
    Shutdown,
    /// The host probe reported the host gone; exit without cleanup
    HostDied,
}

impl LoopExit {
    /// Process exit status for a standalone run
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Shutdown => 0,
            Self::HostDied => 1,
        }
    }
}

const fn slot_token(index: SlotIndex) -> Token {
    Token(SLOT_BASE + index)
}

/// The readiness multiplexer.
///
/// Owns the listener and every admitted connection. Nothing in here is
/// shared with another thread except the [`ControlBridge`] and the
/// [`ServerStats`] counters.
pub struct ServerLoop {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    local_addr: SocketAddr,
    /// What the listener was actually created with
    listen: ListenSettings,
    slots: SlotTable<Connection>,
    /// Readable slots of the current tick, reused across ticks
    ready: Vec<SlotIndex>,
    /// An accept succeeded last tick, so more connections may be queued
    accept_pending: bool,
    config: Config,
    source: Box<dyn ConfigSource>,
    host: Box<dyn HostProbe>,
    bridge: Arc<ControlBridge>,
    stats: Arc<ServerStats>,
}

impl ServerLoop {
    /// Validate the configuration and open the listener it describes
    pub fn new(
        config: Config,
        source: impl ConfigSource + 'static,
        host: impl HostProbe + 'static,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let addr = config.socket_addr()?;
        let listener = listener::open(addr, config.server.queue_depth)?;
        Self::from_listener(listener, config, source, host)
    }

    /// Serve an already opened listener.
    ///
    /// The configuration's host and port are ignored in favour of the
    /// listener's own address. Its logging level takes effect immediately.
    pub fn from_listener(
        mut listener: TcpListener,
        config: Config,
        source: impl ConfigSource + 'static,
        host: impl HostProbe + 'static,
    ) -> Result<Self, StartupError> {
        logger::apply_level(&config);

        let poll = Poll::new().map_err(StartupError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(StartupError::Poll)?;
        let bridge =
            Arc::new(ControlBridge::new(poll.registry(), WAKER).map_err(StartupError::Poll)?);

        let local_addr = listener.local_addr().map_err(StartupError::Poll)?;
        let listen = ListenSettings {
            host: local_addr.ip().to_string(),
            port: local_addr.port(),
            queue_depth: config.server.queue_depth,
        };

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            listener,
            local_addr,
            listen,
            slots: SlotTable::new(config.capacity()),
            ready: Vec::new(),
            accept_pending: false,
            config,
            source: Box::new(source),
            host: Box::new(host),
            bridge,
            stats: Arc::new(ServerStats::new()),
        })
    }

    /// Handle for requesting shutdown or reload from other threads
    pub fn bridge(&self) -> Arc<ControlBridge> {
        Arc::clone(&self.bridge)
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run ticks until shutdown or host death.
    ///
    /// Connections still occupying slots when shutdown is observed are not
    /// drained: they are closed without a response when the loop is dropped.
    pub fn run(mut self) -> LoopExit {
        loop {
            if let ControlFlow::Break(exit) = self.tick() {
                return exit;
            }
        }
    }

    /// One wait-and-act cycle
    pub fn tick(&mut self) -> ControlFlow<LoopExit> {
        if self.bridge.shutdown_requested() {
            let abandoned: Vec<SlotIndex> = self.slots.occupied_indices().collect();
            logger::log_shutdown(&self.stats.snapshot(), &abandoned);
            return ControlFlow::Break(LoopExit::Shutdown);
        }
        self.stats.record_tick();

        // Queued connections produce no new edge, so retry without waiting
        let timeout = if self.accept_pending {
            Duration::ZERO
        } else {
            self.config.poll_interval()
        };
        let waited = self.poll.poll(&mut self.events, Some(timeout));

        if !self.host.host_alive() {
            logger::log_host_died();
            return ControlFlow::Break(LoopExit::HostDied);
        }

        if self.bridge.take_reload() {
            self.reload();
        }

        if let Err(e) = waited {
            if e.kind() != io::ErrorKind::Interrupted {
                logger::log_poll_error(&e);
            }
            return ControlFlow::Continue(());
        }

        let mut listener_ready = self.accept_pending;
        self.ready.clear();
        for event in &self.events {
            match event.token() {
                LISTENER => listener_ready = true,
                WAKER => {}
                Token(n) => self.ready.push(n - SLOT_BASE),
            }
        }
        self.ready.sort_unstable();
        self.ready.dedup();

        // Listener before slots; a slot admitted now is first polled next tick
        if listener_ready {
            self.accept_one();
        }

        let ready = std::mem::take(&mut self.ready);
        for &index in &ready {
            self.service_slot(index);
        }
        self.ready = ready;

        self.stats.set_occupied(self.slots.occupied());
        ControlFlow::Continue(())
    }

    /// Accept at most one pending connection and try to give it a slot
    fn accept_one(&mut self) {
        let (stream, peer_addr) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                self.accept_pending = false;
                return;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                self.accept_pending = true;
                return;
            }
            Err(e) => {
                logger::log_accept_error(&e);
                self.accept_pending = false;
                return;
            }
        };
        self.accept_pending = true;

        let index = match self.slots.try_admit(Connection::new(stream, peer_addr)) {
            Ok(index) => index,
            Err(Rejected(conn)) => {
                logger::log_capacity_exceeded(
                    &conn.peer_addr,
                    self.slots.occupied(),
                    self.slots.capacity(),
                );
                self.stats.record_rejected();
                // Dropping closes the socket without sending anything
                drop(conn);
                return;
            }
        };

        let registered = match self.slots.get_mut(index) {
            Some(conn) => self
                .poll
                .registry()
                .register(&mut conn.stream, slot_token(index), Interest::READABLE),
            None => Ok(()),
        };
        if let Err(e) = registered {
            logger::log_warning(&format!(
                "failed to watch connection from {peer_addr}: {e}"
            ));
            self.slots.release(index);
            return;
        }

        self.stats.record_admitted();
        logger::log_connection_admitted(&peer_addr, index);
    }

    /// Answer a readable slot and release it, whatever happened on the wire
    fn service_slot(&mut self, index: SlotIndex) {
        let Some(conn) = self.slots.get_mut(index) else {
            return;
        };

        let report = connection::service(&mut conn.stream);
        if self.config.logging.access_log {
            logger::log_access(
                &report.log_entry(conn, index),
                &self.config.logging.access_log_format,
            );
        }
        if !report.outcome.response_delivered() {
            logger::log_debug(&format!(
                "response to {} not fully sent ({}, {} bytes)",
                conn.peer_addr,
                report.outcome.label(),
                report.bytes_sent
            ));
        }

        if let Some(mut conn) = self.slots.release(index) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
        }
        self.stats.record_served(report.outcome.response_delivered());
    }

    /// Fetch and apply the latest snapshot; keep the current one on error
    fn reload(&mut self) {
        match self.source.load() {
            Ok(next) => self.apply(next),
            Err(e) => logger::log_reload_failed(&e),
        }
    }

    fn apply(&mut self, next: Config) {
        let requested = next.listen_settings();
        if requested.host != self.listen.host {
            logger::log_restart_required("server.host", &self.listen.host, &requested.host);
        }
        if requested.port != self.listen.port {
            logger::log_restart_required(
                "server.port",
                &self.listen.port.to_string(),
                &requested.port.to_string(),
            );
        }
        if requested.queue_depth != self.listen.queue_depth {
            logger::log_restart_required(
                "server.queue_depth",
                &self.listen.queue_depth.to_string(),
                &requested.queue_depth.to_string(),
            );
        }

        // Occupied slots stay put even if the new capacity is smaller
        self.slots.set_capacity(next.capacity());
        logger::apply_level(&next);

        let (generation, applied_at_ms) = self.stats.record_reload();
        logger::log_reload_applied(generation, applied_at_ms, &next);
        self.config = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapshotSource;
    use crate::response::canned_response;
    use crate::server::host::HostWatch;
    use std::io::{Read, Write};
    use std::net::{Shutdown, TcpStream};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::JoinHandle;
    use std::time::Instant;

    const POLL_MS: u64 = 50;

    struct Running {
        addr: SocketAddr,
        bridge: Arc<ControlBridge>,
        stats: Arc<ServerStats>,
        source: SnapshotSource,
        handle: JoinHandle<LoopExit>,
    }

    impl Running {
        fn stop(self) -> LoopExit {
            self.bridge.request_shutdown();
            self.handle.join().unwrap()
        }
    }

    fn test_config(capacity: u32) -> Config {
        let mut cfg = Config::default();
        cfg.server.host = "127.0.0.1".to_string();
        cfg.server.max_sockets = capacity;
        cfg.server.poll_interval_ms = POLL_MS;
        cfg.logging.level = "error".to_string();
        cfg.logging.access_log = false;
        cfg
    }

    /// A loop on an ephemeral port, driven by the caller's own `tick()` calls
    fn build(config: Config) -> ServerLoop {
        let listener = listener::open("127.0.0.1:0".parse().unwrap(), 32).unwrap();
        let source = SnapshotSource::new(config.clone());
        ServerLoop::from_listener(listener, config, source, HostWatch::Detached).unwrap()
    }

    fn start_with(config: Config, host: impl HostProbe + 'static) -> Running {
        let listener = listener::open("127.0.0.1:0".parse().unwrap(), 32).unwrap();
        let source = SnapshotSource::new(config.clone());
        let server = ServerLoop::from_listener(listener, config, source.clone(), host).unwrap();
        let addr = server.local_addr();
        let bridge = server.bridge();
        let stats = server.stats();
        let handle = std::thread::spawn(move || server.run());
        Running {
            addr,
            bridge,
            stats,
            source,
            handle,
        }
    }

    fn start(capacity: u32) -> Running {
        start_with(test_config(capacity), HostWatch::Detached)
    }

    fn wait_for(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn connect(addr: SocketAddr) -> TcpStream {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    /// Everything the server sends before closing; a reset counts as nothing
    fn read_all(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        match stream.read_to_end(&mut buf) {
            Ok(_) => buf,
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => buf,
            Err(e) => panic!("read failed: {e}"),
        }
    }

    fn request(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
        let mut stream = connect(addr);
        stream.write_all(payload).unwrap();
        read_all(&mut stream)
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(LoopExit::Shutdown.exit_code(), 0);
        assert_eq!(LoopExit::HostDied.exit_code(), 1);
    }

    #[test]
    fn test_single_request_gets_canned_response() {
        let server = start(1);
        let reply = request(server.addr, b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        assert_eq!(
            reply,
            b"HTTP/1.0 200 OK\r\nContent-Length: 12\r\n\r\nHello world!"
        );

        wait_for("slot release", || server.stats.occupied() == 0);
        assert_eq!(server.stats.snapshot().served, 1);
        assert_eq!(server.stop(), LoopExit::Shutdown);
    }

    #[test]
    fn test_zero_byte_request_still_answered() {
        let server = start(1);
        let mut stream = connect(server.addr);
        stream.shutdown(Shutdown::Write).unwrap();
        assert_eq!(read_all(&mut stream), canned_response());
        server.stop();
    }

    #[test]
    fn test_payload_never_changes_response() {
        let server = start(2);
        let payloads: [&[u8]; 4] = [
            b"\x00\x01\x02\xff",
            b"POST /x HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc",
            b"not http at all",
            &[b'a'; 1500],
        ];
        for payload in payloads {
            assert_eq!(request(server.addr, payload), canned_response());
        }
        server.stop();
    }

    #[test]
    fn test_full_table_drops_extra_connection() {
        let server = start(1);

        let mut first = connect(server.addr);
        wait_for("first admission", || server.stats.occupied() == 1);

        let mut second = connect(server.addr);
        wait_for("rejection", || server.stats.snapshot().rejected == 1);
        assert!(read_all(&mut second).is_empty());

        first.write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        assert_eq!(read_all(&mut first), canned_response());

        let snap = server.stats.snapshot();
        assert_eq!(snap.accepted, 1);
        assert_eq!(snap.rejected, 1);
        server.stop();
    }

    #[test]
    fn test_capacity_bound_holds() {
        let server = start(3);
        let mut held: Vec<TcpStream> = Vec::new();
        for n in 1..=3 {
            held.push(connect(server.addr));
            wait_for("admission", || server.stats.occupied() == n);
        }

        let mut extra = connect(server.addr);
        wait_for("rejection", || server.stats.snapshot().rejected == 1);
        assert!(read_all(&mut extra).is_empty());
        assert_eq!(server.stats.occupied(), 3);

        for stream in &mut held {
            stream.write_all(b"hi").unwrap();
            assert_eq!(read_all(stream), canned_response());
        }
        wait_for("all released", || server.stats.occupied() == 0);
        server.stop();
    }

    #[cfg(target_os = "linux")]
    fn open_descriptors() -> usize {
        std::fs::read_dir("/proc/self/fd").unwrap().count()
    }

    #[test]
    fn test_thousand_sequential_cycles() {
        let server = start(1);
        #[cfg(target_os = "linux")]
        let descriptors_before = open_descriptors();

        for _ in 0..1000 {
            assert_eq!(request(server.addr, b"ping"), canned_response());
            wait_for("slot release", || server.stats.occupied() == 0);
        }
        let snap = server.stats.snapshot();
        assert_eq!(snap.served, 1000);
        assert_eq!(snap.accepted, 1000);
        assert_eq!(snap.rejected, 0);

        // Other tests share the process table, so allow some slack; a leaked
        // socket per cycle would add a thousand
        #[cfg(target_os = "linux")]
        {
            let descriptors_after = open_descriptors();
            assert!(
                descriptors_after <= descriptors_before + 64,
                "descriptors grew from {descriptors_before} to {descriptors_after}"
            );
        }
        server.stop();
    }

    #[test]
    fn test_tick_admits_one_and_services_ready_slots_in_order() {
        let mut server = build(test_config(3));
        let addr = server.local_addr();
        let stats = server.stats();
        let mut clients: Vec<TcpStream> = (0..3).map(|_| connect(addr)).collect();

        // Three connections queued, one admission per tick
        for expected in 1..=3 {
            assert!(server.tick().is_continue());
            assert_eq!(stats.occupied(), expected);
        }
        for (index, client) in clients.iter().enumerate() {
            let conn = server.slots.get_mut(index).unwrap();
            assert_eq!(conn.peer_addr, client.local_addr().unwrap());
        }

        clients[2].write_all(b"two").unwrap();
        clients[0].write_all(b"zero").unwrap();
        std::thread::sleep(Duration::from_millis(POLL_MS));

        // Both answered within the same tick, lowest index first
        assert!(server.tick().is_continue());
        assert_eq!(server.ready, vec![0, 2]);
        let snap = stats.snapshot();
        assert_eq!(snap.served, 2);
        assert_eq!(snap.occupied, 1);
        assert_eq!(read_all(&mut clients[0]), canned_response());
        assert_eq!(read_all(&mut clients[2]), canned_response());
    }

    #[test]
    fn test_slot_not_serviced_in_its_admission_tick() {
        let mut server = build(test_config(2));
        let stats = server.stats();

        // Data is already waiting when the connection is admitted
        let mut client = connect(server.local_addr());
        client.write_all(b"GET / HTTP/1.0\r\n\r\n").unwrap();
        std::thread::sleep(Duration::from_millis(POLL_MS));

        assert!(server.tick().is_continue());
        let snap = stats.snapshot();
        assert_eq!(snap.occupied, 1);
        assert_eq!(snap.served, 0);
        assert!(server.ready.is_empty());

        for _ in 0..10 {
            if stats.snapshot().served == 1 {
                break;
            }
            assert!(server.tick().is_continue());
        }
        assert_eq!(stats.snapshot().served, 1);
        assert_eq!(stats.occupied(), 0);
        assert_eq!(read_all(&mut client), canned_response());
    }

    #[test]
    fn test_startup_level_applies_without_reload() {
        logger::set_level(logger::Level::Info);
        let _server = build(test_config(1));
        assert_eq!(logger::level(), logger::Level::Error);
    }

    #[test]
    fn test_shutdown_abandons_occupied_slots() {
        let server = start(2);
        let mut idle = connect(server.addr);
        wait_for("admission", || server.stats.occupied() == 1);

        let asked = Instant::now();
        let exit = server.stop();
        assert_eq!(exit, LoopExit::Shutdown);
        assert!(asked.elapsed() < Duration::from_millis(POLL_MS * 20));

        // Closed without a response
        assert!(read_all(&mut idle).is_empty());
    }

    #[test]
    fn test_reload_grows_capacity_for_new_admissions() {
        let server = start(1);
        let mut first = connect(server.addr);
        wait_for("first admission", || server.stats.occupied() == 1);

        let mut next = test_config(2);
        next.server.port = server.addr.port();
        server.source.publish(next);
        server.bridge.request_reload();
        wait_for("reload", || server.stats.snapshot().reloads == 1);
        assert_eq!(server.stats.snapshot().generation, 2);

        let mut second = connect(server.addr);
        wait_for("second admission", || server.stats.occupied() == 2);
        let mut third = connect(server.addr);
        wait_for("rejection", || server.stats.snapshot().rejected == 1);
        assert!(read_all(&mut third).is_empty());

        for stream in [&mut first, &mut second] {
            stream.write_all(b"x").unwrap();
            assert_eq!(read_all(stream), canned_response());
        }
        server.stop();
    }

    #[test]
    fn test_reload_shrink_keeps_occupied_slots() {
        let server = start(2);
        let mut first = connect(server.addr);
        let mut second = connect(server.addr);
        wait_for("two admissions", || server.stats.occupied() == 2);

        let mut next = test_config(1);
        next.server.port = server.addr.port();
        server.source.publish(next);
        server.bridge.request_reload();
        wait_for("reload", || server.stats.snapshot().reloads == 1);
        assert_eq!(server.stats.occupied(), 2);

        first.write_all(b"a").unwrap();
        assert_eq!(read_all(&mut first), canned_response());
        wait_for("first release", || server.stats.occupied() == 1);

        // One live connection already meets the new cap of one
        let mut third = connect(server.addr);
        wait_for("rejection", || server.stats.snapshot().rejected == 1);
        assert!(read_all(&mut third).is_empty());

        second.write_all(b"b").unwrap();
        assert_eq!(read_all(&mut second), canned_response());
        server.stop();
    }

    #[test]
    fn test_invalid_reload_keeps_configuration() {
        let server = start(1);
        let mut bad = test_config(1);
        bad.server.max_sockets = 0;
        server.source.publish(bad);
        server.bridge.request_reload();

        // Wake handled; still serving with the old capacity
        assert_eq!(request(server.addr, b"x"), canned_response());
        let snap = server.stats.snapshot();
        assert_eq!(snap.reloads, 0);
        assert_eq!(snap.generation, 1);
        server.stop();
    }

    #[test]
    fn test_reload_port_change_keeps_listener() {
        let server = start(1);
        let mut next = test_config(1);
        next.server.port = if server.addr.port() == 65_535 {
            1
        } else {
            server.addr.port() + 1
        };
        server.source.publish(next);
        server.bridge.request_reload();
        wait_for("reload", || server.stats.snapshot().reloads == 1);

        assert_eq!(request(server.addr, b"still here?"), canned_response());
        server.stop();
    }

    struct FlagHost(Arc<AtomicBool>);

    impl HostProbe for FlagHost {
        fn host_alive(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_host_death_exits_immediately() {
        let alive = Arc::new(AtomicBool::new(true));
        let server = start_with(test_config(1), FlagHost(Arc::clone(&alive)));
        assert_eq!(request(server.addr, b"x"), canned_response());

        alive.store(false, Ordering::SeqCst);
        let exit = server.handle.join().unwrap();
        assert_eq!(exit, LoopExit::HostDied);
    }

    #[test]
    fn test_tick_is_bounded_without_activity() {
        let server = start(1);
        wait_for("several idle ticks", || server.stats.snapshot().ticks >= 3);
        server.stop();
    }
}
