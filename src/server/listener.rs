// Listener socket module
// Creates the non-blocking listening endpoint the loop serves

use std::io;
use std::net::SocketAddr;

use mio::net::TcpListener;
use socket2::{Domain, Protocol, Socket, Type};

use crate::error::{ListenerError, ListenerStep};

/// Create a non-blocking `TcpListener` with `SO_REUSEADDR` enabled.
///
/// Any failure here is fatal for the process; the listener is never
/// rebound while the loop runs.
///
/// # Arguments
///
/// * `addr` - The socket address to bind to
/// * `backlog` - Queue depth passed to `listen()`
pub fn open(addr: SocketAddr, backlog: u32) -> Result<TcpListener, ListenerError> {
    // Create socket with appropriate domain (IPv4 or IPv6)
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .map_err(step_error(ListenerStep::Socket, addr))?;

    // Allow binding to a port in TIME_WAIT state, so a restart can rebind at once
    socket
        .set_reuse_address(true)
        .map_err(step_error(ListenerStep::Options, addr))?;

    socket
        .set_nonblocking(true)
        .map_err(step_error(ListenerStep::Options, addr))?;

    socket
        .bind(&addr.into())
        .map_err(step_error(ListenerStep::Bind, addr))?;

    let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
    socket
        .listen(backlog)
        .map_err(step_error(ListenerStep::Listen, addr))?;

    let std_listener: std::net::TcpListener = socket.into();
    Ok(TcpListener::from_std(std_listener))
}

/// Tag an I/O failure with the setup step and address it happened on
fn step_error(step: ListenerStep, addr: SocketAddr) -> impl FnOnce(io::Error) -> ListenerError {
    move |source| ListenerError { step, addr, source }
}
