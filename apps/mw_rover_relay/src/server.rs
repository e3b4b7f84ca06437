//! Accept loop: one thread per connection, stopped by a shared flag.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use mw_pinctrl_gpio::RegisterWindow;
use socket2::{Domain, Protocol, Socket, Type};

use crate::http::{Relay, serve_connection};

const BACKLOG: i32 = 128;
pub const IO_TIMEOUT: Duration = Duration::from_secs(5);
const ACCEPT_POLL: Duration = Duration::from_millis(50);

pub fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;
    Ok(socket.into())
}

/// Serve until `shutdown` is set, then wait for in-flight connections.
pub fn serve<W, G>(listener: TcpListener, relay: Arc<Relay<W, G>>, shutdown: &AtomicBool) -> io::Result<()>
where
    W: Write + Send + 'static,
    G: RegisterWindow + 'static,
{
    listener.set_nonblocking(true)?;
    info!("listening on {}", listener.local_addr()?);

    let mut workers: Vec<JoinHandle<()>> = Vec::new();
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let relay = Arc::clone(&relay);
                let worker = thread::Builder::new()
                    .name(format!("conn-{peer}"))
                    .spawn(move || handle(&relay, stream, peer))?;
                workers.push(worker);
                workers.retain(|w| !w.is_finished());
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => warn!("accept failed: {e}"),
        }
    }

    info!("shutting down, {} connection(s) in flight", workers.len());
    for worker in workers {
        if worker.join().is_err() {
            warn!("a connection thread panicked");
        }
    }
    Ok(())
}

fn handle<W: Write + Send, G: RegisterWindow>(relay: &Relay<W, G>, mut stream: TcpStream, peer: SocketAddr) {
    let prepared = stream
        .set_nonblocking(false)
        .and_then(|()| stream.set_read_timeout(Some(IO_TIMEOUT)))
        .and_then(|()| stream.set_write_timeout(Some(IO_TIMEOUT)));
    if let Err(e) = prepared.and_then(|()| serve_connection(relay, &mut stream)) {
        debug!("{peer}: {e}");
    }
}
