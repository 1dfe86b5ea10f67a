//! The reference mio-based runtime (spec §6's "Client runtime contract").
//!
//! This is intentionally a thin shell: all of the interesting behavior lives
//! in [`crate::http::connection::Connection`], which never touches a socket
//! directly. This module's only job is to pump bytes between real
//! `mio::tcp::TcpStream`s and `Connection::feed`/`pending_write`/
//! `on_write_finished`, the same accept/poll/read/write loop shape as the
//! teacher's `socket_handler` module, minus its `TaskPool` dispatch — spec §5
//! requires single-threaded, I/O-readiness-driven scheduling, so every
//! callback here runs inline on the poll thread.

use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::Arc;

use log::{debug, info, warn};
use mio::tcp::{TcpListener, TcpStream};
use mio::{Events, Poll, PollOpt, Ready, Token};

use crate::config::Settings;
use crate::http::connection::Connection;
use crate::router::Dispatcher;

const LISTENER: Token = Token(0);
const READ_CHUNK: usize = 8 * 1024;

struct Slot {
    socket: TcpStream,
    conn: Connection,
}

/// A single-threaded, event-driven HTTP server.
pub struct Server {
    listener: TcpListener,
    poll: Poll,
    settings: Arc<Settings>,
    dispatcher: Arc<dyn Dispatcher>,
    slots: HashMap<Token, Slot>,
    next_token: usize,
}

impl Server {
    pub fn bind(settings: Arc<Settings>, dispatcher: Arc<dyn Dispatcher>) -> io::Result<Server> {
        let addr = settings
            .bind_addr
            .parse()
            .map_err(|e| io::Error::new(ErrorKind::InvalidInput, format!("bad bind_addr: {}", e)))?;
        let listener = TcpListener::bind(&addr)?;
        let poll = Poll::new()?;
        poll.register(&listener, LISTENER, Ready::readable(), PollOpt::edge())?;
        Ok(Server { listener, poll, settings, dispatcher, slots: HashMap::new(), next_token: 1 })
    }

    /// Runs the accept/poll loop forever.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(1024);
        loop {
            self.poll.poll(&mut events, None)?;
            let tokens: Vec<(Token, Ready)> = events.iter().map(|e| (e.token(), e.readiness())).collect();
            for (token, readiness) in tokens {
                if token == LISTENER {
                    self.accept_all()?;
                } else {
                    self.handle_event(token, readiness);
                }
            }
        }
    }

    fn accept_all(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((socket, peer_addr)) => {
                    let local_addr = socket.local_addr()?;
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    self.poll.register(
                        &socket,
                        token,
                        Ready::readable() | Ready::writable(),
                        PollOpt::edge(),
                    )?;
                    let conn = Connection::new(
                        peer_addr,
                        local_addr,
                        self.settings.clone(),
                        self.dispatcher.clone(),
                    );
                    debug!("accepted connection from {}", peer_addr);
                    self.slots.insert(token, Slot { socket, conn });
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => {
                    warn!("accept failed: {}", e);
                    return Ok(());
                }
            }
        }
    }

    fn handle_event(&mut self, token: Token, readiness: Ready) {
        let close = {
            let slot = match self.slots.get_mut(&token) {
                Some(slot) => slot,
                None => return,
            };

            if readiness.is_readable() {
                if Self::pump_read(slot) {
                    true
                } else {
                    Self::pump_write(slot);
                    slot.conn.should_close()
                }
            } else if readiness.is_writable() {
                Self::pump_write(slot);
                slot.conn.should_close()
            } else {
                false
            }
        };

        if close {
            self.close(token);
        }
    }

    /// Reads available bytes into the connection. Returns `true` if the
    /// socket should be torn down (peer closed, or a read error).
    fn pump_read(slot: &mut Slot) -> bool {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match slot.socket.read(&mut buf) {
                Ok(0) => return true,
                Ok(n) => slot.conn.feed(&buf[..n]),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return false,
                Err(e) => {
                    warn!("read error: {}", e);
                    return true;
                }
            }
        }
    }

    /// Drains whatever the connection has queued to write. Calls
    /// `on_write_finished` once the buffer is fully flushed, which may queue
    /// more output (the next chunk of a static file, say) to drain in turn.
    fn pump_write(slot: &mut Slot) {
        loop {
            if slot.conn.pending_write().is_empty() {
                return;
            }
            let result = slot.socket.write(slot.conn.pending_write());
            match result {
                Ok(written) => {
                    slot.conn.pending_write().drain(..written);
                    if slot.conn.pending_write().is_empty() {
                        slot.conn.on_write_finished();
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!("write error: {}", e);
                    return;
                }
            }
        }
    }

    fn close(&mut self, token: Token) {
        if let Some(mut slot) = self.slots.remove(&token) {
            slot.conn.shutdown();
            let _ = self.poll.deregister(&slot.socket);
            info!("closed connection {:?}", token);
        }
    }
}
