//! Readiness multiplexer.
//!
//! Wraps `mio::Poll`. mio reports readiness edges; the event loop reads one
//! fixed-size chunk per event, so the multiplexer also re-reports any token the
//! loop marks as not drained (`carry`). Together this gives level-triggered
//! behaviour: a descriptor with unread data is reported on every `wait` until
//! the loop stops carrying it.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use mio::event::Source;
use mio::{Events, Interest, Poll, Token};

use crate::relay::error::RelayError;

/// One entry of a `wait` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
}

impl Readiness {
    fn merge(&mut self, other: Readiness) {
        self.readable |= other.readable;
        self.writable |= other.writable;
    }
}

pub struct Multiplexer {
    poll: Poll,
    events: Events,
    carried: HashMap<Token, Readiness>,
}

impl Multiplexer {
    /// Create a multiplexer that drains at most `max_events` OS events per wait.
    pub fn new(max_events: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(max_events),
            carried: HashMap::new(),
        })
    }

    pub fn register<S>(&self, source: &mut S, token: Token, interest: Interest) -> Result<(), RelayError>
    where
        S: Source + ?Sized,
    {
        self.poll
            .registry()
            .register(source, token, interest)
            .map_err(|source| RelayError::Registration { token, source })
    }

    pub fn reregister<S>(&self, source: &mut S, token: Token, interest: Interest) -> Result<(), RelayError>
    where
        S: Source + ?Sized,
    {
        self.poll
            .registry()
            .reregister(source, token, interest)
            .map_err(|source| RelayError::Registration { token, source })
    }

    /// Stop tracking `source`. Errors are swallowed: the descriptor may already
    /// be gone, and either way no further events arrive for it.
    pub fn deregister<S>(&mut self, source: &mut S, token: Token)
    where
        S: Source + ?Sized,
    {
        self.carried.remove(&token);
        if let Err(e) = self.poll.registry().deregister(source) {
            tracing::trace!(?token, error = %e, "Deregister failed, ignoring");
        }
    }

    /// Report `token` again on the next `wait`, even if the OS reports no new edge.
    pub fn carry(&mut self, token: Token, readable: bool, writable: bool) {
        let readiness = Readiness {
            token,
            readable,
            writable,
        };
        self.carried
            .entry(token)
            .and_modify(|r| r.merge(readiness))
            .or_insert(readiness);
    }

    /// Block until at least one tracked descriptor is ready (or `timeout` passes),
    /// then fill `batch` with this round's readiness.
    ///
    /// While carried readiness is pending the OS is polled without blocking.
    /// `batch` is cleared first; a token appears at most once.
    pub fn wait(&mut self, batch: &mut Vec<Readiness>, timeout: Option<Duration>) -> io::Result<()> {
        batch.clear();

        let timeout = if self.carried.is_empty() {
            timeout
        } else {
            Some(Duration::ZERO)
        };

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => self.events.clear(),
            Err(e) => return Err(e),
        }

        for event in self.events.iter() {
            let mut readiness = Readiness {
                token: event.token(),
                // Errors and hang-ups surface through the next read/write call
                readable: event.is_readable() || event.is_read_closed() || event.is_error(),
                writable: event.is_writable() || event.is_write_closed() || event.is_error(),
            };
            if let Some(carried) = self.carried.remove(&readiness.token) {
                readiness.merge(carried);
            }
            batch.push(readiness);
        }
        batch.extend(self.carried.drain().map(|(_, r)| r));

        Ok(())
    }
}

impl std::fmt::Debug for Multiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multiplexer")
            .field("carried", &self.carried.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mio::net::{TcpListener, TcpStream};
    use std::io::Write;

    const SERVER: Token = Token(0);

    fn wait_for(mux: &mut Multiplexer, token: Token) -> Readiness {
        let mut batch = Vec::new();
        for _ in 0..100 {
            mux.wait(&mut batch, Some(Duration::from_millis(50))).unwrap();
            if let Some(r) = batch.iter().find(|r| r.token == token) {
                return *r;
            }
        }
        panic!("{:?} never became ready", token);
    }

    #[test]
    fn reports_acceptable_listener() {
        let mut mux = Multiplexer::new(16).unwrap();
        let mut listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        mux.register(&mut listener, SERVER, Interest::READABLE).unwrap();

        let _client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();

        let ready = wait_for(&mut mux, SERVER);
        assert!(ready.readable);
    }

    #[test]
    fn carried_token_is_reported_without_os_event() {
        let mut mux = Multiplexer::new(16).unwrap();
        mux.carry(Token(7), true, false);
        mux.carry(Token(7), false, true);

        let mut batch = Vec::new();
        mux.wait(&mut batch, None).unwrap();
        assert_eq!(
            batch,
            vec![Readiness {
                token: Token(7),
                readable: true,
                writable: true
            }]
        );

        // Carried readiness is one-shot
        mux.wait(&mut batch, Some(Duration::from_millis(10))).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn carried_and_os_readiness_merge_into_one_entry() {
        let mut mux = Multiplexer::new(16).unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut stream = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        server_side.write_all(b"ping").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        mux.register(&mut stream, Token(3), Interest::READABLE).unwrap();
        mux.carry(Token(3), false, true);

        let mut batch = Vec::new();
        mux.wait(&mut batch, None).unwrap();
        assert_eq!(
            batch,
            vec![Readiness {
                token: Token(3),
                readable: true,
                writable: true
            }]
        );
    }

    #[test]
    fn deregister_drops_carried_and_tolerates_unknown_source() {
        let mut mux = Multiplexer::new(16).unwrap();
        let mut listener = TcpListener::bind("127.0.0.1:0".parse().unwrap()).unwrap();

        mux.carry(SERVER, true, false);
        // Never registered: the OS error is swallowed
        mux.deregister(&mut listener, SERVER);

        let mut batch = Vec::new();
        mux.wait(&mut batch, Some(Duration::from_millis(10))).unwrap();
        assert!(batch.is_empty());
    }
}
