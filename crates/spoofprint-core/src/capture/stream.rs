use std::io::{self, Read, Write};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::{info, warn};

use super::{CaptureResult, ClientHelloProbe};
use crate::fingerprint::Fingerprint;
use crate::store::{remote_key, FingerprintStore};

/// Read-path decorator that fingerprints the ClientHello passing through it.
///
/// Every byte read from `inner` reaches the caller unchanged; a copy goes to
/// the probe until the capture settles. Writes pass straight through.
pub struct ClientHelloCapture<S> {
    inner: S,
    probe: ClientHelloProbe,
    store: FingerprintStore,
    remote_key: String,
}

impl<S> ClientHelloCapture<S> {
    pub fn new(inner: S, remote_key: impl Into<String>, store: FingerprintStore) -> Self {
        Self {
            inner,
            probe: ClientHelloProbe::default(),
            store,
            remote_key: remote_key.into(),
        }
    }

    /// Replace the record length limit. Only meaningful before the first read.
    pub fn with_max_record_len(mut self, max_record_len: usize) -> Self {
        self.probe = ClientHelloProbe::new(max_record_len);
        self
    }

    pub fn fingerprint(&self) -> Option<Arc<Fingerprint>> {
        self.probe.fingerprint().cloned()
    }

    pub fn outcome(&self) -> Option<&CaptureResult> {
        self.probe.outcome()
    }

    pub fn is_settled(&self) -> bool {
        self.probe.is_settled()
    }

    pub fn remote_key(&self) -> &str {
        &self.remote_key
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl ClientHelloCapture<tokio::net::TcpStream> {
    /// Wrap an accepted connection, keyed by its peer address.
    pub fn accept(stream: tokio::net::TcpStream, store: FingerprintStore) -> io::Result<Self> {
        let key = remote_key(&stream.peer_addr()?);
        Ok(Self::new(stream, key, store))
    }
}

fn observe(probe: &mut ClientHelloProbe, store: &FingerprintStore, key: &str, fresh: &[u8]) {
    match probe.observe(fresh) {
        Some(Ok(fingerprint)) => {
            info!(remote = key, ja4 = %fingerprint.ja4, "Captured ClientHello");
            store.record(key, Arc::clone(fingerprint));
        }
        Some(Err(e)) => warn!(remote = key, "{}", e),
        None => {}
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ClientHelloCapture<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let polled = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = polled {
            observe(
                &mut this.probe,
                &this.store,
                &this.remote_key,
                &buf.filled()[before..],
            );
        }
        polled
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ClientHelloCapture<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl<S: Read> Read for ClientHelloCapture<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        observe(&mut self.probe, &self.store, &self.remote_key, &buf[..n]);
        Ok(n)
    }
}

impl<S: Write> Write for ClientHelloCapture<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
