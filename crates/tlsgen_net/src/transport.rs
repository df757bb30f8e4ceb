use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::fmt::Debug;
use std::fs::File;
use std::io::{self, IoSlice, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;
use tlsgen_traits::DuplexChannel;
use tracing::{debug, trace};

/// Placeholder endpoints reported by the capture sink.
pub const CAPTURE_LOCAL_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
pub const CAPTURE_PEER_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 443);

/// A fake connection: outbound bytes go verbatim into `sink`, inbound reads are always EOF.
///
/// The sink is owned exclusively until `close` or `into_inner`.
#[derive(Debug)]
pub struct CaptureTransport<W: Write = File> {
    sink: Option<W>,
    recorded: u64,
}

impl<W: Write> CaptureTransport<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Some(sink),
            recorded: 0,
        }
    }

    /// Total bytes accepted by the sink so far.
    pub fn bytes_recorded(&self) -> u64 {
        self.recorded
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    /// Hands back the sink, or `None` if already closed.
    pub fn into_inner(mut self) -> Option<W> {
        self.sink.take()
    }

    fn sink_mut(&mut self) -> io::Result<&mut W> {
        self.sink
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "capture sink closed"))
    }
}

impl<W: Write> Read for CaptureTransport<W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        trace!("capture read of {} bytes answered with EOF", buf.len());
        Ok(0)
    }
}

impl<W: Write> Write for CaptureTransport<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.sink_mut()?.write(buf)?;
        self.recorded += n as u64;
        trace!("recorded {} bytes", n);
        Ok(n)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let n = self.sink_mut()?.write_vectored(bufs)?;
        self.recorded += n as u64;
        trace!("recorded {} bytes", n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink_mut()?.flush()
    }
}

impl<W: Write + Send + Debug> DuplexChannel for CaptureTransport<W> {
    fn close(&mut self) -> io::Result<()> {
        match self.sink.take() {
            Some(mut sink) => {
                sink.flush()?;
                debug!("capture sink closed after {} bytes", self.recorded);
                Ok(())
            }
            None => Ok(()),
        }
    }

    // Reads never block, so timeouts have nothing to bound.
    fn set_read_deadline(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn set_write_deadline(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(CAPTURE_LOCAL_ADDR)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Ok(CAPTURE_PEER_ADDR)
    }
}

/// A live TCP connection presented through the same channel interface.
#[derive(Debug)]
pub struct NetworkTransport {
    stream: TcpStream,
}

impl NetworkTransport {
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream }
    }
}

impl Read for NetworkTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for NetworkTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl DuplexChannel for NetworkTransport {
    fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(std::net::Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn set_read_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    fn set_write_deadline(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_write_timeout(timeout)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

pub struct TransportBuilder;

impl TransportBuilder {
    /// Opens a capture sink at `path`, truncating any previous content.
    pub fn capture_file(path: &std::path::Path) -> io::Result<CaptureTransport<File>> {
        let file = File::create(path)?;
        debug!("capture sink opened at {}", path.display());
        Ok(CaptureTransport::new(file))
    }

    /// Connects a TCP socket with Nagle disabled before any bytes move.
    ///
    /// # Arguments
    /// * `addr` - Remote target address
    /// * `timeout` - Upper bound on the connect itself
    pub fn connect(addr: SocketAddr, timeout: Duration) -> io::Result<NetworkTransport> {
        let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_nodelay(true)?;
        socket.connect_timeout(&SockAddr::from(addr), timeout)?;

        let stream: TcpStream = socket.into();
        debug!("connected to {}", addr);
        Ok(NetworkTransport::from_stream(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn capture_read_is_always_eof() {
        let mut transport = CaptureTransport::new(Vec::new());
        for size in [0usize, 1, 5, 16 * 1024] {
            let mut buf = vec![0xaa; size];
            for _ in 0..3 {
                assert_eq!(transport.read(&mut buf).unwrap(), 0);
            }
            assert!(buf.iter().all(|b| *b == 0xaa));
        }
    }

    #[test]
    fn capture_write_is_verbatim_and_ordered() {
        let mut transport = CaptureTransport::new(Vec::new());
        transport.write_all(b"\x16\x03\x01").unwrap();
        transport
            .write_vectored(&[IoSlice::new(b"\x00\x02"), IoSlice::new(b"\x01\x00")])
            .unwrap();
        assert_eq!(transport.bytes_recorded(), 7);
        assert_eq!(
            transport.into_inner().unwrap(),
            b"\x16\x03\x01\x00\x02\x01\x00".to_vec()
        );
    }

    #[test]
    fn capture_write_after_close_fails() {
        let mut transport = CaptureTransport::new(Vec::new());
        transport.write_all(b"abc").unwrap();
        transport.close().unwrap();
        assert!(transport.is_closed());

        let err = transport.write(b"more").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert_eq!(transport.bytes_recorded(), 3);
    }

    #[test]
    fn capture_deadlines_and_addresses_are_inert() {
        let mut transport = CaptureTransport::new(Vec::new());
        transport.set_deadline(Some(Duration::from_secs(1))).unwrap();
        transport.set_read_deadline(None).unwrap();
        transport.set_write_deadline(Some(Duration::ZERO)).unwrap();
        assert_eq!(transport.local_addr().unwrap(), CAPTURE_LOCAL_ADDR);
        assert_eq!(transport.peer_addr().unwrap().port(), 443);
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn capture_propagates_sink_failure() {
        let mut transport = CaptureTransport::new(FullDisk);
        let err = transport.write(b"hello").unwrap_err();
        assert_eq!(err.to_string(), "no space left on device");
        assert_eq!(transport.bytes_recorded(), 0);
    }

    #[test]
    fn capture_file_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        std::fs::write(&path, b"stale bytes from a previous run").unwrap();

        let mut transport = TransportBuilder::capture_file(&path).unwrap();
        transport.write_all(b"new").unwrap();
        transport.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new".to_vec());
    }

    #[test]
    fn network_transport_moves_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut transport = TransportBuilder::connect(addr, Duration::from_secs(5)).unwrap();
        let (mut accepted, _) = listener.accept().unwrap();

        transport.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        accepted.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        assert_eq!(transport.peer_addr().unwrap(), addr);

        transport.set_read_deadline(Some(Duration::from_millis(50))).unwrap();
        transport.close().unwrap();
    }
}
