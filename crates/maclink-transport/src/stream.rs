use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

use crate::error::Result;

/// One end of a bus connection.
///
/// Handed out by [`crate::UnixDomainSocket::connect`] and
/// [`crate::UnixDomainSocket::accept`]. Reads and writes block unless a
/// timeout is set, in which case they fail with `WouldBlock`/`TimedOut`.
///
/// A read deadline bounds the total time spent in reads, however the data
/// trickles in: every read waits at most until the deadline, and reads after
/// it fail with `TimedOut` at once.
pub struct IpcStream {
    inner: UnixStream,
    read_timeout: Option<Duration>,
    read_deadline: Option<Instant>,
}

impl IpcStream {
    pub fn from_unix(stream: UnixStream) -> Self {
        Self {
            inner: stream,
            read_timeout: None,
            read_deadline: None,
        }
    }

    /// Longest wait for any single read. `None` blocks indefinitely.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout)?;
        self.read_timeout = timeout;
        Ok(())
    }

    /// Point in time after which reads fail with `TimedOut`. `None` clears it
    /// and restores the plain read timeout.
    pub fn set_read_deadline(&mut self, deadline: Option<Instant>) -> Result<()> {
        self.read_deadline = deadline;
        if deadline.is_none() {
            self.inner.set_read_timeout(self.read_timeout)?;
        }
        Ok(())
    }

    pub fn read_deadline(&self) -> Option<Instant> {
        self.read_deadline
    }

    /// Bound the next read by the deadline, if one is set.
    fn arm_deadline(&self) -> std::io::Result<()> {
        let Some(deadline) = self.read_deadline else {
            return Ok(());
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(std::io::Error::new(
                ErrorKind::TimedOut,
                "read deadline passed",
            ));
        }
        let wait = self.read_timeout.map_or(remaining, |t| t.min(remaining));
        self.inner.set_read_timeout(Some(wait))
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.inner.set_write_timeout(timeout)?)
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        Ok(self.inner.set_nonblocking(nonblocking)?)
    }

    /// A second handle on the same connection, for a dedicated reader thread.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            inner: self.inner.try_clone()?,
            read_timeout: self.read_timeout,
            read_deadline: None,
        })
    }

    /// Close both directions. Threads blocked reading any clone see EOF.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Err(err) if err.kind() != ErrorKind::NotConnected => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// `(uid, gid, pid)` of the process on the other end, via `SO_PEERCRED`.
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        use std::os::fd::AsRawFd;

        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid for writes of the sizes passed,
        // and the descriptor stays open for the duration of the call.
        let rc = unsafe {
            libc::getsockopt(
                self.inner.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        (rc == 0 && len as usize == std::mem::size_of::<libc::ucred>())
            .then(|| (cred.uid, cred.gid, cred.pid as u32))
    }

    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }
}

impl Read for IpcStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.arm_deadline()?;
        self.inner.read(buf)
    }
}

impl Write for IpcStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for IpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcStream")
            .field("peer", &self.peer_credentials())
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}
