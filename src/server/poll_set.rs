use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Dense `pollfd` array for one `poll(2)` call.
///
/// Entry 0 is reserved for the listener; entry `i + 1` mirrors client slot `i`.
pub(crate) struct PollSet {
    fds: Vec<libc::pollfd>,
}

impl PollSet {
    pub(crate) fn with_listener(listener: RawFd, max_clients: usize) -> Self {
        let mut fds = Vec::with_capacity(max_clients + 1);
        fds.push(readable(listener));
        Self { fds }
    }

    pub(crate) fn push(&mut self, fd: RawFd) {
        self.fds.push(readable(fd));
    }

    /// Same O(1) move as `Vec::swap_remove`, so slot/pollfd pairs stay aligned.
    pub(crate) fn swap_remove(&mut self, idx: usize) {
        if idx == 0 || idx >= self.fds.len() {
            return;
        }
        self.fds.swap_remove(idx);
    }

    /// Drop every client entry, keeping the listener.
    pub(crate) fn clear_clients(&mut self) {
        self.fds.truncate(1);
    }

    pub(crate) fn len(&self) -> usize {
        self.fds.len()
    }

    pub(crate) fn fd(&self, idx: usize) -> RawFd {
        self.fds[idx].fd
    }

    pub(crate) fn revents(&self, idx: usize) -> libc::c_short {
        self.fds[idx].revents
    }

    /// Block until something is ready or `timeout` elapses.
    ///
    /// Returns the number of ready entries; EINTR counts as zero.
    pub(crate) fn wait(&mut self, timeout: Duration) -> io::Result<usize> {
        let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        for p in &mut self.fds {
            p.revents = 0;
        }
        // SAFETY: `fds` is a live, exclusively borrowed array of `len` pollfds.
        let n = unsafe {
            libc::poll(
                self.fds.as_mut_ptr(),
                self.fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(n as usize)
    }
}

fn readable(fd: RawFd) -> libc::pollfd {
    libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }
}
