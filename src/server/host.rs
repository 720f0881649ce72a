// Host liveness probe
// Lets the loop notice that the process supervising it has gone away

/// Tells the loop whether the host that launched it is still around.
///
/// Checked once per tick right after the wait. A `false` answer makes the
/// loop exit at once, without cleanup.
pub trait HostProbe: Send {
    fn host_alive(&self) -> bool;
}

/// Built-in probes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostWatch {
    /// The host is the parent process with this pid; reparenting means it died
    Parent(u32),
    /// No host to watch
    Detached,
}

impl HostWatch {
    /// Watch the current parent process
    #[cfg(unix)]
    pub fn parent() -> Self {
        Self::Parent(std::os::unix::process::parent_id())
    }

    #[cfg(not(unix))]
    pub fn parent() -> Self {
        Self::Detached
    }
}

impl HostProbe for HostWatch {
    fn host_alive(&self) -> bool {
        match self {
            #[cfg(unix)]
            Self::Parent(pid) => std::os::unix::process::parent_id() == *pid,
            #[cfg(not(unix))]
            Self::Parent(_) => true,
            Self::Detached => true,
        }
    }
}
