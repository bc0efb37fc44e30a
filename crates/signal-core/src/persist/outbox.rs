use crate::persist::remote::RemoteWrite;

/// Single-flight queue for remote writes shipped in the background.
///
/// At most one write is in flight and one is pending. Writes land in
/// submission order, so the newest submitted state is the last one stored.
/// An opportunistic write never displaces a pending forced one.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Option<RemoteWrite>,
    in_flight: bool,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, write: RemoteWrite) {
        match &self.pending {
            Some(queued) if queued.forced && !write.forced => {
                log::debug!("outbox: keeping pending forced write");
            }
            _ => self.pending = Some(write),
        }
    }

    /// Take the next write to send, if nothing is in flight.
    pub fn next(&mut self) -> Option<RemoteWrite> {
        if self.in_flight {
            return None;
        }
        let write = self.pending.take()?;
        self.in_flight = true;
        Some(write)
    }

    /// Mark the in-flight write finished, whatever its outcome.
    pub fn complete(&mut self) {
        self.in_flight = false;
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight && self.pending.is_none()
    }

    /// Drop anything not yet sent (sign-out, wipe).
    pub fn clear(&mut self) {
        self.pending = None;
    }
}
