//! Bounded session table: each registered session is bound to exactly one socket.
//!
//! Handles are 1-based; slot `i` maps to handle `i + 1`. This mirrors the source's fixed
//! array of registered sessions directly rather than a growable `Vec`-plus-free-list,
//! since the session count is capped by a build parameter (`N`).

use enip_support::error::{EnipError, EnipResult};

/// Opaque, platform-supplied socket identifier. The core never owns the underlying
/// socket; it only ever correlates frames and sessions by this id.
pub type SocketId = u64;

pub type SessionHandle = u32;

pub enum RegisterOutcome {
    /// A fresh session was allocated.
    New(SessionHandle),
    /// `socket` already had a live session; its existing handle is returned.
    AlreadyRegistered(SessionHandle),
    /// No free slot.
    Full,
}

pub struct SessionTable {
    slots: Vec<Option<SocketId>>,
}

impl SessionTable {
    pub fn new(capacity: usize) -> SessionTable {
        SessionTable { slots: vec![None; capacity] }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Registers `socket`, allocating the lowest free slot. If `socket` already holds a
    /// session, returns that session's existing handle instead of allocating a new one.
    pub fn register(&mut self, socket: SocketId) -> RegisterOutcome {
        if let Some(index) = self.slots.iter().position(|slot| *slot == Some(socket)) {
            return RegisterOutcome::AlreadyRegistered(index_to_handle(index));
        }

        match self.slots.iter().position(|slot| slot.is_none()) {
            Some(index) => {
                self.slots[index] = Some(socket);
                RegisterOutcome::New(index_to_handle(index))
            }
            None => RegisterOutcome::Full,
        }
    }

    pub fn lookup(&self, handle: SessionHandle) -> Option<SocketId> {
        handle_to_index(handle)
            .and_then(|index| self.slots.get(index))
            .and_then(|slot| *slot)
    }

    /// Validates that `handle` is live and bound to `socket` (the socket the frame
    /// carrying this handle arrived on).
    pub fn validate(&self, handle: SessionHandle, socket: SocketId) -> EnipResult<()> {
        match self.lookup(handle) {
            Some(bound) if bound == socket => Ok(()),
            _ => Err(EnipError::SessionUnknown),
        }
    }

    /// Releases the slot bound to `handle`, returning the socket that was bound there.
    pub fn close_by_handle(&mut self, handle: SessionHandle) -> Option<SocketId> {
        let index = handle_to_index(handle)?;
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Releases whichever slot (if any) holds `socket`. Used on TCP peer disconnect.
    pub fn close_by_socket(&mut self, socket: SocketId) -> Option<SessionHandle> {
        let index = self.slots.iter().position(|slot| *slot == Some(socket))?;
        self.slots[index] = None;
        Some(index_to_handle(index))
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }
}

fn index_to_handle(index: usize) -> SessionHandle {
    index as SessionHandle + 1
}

fn handle_to_index(handle: SessionHandle) -> Option<usize> {
    if handle == 0 {
        None
    } else {
        Some((handle - 1) as usize)
    }
}
