use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;

use elink_frame::Response;

use crate::client::Client;

/// Tokens handed out by the registry stay below this bit; synchronize nonces
/// set it.
pub const NONCE_BIT: u32 = 0x8000_0000;

const TOKEN_MAX: u32 = NONCE_BIT - 1;

/// Opaque handle the companion echoes back in callback responses.
///
/// Only meaningful to this client. Tokens are never zero; a zero correlation
/// on the wire means "no callback".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackToken(NonZeroU32);

impl CallbackToken {
    /// Wrap a raw correlation value. Returns `None` for zero.
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// The value sent on the wire.
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.get())
    }
}

/// A registered callback.
///
/// Receives the client, so it can send requests or drain further input,
/// and a reader over the response arguments. Borrowed argument slices cannot
/// outlive the call.
pub type Callback<P> = Box<dyn FnMut(&mut Client<P>, &mut Response<'_>) + Send>;

enum Slot<P> {
    Ready(Callback<P>),
    // Taken out for the duration of a call; holds the lease that may put it back.
    InFlight(u64),
}

/// Proof that a callback was taken out of its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lease(u64);

pub(crate) struct CallbackRegistry<P> {
    slots: HashMap<u32, Slot<P>>,
    next_token: u32,
    next_lease: u64,
}

impl<P> Default for CallbackRegistry<P> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            next_token: 1,
            next_lease: 0,
        }
    }
}

impl<P> CallbackRegistry<P> {
    /// Register under a fresh token.
    pub(crate) fn allocate(&mut self, callback: Callback<P>) -> CallbackToken {
        loop {
            let raw = self.next_token;
            self.next_token = if raw >= TOKEN_MAX { 1 } else { raw + 1 };
            if self.slots.contains_key(&raw) {
                continue;
            }
            if let Some(token) = CallbackToken::new(raw) {
                self.slots.insert(raw, Slot::Ready(callback));
                return token;
            }
        }
    }

    /// Register under a caller-chosen token. Returns true if a registration
    /// was replaced.
    pub(crate) fn insert(&mut self, token: CallbackToken, callback: Callback<P>) -> bool {
        self.slots
            .insert(token.get(), Slot::Ready(callback))
            .is_some()
    }

    pub(crate) fn remove(&mut self, token: CallbackToken) -> bool {
        self.slots.remove(&token.get()).is_some()
    }

    pub(crate) fn contains(&self, token: CallbackToken) -> bool {
        self.slots.contains_key(&token.get())
    }

    pub(crate) fn is_in_flight(&self, token: CallbackToken) -> bool {
        matches!(self.slots.get(&token.get()), Some(Slot::InFlight(_)))
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    /// Take a callback out for invocation. `None` if unregistered or already
    /// running further up the stack.
    pub(crate) fn take(&mut self, token: CallbackToken) -> Option<(Callback<P>, Lease)> {
        let slot = self.slots.get_mut(&token.get())?;
        if matches!(slot, Slot::InFlight(_)) {
            return None;
        }
        let lease = self.next_lease;
        self.next_lease = self.next_lease.wrapping_add(1);
        match std::mem::replace(slot, Slot::InFlight(lease)) {
            Slot::Ready(callback) => Some((callback, Lease(lease))),
            Slot::InFlight(_) => None,
        }
    }

    /// Put a callback back after invocation, unless its slot was removed or
    /// re-registered in the meantime.
    pub(crate) fn restore(&mut self, token: CallbackToken, lease: Lease, callback: Callback<P>) {
        if let Some(slot) = self.slots.get_mut(&token.get()) {
            if matches!(slot, Slot::InFlight(held) if *held == lease.0) {
                *slot = Slot::Ready(callback);
            }
        }
    }
}

impl<P> fmt::Debug for CallbackRegistry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let in_flight = self
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::InFlight(_)))
            .count();
        f.debug_struct("CallbackRegistry")
            .field("registered", &self.slots.len())
            .field("in_flight", &in_flight)
            .field("next_token", &self.next_token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use elink_transport::MemoryPort;

    use super::*;

    type Registry = CallbackRegistry<MemoryPort>;

    fn noop() -> Callback<MemoryPort> {
        Box::new(|_: &mut Client<MemoryPort>, _: &mut Response<'_>| {})
    }

    #[test]
    fn zero_is_not_a_token() {
        assert!(CallbackToken::new(0).is_none());
        assert_eq!(CallbackToken::new(5).map(CallbackToken::get), Some(5));
    }

    #[test]
    fn allocated_tokens_are_distinct_and_below_nonce_bit() {
        let mut registry = Registry::default();
        let a = registry.allocate(noop());
        let b = registry.allocate(noop());
        assert_ne!(a, b);
        assert_eq!(a.get() & NONCE_BIT, 0);
        assert_eq!(b.get() & NONCE_BIT, 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn allocation_wraps_and_skips_live_tokens() {
        let mut registry = Registry::default();
        let first = registry.allocate(noop());
        registry.next_token = TOKEN_MAX;
        let last = registry.allocate(noop());
        assert_eq!(last.get(), TOKEN_MAX);
        // Wrapped to 1, which is still registered, so 2 is next.
        let wrapped = registry.allocate(noop());
        assert_eq!(first.get(), 1);
        assert_eq!(wrapped.get(), 2);
    }

    #[test]
    fn take_and_restore() {
        let mut registry = Registry::default();
        let token = registry.allocate(noop());

        let (callback, lease) = registry.take(token).unwrap();
        assert!(registry.is_in_flight(token));
        assert!(registry.take(token).is_none());

        registry.restore(token, lease, callback);
        assert!(!registry.is_in_flight(token));
        assert!(registry.take(token).is_some());
    }

    #[test]
    fn removed_during_call_is_not_restored() {
        let mut registry = Registry::default();
        let token = registry.allocate(noop());
        let (callback, lease) = registry.take(token).unwrap();
        assert!(registry.remove(token));
        registry.restore(token, lease, callback);
        assert!(!registry.contains(token));
    }

    #[test]
    fn replaced_during_call_keeps_replacement() {
        let mut registry = Registry::default();
        let token = registry.allocate(noop());
        let (callback, lease) = registry.take(token).unwrap();
        assert!(registry.insert(token, noop()));
        registry.restore(token, lease, callback);
        // The replacement is Ready and takes a fresh lease.
        let (_, second) = registry.take(token).unwrap();
        assert_ne!(second, lease);
    }

    #[test]
    fn clear_drops_everything() {
        let mut registry = Registry::default();
        let token = registry.allocate(noop());
        let (callback, lease) = registry.take(token).unwrap();
        registry.clear();
        registry.restore(token, lease, callback);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn token_display_is_hex() {
        let token = CallbackToken::new(0x2A).unwrap();
        assert_eq!(token.to_string(), "0x0000002a");
    }
}
