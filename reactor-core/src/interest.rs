//! Interest-set bitset: the subset of {READ, WRITE} a registration wants
//! readiness notifications for.

use std::ops::{BitOr, BitOrAssign};

/// A small bitset over `{READ, WRITE}`.
///
/// Mutated only on the selector thread (or inline, when the caller already
/// *is* the selector thread) per the core's interest-set invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest(u8);

impl Interest {
    const READ_BIT: u8 = 0b01;
    const WRITE_BIT: u8 = 0b10;

    /// The empty interest set.
    pub const NONE: Interest = Interest(0);
    /// Readable readiness only.
    pub const READ: Interest = Interest(Self::READ_BIT);
    /// Writable readiness only.
    pub const WRITE: Interest = Interest(Self::WRITE_BIT);

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn readable(self) -> bool {
        self.0 & Self::READ_BIT != 0
    }

    #[must_use]
    pub const fn writable(self) -> bool {
        self.0 & Self::WRITE_BIT != 0
    }

    /// Apply `ops`, adding them if `add` is true, else removing them.
    #[must_use]
    pub const fn apply(self, ops: Interest, add: bool) -> Interest {
        if add {
            Interest(self.0 | ops.0)
        } else {
            Interest(self.0 & !ops.0)
        }
    }

    /// Convert to the `mio::Interest` mio requires for (re)registration.
    /// Returns `None` for the empty set, since `mio` has no "no interest"
    /// registration state — callers must deregister instead.
    #[must_use]
    pub fn to_mio(self) -> Option<mio::Interest> {
        match (self.readable(), self.writable()) {
            (true, true) => Some(mio::Interest::READABLE | mio::Interest::WRITABLE),
            (true, false) => Some(mio::Interest::READABLE),
            (false, true) => Some(mio::Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

impl BitOr for Interest {
    type Output = Interest;
    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        self.0 |= rhs.0;
    }
}
