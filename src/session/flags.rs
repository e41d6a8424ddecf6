//! Session state flags.
//!
//! Independent bits stored in a single atomic integer. `KICKED_OUT` is
//! terminal: once set it is never cleared by any flag operation.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u32);

impl Flags {
    /// Key exchange processed; the next outbound frame completes the handshake
    pub const KEY_EXCHANGED: Flags = Flags(0x1);
    /// Traffic is encrypted in both directions
    pub const ENCRYPTING: Flags = Flags(0x2);
    /// Session has been kicked (sticky)
    pub const KICKED_OUT: Flags = Flags(0x4);
    /// Client passed login
    pub const AUTHORIZED: Flags = Flags(0x8);

    pub const fn empty() -> Self {
        Flags(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Flags(bits)
    }

    /// All bits of `other` are set
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Any bit of `other` is set
    pub const fn intersects(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Flags {
    type Output = Flags;

    fn bitand(self, rhs: Flags) -> Flags {
        Flags(self.0 & rhs.0)
    }
}

impl Not for Flags {
    type Output = Flags;

    fn not(self) -> Flags {
        Flags(!self.0)
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Flags, &str); 4] = [
            (Flags::KEY_EXCHANGED, "KEY_EXCHANGED"),
            (Flags::ENCRYPTING, "ENCRYPTING"),
            (Flags::KICKED_OUT, "KICKED_OUT"),
            (Flags::AUTHORIZED, "AUTHORIZED"),
        ];
        let mut set = f.debug_set();
        for (flag, name) in NAMES {
            if self.contains(flag) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}
