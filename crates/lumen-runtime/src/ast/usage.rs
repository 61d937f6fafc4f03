use core::ops::{BitOr, BitOrAssign};

/// Access mode of a variable inside a recorded body.
///
/// Marks accumulate: a variable read in one place and written in another ends
/// up as `ReadWrite`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u8)]
pub enum Usage {
    #[default]
    None = 0,
    Read = 1,
    Write = 2,
    ReadWrite = 3,
}

impl Usage {
    #[inline]
    const fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::None,
            1 => Self::Read,
            2 => Self::Write,
            _ => Self::ReadWrite,
        }
    }

    #[inline]
    pub const fn is_readable(self) -> bool {
        self as u8 & 1 != 0
    }

    #[inline]
    pub const fn is_writable(self) -> bool {
        self as u8 & 2 != 0
    }
}

impl BitOr for Usage {
    type Output = Usage;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self::from_bits(self as u8 | rhs as u8)
    }
}

impl BitOrAssign for Usage {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_accumulate() {
        let mut u = Usage::None;
        u |= Usage::Read;
        assert_eq!(u, Usage::Read);
        u |= Usage::Write;
        assert_eq!(u, Usage::ReadWrite);
        assert!(u.is_readable() && u.is_writable());
        assert!(!Usage::Write.is_readable());
    }
}
