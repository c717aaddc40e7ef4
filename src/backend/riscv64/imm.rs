use core::fmt;

/// A signed 12-bit immediate, the offset of loads/stores and the operand of
/// the register-immediate ALU forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Imm12(u16);

impl Imm12 {
    pub const MIN: i64 = -2048;
    pub const MAX: i64 = 2047;

    pub fn as_i16(&self) -> i16 {
        // signext
        ((self.0 << 4) as i16) >> 4
    }

    pub fn as_i64(&self) -> i64 { self.as_i16() as i64 }

    pub fn try_from_i64(x: i64) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&x) {
            Some(Imm12(x as u16 & 0xfff))
        } else {
            None
        }
    }

    pub fn try_from_u64(x: u64) -> Option<Self> {
        i64::try_from(x).ok().and_then(Self::try_from_i64)
    }

    pub fn zero() -> Self { Imm12(0) }

    pub fn is_zero(&self) -> bool { self.0 == 0 }

    pub fn bits(&self) -> u16 { self.0 }
}

impl PartialOrd for Imm12 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.as_i16().partial_cmp(&other.as_i16())
    }
}

impl fmt::Display for Imm12 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.as_i16()) }
}

#[cfg(test)]
mod tests {
    use super::Imm12;

    #[test]
    fn test_imm12_window() {
        assert_eq!(Imm12::try_from_i64(2047).map(|imm| imm.as_i64()), Some(2047));
        assert_eq!(Imm12::try_from_i64(-2048).map(|imm| imm.as_i64()), Some(-2048));
        assert_eq!(Imm12::try_from_i64(-1).map(|imm| imm.bits()), Some(0xfff));
        assert!(Imm12::try_from_i64(2048).is_none());
        assert!(Imm12::try_from_i64(-2049).is_none());
        assert!(Imm12::try_from_u64(u64::MAX).is_none());
        assert!(Imm12::try_from_u64(4096).is_none());
    }

    #[test]
    fn test_imm12_display() {
        assert_eq!(Imm12::try_from_i64(-16).unwrap().to_string(), "-16");
        assert_eq!(Imm12::zero().to_string(), "0");
        assert!(Imm12::zero().is_zero());
    }
}
