/// Operand width in the guest instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    pub const fn bytes(self) -> u32 {
        match self {
            Width::W8 => 1,
            Width::W16 => 2,
            Width::W32 => 4,
            Width::W64 => 8,
        }
    }

    pub const fn bits(self) -> u32 {
        self.bytes() * 8
    }

    /// Width selected by REX.W / operand-size override, per x86_64's usual
    /// precedence: REX.W wins, then the `0x66` prefix narrows to 16-bit,
    /// otherwise 32-bit (the default operand size for a user-mode process).
    pub const fn from_prefixes(rex_w: bool, opsize_override: bool) -> Width {
        if rex_w {
            Width::W64
        } else if opsize_override {
            Width::W16
        } else {
            Width::W32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rex_w_wins_over_opsize_override() {
        assert_eq!(Width::from_prefixes(true, true), Width::W64);
    }

    #[test]
    fn opsize_override_narrows_to_16_bit() {
        assert_eq!(Width::from_prefixes(false, true), Width::W16);
    }

    #[test]
    fn default_operand_size_is_32_bit() {
        assert_eq!(Width::from_prefixes(false, false), Width::W32);
    }

    #[test]
    fn byte_and_bit_widths_agree() {
        for w in [Width::W8, Width::W16, Width::W32, Width::W64] {
            assert_eq!(w.bits(), w.bytes() * 8);
        }
    }
}
