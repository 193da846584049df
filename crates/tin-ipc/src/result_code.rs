use std::fmt;

/// Status code returned by a privileged service.
///
/// Bit layout of the raw `u32`:
///
/// ```text
/// ┌──────────┬────────────────────────────────────────┐
/// │ Bits     │ Field                                  │
/// ├──────────┼────────────────────────────────────────┤
/// │ 0..=8    │ Module (which service family raised it)│
/// │ 9..=21   │ Description (error within the module)  │
/// │ 22..=31  │ Unused, zero                           │
/// └──────────┴────────────────────────────────────────┘
/// ```
///
/// A raw value of zero is success. Codes are displayed in the
/// conventional `2MMM-DDDD` form, so module 5 description 3 prints as
/// `2005-0003`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResultCode(u32);

impl ResultCode {
    /// The success code.
    pub const SUCCESS: Self = Self(0);

    const MODULE_BITS: u32 = 9;
    const DESCRIPTION_BITS: u32 = 13;

    /// Build a code from its module and description.
    #[must_use]
    pub const fn new(module: u32, description: u32) -> Self {
        let module = module & ((1 << Self::MODULE_BITS) - 1);
        let description = description & ((1 << Self::DESCRIPTION_BITS) - 1);
        Self(module | (description << Self::MODULE_BITS))
    }

    /// Wrap a raw value as returned by the transport.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn module(self) -> u32 {
        self.0 & ((1 << Self::MODULE_BITS) - 1)
    }

    #[must_use]
    pub const fn description(self) -> u32 {
        (self.0 >> Self::MODULE_BITS) & ((1 << Self::DESCRIPTION_BITS) - 1)
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:04} ({:#x})",
            2000 + self.module(),
            self.description(),
            self.0
        )
    }
}
