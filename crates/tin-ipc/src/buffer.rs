/// Buffer descriptor attributes.
///
/// Bit layout:
///   bit 0 = In (caller → service)
///   bit 1 = Out (service → caller)
///   bit 2 = `MapAlias` (memory is aliased into the service for the call)
///   bit 3 = Pointer (copied through the pointer buffer)
///   bit 4 = `FixedSize` (pointer buffer of a size both sides agree on)
///   bit 5 = `AutoSelect` (transport picks alias or pointer)
///   bit 6 = `MapTransferAllowsNonSecure`
///   bit 7 = `MapTransferAllowsNonDevice`
///   bits 8-31 = reserved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferAttr(u32);

impl BufferAttr {
    pub const NONE: Self = Self(0);
    pub const IN: Self = Self(1 << 0);
    pub const OUT: Self = Self(1 << 1);
    pub const MAP_ALIAS: Self = Self(1 << 2);
    pub const POINTER: Self = Self(1 << 3);
    pub const FIXED_SIZE: Self = Self(1 << 4);
    pub const AUTO_SELECT: Self = Self(1 << 5);
    pub const MAP_TRANSFER_ALLOWS_NON_SECURE: Self = Self(1 << 6);
    pub const MAP_TRANSFER_ALLOWS_NON_DEVICE: Self = Self(1 << 7);

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    /// `true` when every bit of `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_in(self) -> bool {
        self.contains(Self::IN)
    }

    pub fn is_out(self) -> bool {
        self.contains(Self::OUT)
    }
}

impl std::ops::BitOr for BufferAttr {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One tagged buffer attached to a request.
///
/// The borrow lives exactly as long as the [`Request`](crate::Request)
/// it belongs to, which is the duration of one call. Nothing the
/// service sees through a buffer outlives the dispatch.
#[derive(Debug)]
pub enum Buffer<'a> {
    In { data: &'a [u8], attr: BufferAttr },
    Out { data: &'a mut [u8], attr: BufferAttr },
}

impl Buffer<'_> {
    pub fn attr(&self) -> BufferAttr {
        match self {
            Self::In { attr, .. } | Self::Out { attr, .. } => *attr,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::In { data, .. } => data.len(),
            Self::Out { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_flags() {
        let attr = BufferAttr::IN | BufferAttr::MAP_ALIAS;
        assert!(attr.is_in());
        assert!(!attr.is_out());
        assert!(attr.contains(BufferAttr::MAP_ALIAS));
        assert_eq!(attr.raw(), 0b101);
    }

    #[test]
    fn pointer_fixed_size_out() {
        let attr = BufferAttr::OUT | BufferAttr::POINTER | BufferAttr::FIXED_SIZE;
        assert!(attr.is_out());
        assert!(attr.contains(BufferAttr::POINTER | BufferAttr::FIXED_SIZE));
        assert!(!attr.contains(BufferAttr::AUTO_SELECT));
    }

    #[test]
    fn buffer_reports_len() {
        let data = [0u8; 7];
        let buffer = Buffer::In {
            data: &data,
            attr: BufferAttr::IN,
        };
        assert_eq!(buffer.len(), 7);
        assert!(!buffer.is_empty());
    }
}
