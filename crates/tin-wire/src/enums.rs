use crate::error::WireError;

// ── Macro for wire-byte enum boilerplate ──────────────────────────────
//
// Every enum in this module is a closed set of named variants, each
// stored as a single byte. The macro generates the byte conversions and
// a stable display name.

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $wire:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Encode this variant as a single wire byte.
            #[must_use]
            pub fn to_wire_byte(self) -> u8 {
                match self {
                    $( Self::$variant => $wire ),+
                }
            }

            /// Decode a wire byte into this enum.
            ///
            /// # Errors
            ///
            /// [`WireError::InvalidEnumValue`] if the byte doesn't match
            /// any known variant.
            pub fn from_wire_byte(value: u8) -> Result<Self, WireError> {
                match value {
                    $( $wire => Ok(Self::$variant), )+
                    other => Err(WireError::InvalidEnumValue {
                        enum_name: stringify!($name),
                        value: other,
                    }),
                }
            }

            /// Variant name as written in this module.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant) ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

// ── ContentMetaType ───────────────────────────────────────────────────

wire_enum! {
    /// Kind of title a meta record describes.
    ///
    /// ```text
    /// ┌──────┬──────────────────────┐
    /// │ Wire │ Type                 │
    /// ├──────┼──────────────────────┤
    /// │ 0x00 │ Unknown              │
    /// │ 0x01 │ SystemProgram        │
    /// │ 0x02 │ SystemData           │
    /// │ 0x03 │ SystemUpdate         │
    /// │ 0x04 │ BootImagePackage     │
    /// │ 0x05 │ BootImagePackageSafe │
    /// │ 0x80 │ Application          │
    /// │ 0x81 │ Patch                │
    /// │ 0x82 │ AddOnContent         │
    /// │ 0x83 │ Delta                │
    /// │ 0x84 │ DataPatch            │
    /// └──────┴──────────────────────┘
    /// ```
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum ContentMetaType {
        Unknown = 0x00,
        SystemProgram = 0x01,
        SystemData = 0x02,
        SystemUpdate = 0x03,
        BootImagePackage = 0x04,
        BootImagePackageSafe = 0x05,
        Application = 0x80,
        Patch = 0x81,
        AddOnContent = 0x82,
        Delta = 0x83,
        DataPatch = 0x84,
    }
}

// ── ContentType ───────────────────────────────────────────────────────

wire_enum! {
    /// Role of one content file within a title.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum ContentType {
        Meta = 0,
        Program = 1,
        Data = 2,
        Control = 3,
        HtmlDocument = 4,
        LegalInformation = 5,
        /// Patch delta fragment. Never installed; dropped from the
        /// installed record.
        DeltaFragment = 6,
    }
}

// ── StorageId ─────────────────────────────────────────────────────────

wire_enum! {
    /// Storage volume a content or record lives on.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub enum StorageId {
        None = 0,
        Host = 1,
        GameCard = 2,
        BuiltInSystem = 3,
        BuiltInUser = 4,
        #[default]
        SdCard = 5,
        Any = 6,
    }
}

// ── ContentInstallType ────────────────────────────────────────────────

wire_enum! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub enum ContentInstallType {
        #[default]
        Full = 0,
        FragmentOnly = 1,
        Unknown = 7,
    }
}

// ── ApplicationEvent ──────────────────────────────────────────────────

wire_enum! {
    /// Tag stored with a registry entry describing its last change.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub enum ApplicationEvent {
        Launched = 0,
        Unknown1 = 1,
        Unknown2 = 2,
        Installed = 3,
        GameCardInserted = 5,
        Archived = 6,
        GameCardRemoved = 10,
    }
}
