use derive_more::{Display, From, Into};

/// Width of a reference slot inside an object body.
pub const PTR_SIZE: u32 = 4;

/// The address of a managed object. [`Addr::NULL`] is never allocated.
#[derive(From, Into, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[display(fmt = "@{}", _0)]
pub struct Addr(pub u32);

impl Addr {
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn to_le_bytes(self) -> [u8; PTR_SIZE as usize] {
        self.0.to_le_bytes()
    }

    pub fn from_le_bytes(buf: [u8; PTR_SIZE as usize]) -> Self {
        Self(u32::from_le_bytes(buf))
    }
}

/// Runtime type tag of a managed object.
#[derive(From, Into, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[display(fmt = "class#{}", _0)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Objects that carry no runtime type.
    pub const UNMANAGED: Self = Self(0);
    /// Raw backing storage of growable arrays.
    pub const ARRAY_BUFFER: Self = Self(1);
    pub const FIRST_USER: Self = Self(2);
}
