use anyhow::{anyhow, Result};
use derive_more::Display;
use std::fmt::{self, Formatter};
use std::mem;

#[repr(u8)]
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Display)]
pub enum NumType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl NumType {
    pub fn size(self) -> u32 {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    pub fn align_log2(self) -> u8 {
        self.size().trailing_zeros() as u8
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

/// A typed primitive, held as little-endian bits in the low `ty.size()` bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Num {
    ty: NumType,
    bits: u64,
}

macro_rules! num_accessors {
    ($($ctor:ident, $getter:ident, $prim:ty, $variant:ident;)*) => {
        impl Num {
            $(
                pub fn $ctor(v: $prim) -> Self {
                    let mut buf = [0u8; mem::size_of::<u64>()];
                    buf[..mem::size_of::<$prim>()].copy_from_slice(&v.to_le_bytes());
                    Self {
                        ty: NumType::$variant,
                        bits: u64::from_le_bytes(buf),
                    }
                }

                pub fn $getter(&self) -> Option<$prim> {
                    if self.ty != NumType::$variant {
                        return None;
                    }
                    let mut buf = [0u8; mem::size_of::<$prim>()];
                    buf.copy_from_slice(&self.bits.to_le_bytes()[..mem::size_of::<$prim>()]);
                    Some(<$prim>::from_le_bytes(buf))
                }
            )*
        }
    };
}

num_accessors! {
    u8, as_u8, u8, U8;
    i8, as_i8, i8, I8;
    u16, as_u16, u16, U16;
    i16, as_i16, i16, I16;
    u32, as_u32, u32, U32;
    i32, as_i32, i32, I32;
    u64, as_u64, u64, U64;
    i64, as_i64, i64, I64;
    f32, as_f32, f32, F32;
    f64, as_f64, f64, F64;
}

impl Num {
    pub fn ty(&self) -> NumType {
        self.ty
    }

    pub fn from_le_slice(ty: NumType, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ty.size() as usize {
            return Err(anyhow!(
                "{} needs {} bytes, got {}",
                ty,
                ty.size(),
                bytes.len()
            ));
        }
        let mut buf = [0u8; mem::size_of::<u64>()];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            ty,
            bits: u64::from_le_bytes(buf),
        })
    }

    /// All 8 bytes; only the first `ty.size()` are significant.
    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.bits.to_le_bytes()
    }
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.ty {
            NumType::F32 => write!(f, "{}f32", f32::from_bits(self.bits as u32)),
            NumType::F64 => write!(f, "{}f64", f64::from_bits(self.bits)),
            NumType::I8 => write!(f, "{}i8", self.bits as u8 as i8),
            NumType::I16 => write!(f, "{}i16", self.bits as u16 as i16),
            NumType::I32 => write!(f, "{}i32", self.bits as u32 as i32),
            NumType::I64 => write!(f, "{}i64", self.bits as i64),
            ty => write!(f, "{}{}", self.bits, ty.to_string().to_lowercase()),
        }
    }
}
