use derive_more::{Deref, Display, From};

/// Stable 32-bit hash of a field name (djb2).
///
/// Used to tell a base class's visitor which fields a subclass has already emitted.
#[derive(From, Deref, Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub struct NameHash(u32);

impl NameHash {
    pub fn of(name: &str) -> Self {
        let mut h: u32 = 5381;
        for b in name.bytes() {
            h = h.wrapping_mul(33).wrapping_add(u32::from(b));
        }
        Self(h)
    }
}
