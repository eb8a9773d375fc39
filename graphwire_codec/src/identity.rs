use graphwire_types::format::FormatErrKind;
use graphwire_types::runtime::Addr;
use std::collections::HashMap;


/// Encode side. Assigns ids to distinct addresses in first-encounter order.
///
/// An address stays in the table for the whole call, so a later encounter
/// through sharing is treated the same as one through a cycle.
#[derive(Default, Debug)]
pub struct IdentityTable {
    ids: HashMap<Addr, u32>,
}

impl IdentityTable {
    pub fn get(&self, addr: Addr) -> Option<u32> {
        self.ids.get(&addr).copied()
    }

    /// Returns the new id. `addr` must not have been assigned before.
    pub fn assign(&mut self, addr: Addr) -> u32 {
        let id = self.ids.len() as u32;
        self.ids.insert(addr, id);
        id
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Decode side. `addrs[id]` is the object rebuilt for `id`.
#[derive(Default, Debug)]
pub struct AddressTable {
    addrs: Vec<Addr>,
}

impl AddressTable {
    pub fn next_id(&self) -> u32 {
        self.addrs.len() as u32
    }

    /// Ids are defined strictly in sequence; a gap or a redefinition is malformed.
    pub fn expect_next(&self, id: u32) -> Result<(), FormatErrKind> {
        let expected = self.next_id();
        if id != expected {
            return Err(FormatErrKind::IdOutOfSequence {
                expected,
                found: id,
            });
        }
        Ok(())
    }

    pub fn push(&mut self, addr: Addr) {
        self.addrs.push(addr);
    }

    pub fn resolve(&self, id: u32) -> Result<Addr, FormatErrKind> {
        self.addrs
            .get(id as usize)
            .copied()
            .ok_or(FormatErrKind::UnresolvedBackRef(id))
    }

    pub fn addrs(&self) -> &[Addr] {
        &self.addrs
    }
}
