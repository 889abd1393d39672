//! GNU symbol versioning: the `.gnu.version_r` verneed chain.
//!
//! A verneed chain is a linked list of `Verneed` records, each owning a
//! sub-list of `Vernaux` records. All links (`vn_next`, `vn_aux`,
//! `vna_next`) are byte offsets relative to the record carrying them, and a
//! zero `vn_next`/`vna_next` terminates its list. Field widths are the same
//! in both container sizes, so only endianness matters here.
//!
//! The chain is held as ordered records with their link offsets intact;
//! encoding replays the links to place every record, so the byte image a
//! chain decodes from is reproduced exactly.

use scroll::{Endian, Pread, Pwrite, SizeWith};

use crate::error::Result;

/// A `.gnu.version` index reserved for unversioned local symbols.
pub const VER_NDX_LOCAL: u16 = 0;
/// A `.gnu.version` index reserved for symbols in the global namespace.
pub const VER_NDX_GLOBAL: u16 = 1;

pub const SIZEOF_VERNEED: usize = 16;
pub const SIZEOF_VERNAUX: usize = 16;

/// The wire form of a `Verneed` record, without its auxiliary entries.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct ElfVerneed {
    /// Version of this structure, currently 1.
    pub vn_version: u16,
    /// Number of associated vernaux entries.
    pub vn_cnt: u16,
    /// Offset of the file name string in `.dynstr`.
    pub vn_file: u32,
    /// Byte offset from this record to its first vernaux entry.
    pub vn_aux: u32,
    /// Byte offset from this record to the next verneed entry, 0 at the end.
    pub vn_next: u32,
}

/// A version requirement against one `Vernaux` of a dependency.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
pub struct Vernaux {
    /// ELF hash of the version name.
    pub vna_hash: u32,
    /// Version information flag bitmask.
    pub vna_flags: u16,
    /// The version index assigned to this requirement, referenced by
    /// `.gnu.version` entries.
    pub vna_other: u16,
    /// Offset of the version name string in `.dynstr`.
    pub vna_name: u32,
    /// Byte offset from this record to the next vernaux entry, 0 at the end.
    pub vna_next: u32,
}

/// A `Verneed` record together with its auxiliary entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Verneed {
    pub vn_version: u16,
    pub vn_cnt: u16,
    pub vn_file: u32,
    pub vn_aux: u32,
    pub vn_next: u32,
    pub aux: Vec<Vernaux>,
}

impl Verneed {
    fn wire(&self) -> ElfVerneed {
        ElfVerneed {
            vn_version: self.vn_version,
            vn_cnt: self.vn_cnt,
            vn_file: self.vn_file,
            vn_aux: self.vn_aux,
            vn_next: self.vn_next,
        }
    }
}

/// Decode `count` verneed records starting at `offset`, following the link
/// offsets the way the dynamic linker does.
pub fn parse_chain(bytes: &[u8], offset: usize, count: usize, le: Endian) -> Result<Vec<Verneed>> {
    let mut chain = Vec::with_capacity(count);
    let mut pos = offset;
    for _ in 0..count {
        let vn: ElfVerneed = bytes.pread_with(pos, le)?;
        let mut aux = Vec::with_capacity(vn.vn_cnt as usize);
        let mut aux_pos = pos + vn.vn_aux as usize;
        for _ in 0..vn.vn_cnt {
            let vna: Vernaux = bytes.pread_with(aux_pos, le)?;
            aux_pos += vna.vna_next as usize;
            aux.push(vna);
        }
        pos += vn.vn_next as usize;
        chain.push(Verneed {
            vn_version: vn.vn_version,
            vn_cnt: vn.vn_cnt,
            vn_file: vn.vn_file,
            vn_aux: vn.vn_aux,
            vn_next: vn.vn_next,
            aux,
        });
    }
    Ok(chain)
}

/// The serialized extent of a chain: the end of the furthest record the link
/// offsets place.
pub fn chain_size(chain: &[Verneed]) -> usize {
    let mut size = 0;
    let mut pos = 0;
    for vn in chain {
        size = size.max(pos + SIZEOF_VERNEED);
        let mut aux_pos = pos + vn.vn_aux as usize;
        for vna in &vn.aux {
            size = size.max(aux_pos + SIZEOF_VERNAUX);
            aux_pos += vna.vna_next as usize;
        }
        pos += vn.vn_next as usize;
    }
    size
}

/// The position of the last verneed record relative to the chain start:
/// the sum of every `vn_next` (the terminator contributes 0).
pub fn last_position(chain: &[Verneed]) -> usize {
    chain.iter().map(|vn| vn.vn_next as usize).sum()
}

/// Encode a chain, placing each record where its link offsets point.
pub fn encode_chain(chain: &[Verneed], le: Endian) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; chain_size(chain)];
    let mut pos = 0;
    for vn in chain {
        bytes.pwrite_with(vn.wire(), pos, le)?;
        let mut aux_pos = pos + vn.vn_aux as usize;
        for vna in &vn.aux {
            bytes.pwrite_with(*vna, aux_pos, le)?;
            aux_pos += vna.vna_next as usize;
        }
        pos += vn.vn_next as usize;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::size_of;

    pub fn sample_chain() -> Vec<Verneed> {
        vec![
            Verneed {
                vn_version: 1,
                vn_cnt: 2,
                vn_file: 0x10,
                vn_aux: SIZEOF_VERNEED as u32,
                vn_next: (SIZEOF_VERNEED + 2 * SIZEOF_VERNAUX) as u32,
                aux: vec![
                    Vernaux {
                        vna_hash: 0x0d696910,
                        vna_flags: 0,
                        vna_other: 2,
                        vna_name: 0x20,
                        vna_next: SIZEOF_VERNAUX as u32,
                    },
                    Vernaux {
                        vna_hash: 0x09691a75,
                        vna_flags: 0,
                        vna_other: 3,
                        vna_name: 0x2c,
                        vna_next: 0,
                    },
                ],
            },
            Verneed {
                vn_version: 1,
                vn_cnt: 1,
                vn_file: 0x38,
                vn_aux: SIZEOF_VERNEED as u32,
                vn_next: 0,
                aux: vec![Vernaux {
                    vna_hash: 0x0d696911,
                    vna_flags: 0,
                    vna_other: 4,
                    vna_name: 0x44,
                    vna_next: 0,
                }],
            },
        ]
    }

    #[test]
    fn wire_sizes() {
        assert_eq!(SIZEOF_VERNEED, size_of::<ElfVerneed>());
        assert_eq!(SIZEOF_VERNAUX, size_of::<Vernaux>());
    }

    #[test]
    fn size_and_position() {
        let chain = sample_chain();
        assert_eq!(chain_size(&chain), 5 * 16);
        assert_eq!(last_position(&chain), 3 * 16);
        assert_eq!(chain_size(&[]), 0);
        assert_eq!(last_position(&[]), 0);
    }

    #[test]
    fn roundtrip() {
        for &le in &[Endian::Little, Endian::Big] {
            let chain = sample_chain();
            let bytes = encode_chain(&chain, le).unwrap();
            let decoded = parse_chain(&bytes, 0, chain.len(), le).unwrap();
            assert_eq!(decoded, chain);
            let reencoded = encode_chain(&decoded, le).unwrap();
            assert_eq!(reencoded, bytes);
        }
    }

    #[test]
    fn parse_at_offset() {
        let chain = sample_chain();
        let encoded = encode_chain(&chain, Endian::Little).unwrap();
        let mut bytes = vec![0xaau8; 24];
        bytes.extend_from_slice(&encoded);
        let decoded = parse_chain(&bytes, 24, chain.len(), Endian::Little).unwrap();
        assert_eq!(decoded, chain);
    }

    #[test]
    fn aux_placed_by_links() {
        // A vernaux pushed away from its verneed by a wide vn_aux still
        // round-trips: the links dictate placement, not record order.
        let chain = vec![Verneed {
            vn_version: 1,
            vn_cnt: 1,
            vn_file: 4,
            vn_aux: 32,
            vn_next: 0,
            aux: vec![Vernaux {
                vna_hash: 1,
                vna_flags: 0,
                vna_other: 2,
                vna_name: 8,
                vna_next: 0,
            }],
        }];
        assert_eq!(chain_size(&chain), 48);
        let bytes = encode_chain(&chain, Endian::Little).unwrap();
        assert_eq!(bytes.len(), 48);
        let decoded = parse_chain(&bytes, 0, 1, Endian::Little).unwrap();
        assert_eq!(decoded, chain);
    }
}
