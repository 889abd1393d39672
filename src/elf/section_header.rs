//! Section headers.

use scroll::{Pread, Pwrite, ctx};

use crate::container::{Container, Ctx};
use crate::error::{Error, Result};

/// Section header table entry unused.
pub const SHT_NULL: u32 = 0;
/// Program data.
pub const SHT_PROGBITS: u32 = 1;
/// Symbol table.
pub const SHT_SYMTAB: u32 = 2;
/// String table.
pub const SHT_STRTAB: u32 = 3;
/// Relocation entries with addends.
pub const SHT_RELA: u32 = 4;
/// Symbol hash table.
pub const SHT_HASH: u32 = 5;
/// Dynamic linking information.
pub const SHT_DYNAMIC: u32 = 6;
/// Relocation entries, no addends.
pub const SHT_REL: u32 = 9;
/// Dynamic linker symbol table.
pub const SHT_DYNSYM: u32 = 11;
/// GNU-style hash table.
pub const SHT_GNU_HASH: u32 = 0x6ffffff6;
/// Version definition section.
pub const SHT_GNU_VERDEF: u32 = 0x6ffffffd;
/// Version needs section.
pub const SHT_GNU_VERNEED: u32 = 0x6ffffffe;
/// Version symbol table.
pub const SHT_GNU_VERSYM: u32 = 0x6fffffff;

/// Writable.
pub const SHF_WRITE: u64 = 1 << 0;
/// Occupies memory during execution.
pub const SHF_ALLOC: u64 = 1 << 1;
/// `sh_info` contains a section header table index.
pub const SHF_INFO_LINK: u64 = 1 << 6;

pub fn sht_to_str(sht: u32) -> &'static str {
    match sht {
        SHT_NULL => "SHT_NULL",
        SHT_PROGBITS => "SHT_PROGBITS",
        SHT_SYMTAB => "SHT_SYMTAB",
        SHT_STRTAB => "SHT_STRTAB",
        SHT_RELA => "SHT_RELA",
        SHT_HASH => "SHT_HASH",
        SHT_DYNAMIC => "SHT_DYNAMIC",
        SHT_REL => "SHT_REL",
        SHT_DYNSYM => "SHT_DYNSYM",
        SHT_GNU_HASH => "SHT_GNU_HASH",
        SHT_GNU_VERDEF => "SHT_GNU_VERDEF",
        SHT_GNU_VERNEED => "SHT_GNU_VERNEED",
        SHT_GNU_VERSYM => "SHT_GNU_VERSYM",
        _ => "UNKNOWN_SHT",
    }
}

pub mod section_header32 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_SHDR: usize = 40;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct SectionHeader {
        pub sh_name: u32,
        pub sh_type: u32,
        pub sh_flags: u32,
        pub sh_addr: u32,
        pub sh_offset: u32,
        pub sh_size: u32,
        pub sh_link: u32,
        pub sh_info: u32,
        pub sh_addralign: u32,
        pub sh_entsize: u32,
    }
}

pub mod section_header64 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_SHDR: usize = 64;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct SectionHeader {
        pub sh_name: u32,
        pub sh_type: u32,
        pub sh_flags: u64,
        pub sh_addr: u64,
        pub sh_offset: u64,
        pub sh_size: u64,
        pub sh_link: u32,
        pub sh_info: u32,
        pub sh_addralign: u64,
        pub sh_entsize: u64,
    }
}

/// A unified section header, independent of container size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SectionHeader {
    /// Section name, as an offset into the section header string table.
    pub sh_name: usize,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

impl SectionHeader {
    /// The encoded size of a section header in the given context.
    #[inline]
    pub fn size(ctx: Ctx) -> usize {
        match ctx.container {
            Container::Little => section_header32::SIZEOF_SHDR,
            Container::Big => section_header64::SIZEOF_SHDR,
        }
    }
}

impl From<section_header32::SectionHeader> for SectionHeader {
    fn from(sh: section_header32::SectionHeader) -> Self {
        SectionHeader {
            sh_name: sh.sh_name as usize,
            sh_type: sh.sh_type,
            sh_flags: u64::from(sh.sh_flags),
            sh_addr: u64::from(sh.sh_addr),
            sh_offset: u64::from(sh.sh_offset),
            sh_size: u64::from(sh.sh_size),
            sh_link: sh.sh_link,
            sh_info: sh.sh_info,
            sh_addralign: u64::from(sh.sh_addralign),
            sh_entsize: u64::from(sh.sh_entsize),
        }
    }
}

impl From<SectionHeader> for section_header32::SectionHeader {
    fn from(sh: SectionHeader) -> Self {
        section_header32::SectionHeader {
            sh_name: sh.sh_name as u32,
            sh_type: sh.sh_type,
            sh_flags: sh.sh_flags as u32,
            sh_addr: sh.sh_addr as u32,
            sh_offset: sh.sh_offset as u32,
            sh_size: sh.sh_size as u32,
            sh_link: sh.sh_link,
            sh_info: sh.sh_info,
            sh_addralign: sh.sh_addralign as u32,
            sh_entsize: sh.sh_entsize as u32,
        }
    }
}

impl From<section_header64::SectionHeader> for SectionHeader {
    fn from(sh: section_header64::SectionHeader) -> Self {
        SectionHeader {
            sh_name: sh.sh_name as usize,
            sh_type: sh.sh_type,
            sh_flags: sh.sh_flags,
            sh_addr: sh.sh_addr,
            sh_offset: sh.sh_offset,
            sh_size: sh.sh_size,
            sh_link: sh.sh_link,
            sh_info: sh.sh_info,
            sh_addralign: sh.sh_addralign,
            sh_entsize: sh.sh_entsize,
        }
    }
}

impl From<SectionHeader> for section_header64::SectionHeader {
    fn from(sh: SectionHeader) -> Self {
        section_header64::SectionHeader {
            sh_name: sh.sh_name as u32,
            sh_type: sh.sh_type,
            sh_flags: sh.sh_flags,
            sh_addr: sh.sh_addr,
            sh_offset: sh.sh_offset,
            sh_size: sh.sh_size,
            sh_link: sh.sh_link,
            sh_info: sh.sh_info,
            sh_addralign: sh.sh_addralign,
            sh_entsize: sh.sh_entsize,
        }
    }
}

impl ctx::SizeWith<Ctx> for SectionHeader {
    fn size_with(ctx: &Ctx) -> usize {
        SectionHeader::size(*ctx)
    }
}

impl<'a> ctx::TryFromCtx<'a, Ctx> for SectionHeader {
    type Error = Error;
    fn try_from_ctx(bytes: &'a [u8], Ctx { container, le }: Ctx) -> Result<(Self, usize)> {
        match container {
            Container::Little => Ok((
                bytes
                    .pread_with::<section_header32::SectionHeader>(0, le)?
                    .into(),
                section_header32::SIZEOF_SHDR,
            )),
            Container::Big => Ok((
                bytes
                    .pread_with::<section_header64::SectionHeader>(0, le)?
                    .into(),
                section_header64::SIZEOF_SHDR,
            )),
        }
    }
}

impl ctx::TryIntoCtx<Ctx> for SectionHeader {
    type Error = Error;
    fn try_into_ctx(self, bytes: &mut [u8], Ctx { container, le }: Ctx) -> Result<usize> {
        match container {
            Container::Little => {
                let sh: section_header32::SectionHeader = self.into();
                Ok(bytes.pwrite_with(sh, 0, le)?)
            }
            Container::Big => {
                let sh: section_header64::SectionHeader = self.into();
                Ok(bytes.pwrite_with(sh, 0, le)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scroll::{Pread, Pwrite};

    #[test]
    fn roundtrip() {
        let sh = SectionHeader {
            sh_name: 27,
            sh_type: SHT_DYNSYM,
            sh_flags: SHF_ALLOC,
            sh_addr: 0x400290,
            sh_offset: 0x290,
            sh_size: 0x180,
            sh_link: 2,
            sh_info: 1,
            sh_addralign: 8,
            sh_entsize: 24,
        };
        for &(container, le) in &[
            (Container::Little, scroll::Endian::Little),
            (Container::Little, scroll::Endian::Big),
            (Container::Big, scroll::Endian::Little),
            (Container::Big, scroll::Endian::Big),
        ] {
            let ctx = Ctx::new(container, le);
            let mut bytes = vec![0u8; SectionHeader::size(ctx)];
            bytes.pwrite_with(sh, 0, ctx).unwrap();
            let decoded: SectionHeader = bytes.pread_with(0, ctx).unwrap();
            assert_eq!(decoded, sh);
            let mut reencoded = vec![0u8; SectionHeader::size(ctx)];
            reencoded.pwrite_with(decoded, 0, ctx).unwrap();
            assert_eq!(reencoded, bytes);
        }
    }
}
