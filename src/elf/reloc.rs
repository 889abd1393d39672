//! Dynamic relocation entries, `Rel` and `Rela`.
//!
//! `r_info` packs the symbol index and the relocation type with a
//! class-dependent shift: `sym << 32 | type` in 64-bit containers,
//! `sym << 8 | type` in 32-bit ones. The unified [`Reloc`] keeps the two
//! sub-fields apart; the packed word is rebuilt when a record is encoded.

use core::fmt;

use scroll::{Pread, Pwrite, ctx};

use crate::container::{Container, Ctx};
use crate::error::{Error, Result};

pub mod reloc32 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_RELA: usize = 12;
    pub const SIZEOF_REL: usize = 8;

    /// Relocation with an explicit addend.
    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct Rela {
        pub r_offset: u32,
        pub r_info: u32,
        pub r_addend: i32,
    }

    /// Relocation without an addend.
    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct Rel {
        pub r_offset: u32,
        pub r_info: u32,
    }

    #[inline(always)]
    pub fn r_sym(info: u32) -> u32 {
        info >> 8
    }

    #[inline(always)]
    pub fn r_type(info: u32) -> u32 {
        info & 0xff
    }

    #[inline(always)]
    pub fn r_info(sym: u32, typ: u32) -> u32 {
        (sym << 8) | (typ & 0xff)
    }
}

pub mod reloc64 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_RELA: usize = 24;
    pub const SIZEOF_REL: usize = 16;

    /// Relocation with an explicit addend.
    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct Rela {
        pub r_offset: u64,
        pub r_info: u64,
        pub r_addend: i64,
    }

    /// Relocation without an addend.
    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct Rel {
        pub r_offset: u64,
        pub r_info: u64,
    }

    #[inline(always)]
    pub fn r_sym(info: u64) -> u32 {
        (info >> 32) as u32
    }

    #[inline(always)]
    pub fn r_type(info: u64) -> u32 {
        (info & 0xffff_ffff) as u32
    }

    #[inline(always)]
    pub fn r_info(sym: u64, typ: u64) -> u64 {
        (sym << 32) | typ
    }
}

/// A unified relocation. `r_addend` is `Some` for `Rela` records and `None`
/// for `Rel` records.
#[derive(Clone, Copy, Default, PartialEq)]
pub struct Reloc {
    pub r_offset: u64,
    pub r_addend: Option<i64>,
    /// Index into the dynamic symbol table.
    pub r_sym: usize,
    pub r_type: u32,
}

/// The codec context for relocations: whether the record carries an addend,
/// and the container context.
pub type RelocCtx = (bool, Ctx);

impl Reloc {
    /// The encoded size of a relocation in the given context.
    pub fn size(is_rela: bool, ctx: Ctx) -> usize {
        match ctx.container {
            Container::Little => {
                if is_rela {
                    reloc32::SIZEOF_RELA
                } else {
                    reloc32::SIZEOF_REL
                }
            }
            Container::Big => {
                if is_rela {
                    reloc64::SIZEOF_RELA
                } else {
                    reloc64::SIZEOF_REL
                }
            }
        }
    }
}

impl fmt::Debug for Reloc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Reloc")
            .field("r_offset", &format_args!("{:x}", self.r_offset))
            .field("r_addend", &format_args!("{:x}", self.r_addend.unwrap_or(0)))
            .field("r_sym", &self.r_sym)
            .field("r_type", &self.r_type)
            .finish()
    }
}

impl From<reloc32::Rela> for Reloc {
    fn from(rela: reloc32::Rela) -> Self {
        Reloc {
            r_offset: u64::from(rela.r_offset),
            r_addend: Some(i64::from(rela.r_addend)),
            r_sym: reloc32::r_sym(rela.r_info) as usize,
            r_type: reloc32::r_type(rela.r_info),
        }
    }
}

impl From<reloc32::Rel> for Reloc {
    fn from(rel: reloc32::Rel) -> Self {
        Reloc {
            r_offset: u64::from(rel.r_offset),
            r_addend: None,
            r_sym: reloc32::r_sym(rel.r_info) as usize,
            r_type: reloc32::r_type(rel.r_info),
        }
    }
}

impl From<Reloc> for reloc32::Rela {
    fn from(reloc: Reloc) -> Self {
        reloc32::Rela {
            r_offset: reloc.r_offset as u32,
            r_info: reloc32::r_info(reloc.r_sym as u32, reloc.r_type),
            r_addend: reloc.r_addend.unwrap_or(0) as i32,
        }
    }
}

impl From<Reloc> for reloc32::Rel {
    fn from(reloc: Reloc) -> Self {
        reloc32::Rel {
            r_offset: reloc.r_offset as u32,
            r_info: reloc32::r_info(reloc.r_sym as u32, reloc.r_type),
        }
    }
}

impl From<reloc64::Rela> for Reloc {
    fn from(rela: reloc64::Rela) -> Self {
        Reloc {
            r_offset: rela.r_offset,
            r_addend: Some(rela.r_addend),
            r_sym: reloc64::r_sym(rela.r_info) as usize,
            r_type: reloc64::r_type(rela.r_info),
        }
    }
}

impl From<reloc64::Rel> for Reloc {
    fn from(rel: reloc64::Rel) -> Self {
        Reloc {
            r_offset: rel.r_offset,
            r_addend: None,
            r_sym: reloc64::r_sym(rel.r_info) as usize,
            r_type: reloc64::r_type(rel.r_info),
        }
    }
}

impl From<Reloc> for reloc64::Rela {
    fn from(reloc: Reloc) -> Self {
        reloc64::Rela {
            r_offset: reloc.r_offset,
            r_info: reloc64::r_info(reloc.r_sym as u64, u64::from(reloc.r_type)),
            r_addend: reloc.r_addend.unwrap_or(0),
        }
    }
}

impl From<Reloc> for reloc64::Rel {
    fn from(reloc: Reloc) -> Self {
        reloc64::Rel {
            r_offset: reloc.r_offset,
            r_info: reloc64::r_info(reloc.r_sym as u64, u64::from(reloc.r_type)),
        }
    }
}

impl ctx::SizeWith<RelocCtx> for Reloc {
    fn size_with(&(is_rela, ctx): &RelocCtx) -> usize {
        Reloc::size(is_rela, ctx)
    }
}

impl<'a> ctx::TryFromCtx<'a, RelocCtx> for Reloc {
    type Error = Error;
    fn try_from_ctx(
        bytes: &'a [u8],
        (is_rela, Ctx { container, le }): RelocCtx,
    ) -> Result<(Self, usize)> {
        let reloc = match container {
            Container::Little => {
                if is_rela {
                    (
                        bytes.pread_with::<reloc32::Rela>(0, le)?.into(),
                        reloc32::SIZEOF_RELA,
                    )
                } else {
                    (
                        bytes.pread_with::<reloc32::Rel>(0, le)?.into(),
                        reloc32::SIZEOF_REL,
                    )
                }
            }
            Container::Big => {
                if is_rela {
                    (
                        bytes.pread_with::<reloc64::Rela>(0, le)?.into(),
                        reloc64::SIZEOF_RELA,
                    )
                } else {
                    (
                        bytes.pread_with::<reloc64::Rel>(0, le)?.into(),
                        reloc64::SIZEOF_REL,
                    )
                }
            }
        };
        Ok(reloc)
    }
}

impl ctx::TryIntoCtx<RelocCtx> for Reloc {
    type Error = Error;
    fn try_into_ctx(
        self,
        bytes: &mut [u8],
        (is_rela, Ctx { container, le }): RelocCtx,
    ) -> Result<usize> {
        match container {
            Container::Little => {
                if is_rela {
                    let rela: reloc32::Rela = self.into();
                    Ok(bytes.pwrite_with(rela, 0, le)?)
                } else {
                    let rel: reloc32::Rel = self.into();
                    Ok(bytes.pwrite_with(rel, 0, le)?)
                }
            }
            Container::Big => {
                if is_rela {
                    let rela: reloc64::Rela = self.into();
                    Ok(bytes.pwrite_with(rela, 0, le)?)
                } else {
                    let rel: reloc64::Rel = self.into();
                    Ok(bytes.pwrite_with(rel, 0, le)?)
                }
            }
        }
    }
}
