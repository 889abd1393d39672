//! Dynamic symbol table entries.

use core::fmt;

use scroll::{Pread, Pwrite, ctx};

use crate::container::{Container, Ctx};
use crate::error::{Error, Result};

/// Local symbol.
pub const STB_LOCAL: u8 = 0;
/// Global symbol.
pub const STB_GLOBAL: u8 = 1;
/// Weak symbol.
pub const STB_WEAK: u8 = 2;

/// Symbol type is unspecified.
pub const STT_NOTYPE: u8 = 0;
/// Symbol is a data object.
pub const STT_OBJECT: u8 = 1;
/// Symbol is a code object.
pub const STT_FUNC: u8 = 2;
/// Symbol associated with a section.
pub const STT_SECTION: u8 = 3;

/// The binding half of `st_info` (high four bits).
#[inline]
pub fn st_bind(info: u8) -> u8 {
    info >> 4
}

/// The type half of `st_info` (low four bits).
#[inline]
pub fn st_type(info: u8) -> u8 {
    info & 0xf
}

/// Pack binding and type into `st_info`.
#[inline]
pub fn st_info(bind: u8, typ: u8) -> u8 {
    (bind << 4) | (typ & 0xf)
}

pub mod sym32 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_SYM: usize = 16;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct Sym {
        pub st_name: u32,
        pub st_value: u32,
        pub st_size: u32,
        pub st_info: u8,
        pub st_other: u8,
        pub st_shndx: u16,
    }
}

pub mod sym64 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_SYM: usize = 24;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct Sym {
        pub st_name: u32,
        pub st_info: u8,
        pub st_other: u8,
        pub st_shndx: u16,
        pub st_value: u64,
        pub st_size: u64,
    }
}

/// A unified dynamic symbol, independent of container size.
#[derive(Clone, Copy, Default, PartialEq)]
pub struct Sym {
    /// Symbol name, as an offset into `.dynstr`.
    pub st_name: usize,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: usize,
    pub st_value: u64,
    pub st_size: u64,
}

impl Sym {
    /// The encoded size of a symbol in the given context.
    #[inline]
    pub fn size(ctx: Ctx) -> usize {
        match ctx.container {
            Container::Little => sym32::SIZEOF_SYM,
            Container::Big => sym64::SIZEOF_SYM,
        }
    }

    /// `STB_GLOBAL`/`STB_WEAK` binding with a zero value: an import.
    pub fn is_import(&self) -> bool {
        let bind = st_bind(self.st_info);
        (bind == STB_GLOBAL || bind == STB_WEAK) && self.st_value == 0
    }
}

impl fmt::Debug for Sym {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Sym")
            .field("st_name", &self.st_name)
            .field("st_bind", &st_bind(self.st_info))
            .field("st_type", &st_type(self.st_info))
            .field("st_other", &self.st_other)
            .field("st_shndx", &self.st_shndx)
            .field("st_value", &format_args!("{:x}", self.st_value))
            .field("st_size", &self.st_size)
            .finish()
    }
}

impl From<sym32::Sym> for Sym {
    fn from(sym: sym32::Sym) -> Self {
        Sym {
            st_name: sym.st_name as usize,
            st_info: sym.st_info,
            st_other: sym.st_other,
            st_shndx: sym.st_shndx as usize,
            st_value: u64::from(sym.st_value),
            st_size: u64::from(sym.st_size),
        }
    }
}

impl From<Sym> for sym32::Sym {
    fn from(sym: Sym) -> Self {
        sym32::Sym {
            st_name: sym.st_name as u32,
            st_value: sym.st_value as u32,
            st_size: sym.st_size as u32,
            st_info: sym.st_info,
            st_other: sym.st_other,
            st_shndx: sym.st_shndx as u16,
        }
    }
}

impl From<sym64::Sym> for Sym {
    fn from(sym: sym64::Sym) -> Self {
        Sym {
            st_name: sym.st_name as usize,
            st_info: sym.st_info,
            st_other: sym.st_other,
            st_shndx: sym.st_shndx as usize,
            st_value: sym.st_value,
            st_size: sym.st_size,
        }
    }
}

impl From<Sym> for sym64::Sym {
    fn from(sym: Sym) -> Self {
        sym64::Sym {
            st_name: sym.st_name as u32,
            st_info: sym.st_info,
            st_other: sym.st_other,
            st_shndx: sym.st_shndx as u16,
            st_value: sym.st_value,
            st_size: sym.st_size,
        }
    }
}

impl ctx::SizeWith<Ctx> for Sym {
    fn size_with(ctx: &Ctx) -> usize {
        Sym::size(*ctx)
    }
}

impl<'a> ctx::TryFromCtx<'a, Ctx> for Sym {
    type Error = Error;
    fn try_from_ctx(bytes: &'a [u8], Ctx { container, le }: Ctx) -> Result<(Self, usize)> {
        match container {
            Container::Little => Ok((
                bytes.pread_with::<sym32::Sym>(0, le)?.into(),
                sym32::SIZEOF_SYM,
            )),
            Container::Big => Ok((
                bytes.pread_with::<sym64::Sym>(0, le)?.into(),
                sym64::SIZEOF_SYM,
            )),
        }
    }
}

impl ctx::TryIntoCtx<Ctx> for Sym {
    type Error = Error;
    fn try_into_ctx(self, bytes: &mut [u8], Ctx { container, le }: Ctx) -> Result<usize> {
        match container {
            Container::Little => {
                let sym: sym32::Sym = self.into();
                Ok(bytes.pwrite_with(sym, 0, le)?)
            }
            Container::Big => {
                let sym: sym64::Sym = self.into();
                Ok(bytes.pwrite_with(sym, 0, le)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scroll::{Pread, Pwrite};

    #[test]
    fn info_packing() {
        let info = st_info(STB_GLOBAL, STT_FUNC);
        assert_eq!(st_bind(info), STB_GLOBAL);
        assert_eq!(st_type(info), STT_FUNC);
    }

    #[test]
    fn roundtrip() {
        let sym = Sym {
            st_name: 0x2f,
            st_info: st_info(STB_GLOBAL, STT_FUNC),
            st_other: 0,
            st_shndx: 0,
            st_value: 0,
            st_size: 0x20,
        };
        assert!(sym.is_import());
        for &(container, le) in &[
            (Container::Little, scroll::Endian::Little),
            (Container::Little, scroll::Endian::Big),
            (Container::Big, scroll::Endian::Little),
            (Container::Big, scroll::Endian::Big),
        ] {
            let ctx = Ctx::new(container, le);
            let mut bytes = vec![0u8; Sym::size(ctx)];
            bytes.pwrite_with(sym, 0, ctx).unwrap();
            let decoded: Sym = bytes.pread_with(0, ctx).unwrap();
            assert_eq!(decoded, sym);
            let mut reencoded = vec![0u8; Sym::size(ctx)];
            reencoded.pwrite_with(decoded, 0, ctx).unwrap();
            assert_eq!(reencoded, bytes);
        }
    }
}
