//! Entries of the `_DYNAMIC` array carried in the `PT_DYNAMIC` segment.

use core::fmt;

use scroll::{Pread, Pwrite, ctx};

use crate::container::{Container, Ctx};
use crate::error::{Error, Result};

// Tag kinds live in u64 so 32-bit d_tag values widen losslessly at parse time
// instead of the 64-bit ones truncating.
pub const DT_NULL: u64 = 0;
pub const DT_NEEDED: u64 = 1;
pub const DT_PLTRELSZ: u64 = 2;
pub const DT_PLTGOT: u64 = 3;
pub const DT_HASH: u64 = 4;
pub const DT_STRTAB: u64 = 5;
pub const DT_SYMTAB: u64 = 6;
pub const DT_RELA: u64 = 7;
pub const DT_RELASZ: u64 = 8;
pub const DT_RELAENT: u64 = 9;
pub const DT_STRSZ: u64 = 10;
pub const DT_SYMENT: u64 = 11;
pub const DT_INIT: u64 = 12;
pub const DT_FINI: u64 = 13;
pub const DT_SONAME: u64 = 14;
pub const DT_RPATH: u64 = 15;
pub const DT_SYMBOLIC: u64 = 16;
pub const DT_REL: u64 = 17;
pub const DT_RELSZ: u64 = 18;
pub const DT_RELENT: u64 = 19;
pub const DT_PLTREL: u64 = 20;
pub const DT_DEBUG: u64 = 21;
pub const DT_TEXTREL: u64 = 22;
pub const DT_JMPREL: u64 = 23;
pub const DT_BIND_NOW: u64 = 24;
pub const DT_INIT_ARRAY: u64 = 25;
pub const DT_FINI_ARRAY: u64 = 26;
pub const DT_INIT_ARRAYSZ: u64 = 27;
pub const DT_FINI_ARRAYSZ: u64 = 28;
pub const DT_RUNPATH: u64 = 29;
pub const DT_FLAGS: u64 = 30;
pub const DT_GNU_HASH: u64 = 0x6ffffef5;
pub const DT_VERSYM: u64 = 0x6ffffff0;
pub const DT_RELACOUNT: u64 = 0x6ffffff9;
pub const DT_RELCOUNT: u64 = 0x6ffffffa;
pub const DT_FLAGS_1: u64 = 0x6ffffffb;
pub const DT_VERDEF: u64 = 0x6ffffffc;
pub const DT_VERDEFNUM: u64 = 0x6ffffffd;
pub const DT_VERNEED: u64 = 0x6ffffffe;
pub const DT_VERNEEDNUM: u64 = 0x6fffffff;

#[inline]
pub fn tag_to_str(tag: u64) -> &'static str {
    match tag {
        DT_NULL => "DT_NULL",
        DT_NEEDED => "DT_NEEDED",
        DT_PLTRELSZ => "DT_PLTRELSZ",
        DT_PLTGOT => "DT_PLTGOT",
        DT_HASH => "DT_HASH",
        DT_STRTAB => "DT_STRTAB",
        DT_SYMTAB => "DT_SYMTAB",
        DT_RELA => "DT_RELA",
        DT_RELASZ => "DT_RELASZ",
        DT_RELAENT => "DT_RELAENT",
        DT_STRSZ => "DT_STRSZ",
        DT_SYMENT => "DT_SYMENT",
        DT_INIT => "DT_INIT",
        DT_FINI => "DT_FINI",
        DT_SONAME => "DT_SONAME",
        DT_RPATH => "DT_RPATH",
        DT_SYMBOLIC => "DT_SYMBOLIC",
        DT_REL => "DT_REL",
        DT_RELSZ => "DT_RELSZ",
        DT_RELENT => "DT_RELENT",
        DT_PLTREL => "DT_PLTREL",
        DT_DEBUG => "DT_DEBUG",
        DT_TEXTREL => "DT_TEXTREL",
        DT_JMPREL => "DT_JMPREL",
        DT_BIND_NOW => "DT_BIND_NOW",
        DT_INIT_ARRAY => "DT_INIT_ARRAY",
        DT_FINI_ARRAY => "DT_FINI_ARRAY",
        DT_INIT_ARRAYSZ => "DT_INIT_ARRAYSZ",
        DT_FINI_ARRAYSZ => "DT_FINI_ARRAYSZ",
        DT_RUNPATH => "DT_RUNPATH",
        DT_FLAGS => "DT_FLAGS",
        DT_GNU_HASH => "DT_GNU_HASH",
        DT_VERSYM => "DT_VERSYM",
        DT_RELACOUNT => "DT_RELACOUNT",
        DT_RELCOUNT => "DT_RELCOUNT",
        DT_FLAGS_1 => "DT_FLAGS_1",
        DT_VERDEF => "DT_VERDEF",
        DT_VERDEFNUM => "DT_VERDEFNUM",
        DT_VERNEED => "DT_VERNEED",
        DT_VERNEEDNUM => "DT_VERNEEDNUM",
        _ => "UNKNOWN_TAG",
    }
}

pub mod dyn32 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_DYN: usize = 8;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct Dyn {
        pub d_tag: u32,
        pub d_val: u32,
    }
}

pub mod dyn64 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_DYN: usize = 16;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct Dyn {
        pub d_tag: u64,
        pub d_val: u64,
    }
}

/// A unified entry in the dynamic array.
#[derive(Clone, Copy, Default, PartialEq)]
pub struct Dyn {
    pub d_tag: u64,
    pub d_val: u64,
}

impl Dyn {
    /// The encoded size of a dynamic entry in the given context.
    #[inline]
    pub fn size(ctx: Ctx) -> usize {
        match ctx.container {
            Container::Little => dyn32::SIZEOF_DYN,
            Container::Big => dyn64::SIZEOF_DYN,
        }
    }
}

impl fmt::Debug for Dyn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "d_tag: {} d_val: 0x{:x}",
            tag_to_str(self.d_tag),
            self.d_val
        )
    }
}

impl From<dyn32::Dyn> for Dyn {
    fn from(d: dyn32::Dyn) -> Self {
        Dyn {
            d_tag: u64::from(d.d_tag),
            d_val: u64::from(d.d_val),
        }
    }
}

impl From<Dyn> for dyn32::Dyn {
    fn from(d: Dyn) -> Self {
        dyn32::Dyn {
            d_tag: d.d_tag as u32,
            d_val: d.d_val as u32,
        }
    }
}

impl From<dyn64::Dyn> for Dyn {
    fn from(d: dyn64::Dyn) -> Self {
        Dyn {
            d_tag: d.d_tag,
            d_val: d.d_val,
        }
    }
}

impl From<Dyn> for dyn64::Dyn {
    fn from(d: Dyn) -> Self {
        dyn64::Dyn {
            d_tag: d.d_tag,
            d_val: d.d_val,
        }
    }
}

impl ctx::SizeWith<Ctx> for Dyn {
    fn size_with(ctx: &Ctx) -> usize {
        Dyn::size(*ctx)
    }
}

impl<'a> ctx::TryFromCtx<'a, Ctx> for Dyn {
    type Error = Error;
    fn try_from_ctx(bytes: &'a [u8], Ctx { container, le }: Ctx) -> Result<(Self, usize)> {
        match container {
            Container::Little => Ok((
                bytes.pread_with::<dyn32::Dyn>(0, le)?.into(),
                dyn32::SIZEOF_DYN,
            )),
            Container::Big => Ok((
                bytes.pread_with::<dyn64::Dyn>(0, le)?.into(),
                dyn64::SIZEOF_DYN,
            )),
        }
    }
}

impl ctx::TryIntoCtx<Ctx> for Dyn {
    type Error = Error;
    fn try_into_ctx(self, bytes: &mut [u8], Ctx { container, le }: Ctx) -> Result<usize> {
        match container {
            Container::Little => {
                let d: dyn32::Dyn = self.into();
                Ok(bytes.pwrite_with(d, 0, le)?)
            }
            Container::Big => {
                let d: dyn64::Dyn = self.into();
                Ok(bytes.pwrite_with(d, 0, le)?)
            }
        }
    }
}

/// Parse the dynamic array from the raw bytes of a `PT_DYNAMIC` segment.
/// Entries after the first `DT_NULL` are padding and are dropped; the
/// terminator itself is kept.
pub fn parse(bytes: &[u8], ctx: Ctx) -> Result<Vec<Dyn>> {
    let count = bytes.len() / Dyn::size(ctx);
    let mut dyns = Vec::with_capacity(count);
    let mut offset = 0;
    for _ in 0..count {
        let d: Dyn = bytes.gread_with(&mut offset, ctx)?;
        let done = d.d_tag == DT_NULL;
        dyns.push(d);
        if done {
            break;
        }
    }
    Ok(dyns)
}

/// Look up a tag that may appear at most once. `Ok(None)` when absent,
/// an invariant error when duplicated.
pub fn get_tag(dyns: &[Dyn], tag: u64) -> Result<Option<u64>> {
    let mut matches = dyns.iter().filter(|d| d.d_tag == tag);
    match (matches.next(), matches.next()) {
        (Some(d), None) => Ok(Some(d.d_val)),
        (None, _) => Ok(None),
        (Some(_), Some(_)) => Err(Error::Invariant(format!(
            "duplicate dynamic tag {}",
            tag_to_str(tag)
        ))),
    }
}

/// Like [`get_tag`], but absence is malformed input.
pub fn require_tag(dyns: &[Dyn], tag: u64) -> Result<u64> {
    get_tag(dyns, tag)?.ok_or_else(|| {
        Error::Malformed(format!("missing required dynamic tag {}", tag_to_str(tag)))
    })
}

pub fn has_tag(dyns: &[Dyn], tag: u64) -> bool {
    dyns.iter().any(|d| d.d_tag == tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scroll::{Pread, Pwrite};

    #[test]
    fn roundtrip() {
        let d = Dyn {
            d_tag: DT_STRTAB,
            d_val: 0x4002a8,
        };
        for &(container, le) in &[
            (Container::Little, scroll::Endian::Little),
            (Container::Little, scroll::Endian::Big),
            (Container::Big, scroll::Endian::Little),
            (Container::Big, scroll::Endian::Big),
        ] {
            let ctx = Ctx::new(container, le);
            let mut bytes = vec![0u8; Dyn::size(ctx)];
            bytes.pwrite_with(d, 0, ctx).unwrap();
            let decoded: Dyn = bytes.pread_with(0, ctx).unwrap();
            assert_eq!(decoded, d);
            let mut reencoded = vec![0u8; Dyn::size(ctx)];
            reencoded.pwrite_with(decoded, 0, ctx).unwrap();
            assert_eq!(reencoded, bytes);
        }
    }

    #[test]
    fn parse_stops_at_null() {
        let ctx = Ctx::default();
        let entries = [
            Dyn {
                d_tag: DT_NEEDED,
                d_val: 1,
            },
            Dyn {
                d_tag: DT_NULL,
                d_val: 0,
            },
            Dyn {
                d_tag: DT_NEEDED,
                d_val: 9,
            },
        ];
        let mut bytes = vec![0u8; entries.len() * Dyn::size(ctx)];
        let mut offset = 0;
        for d in entries {
            bytes.gwrite_with(d, &mut offset, ctx).unwrap();
        }
        let dyns = parse(&bytes, ctx).unwrap();
        assert_eq!(dyns.len(), 2);
        assert_eq!(dyns[1].d_tag, DT_NULL);
    }

    #[test]
    fn tag_lookup() {
        let dyns = [
            Dyn {
                d_tag: DT_NEEDED,
                d_val: 1,
            },
            Dyn {
                d_tag: DT_STRTAB,
                d_val: 0x1000,
            },
            Dyn {
                d_tag: DT_NEEDED,
                d_val: 7,
            },
        ];
        assert_eq!(get_tag(&dyns, DT_STRTAB).unwrap(), Some(0x1000));
        assert_eq!(get_tag(&dyns, DT_SYMTAB).unwrap(), None);
        assert!(get_tag(&dyns, DT_NEEDED).is_err());
        assert!(require_tag(&dyns, DT_SYMTAB).is_err());
        assert!(has_tag(&dyns, DT_NEEDED));
    }
}
