//! The ELF file header.

use scroll::{Pread, Pwrite, ctx};

use crate::container::{Container, Ctx};
use crate::error::{Error, Result};

/// The ELF magic number.
pub const ELFMAG: &[u8; 4] = b"\x7fELF";
/// Size of the magic prefix.
pub const SELFMAG: usize = 4;

/// File class byte index.
pub const EI_CLASS: usize = 4;
/// 32-bit objects.
pub const ELFCLASS32: u8 = 1;
/// 64-bit objects.
pub const ELFCLASS64: u8 = 2;

/// Data encoding byte index.
pub const EI_DATA: usize = 5;
/// 2's complement, little endian.
pub const ELFDATA2LSB: u8 = 1;
/// 2's complement, big endian.
pub const ELFDATA2MSB: u8 = 2;

/// Number of bytes in `e_ident`.
pub const SIZEOF_IDENT: usize = 16;

/// No file type.
pub const ET_NONE: u16 = 0;
/// Relocatable file.
pub const ET_REL: u16 = 1;
/// Executable file.
pub const ET_EXEC: u16 = 2;
/// Shared object file.
pub const ET_DYN: u16 = 3;
/// Core file.
pub const ET_CORE: u16 = 4;

#[inline]
pub fn et_to_str(et: u16) -> &'static str {
    match et {
        ET_NONE => "NONE",
        ET_REL => "REL",
        ET_EXEC => "EXEC",
        ET_DYN => "DYN",
        ET_CORE => "CORE",
        _ => "UNKNOWN_ET",
    }
}

pub mod header32 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_EHDR: usize = 52;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct Header {
        pub e_ident: [u8; 16],
        pub e_type: u16,
        pub e_machine: u16,
        pub e_version: u32,
        pub e_entry: u32,
        pub e_phoff: u32,
        pub e_shoff: u32,
        pub e_flags: u32,
        pub e_ehsize: u16,
        pub e_phentsize: u16,
        pub e_phnum: u16,
        pub e_shentsize: u16,
        pub e_shnum: u16,
        pub e_shstrndx: u16,
    }
}

pub mod header64 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_EHDR: usize = 64;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct Header {
        pub e_ident: [u8; 16],
        pub e_type: u16,
        pub e_machine: u16,
        pub e_version: u32,
        pub e_entry: u64,
        pub e_phoff: u64,
        pub e_shoff: u64,
        pub e_flags: u32,
        pub e_ehsize: u16,
        pub e_phentsize: u16,
        pub e_phnum: u16,
        pub e_shentsize: u16,
        pub e_shnum: u16,
        pub e_shstrndx: u16,
    }
}

/// A unified ELF header, independent of container size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Header {
    pub e_ident: [u8; SIZEOF_IDENT],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl Header {
    /// The encoded size of the header in the given context.
    #[inline]
    pub fn size(ctx: Ctx) -> usize {
        match ctx.container {
            Container::Little => header32::SIZEOF_EHDR,
            Container::Big => header64::SIZEOF_EHDR,
        }
    }
}

impl From<header32::Header> for Header {
    fn from(header: header32::Header) -> Self {
        Header {
            e_ident: header.e_ident,
            e_type: header.e_type,
            e_machine: header.e_machine,
            e_version: header.e_version,
            e_entry: u64::from(header.e_entry),
            e_phoff: u64::from(header.e_phoff),
            e_shoff: u64::from(header.e_shoff),
            e_flags: header.e_flags,
            e_ehsize: header.e_ehsize,
            e_phentsize: header.e_phentsize,
            e_phnum: header.e_phnum,
            e_shentsize: header.e_shentsize,
            e_shnum: header.e_shnum,
            e_shstrndx: header.e_shstrndx,
        }
    }
}

impl From<Header> for header32::Header {
    fn from(header: Header) -> Self {
        header32::Header {
            e_ident: header.e_ident,
            e_type: header.e_type,
            e_machine: header.e_machine,
            e_version: header.e_version,
            e_entry: header.e_entry as u32,
            e_phoff: header.e_phoff as u32,
            e_shoff: header.e_shoff as u32,
            e_flags: header.e_flags,
            e_ehsize: header.e_ehsize,
            e_phentsize: header.e_phentsize,
            e_phnum: header.e_phnum,
            e_shentsize: header.e_shentsize,
            e_shnum: header.e_shnum,
            e_shstrndx: header.e_shstrndx,
        }
    }
}

impl From<header64::Header> for Header {
    fn from(header: header64::Header) -> Self {
        Header {
            e_ident: header.e_ident,
            e_type: header.e_type,
            e_machine: header.e_machine,
            e_version: header.e_version,
            e_entry: header.e_entry,
            e_phoff: header.e_phoff,
            e_shoff: header.e_shoff,
            e_flags: header.e_flags,
            e_ehsize: header.e_ehsize,
            e_phentsize: header.e_phentsize,
            e_phnum: header.e_phnum,
            e_shentsize: header.e_shentsize,
            e_shnum: header.e_shnum,
            e_shstrndx: header.e_shstrndx,
        }
    }
}

impl From<Header> for header64::Header {
    fn from(header: Header) -> Self {
        header64::Header {
            e_ident: header.e_ident,
            e_type: header.e_type,
            e_machine: header.e_machine,
            e_version: header.e_version,
            e_entry: header.e_entry,
            e_phoff: header.e_phoff,
            e_shoff: header.e_shoff,
            e_flags: header.e_flags,
            e_ehsize: header.e_ehsize,
            e_phentsize: header.e_phentsize,
            e_phnum: header.e_phnum,
            e_shentsize: header.e_shentsize,
            e_shnum: header.e_shnum,
            e_shstrndx: header.e_shstrndx,
        }
    }
}

impl ctx::SizeWith<Ctx> for Header {
    fn size_with(ctx: &Ctx) -> usize {
        Header::size(*ctx)
    }
}

impl<'a> ctx::TryFromCtx<'a, Ctx> for Header {
    type Error = Error;
    fn try_from_ctx(bytes: &'a [u8], Ctx { container, le }: Ctx) -> Result<(Self, usize)> {
        match container {
            Container::Little => Ok((
                bytes.pread_with::<header32::Header>(0, le)?.into(),
                header32::SIZEOF_EHDR,
            )),
            Container::Big => Ok((
                bytes.pread_with::<header64::Header>(0, le)?.into(),
                header64::SIZEOF_EHDR,
            )),
        }
    }
}

impl ctx::TryIntoCtx<Ctx> for Header {
    type Error = Error;
    fn try_into_ctx(self, bytes: &mut [u8], Ctx { container, le }: Ctx) -> Result<usize> {
        match container {
            Container::Little => {
                let header: header32::Header = self.into();
                Ok(bytes.pwrite_with(header, 0, le)?)
            }
            Container::Big => {
                let header: header64::Header = self.into();
                Ok(bytes.pwrite_with(header, 0, le)?)
            }
        }
    }
}

/// Inspect the `e_ident` prefix and derive the codec context, rejecting
/// non-ELF input and unsupported class/encoding combinations.
pub fn peek_ctx(bytes: &[u8]) -> Result<Ctx> {
    if bytes.len() < SIZEOF_IDENT {
        return Err(Error::Malformed(format!(
            "{} bytes is too short for an ELF identification header",
            bytes.len()
        )));
    }
    if &bytes[..SELFMAG] != ELFMAG {
        let magic: u64 = bytes.pread_with(0, scroll::LE)?;
        return Err(Error::BadMagic(magic));
    }
    let container = match bytes[EI_CLASS] {
        ELFCLASS32 => Container::Little,
        ELFCLASS64 => Container::Big,
        class => {
            return Err(Error::Malformed(format!("unsupported ELF class {class}")));
        }
    };
    let le = match bytes[EI_DATA] {
        ELFDATA2LSB => scroll::Endian::Little,
        ELFDATA2MSB => scroll::Endian::Big,
        encoding => {
            return Err(Error::Malformed(format!(
                "unsupported ELF data encoding {encoding}"
            )));
        }
    };
    Ok(Ctx::new(container, le))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scroll::{Pread, Pwrite};

    fn ident(class: u8, data: u8) -> [u8; SIZEOF_IDENT] {
        let mut e_ident = [0u8; SIZEOF_IDENT];
        e_ident[..SELFMAG].copy_from_slice(ELFMAG);
        e_ident[EI_CLASS] = class;
        e_ident[EI_DATA] = data;
        e_ident[6] = 1;
        e_ident
    }

    #[test]
    fn peek() {
        let mut bytes = vec![0u8; header64::SIZEOF_EHDR];
        bytes[..SIZEOF_IDENT].copy_from_slice(&ident(ELFCLASS64, ELFDATA2LSB));
        let ctx = peek_ctx(&bytes).unwrap();
        assert_eq!(ctx, Ctx::new(Container::Big, scroll::Endian::Little));

        bytes[EI_CLASS] = ELFCLASS32;
        bytes[EI_DATA] = ELFDATA2MSB;
        let ctx = peek_ctx(&bytes).unwrap();
        assert_eq!(ctx, Ctx::new(Container::Little, scroll::Endian::Big));

        bytes[0] = 0x7e;
        assert!(matches!(peek_ctx(&bytes), Err(Error::BadMagic(_))));
    }

    #[test]
    fn roundtrip() {
        for &(container, le) in &[
            (Container::Little, scroll::Endian::Little),
            (Container::Little, scroll::Endian::Big),
            (Container::Big, scroll::Endian::Little),
            (Container::Big, scroll::Endian::Big),
        ] {
            let ctx = Ctx::new(container, le);
            let class = if ctx.is_big() { ELFCLASS64 } else { ELFCLASS32 };
            let data = if ctx.is_little_endian() {
                ELFDATA2LSB
            } else {
                ELFDATA2MSB
            };
            let header = Header {
                e_ident: ident(class, data),
                e_type: ET_EXEC,
                e_machine: 0x3e,
                e_version: 1,
                e_entry: 0x401000,
                e_phoff: Header::size(ctx) as u64,
                e_shoff: 0x2000,
                e_flags: 0,
                e_ehsize: Header::size(ctx) as u16,
                e_phentsize: 56,
                e_phnum: 3,
                e_shentsize: 64,
                e_shnum: 8,
                e_shstrndx: 7,
            };
            let mut bytes = vec![0u8; Header::size(ctx)];
            bytes.pwrite_with(header, 0, ctx).unwrap();
            let decoded: Header = bytes.pread_with(0, ctx).unwrap();
            assert_eq!(decoded, header);
            let mut reencoded = vec![0u8; Header::size(ctx)];
            reencoded.pwrite_with(decoded, 0, ctx).unwrap();
            assert_eq!(reencoded, bytes);
        }
    }
}
