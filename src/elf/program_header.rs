//! Program headers (segments).

use scroll::{Pread, Pwrite, ctx};

use crate::container::{Container, Ctx};
use crate::error::{Error, Result};

/// Program header table entry unused.
pub const PT_NULL: u32 = 0;
/// Loadable program segment.
pub const PT_LOAD: u32 = 1;
/// Dynamic linking information.
pub const PT_DYNAMIC: u32 = 2;
/// Program interpreter.
pub const PT_INTERP: u32 = 3;
/// Auxiliary information.
pub const PT_NOTE: u32 = 4;
/// Entry for header table itself.
pub const PT_PHDR: u32 = 6;
/// Thread-local storage segment.
pub const PT_TLS: u32 = 7;
/// GCC .eh_frame_hdr segment.
pub const PT_GNU_EH_FRAME: u32 = 0x6474e550;
/// Indicates stack executability.
pub const PT_GNU_STACK: u32 = 0x6474e551;
/// Read-only after relocation.
pub const PT_GNU_RELRO: u32 = 0x6474e552;

/// Segment is executable.
pub const PF_X: u32 = 1 << 0;
/// Segment is writable.
pub const PF_W: u32 = 1 << 1;
/// Segment is readable.
pub const PF_R: u32 = 1 << 2;

pub fn pt_to_str(pt: u32) -> &'static str {
    match pt {
        PT_NULL => "PT_NULL",
        PT_LOAD => "PT_LOAD",
        PT_DYNAMIC => "PT_DYNAMIC",
        PT_INTERP => "PT_INTERP",
        PT_NOTE => "PT_NOTE",
        PT_PHDR => "PT_PHDR",
        PT_TLS => "PT_TLS",
        PT_GNU_EH_FRAME => "PT_GNU_EH_FRAME",
        PT_GNU_STACK => "PT_GNU_STACK",
        PT_GNU_RELRO => "PT_GNU_RELRO",
        _ => "UNKNOWN_PT",
    }
}

pub mod program_header32 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_PHDR: usize = 32;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct ProgramHeader {
        pub p_type: u32,
        pub p_offset: u32,
        pub p_vaddr: u32,
        pub p_paddr: u32,
        pub p_filesz: u32,
        pub p_memsz: u32,
        pub p_flags: u32,
        pub p_align: u32,
    }
}

pub mod program_header64 {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const SIZEOF_PHDR: usize = 56;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Pread, Pwrite, SizeWith)]
    pub struct ProgramHeader {
        pub p_type: u32,
        pub p_flags: u32,
        pub p_offset: u64,
        pub p_vaddr: u64,
        pub p_paddr: u64,
        pub p_filesz: u64,
        pub p_memsz: u64,
        pub p_align: u64,
    }
}

/// A unified program header, independent of container size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

impl ProgramHeader {
    /// The encoded size of a program header in the given context.
    #[inline]
    pub fn size(ctx: Ctx) -> usize {
        match ctx.container {
            Container::Little => program_header32::SIZEOF_PHDR,
            Container::Big => program_header64::SIZEOF_PHDR,
        }
    }

    /// The file range `[p_offset, p_offset + p_filesz)` this segment maps.
    #[inline]
    pub fn file_range(&self) -> core::ops::Range<u64> {
        self.p_offset..self.p_offset + self.p_filesz
    }

    /// The virtual address range `[p_vaddr, p_vaddr + p_filesz)` backed by
    /// file bytes.
    #[inline]
    pub fn vm_range(&self) -> core::ops::Range<u64> {
        self.p_vaddr..self.p_vaddr + self.p_filesz
    }
}

impl From<program_header32::ProgramHeader> for ProgramHeader {
    fn from(ph: program_header32::ProgramHeader) -> Self {
        ProgramHeader {
            p_type: ph.p_type,
            p_flags: ph.p_flags,
            p_offset: u64::from(ph.p_offset),
            p_vaddr: u64::from(ph.p_vaddr),
            p_paddr: u64::from(ph.p_paddr),
            p_filesz: u64::from(ph.p_filesz),
            p_memsz: u64::from(ph.p_memsz),
            p_align: u64::from(ph.p_align),
        }
    }
}

impl From<ProgramHeader> for program_header32::ProgramHeader {
    fn from(ph: ProgramHeader) -> Self {
        program_header32::ProgramHeader {
            p_type: ph.p_type,
            p_offset: ph.p_offset as u32,
            p_vaddr: ph.p_vaddr as u32,
            p_paddr: ph.p_paddr as u32,
            p_filesz: ph.p_filesz as u32,
            p_memsz: ph.p_memsz as u32,
            p_flags: ph.p_flags,
            p_align: ph.p_align as u32,
        }
    }
}

impl From<program_header64::ProgramHeader> for ProgramHeader {
    fn from(ph: program_header64::ProgramHeader) -> Self {
        ProgramHeader {
            p_type: ph.p_type,
            p_flags: ph.p_flags,
            p_offset: ph.p_offset,
            p_vaddr: ph.p_vaddr,
            p_paddr: ph.p_paddr,
            p_filesz: ph.p_filesz,
            p_memsz: ph.p_memsz,
            p_align: ph.p_align,
        }
    }
}

impl From<ProgramHeader> for program_header64::ProgramHeader {
    fn from(ph: ProgramHeader) -> Self {
        program_header64::ProgramHeader {
            p_type: ph.p_type,
            p_flags: ph.p_flags,
            p_offset: ph.p_offset,
            p_vaddr: ph.p_vaddr,
            p_paddr: ph.p_paddr,
            p_filesz: ph.p_filesz,
            p_memsz: ph.p_memsz,
            p_align: ph.p_align,
        }
    }
}

impl ctx::SizeWith<Ctx> for ProgramHeader {
    fn size_with(ctx: &Ctx) -> usize {
        ProgramHeader::size(*ctx)
    }
}

impl<'a> ctx::TryFromCtx<'a, Ctx> for ProgramHeader {
    type Error = Error;
    fn try_from_ctx(bytes: &'a [u8], Ctx { container, le }: Ctx) -> Result<(Self, usize)> {
        match container {
            Container::Little => Ok((
                bytes
                    .pread_with::<program_header32::ProgramHeader>(0, le)?
                    .into(),
                program_header32::SIZEOF_PHDR,
            )),
            Container::Big => Ok((
                bytes
                    .pread_with::<program_header64::ProgramHeader>(0, le)?
                    .into(),
                program_header64::SIZEOF_PHDR,
            )),
        }
    }
}

impl ctx::TryIntoCtx<Ctx> for ProgramHeader {
    type Error = Error;
    fn try_into_ctx(self, bytes: &mut [u8], Ctx { container, le }: Ctx) -> Result<usize> {
        match container {
            Container::Little => {
                let ph: program_header32::ProgramHeader = self.into();
                Ok(bytes.pwrite_with(ph, 0, le)?)
            }
            Container::Big => {
                let ph: program_header64::ProgramHeader = self.into();
                Ok(bytes.pwrite_with(ph, 0, le)?)
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
        let ph = ProgramHeader {
            p_type: PT_LOAD,
            p_flags: PF_R | PF_W,
            p_offset: 0x3000,
            p_vaddr: 0x403000,
            p_paddr: 0x403000,
            p_filesz: 0x260,
            p_memsz: 0x260,
            p_align: 0x1000,
        };
        for &(container, le) in &[
            (Container::Little, scroll::Endian::Little),
            (Container::Little, scroll::Endian::Big),
            (Container::Big, scroll::Endian::Little),
            (Container::Big, scroll::Endian::Big),
        ] {
            let ctx = Ctx::new(container, le);
            let mut bytes = vec![0u8; ProgramHeader::size(ctx)];
            bytes.pwrite_with(ph, 0, ctx).unwrap();
            let decoded: ProgramHeader = bytes.pread_with(0, ctx).unwrap();
            assert_eq!(decoded, ph);
            let mut reencoded = vec![0u8; ProgramHeader::size(ctx)];
            reencoded.pwrite_with(decoded, 0, ctx).unwrap();
            assert_eq!(reencoded, bytes);
        }
    }

    #[test]
    fn ranges() {
        let ph = ProgramHeader {
            p_type: PT_LOAD,
            p_offset: 0x1000,
            p_vaddr: 0x401000,
            p_filesz: 0x200,
            ..Default::default()
        };
        assert!(ph.file_range().contains(&0x11ff));
        assert!(!ph.vm_range().contains(&0x401200));
    }
}
