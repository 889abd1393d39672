//! An in-memory view of one ELF input: its headers, segments, sections, and
//! the materialized dynamic tables the merge operates on.

use log::debug;
use scroll::Pread;

use crate::container::Ctx;
use crate::elf::dynamic::{self, Dyn};
use crate::elf::header::{self, Header};
use crate::elf::program_header::{PT_DYNAMIC, PT_LOAD, ProgramHeader};
use crate::elf::reloc::Reloc;
use crate::elf::section_header::SectionHeader;
use crate::elf::sym::Sym;
use crate::elf::symver::{self, Verneed};
use crate::error::{Error, Result};
use crate::strtab::Strtab;

/// One parsed ELF input.
pub struct Image {
    pub header: Header,
    pub ctx: Ctx,
    pub program_headers: Vec<ProgramHeader>,
    pub section_headers: Vec<SectionHeader>,
    shstrtab: Vec<u8>,
    /// The dynamic tables, present iff the image has a `PT_DYNAMIC` segment.
    pub dynamic: Option<Dynamic>,
}

/// The dynamic linking metadata of an image. Raw table bytes are kept next
/// to their decoded records so the merge can carry the target's tables
/// through byte-for-byte.
pub struct Dynamic {
    pub dyns: Vec<Dyn>,
    /// Whether relocations carry explicit addends (`Rela`).
    pub is_rela: bool,
    pub dynstr: Vec<u8>,
    pub dynsym: Vec<u8>,
    pub symbols: Vec<Sym>,
    pub reldyn: Vec<u8>,
    pub reldyn_relocs: Vec<Reloc>,
    pub relplt: Vec<u8>,
    pub relplt_relocs: Vec<Reloc>,
    pub gnu_version: Vec<u8>,
    pub version_indices: Vec<u16>,
    pub verneeds: Vec<Verneed>,
}

impl Image {
    pub fn parse(bytes: &[u8]) -> Result<Image> {
        let ctx = header::peek_ctx(bytes)?;
        let header: Header = bytes.pread_with(0, ctx)?;

        let mut program_headers = Vec::with_capacity(header.e_phnum as usize);
        let mut offset = header.e_phoff as usize;
        for _ in 0..header.e_phnum {
            program_headers.push(bytes.gread_with::<ProgramHeader>(&mut offset, ctx)?);
        }

        let mut section_headers = Vec::with_capacity(header.e_shnum as usize);
        let mut offset = header.e_shoff as usize;
        for _ in 0..header.e_shnum {
            section_headers.push(bytes.gread_with::<SectionHeader>(&mut offset, ctx)?);
        }

        let shstrtab = match section_headers.get(header.e_shstrndx as usize) {
            Some(shdr) => bytes
                .pread_with::<&[u8]>(shdr.sh_offset as usize, shdr.sh_size as usize)?
                .to_vec(),
            None => Vec::new(),
        };

        let mut dynamic_phdrs = program_headers.iter().filter(|ph| ph.p_type == PT_DYNAMIC);
        let dynamic = match (dynamic_phdrs.next(), dynamic_phdrs.next()) {
            (Some(phdr), None) => Some(Dynamic::parse(bytes, &program_headers, phdr, ctx)?),
            (None, _) => None,
            (Some(_), Some(_)) => {
                return Err(Error::Invariant(
                    "more than one PT_DYNAMIC segment".into(),
                ));
            }
        };

        debug!(
            "parsed {} segments, {} sections, dynamic: {}",
            program_headers.len(),
            section_headers.len(),
            dynamic.is_some()
        );

        Ok(Image {
            header,
            ctx,
            program_headers,
            section_headers,
            shstrtab,
            dynamic,
        })
    }

    /// Whether this image participates in dynamic linking at all.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }

    /// The name of a section, resolved through the section header string
    /// table.
    pub fn section_name(&self, shdr: &SectionHeader) -> Option<&str> {
        Strtab::new(&self.shstrtab).get_at(shdr.sh_name)
    }

    /// The lowest `p_vaddr` across `PT_LOAD` segments: the image's load base.
    pub fn min_load_vaddr(&self) -> Result<u64> {
        self.program_headers
            .iter()
            .filter(|ph| ph.p_type == PT_LOAD)
            .map(|ph| ph.p_vaddr)
            .min()
            .ok_or_else(|| Error::Malformed("no PT_LOAD segment".into()))
    }
}

/// Translate a virtual address to a file offset through the `PT_LOAD`
/// mappings, and slice `size` bytes there.
fn read_vaddr<'a>(
    bytes: &'a [u8],
    program_headers: &[ProgramHeader],
    addr: u64,
    size: usize,
) -> Result<&'a [u8]> {
    let phdr = program_headers
        .iter()
        .filter(|ph| ph.p_type == PT_LOAD)
        .find(|ph| ph.vm_range().contains(&addr))
        .ok_or_else(|| {
            Error::Malformed(format!("address 0x{addr:x} is not mapped by any PT_LOAD"))
        })?;
    let offset = (addr - phdr.p_vaddr + phdr.p_offset) as usize;
    Ok(bytes.pread_with::<&[u8]>(offset, size)?)
}

impl Dynamic {
    fn parse(
        bytes: &[u8],
        program_headers: &[ProgramHeader],
        phdr: &ProgramHeader,
        ctx: Ctx,
    ) -> Result<Dynamic> {
        let segment =
            bytes.pread_with::<&[u8]>(phdr.p_offset as usize, phdr.p_filesz as usize)?;
        let dyns = dynamic::parse(segment, ctx)?;

        let is_rela = match dynamic::get_tag(&dyns, dynamic::DT_PLTREL)? {
            Some(pltrel) => pltrel == dynamic::DT_RELA,
            // No PLT: whichever relocation table tag is present decides.
            None => dynamic::has_tag(&dyns, dynamic::DT_RELA),
        };

        let dynstr = read_table(
            bytes,
            program_headers,
            &dyns,
            dynamic::DT_STRTAB,
            dynamic::DT_STRSZ,
        )?;

        let (rel_tag, relsz_tag) = if is_rela {
            (dynamic::DT_RELA, dynamic::DT_RELASZ)
        } else {
            (dynamic::DT_REL, dynamic::DT_RELSZ)
        };
        let reldyn = read_table(bytes, program_headers, &dyns, rel_tag, relsz_tag)?;
        let reldyn_relocs = parse_relocs(&reldyn, is_rela, ctx)?;

        let relplt = read_table(
            bytes,
            program_headers,
            &dyns,
            dynamic::DT_JMPREL,
            dynamic::DT_PLTRELSZ,
        )?;
        let relplt_relocs = parse_relocs(&relplt, is_rela, ctx)?;

        // The dynamic symbol table has no size tag of its own; its length is
        // implied by the highest symbol index any relocation uses.
        let symbol_count = reldyn_relocs
            .iter()
            .chain(relplt_relocs.iter())
            .map(|reloc| reloc.r_sym)
            .max()
            .map(|max| max + 1)
            .ok_or_else(|| {
                Error::Malformed(
                    "cannot derive the dynamic symbol count: no dynamic relocations".into(),
                )
            })?;
        debug!(
            "{} symbols, {} + {} relocations ({})",
            symbol_count,
            relplt_relocs.len(),
            reldyn_relocs.len(),
            if is_rela { "rela" } else { "rel" }
        );

        let syment = dynamic::require_tag(&dyns, dynamic::DT_SYMENT)? as usize;
        if syment != Sym::size(ctx) {
            return Err(Error::Malformed(format!(
                "DT_SYMENT is {} but symbols are {} bytes in this class",
                syment,
                Sym::size(ctx)
            )));
        }
        let symtab_addr = dynamic::require_tag(&dyns, dynamic::DT_SYMTAB)?;
        let dynsym =
            read_vaddr(bytes, program_headers, symtab_addr, symbol_count * syment)?.to_vec();
        let mut symbols = Vec::with_capacity(symbol_count);
        let mut offset = 0;
        for _ in 0..symbol_count {
            symbols.push(dynsym.gread_with::<Sym>(&mut offset, ctx)?);
        }

        let gnu_version = match dynamic::get_tag(&dyns, dynamic::DT_VERSYM)? {
            Some(addr) => read_vaddr(bytes, program_headers, addr, symbol_count * 2)?.to_vec(),
            None => Vec::new(),
        };
        let mut version_indices = Vec::with_capacity(gnu_version.len() / 2);
        let mut offset = 0;
        while offset < gnu_version.len() {
            version_indices.push(gnu_version.gread_with::<u16>(&mut offset, ctx.le)?);
        }

        let verneeds = match dynamic::get_tag(&dyns, dynamic::DT_VERNEED)? {
            Some(addr) => {
                let count = dynamic::require_tag(&dyns, dynamic::DT_VERNEEDNUM)? as usize;
                if count == 0 {
                    Vec::new()
                } else {
                    let phdr = program_headers
                        .iter()
                        .filter(|ph| ph.p_type == PT_LOAD)
                        .find(|ph| ph.vm_range().contains(&addr))
                        .ok_or_else(|| {
                            Error::Malformed(format!(
                                "DT_VERNEED address 0x{addr:x} is not mapped by any PT_LOAD"
                            ))
                        })?;
                    let offset = (addr - phdr.p_vaddr + phdr.p_offset) as usize;
                    symver::parse_chain(bytes, offset, count, ctx.le)?
                }
            }
            None => Vec::new(),
        };

        Ok(Dynamic {
            dyns,
            is_rela,
            dynstr,
            dynsym,
            symbols,
            reldyn,
            reldyn_relocs,
            relplt,
            relplt_relocs,
            gnu_version,
            version_indices,
            verneeds,
        })
    }

    /// Look up a tag that may appear at most once.
    pub fn tag(&self, tag: u64) -> Result<Option<u64>> {
        dynamic::get_tag(&self.dyns, tag)
    }

    pub fn has_tag(&self, tag: u64) -> bool {
        dynamic::has_tag(&self.dyns, tag)
    }
}

/// Read an `(address, size)` tag pair as raw table bytes. Either tag being
/// absent yields an empty table.
fn read_table(
    bytes: &[u8],
    program_headers: &[ProgramHeader],
    dyns: &[Dyn],
    addr_tag: u64,
    size_tag: u64,
) -> Result<Vec<u8>> {
    match (
        dynamic::get_tag(dyns, addr_tag)?,
        dynamic::get_tag(dyns, size_tag)?,
    ) {
        (Some(addr), Some(size)) if size > 0 => {
            Ok(read_vaddr(bytes, program_headers, addr, size as usize)?.to_vec())
        }
        _ => Ok(Vec::new()),
    }
}

fn parse_relocs(bytes: &[u8], is_rela: bool, ctx: Ctx) -> Result<Vec<Reloc>> {
    let size = Reloc::size(is_rela, ctx);
    if bytes.len() % size != 0 {
        return Err(Error::Malformed(format!(
            "relocation table length {} is not a multiple of the {}-byte entry size",
            bytes.len(),
            size
        )));
    }
    let mut relocs = Vec::with_capacity(bytes.len() / size);
    let mut offset = 0;
    while offset < bytes.len() {
        relocs.push(bytes.gread_with::<Reloc>(&mut offset, (is_rela, ctx))?);
    }
    Ok(relocs)
}
