//! Retargets every structure that points at a dynamic table: `.dynamic`
//! entries, the affected section headers, `PT_DYNAMIC`/`PT_PHDR`, the new
//! `PT_LOAD`, and the ELF header.

use log::warn;

use crate::elf::dynamic::{
    DT_GNU_HASH, DT_HASH, DT_REL, DT_RELA, DT_RELASZ, DT_RELSZ, DT_STRSZ, DT_STRTAB, DT_SYMTAB,
    DT_VERNEED, DT_VERNEEDNUM, DT_VERSYM, Dyn,
};
use crate::elf::header::Header;
use crate::elf::program_header::{PF_R, PF_W, PT_DYNAMIC, PT_LOAD, PT_PHDR, ProgramHeader};
use crate::elf::section_header::SectionHeader;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::layout::{ALIGNMENT, Layout};
use crate::merge::MergePlan;

/// The target's pointing structures, patched to describe the merged tables.
pub struct Patched {
    pub header: Header,
    pub dyns: Vec<Dyn>,
    pub section_headers: Vec<SectionHeader>,
    pub program_headers: Vec<ProgramHeader>,
}

pub fn rewrite(target: &Image, plan: &MergePlan, layout: &Layout) -> Result<Patched> {
    let t = target
        .dynamic
        .as_ref()
        .ok_or_else(|| Error::Invariant("target has no PT_DYNAMIC segment".into()))?;

    if t.has_tag(DT_GNU_HASH) || t.has_tag(DT_HASH) {
        // The hash tables cover only the target's own symbols; they are
        // carried through unmerged and will not index the appended ones.
        warn!("target has a symbol hash table; it is preserved without merging");
    }

    let mut dyns = t.dyns.clone();
    for dyn_entry in &mut dyns {
        match dyn_entry.d_tag {
            DT_STRTAB => dyn_entry.d_val = layout.addr(layout.dynstr),
            DT_STRSZ => dyn_entry.d_val = plan.dynstr.len() as u64,
            DT_SYMTAB => dyn_entry.d_val = layout.addr(layout.dynsym),
            DT_REL | DT_RELA => dyn_entry.d_val = layout.addr(layout.reldyn),
            DT_RELSZ | DT_RELASZ => dyn_entry.d_val = plan.reldyn.len() as u64,
            DT_VERSYM => dyn_entry.d_val = layout.addr(layout.gnu_version),
            DT_VERNEED => dyn_entry.d_val = layout.addr(layout.verneed),
            DT_VERNEEDNUM => dyn_entry.d_val = plan.verneed_count as u64,
            // DT_NEEDED entries stay untouched; carrying the source's
            // dependencies over happens at link time, not here.
            _ => {}
        }
    }

    let mut section_headers = target.section_headers.clone();
    for shdr in &mut section_headers {
        let retarget = |shdr: &mut SectionHeader, offset: u64, size: u64| {
            shdr.sh_addr = layout.addr(offset);
            shdr.sh_offset = offset;
            shdr.sh_size = size;
        };
        match target.section_name(shdr) {
            Some(".dynstr") => retarget(shdr, layout.dynstr, plan.dynstr.len() as u64),
            Some(".dynsym") => retarget(shdr, layout.dynsym, plan.dynsym.len() as u64),
            Some(".rela.dyn") | Some(".rel.dyn") => {
                retarget(shdr, layout.reldyn, plan.reldyn.len() as u64)
            }
            Some(".dynamic") => retarget(shdr, layout.dynamic, layout.dynamic_size),
            Some(".gnu.version") => {
                retarget(shdr, layout.gnu_version, plan.gnu_version.len() as u64)
            }
            Some(".gnu.version_r") => {
                retarget(shdr, layout.verneed, plan.verneed.len() as u64);
                shdr.sh_info = plan.verneed_count as u32;
            }
            _ => {}
        }
    }

    let mut program_headers = target.program_headers.clone();
    for phdr in &mut program_headers {
        match phdr.p_type {
            PT_DYNAMIC => {
                phdr.p_offset = layout.dynamic;
                phdr.p_vaddr = layout.addr(layout.dynamic);
                phdr.p_paddr = layout.addr(layout.dynamic);
                phdr.p_filesz = layout.dynamic_size;
                phdr.p_memsz = layout.dynamic_size;
            }
            PT_PHDR => {
                phdr.p_offset = layout.phdrs;
                phdr.p_vaddr = layout.addr(layout.phdrs);
                phdr.p_paddr = layout.addr(layout.phdrs);
                phdr.p_filesz = layout.phdrs_size;
                phdr.p_memsz = layout.phdrs_size;
            }
            _ => {}
        }
    }
    program_headers.push(ProgramHeader {
        p_type: PT_LOAD,
        p_flags: PF_R | PF_W,
        p_offset: layout.dynstr,
        p_vaddr: layout.start_address,
        p_paddr: layout.start_address,
        p_filesz: layout.segment_size(),
        p_memsz: layout.segment_size(),
        p_align: ALIGNMENT,
    });

    let mut header = target.header;
    header.e_phnum = program_headers.len() as u16;
    header.e_phoff = layout.phdrs;
    header.e_shnum = section_headers.len() as u16;
    header.e_shoff = layout.shdrs;

    Ok(Patched {
        header,
        dyns,
        section_headers,
        program_headers,
    })
}
