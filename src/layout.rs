//! File offsets and virtual addresses of the appended region.
//!
//! The rebuilt tables go at the end of the output file, page-aligned, in a
//! fixed order: `.dynstr`, `.dynsym`, `.rel[a].dyn`, `.gnu.version`,
//! `.gnu.version_r`, `.dynamic`, the section header table, the program
//! header table. The whole region is covered by one new `PT_LOAD` whose
//! virtual addresses mirror the file offsets.

use crate::container::Ctx;
use crate::elf::dynamic::Dyn;
use crate::elf::program_header::ProgramHeader;
use crate::elf::section_header::SectionHeader;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::merge::MergePlan;

/// Page size the appended segment is aligned to.
pub const ALIGNMENT: u64 = 0x1000;

/// Round `x` up to a multiple of `alignment`.
#[inline]
pub fn align_up(x: u64, alignment: u64) -> u64 {
    ((x + alignment - 1) / alignment) * alignment
}

/// File offsets of every rebuilt table, and the virtual address the region
/// is mapped at.
pub struct Layout {
    pub target_size: u64,
    /// Zero bytes between the end of the target and the appended region.
    pub pad: u64,
    pub dynstr: u64,
    pub dynsym: u64,
    pub reldyn: u64,
    pub gnu_version: u64,
    pub verneed: u64,
    pub dynamic: u64,
    pub shdrs: u64,
    pub phdrs: u64,
    pub dynamic_size: u64,
    pub shdrs_size: u64,
    pub phdrs_size: u64,
    /// Virtual address of the appended region (of `dynstr`).
    pub start_address: u64,
}

impl Layout {
    pub fn new(target: &Image, target_size: u64, plan: &MergePlan) -> Result<Layout> {
        let ctx: Ctx = target.ctx;
        let t = target
            .dynamic
            .as_ref()
            .ok_or_else(|| Error::Invariant("target has no PT_DYNAMIC segment".into()))?;

        let dynamic_size = (t.dyns.len() * Dyn::size(ctx)) as u64;
        let shdrs_size = (target.section_headers.len() * SectionHeader::size(ctx)) as u64;
        // One segment is added for the appended region itself.
        let phdrs_size = ((target.program_headers.len() + 1) * ProgramHeader::size(ctx)) as u64;

        let pad = align_up(target_size, ALIGNMENT) - target_size;
        let dynstr = target_size + pad;
        let dynsym = dynstr + plan.dynstr.len() as u64;
        let reldyn = dynsym + plan.dynsym.len() as u64;
        let gnu_version = reldyn + plan.reldyn.len() as u64;
        let verneed = gnu_version + plan.gnu_version.len() as u64;
        let dynamic = verneed + plan.verneed.len() as u64;
        let shdrs = dynamic + dynamic_size;
        let phdrs = shdrs + shdrs_size;

        let start_address = target.min_load_vaddr()? + dynstr;
        if start_address != align_up(start_address, ALIGNMENT) {
            return Err(Error::Invariant(format!(
                "appended region start address 0x{start_address:x} is not page-aligned"
            )));
        }

        Ok(Layout {
            target_size,
            pad,
            dynstr,
            dynsym,
            reldyn,
            gnu_version,
            verneed,
            dynamic,
            shdrs,
            phdrs,
            dynamic_size,
            shdrs_size,
            phdrs_size,
            start_address,
        })
    }

    /// The virtual address a file offset inside the appended region maps to.
    #[inline]
    pub fn addr(&self, offset: u64) -> u64 {
        self.start_address + offset - self.dynstr
    }

    /// End of the appended region: the end of the output file.
    #[inline]
    pub fn end(&self) -> u64 {
        self.phdrs + self.phdrs_size
    }

    /// File (and memory) size of the new `PT_LOAD` segment.
    #[inline]
    pub fn segment_size(&self) -> u64 {
        self.end() - self.dynstr
    }
}
