//! Streams the output file: the patched ELF header, the target's remaining
//! bytes verbatim, alignment padding, then every rebuilt table at the offset
//! the layout assigned it.

use std::io::Write;

use scroll::{Pwrite, ctx::TryIntoCtx};

use crate::container::Ctx;
use crate::elf::header::Header;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::merge::MergePlan;
use crate::rewrite::Patched;

/// Encode a homogeneous record table into a fresh buffer.
fn encode_records<T, C>(records: &[T], entry_size: usize, ctx: C) -> Result<Vec<u8>>
where
    T: Copy + TryIntoCtx<C, Error = Error>,
    C: Copy,
{
    let mut bytes = vec![0u8; records.len() * entry_size];
    let mut offset = 0;
    for &record in records {
        bytes.gwrite_with(record, &mut offset, ctx)?;
    }
    Ok(bytes)
}

fn expect_offset(position: u64, expected: u64, table: &str) -> Result<()> {
    if position != expected {
        return Err(Error::Invariant(format!(
            "emit drift before {table}: at offset 0x{position:x}, layout expects 0x{expected:x}"
        )));
    }
    Ok(())
}

pub fn write_output<W: Write>(
    output: &mut W,
    target_bytes: &[u8],
    plan: &MergePlan,
    layout: &Layout,
    patched: &Patched,
    ctx: Ctx,
) -> Result<()> {
    use crate::elf::dynamic::Dyn;
    use crate::elf::program_header::ProgramHeader;
    use crate::elf::section_header::SectionHeader;

    let ehdr_size = Header::size(ctx);
    let mut ehdr = vec![0u8; ehdr_size];
    ehdr.pwrite_with(patched.header, 0, ctx)?;
    output.write_all(&ehdr)?;
    let mut position = ehdr_size as u64;

    // Everything after the ELF header is carried over untouched.
    output.write_all(&target_bytes[ehdr_size..])?;
    position += (target_bytes.len() - ehdr_size) as u64;

    output.write_all(&vec![0u8; layout.pad as usize])?;
    position += layout.pad;

    expect_offset(position, layout.dynstr, ".dynstr")?;
    output.write_all(&plan.dynstr)?;
    position += plan.dynstr.len() as u64;

    expect_offset(position, layout.dynsym, ".dynsym")?;
    output.write_all(&plan.dynsym)?;
    position += plan.dynsym.len() as u64;

    expect_offset(position, layout.reldyn, ".rel[a].dyn")?;
    output.write_all(&plan.reldyn)?;
    position += plan.reldyn.len() as u64;

    expect_offset(position, layout.gnu_version, ".gnu.version")?;
    output.write_all(&plan.gnu_version)?;
    position += plan.gnu_version.len() as u64;

    expect_offset(position, layout.verneed, ".gnu.version_r")?;
    output.write_all(&plan.verneed)?;
    position += plan.verneed.len() as u64;

    expect_offset(position, layout.dynamic, ".dynamic")?;
    let dynamic = encode_records(&patched.dyns, Dyn::size(ctx), ctx)?;
    output.write_all(&dynamic)?;
    position += dynamic.len() as u64;

    expect_offset(position, layout.shdrs, "section headers")?;
    let shdrs = encode_records(&patched.section_headers, SectionHeader::size(ctx), ctx)?;
    output.write_all(&shdrs)?;
    position += shdrs.len() as u64;

    expect_offset(position, layout.phdrs, "program headers")?;
    let phdrs = encode_records(&patched.program_headers, ProgramHeader::size(ctx), ctx)?;
    output.write_all(&phdrs)?;
    position += phdrs.len() as u64;

    expect_offset(position, layout.end(), "end of output")?;
    Ok(())
}
