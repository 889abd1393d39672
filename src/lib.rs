//! Merge the dynamic linking metadata of one ELF binary into another.
//!
//! [`extend`] takes a *target* ELF and a *source* ELF and produces an output
//! that behaves, at load time, as if the target had been linked against the
//! union of both inputs' dynamic symbols, relocations and version
//! requirements. The target's code and data are carried through byte for
//! byte; the merged `.dynstr`, `.dynsym`, `.rel[a].dyn`, `.gnu.version`,
//! `.gnu.version_r` and `.dynamic` tables, along with rebuilt section and
//! program header tables, land in a new page-aligned `PT_LOAD` segment
//! appended at the end of the file.
//!
//! Appending the source's records means re-indexing everything that crosses
//! table boundaries: string offsets in symbols and verneeds shift by the
//! length of the target's `.dynstr`, symbol indices in relocations shift by
//! the target's symbol count, and version indices shift past the highest
//! `vna_other` the target assigns. The source's `DT_NEEDED` entries are
//! deliberately *not* copied; that belongs to a later link-time step.
//!
//! ```no_run
//! let target = std::fs::read("translated")?;
//! let source = std::fs::read("helpers.so")?;
//! let mut output = Vec::new();
//! dynmerge::extend(&target, &source, &mut output)?;
//! # Ok::<(), dynmerge::Error>(())
//! ```

use std::io::Write;

use log::debug;

pub mod container;
pub mod elf;
pub mod emit;
pub mod error;
pub mod image;
pub mod layout;
pub mod merge;
pub mod rewrite;
pub mod strtab;

pub use crate::error::{Error, Result};
pub use crate::image::Image;

use crate::layout::Layout;
use crate::merge::MergePlan;

/// Merge `source_bytes`' dynamic metadata into `target_bytes`, writing the
/// result to `output`.
///
/// A source without a `PT_DYNAMIC` segment contributes nothing; the target
/// is copied through unchanged. A target without one, when the source has
/// one, is an [`Error::Invariant`].
pub fn extend<W: Write>(target_bytes: &[u8], source_bytes: &[u8], output: &mut W) -> Result<()> {
    let source = Image::parse(source_bytes)?;
    if !source.is_dynamic() {
        debug!("source has no PT_DYNAMIC segment, copying the target through");
        output.write_all(target_bytes)?;
        return Ok(());
    }
    let target = Image::parse(target_bytes)?;

    if target.ctx.container != source.ctx.container {
        return Err(Error::ShapeMismatch(
            "target and source disagree on ELF class".into(),
        ));
    }
    if target.ctx.le != source.ctx.le {
        return Err(Error::ShapeMismatch(
            "target and source disagree on byte order".into(),
        ));
    }
    let (Some(t), Some(s)) = (target.dynamic.as_ref(), source.dynamic.as_ref()) else {
        return Err(Error::Invariant(
            "target has no PT_DYNAMIC segment but the source has one".into(),
        ));
    };
    if t.is_rela != s.is_rela {
        return Err(Error::ShapeMismatch(
            "target and source disagree on the relocation format (Rel vs Rela)".into(),
        ));
    }

    let plan = MergePlan::new(&target, &source)?;
    let layout = Layout::new(&target, target_bytes.len() as u64, &plan)?;
    let patched = rewrite::rewrite(&target, &plan, &layout)?;
    emit::write_output(output, target_bytes, &plan, &layout, &patched, target.ctx)
}
