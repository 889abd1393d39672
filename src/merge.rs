//! Computes the merged dynamic tables: the target's tables carried through
//! byte-for-byte, with re-biased copies of the source's records appended.

use log::debug;
use scroll::Pwrite;

use crate::elf::reloc::Reloc;
use crate::elf::sym::Sym;
use crate::elf::symver::{self, VER_NDX_GLOBAL, VER_NDX_LOCAL};
use crate::error::{Error, Result};
use crate::image::Image;

/// The merged tables, ready for layout and emission, together with the
/// biases that produced them.
pub struct MergePlan {
    /// Added to every source `st_name`, `vn_file` and `vna_name`: the length
    /// of the target's `.dynstr`.
    pub dynstr_bias: usize,
    /// Added to every source relocation's symbol index: the target's dynamic
    /// symbol count.
    pub symbol_bias: usize,
    /// Added to every non-reserved source version index and `vna_other`.
    pub version_index_offset: u16,
    pub dynstr: Vec<u8>,
    pub dynsym: Vec<u8>,
    pub reldyn: Vec<u8>,
    pub gnu_version: Vec<u8>,
    pub verneed: Vec<u8>,
    /// Number of verneed records in the merged chain (`DT_VERNEEDNUM`).
    pub verneed_count: usize,
}

impl MergePlan {
    pub fn new(target: &Image, source: &Image) -> Result<MergePlan> {
        let ctx = target.ctx;
        let t = target
            .dynamic
            .as_ref()
            .ok_or_else(|| Error::Invariant("target has no PT_DYNAMIC segment".into()))?;
        let s = source
            .dynamic
            .as_ref()
            .ok_or_else(|| Error::Invariant("source has no PT_DYNAMIC segment".into()))?;

        // The appended strings are addressed past the target's table, which
        // only works if that table is properly terminated.
        if t.dynstr.last() != Some(&0) {
            return Err(Error::Invariant(
                "target .dynstr does not end in a NUL byte".into(),
            ));
        }
        let dynstr_bias = t.dynstr.len();
        let mut dynstr = t.dynstr.clone();
        dynstr.extend_from_slice(&s.dynstr);

        let symbol_bias = t.symbols.len();
        let mut dynsym = t.dynsym.clone();
        let mut appended = vec![0u8; s.symbols.len() * Sym::size(ctx)];
        let mut offset = 0;
        for sym in &s.symbols {
            let biased = Sym {
                st_name: sym.st_name + dynstr_bias,
                ..*sym
            };
            appended.gwrite_with(biased, &mut offset, ctx)?;
        }
        dynsym.extend_from_slice(&appended);

        // Source plt relocations first, then its dyn relocations; the merged
        // table is referenced solely by DT_REL[A], so the target's own plt
        // relocations stay where they are and are not duplicated here.
        let mut reldyn = t.reldyn.clone();
        let source_relocs = s.relplt_relocs.iter().chain(s.reldyn_relocs.iter());
        let mut appended =
            vec![0u8; (s.relplt_relocs.len() + s.reldyn_relocs.len()) * Reloc::size(t.is_rela, ctx)];
        let mut offset = 0;
        for reloc in source_relocs {
            let biased = Reloc {
                r_sym: reloc.r_sym + symbol_bias,
                ..*reloc
            };
            appended.gwrite_with(biased, &mut offset, (t.is_rela, ctx))?;
        }
        reldyn.extend_from_slice(&appended);

        let version_index_offset = t
            .verneeds
            .iter()
            .flat_map(|vn| vn.aux.iter())
            .map(|vna| vna.vna_other)
            .max()
            .map(|max| max.saturating_sub(1))
            .unwrap_or(0);
        debug!(
            "biases: dynstr +{dynstr_bias}, symbols +{symbol_bias}, versions +{version_index_offset}"
        );

        let mut gnu_version = t.gnu_version.clone();
        let mut appended = vec![0u8; s.version_indices.len() * 2];
        let mut offset = 0;
        for &index in &s.version_indices {
            let biased = if index == VER_NDX_LOCAL || index == VER_NDX_GLOBAL {
                index
            } else {
                index + version_index_offset
            };
            appended.gwrite_with(biased, &mut offset, ctx.le)?;
        }
        gnu_version.extend_from_slice(&appended);

        let mut chain = t.verneeds.clone();
        if !chain.is_empty() && !s.verneeds.is_empty() {
            // The target's terminator must point forward to the first
            // appended record: from the last record's position to the end of
            // the target's serialized chain.
            let size = symver::chain_size(&chain);
            let position = symver::last_position(&chain);
            if let Some(last) = chain.last_mut() {
                last.vn_next = (size - position) as u32;
            }
        }
        for verneed in &s.verneeds {
            let mut verneed = verneed.clone();
            verneed.vn_file += dynstr_bias as u32;
            for vna in &mut verneed.aux {
                vna.vna_name += dynstr_bias as u32;
                vna.vna_other += version_index_offset;
            }
            chain.push(verneed);
        }
        let verneed = symver::encode_chain(&chain, ctx.le)?;
        let verneed_count = chain.len();

        Ok(MergePlan {
            dynstr_bias,
            symbol_bias,
            version_index_offset,
            dynstr,
            dynsym,
            reldyn,
            gnu_version,
            verneed,
            verneed_count,
        })
    }
}
