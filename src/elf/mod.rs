//! Codecs for the fixed-layout ELF records the merge manipulates, each
//! parameterized by [`Ctx`](crate::container::Ctx) so that one record type
//! covers both container sizes and both byte orders.

pub mod dynamic;
pub mod header;
pub mod program_header;
pub mod reloc;
pub mod section_header;
pub mod sym;
pub mod symver;
