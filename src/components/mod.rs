pub mod linear;
pub mod mlp;
pub mod patches;
pub mod positional_encoding;

#[cfg(test)]
mod __test__;

pub use self::linear::Linear;
pub use self::mlp::{Mlp, MlpConfigs};
pub use self::patches::{
    assemble_patches, extract_patches, GridPatches, GridPatchesConfigs, PatchGeometry,
};
pub use self::positional_encoding::{
    dot_product_encode, dot_product_encode2, sum_encode, PositionalEncodeStrategy,
    PositionalEncoding, PositionalEncodingConfigs,
};
