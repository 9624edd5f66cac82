//! Reading and writing texture effect groups: the little binary records that describe what a
//! surface's two texture stages do.

extern crate byteorder;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate log;
extern crate memmap;
#[macro_use]
extern crate nom;

#[cfg(test)]
extern crate tempfile;

pub mod effect_group;
pub mod errors;
pub mod files;
pub mod input_buffer;
pub mod parse;

pub use effect_group::{Stage, TextureEffectGroup, decode_effect_group, encode_effect_group};
pub use files::{load_effect_group, load_effect_group_with, save_effect_group};
pub use parse::effect_group::{
    BareEffectGroup, BareStage, Diagnostic, StageKind, Strictness, parse_effect_group,
    DEFAULT_VALUE_SLOTS, FORMAT_VERSION, STAGE_SLOTS,
};
