// crates/clipmark-media/src/helpers/mod.rs
//
// Internal to clipmark-media; not re-exported.

pub mod seek;
