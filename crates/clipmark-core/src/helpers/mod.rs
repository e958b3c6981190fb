// crates/clipmark-core/src/helpers/mod.rs
//
// Small display helpers shared by the navigator and the shell.

pub mod format;
