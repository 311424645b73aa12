pub mod fs_struct;

pub use fs_struct::*;
