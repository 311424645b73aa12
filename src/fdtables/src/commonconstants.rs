// This file exists to make it easier to vary a single file of constants
// instead of editing the table implementation...

use sysdefs::data::fs_struct::FileDesc;

/// Default number of slots per table.  Re-exported from sysdefs so callers
/// of fdtables don't need another import.
pub use sysdefs::constants::fs_const::FILE_SLOTS_MAX;

/// Bits of a handle used for the slot index.  The rest is the generation.
pub const HANDLE_INDEX_BITS: u32 = 32;

/// Generation given to a slot the first time its index is handed out.
/// Zero is reserved so that a zeroed handle never validates.
pub const FIRST_GENERATION: u32 = 1;

#[allow(non_snake_case)]
/// A close handler which does nothing...
/// It is the default if no close handler is registered
pub const fn NULL_FUNC(_: FileDesc) {}
