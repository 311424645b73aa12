//! This module provides a handle table, an abstraction which keeps native
//! file descriptors away from sandboxed code.  There are several reasons
//! why this is needed.  First, a guest must never hold a raw descriptor, so
//! it can't pass one to a native call we didn't mean to expose.  Second, a
//! handle that was closed must never become valid again, even when its slot
//! is reused for a different file.  Third, each slot carries the rights it
//! was opened with and a sticky error, which the dispatcher enforces.
//!
//! A handle is a 64-bit value packing a slot index and a generation.  The
//! generation of a slot is bumped every time it is recycled, so a stale
//! handle fails the generation check instead of aliasing the new occupant.
//!
//! Tables are plain owned values.  The host keeps one and every guest
//! instance keeps its own.  Nothing in here is internally synchronized.

// ********************** CLIPPY DISCUSSION **************************** //
// We set base lints to give the fullest, most pedantic feedback possible.
// Though we prefer that they are just warnings during development so that
// build-denial is only enforced in CI.
#![warn(
    clippy::all,
    // It's always good to write as much documentation as possible
    missing_docs,
    clippy::pedantic,
)]
// Slot indices are u32 on the wire and usize for indexing.  Casting
// between them is everywhere and is bounded by the capacity clamp.
#![allow(clippy::cast_possible_truncation)]
// ********************* END CLIPPY DISCUSSION ************************* //

// This includes general constants and definitions for things that are
// needed everywhere.  I use the * import here to flatten the namespace so
// folks importing this have the symbols directly imported.
mod commonconstants;
pub use commonconstants::*;

mod handle;
pub use handle::FileHandle;

mod slottable;
pub use slottable::{FileSlot, FileTable};

/***************************** TESTS FOLLOW ******************************/
