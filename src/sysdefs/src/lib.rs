//! System definitions shared by every crate of the workspace: access rights,
//! open flags, the error taxonomy, and the plain data returned by stat and
//! directory listing.
pub mod constants;
pub mod data;
