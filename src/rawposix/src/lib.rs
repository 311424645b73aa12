// RawPOSIX Library - capability-scoped file operations for sandboxed guests
//
// Guests never see native descriptors. They hold handles into a per-cage table, and every path
// they open is resolved below the directory their cage was set up with. Host code uses the same
// dispatcher against its own table, and may open paths unrestricted.

pub mod dispatcher;
pub mod file_api;
pub mod fs_calls;
pub mod guest;
pub mod init;
pub mod restrict;

pub use dispatcher::{io_wait_single_req, Completion, CompletionResult, Request};
pub use guest::guest_io_request;
pub use init::{cage_exit, cage_init, io_wait_single_req_global, new_file_table, GLOBALFILETABLE};

#[cfg(test)]
mod tests;
