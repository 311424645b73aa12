pub mod filesystem_helpers;
pub mod fs_type_conversion;
pub mod path_conversion;

pub use filesystem_helpers::*;
pub use fs_type_conversion::*;
pub use path_conversion::*;
