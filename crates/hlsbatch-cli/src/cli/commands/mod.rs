//! CLI command handlers, one file per command.

mod check;
mod convert;
mod stop;

pub use check::run_check;
pub use convert::{run_convert, ConvertArgs};
pub use stop::run_stop;
