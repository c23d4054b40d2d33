pub mod process;

pub use process::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
