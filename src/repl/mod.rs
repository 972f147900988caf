//! Interactive command loop.
//!
//! - [`Command`]: parsing of user input and its numeric aliases
//! - [`Console`]: the read-dispatch-print loop

mod command;
mod console;

pub use command::Command;
pub use console::{Console, Flow};
