//! Miscellaneous common structs used throughout the library.

mod command;
mod follow;
mod id;
pub mod messages;
mod node;
mod profile;
mod result;
mod routing_table;

pub use command::*;
pub use follow::*;
pub use id::*;
pub use messages::*;
pub use node::*;
pub use profile::*;
pub use result::*;
pub use routing_table::*;
