mod asset;
mod builder;
mod manager;
mod name;
mod path;
mod worker;

pub use asset::*;
pub use builder::*;
pub use manager::*;
pub use name::*;
pub use path::*;
pub use worker::*;
