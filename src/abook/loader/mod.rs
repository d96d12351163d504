pub mod config;
pub mod directory;
pub mod error;
pub mod hierarchy;
pub mod io;
pub mod model;
pub mod sync;

pub use error::{LoaderError, Result};
