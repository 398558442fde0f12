pub mod error;
pub mod install;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod sandbox;
pub mod seed;
pub mod settings;
pub mod toolchain;
pub mod verify;

pub use error::{BootstrapError, Result};
