pub mod actions;
pub mod collection;
pub mod config;
pub mod elements;
pub mod error;
pub mod galaxy;
pub mod logging;
pub mod reducer;
pub mod state;
pub mod store;

pub use actions::*;
pub use reducer::*;
pub use state::*;

pub use error::Error;
pub use error::Result;
