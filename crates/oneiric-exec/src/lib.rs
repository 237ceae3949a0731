pub mod audio;
pub mod capability;
pub mod command;
pub mod contracts;
pub mod share;
pub mod simulated;

pub use audio::*;
pub use capability::*;
pub use command::*;
pub use contracts::*;
pub use share::*;
pub use simulated::*;
