pub mod error;
pub mod progress;
pub mod types;
pub mod update;

pub use error::UpdateError;
pub use types::*;
pub use update::Updater;
