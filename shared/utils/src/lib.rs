pub mod boq;
pub mod config;
pub mod error;
pub mod logging;

pub use boq::*;
pub use config::*;
pub use error::*;
pub use logging::*;
