pub mod config;
pub mod error;
pub mod numeric;
pub mod types;

pub use config::{ParserConfig, TokenMode, TrackerConfig};
pub use error::{Result, TallyError};
pub use numeric::SafeMath;
