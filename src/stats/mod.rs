//! Stats, modifiers and the per-session stat set

pub mod collection;
pub mod manager;
pub mod modifier;
pub mod stat;

pub use collection::{AddOutcome, ModifierCollection};
pub use manager::StatManager;
pub use modifier::{ModifierConfig, ModifierType, StatModifier, PERMANENT};
pub use stat::{ChangeResult, DisplayMode, Stat, StatConfig};
