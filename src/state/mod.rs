//! Session state: turns, presets, listeners and the orchestrating manager

pub mod events;
pub mod manager;
pub mod preset;
pub mod simulation;

pub use events::{ListenerError, ListenerHandle, ObserverRegistry, StateEvent};
pub use manager::{ProcessResult, StateManager};
pub use preset::{PresetManager, StatPreset};
pub use simulation::{SimulationState, TickReport};
