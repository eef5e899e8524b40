pub mod capability;
pub mod controller;
pub mod timeline;
pub mod tracker;
pub mod types;
pub mod voice;

pub use capability::{CapError, MediaExec, SpeechIntel};
pub use tracker::JobTracker;
pub use types::{Emotion, Gender, Segment};
