pub mod generator;
pub mod haptics;
pub mod output;
pub mod tone;

pub use generator::{AlertCycle, AlertGenerator, AlertSettings, OutputFactory};
pub use haptics::{Haptics, ORDER_VIBRATION_PATTERN};
pub use output::{AudioOutput, AudioSupport, Unsupported, WavOutput};
pub use tone::{render_phrase, Phrase, RenderSettings, ToneSegment};
