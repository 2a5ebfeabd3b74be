pub mod config;
pub mod cursor;
pub mod provider;
pub mod replay;
pub mod scratch;

pub use config::{FuzzdataConfig, ReplaySettings};
pub use cursor::ByteCursor;
pub use provider::{EnhancedDataProvider, fallback_date};
pub use replay::{
    ReplayError, ReplayInput, ReplayReport, Step, StepOutcome, StepValue, default_recipe,
    load_inputs, replay, synthetic_input,
};
pub use scratch::{FileData, FileMode, MemoryFile, ScratchError, ScratchOptions, TempScratchFile};
