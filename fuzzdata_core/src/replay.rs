//! Replays fuzz inputs through a recipe of provider operations.
//!
//! A recipe is an ordered list of [`Step`]s. Replaying an input wraps it in an
//! [`Unstructured`] cursor, runs every step against one
//! [`EnhancedDataProvider`], and records what each step consumed and
//! produced. Reports are deterministic for a given input and recipe, which
//! makes them useful when reading a crash reproducer.

use crate::cursor::ByteCursor;
use crate::provider::EnhancedDataProvider;
use crate::scratch::{FileData, ScratchError, ScratchOptions};
use arbitrary::Unstructured;
use rand::RngCore;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

const DEFAULT_SUBLIST_ITEMS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];
const DEFAULT_TEMP_SUFFIX: &str = ".bin";

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read input {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Scratch resource failed during replay: {0}")]
    Scratch(#[from] ScratchError),
}

/// One provider operation in a replay recipe.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
#[serde(deny_unknown_fields)]
pub enum Step {
    RandomBytes,
    RandomString,
    RemainingBytes,
    RemainingString,
    Sublist {
        items: Vec<String>,
    },
    Date,
    MemoryFile {
        #[serde(default)]
        all_data: bool,
        #[serde(default = "default_as_bytes")]
        as_bytes: bool,
    },
    TemporaryFile {
        suffix: String,
        #[serde(default)]
        all_data: bool,
        #[serde(default = "default_as_bytes")]
        as_bytes: bool,
    },
}

fn default_as_bytes() -> bool {
    ScratchOptions::default().as_bytes
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::RandomBytes => "random-bytes",
            Step::RandomString => "random-string",
            Step::RemainingBytes => "remaining-bytes",
            Step::RemainingString => "remaining-string",
            Step::Sublist { .. } => "sublist",
            Step::Date => "date",
            Step::MemoryFile { .. } => "memory-file",
            Step::TemporaryFile { .. } => "temporary-file",
        }
    }
}

/// The recipe used when no configuration names one: every operation once,
/// ending with a drain of whatever is left.
pub fn default_recipe() -> Vec<Step> {
    vec![
        Step::Date,
        Step::Sublist {
            items: DEFAULT_SUBLIST_ITEMS.iter().map(|s| s.to_string()).collect(),
        },
        Step::RandomString,
        Step::RandomBytes,
        Step::MemoryFile {
            all_data: false,
            as_bytes: true,
        },
        Step::TemporaryFile {
            suffix: DEFAULT_TEMP_SUFFIX.to_string(),
            all_data: false,
            as_bytes: true,
        },
        Step::RemainingBytes,
    ]
}

/// The value a step produced. Binary payloads are rendered as lowercase hex.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StepValue {
    Bytes { hex: String },
    Text { text: String },
    List { items: Vec<String> },
    Date { date: String },
    File { text: bool, contents: String },
}

impl StepValue {
    fn from_file_data(data: FileData) -> Self {
        match data {
            FileData::Bytes(bytes) => StepValue::File {
                text: false,
                contents: to_hex(&bytes),
            },
            FileData::Text(text) => StepValue::File {
                text: true,
                contents: text,
            },
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct StepOutcome {
    pub step: String,
    pub consumed: usize,
    pub remaining: usize,
    pub value: StepValue,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ReplayReport {
    pub source: String,
    pub input_len: usize,
    pub input_md5: String,
    pub steps: Vec<StepOutcome>,
    /// Steps not run because the cursor was exhausted.
    pub skipped: usize,
}

/// A fuzz input and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayInput {
    pub source: String,
    pub data: Vec<u8>,
}

/// Runs `recipe` against `input`.
///
/// With `stop_on_exhaustion`, steps after the cursor runs dry are counted in
/// `skipped` instead of producing empty values.
pub fn replay(
    input: &ReplayInput,
    recipe: &[Step],
    stop_on_exhaustion: bool,
) -> Result<ReplayReport, ReplayError> {
    let mut provider = EnhancedDataProvider::new(Unstructured::new(&input.data));
    let mut steps = Vec::with_capacity(recipe.len());
    let mut skipped = 0;

    for step in recipe {
        let before = provider.remaining_bytes();
        if stop_on_exhaustion && before == 0 {
            skipped += 1;
            continue;
        }
        let value = run_step(&mut provider, step)?;
        let remaining = provider.remaining_bytes();
        trace!(step = step.name(), consumed = before - remaining, remaining, "replayed step");
        steps.push(StepOutcome {
            step: step.name().to_string(),
            consumed: before - remaining,
            remaining,
            value,
        });
    }

    if skipped > 0 {
        debug!(source = %input.source, skipped, "cursor exhausted before end of recipe");
    }

    Ok(ReplayReport {
        source: input.source.clone(),
        input_len: input.data.len(),
        input_md5: format!("{:x}", md5::compute(&input.data)),
        steps,
        skipped,
    })
}

fn run_step<C: ByteCursor>(
    provider: &mut EnhancedDataProvider<C>,
    step: &Step,
) -> Result<StepValue, ReplayError> {
    let value = match step {
        Step::RandomBytes => StepValue::Bytes {
            hex: to_hex(&provider.consume_random_bytes()),
        },
        Step::RandomString => StepValue::Text {
            text: provider.consume_random_string(),
        },
        Step::RemainingBytes => StepValue::Bytes {
            hex: to_hex(&provider.consume_remaining_bytes()),
        },
        Step::RemainingString => StepValue::Text {
            text: provider.consume_remaining_string(),
        },
        Step::Sublist { items } => StepValue::List {
            items: provider.consume_sublist(items),
        },
        Step::Date => StepValue::Date {
            date: provider
                .consume_date()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
        },
        Step::MemoryFile { all_data, as_bytes } => {
            let options = ScratchOptions {
                all_data: *all_data,
                as_bytes: *as_bytes,
            };
            let data = provider
                .with_memory_file(options, |file| read_back(file, *as_bytes))
                .map_err(ScratchError::io("read back"))?;
            StepValue::from_file_data(data)
        }
        Step::TemporaryFile {
            suffix,
            all_data,
            as_bytes,
        } => {
            let options = ScratchOptions {
                all_data: *all_data,
                as_bytes: *as_bytes,
            };
            let data = provider
                .with_temporary_file(suffix, options, |path| read_path(path, *as_bytes))?
                .map_err(ScratchError::io("read back"))?;
            StepValue::from_file_data(data)
        }
    };
    Ok(value)
}

fn read_back(reader: &mut impl Read, as_bytes: bool) -> io::Result<FileData> {
    if as_bytes {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(FileData::Bytes(bytes))
    } else {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(FileData::Text(text))
    }
}

fn read_path(path: &Path, as_bytes: bool) -> io::Result<FileData> {
    let mut file = fs::File::open(path)?;
    read_back(&mut file, as_bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Loads replay inputs. Files are read directly; directories contribute their
/// regular files (not recursively), sorted by path.
pub fn load_inputs(paths: &[PathBuf]) -> Result<Vec<ReplayInput>, ReplayError> {
    let mut inputs = Vec::new();
    for path in paths {
        let metadata = fs::metadata(path).map_err(|source| ReplayError::Io {
            path: path.clone(),
            source,
        })?;
        if metadata.is_dir() {
            let mut files = Vec::new();
            let entries = fs::read_dir(path).map_err(|source| ReplayError::Io {
                path: path.clone(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| ReplayError::Io {
                    path: path.clone(),
                    source,
                })?;
                let entry_path = entry.path();
                if entry_path.is_file() {
                    files.push(entry_path);
                }
            }
            files.sort();
            for file in files {
                inputs.push(read_input(&file)?);
            }
        } else {
            inputs.push(read_input(path)?);
        }
    }
    debug!(count = inputs.len(), "loaded replay inputs");
    Ok(inputs)
}

fn read_input(path: &Path) -> Result<ReplayInput, ReplayError> {
    let data = fs::read(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ReplayInput {
        source: path.display().to_string(),
        data,
    })
}

/// A deterministic pseudo-random input of `len` bytes for exploring recipes.
pub fn synthetic_input(seed: u64, len: usize) -> ReplayInput {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    ReplayInput {
        source: format!("synthetic(seed={seed}, len={len})"),
        data,
    }
}
