//! # Engine Module
//!
//! Tutto ciò che riguarda il motore esterno (Ghostscript):
//! - `locator`: trova il binario (bundled, override o di sistema) e i path di runtime
//! - `arguments`: costruzione pura dell'argv
//! - `invoker`: esecuzione del processo e classificazione dell'esito
//! - `grayscale`: pre-pass opzionale di conversione in scala di grigi

pub mod arguments;
pub mod grayscale;
pub mod invoker;
pub mod locator;

pub use arguments::ArgumentBuilder;
pub use grayscale::{GrayscaleIntermediate, GrayscaleStage};
pub use invoker::{EngineInvoker, EngineRun};
pub use locator::{EngineEnvironment, EngineLocator, EngineSource};
