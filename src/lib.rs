//! Compiler backend for arbitrary-waveform generators: turns an abstract, timed
//! pulse description into the waveform (`*.wfm`) and program (`*.seq`) files a
//! device with bounded onboard memory and a bounded instruction table can load.
//!
//! Pipeline: [`pulse`] envelope generators → [`timeline`] container →
//! [`region`] analyzer → [`optimizer`] (repetition compression + ceiling
//! validation) → [`codec`] (bit-exact file emission).

pub mod codec;
pub mod error;
pub mod optimizer;
pub mod pulse;
pub mod region;
pub mod timeline;

pub use codec::*;
pub use error::*;
pub use optimizer::*;
pub use pulse::*;
pub use region::*;
pub use timeline::*;
