//! Bit-exact binary codec for the two companion hardware file formats.
//!
//! A waveform file (`*.wfm`) holds one segment's analog samples interleaved with
//! marker bytes; a program file (`*.seq`) holds the instruction table plus jump
//! configuration. Both layouts are the hardware-compatibility surface: every
//! byte, including the CRLF terminators and the space after the magic number,
//! is fixed. Identical inputs always produce byte-identical files — nothing
//! here reads clocks or randomness.
//!
//! Encoding (pure, to `Vec<u8>`) is split from writing so tests can check the
//! layout without touching the filesystem; [`SeqWriteSession`] adds the output
//! directory handling. There is no partial-success mode for a single write: on
//! error the partially written file must be treated as invalid by the caller.

use std::fmt;
use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::ArrayView1;

use crate::error::{SeqError, SeqResult};
use crate::optimizer::{ProgramEntry, SeqProgram};

/// Per-file sample cap of the waveform format (after padding).
pub const WFM_SAMPLE_CAP: usize = 4_000_000;

/// Clock rate string for a sample period given in nanoseconds.
///
/// The table is fixed by the hardware; an unrecognized key is a configuration
/// error, not something to round.
fn clock_rate(timeres_ns: u32) -> SeqResult<&'static str> {
    match timeres_ns {
        1 => Ok("1.0000000000E+9"),
        5 => Ok("2.0000000000E+08"),
        10 => Ok("1.0000000000E+08"),
        25 => Ok("4.0000000000E+07"),
        100 => Ok("1.0000000000E+07"),
        other => Err(SeqError::Value(format!(
            "unsupported sample period {} ns (supported: 1, 5, 10, 25, 100)",
            other
        ))),
    }
}

/// Encodes one waveform (analog + markers) into the device waveform file layout:
///
/// `MAGIC 1000 \r\n` + `#<D><N>` + payload + `CLOCK <rate>\r\n`
///
/// The two arrays are first jointly padded with trailing zeros to a multiple of
/// 4 samples; the payload is then `N = padded_len * 5` bytes, each sample a
/// 4-byte little-endian IEEE-754 float immediately followed by one marker byte.
/// `D` is the decimal digit count of `N`.
///
/// Fails with [`SeqError::Value`] if the padded length reaches the per-file cap
/// or the sample period is not in the clock table.
pub fn encode_waveform(
    analog: ArrayView1<f64>,
    markers: ArrayView1<u8>,
    timeres_ns: u32,
) -> SeqResult<Vec<u8>> {
    assert_eq!(
        analog.len(),
        markers.len(),
        "analog ({}) and marker ({}) arrays must have equal length",
        analog.len(),
        markers.len()
    );
    let rate = clock_rate(timeres_ns)?;
    let padded = (analog.len() + 3) / 4 * 4;
    if padded >= WFM_SAMPLE_CAP {
        return Err(SeqError::Value(format!(
            "waveform memory limit exceeded: padded length {} >= {} samples",
            padded, WFM_SAMPLE_CAP
        )));
    }

    let payload_len = padded * 5;
    let mut buf = Vec::with_capacity(payload_len + 64);
    buf.extend_from_slice(b"MAGIC 1000 \r\n");
    let digits = payload_len.to_string();
    buf.push(b'#');
    buf.extend_from_slice(digits.len().to_string().as_bytes());
    buf.extend_from_slice(digits.as_bytes());
    for i in 0..padded {
        let value = if i < analog.len() { analog[i] as f32 } else { 0.0 };
        buf.extend_from_slice(&value.to_le_bytes());
        buf.push(if i < markers.len() { markers[i] } else { 0 });
    }
    buf.extend_from_slice(format!("CLOCK {}\r\n", rate).as_bytes());
    Ok(buf)
}

/// Jump mode of the device sequencer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JumpMode {
    LOGIC,
    TABLE,
    SOFTWARE,
}
impl fmt::Display for JumpMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                JumpMode::LOGIC => "LOGIC",
                JumpMode::TABLE => "TABLE",
                JumpMode::SOFTWARE => "SOFTWARE",
            }
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JumpTiming {
    SYNC,
    ASYNC,
}
impl fmt::Display for JumpTiming {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                JumpTiming::SYNC => "SYNC",
                JumpTiming::ASYNC => "ASYNC",
            }
        )
    }
}

/// Optional jump metadata appended to a program file.
#[derive(Clone, Debug)]
pub struct JumpOptions {
    pub table_jump: Option<[i32; 16]>,
    pub logic_jump: Option<[i32; 4]>,
    pub jump_mode: JumpMode,
    pub jump_timing: JumpTiming,
    pub strobe: u8,
}

impl Default for JumpOptions {
    fn default() -> Self {
        Self {
            table_jump: None,
            logic_jump: None,
            jump_mode: JumpMode::SOFTWARE,
            jump_timing: JumpTiming::ASYNC,
            strobe: 0,
        }
    }
}

fn join_ints(values: &[i32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<String>>()
        .join(",")
}

/// Encodes an ordered instruction table into the device program file layout.
///
/// All textual fields are ASCII with exact CRLF terminators:
///
/// ```text
/// MAGIC 3002 \r\n
/// LINES <count>\r\n
/// "<ch1>","<ch2>",<repeat>,<wait>,<goto>,<logic>\r\n   (per entry)
/// TABLE_JUMP <16 ints>\r\n                             (optional)
/// LOGIC_JUMP <4 ints>\r\n                              (optional)
/// JUMP_MODE <LOGIC|TABLE|SOFTWARE>\r\n
/// JUMP_TIMING <SYNC|ASYNC>\r\n
/// STROBE <0|1>\r\n
/// ```
///
/// The entry-count hardware ceiling is enforced upstream by the optimizer.
pub fn encode_program(entries: &[ProgramEntry], jump: &JumpOptions) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"MAGIC 3002 \r\n");
    buf.extend_from_slice(format!("LINES {}\r\n", entries.len()).as_bytes());
    for entry in entries {
        buf.extend_from_slice(
            format!(
                "\"{}\",\"{}\",{},{},{},{}\r\n",
                entry.ch1_wfm,
                entry.ch2_wfm,
                entry.repeat,
                entry.wait_trig,
                entry.goto_target,
                entry.logic_jump
            )
            .as_bytes(),
        );
    }
    if let Some(table) = &jump.table_jump {
        buf.extend_from_slice(format!("TABLE_JUMP {}\r\n", join_ints(table)).as_bytes());
    }
    if let Some(logic) = &jump.logic_jump {
        buf.extend_from_slice(format!("LOGIC_JUMP {}\r\n", join_ints(logic)).as_bytes());
    }
    buf.extend_from_slice(format!("JUMP_MODE {}\r\n", jump.jump_mode).as_bytes());
    buf.extend_from_slice(format!("JUMP_TIMING {}\r\n", jump.jump_timing).as_bytes());
    buf.extend_from_slice(format!("STROBE {}\r\n", jump.strobe).as_bytes());
    buf
}

/// A write session bound to one output directory.
///
/// Opening a session deletes any pre-existing `*.wfm` / `*.seq` files there —
/// an explicit reset, never an implicit merge — so a run can never mix its
/// output with stale artifacts from a previous one. File handles are scoped to
/// each write call and released on every exit path.
pub struct SeqWriteSession {
    dir: PathBuf,
}

impl SeqWriteSession {
    pub fn new(dir: impl AsRef<Path>) -> SeqResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        for dirent in fs::read_dir(&dir)? {
            let path = dirent?.path();
            let stale = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("wfm") | Some("seq")
            );
            if stale {
                debug!("removing stale output file {}", path.display());
                fs::remove_file(&path)?;
            }
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes one waveform file `<name>_<channel>.wfm` and returns its path.
    pub fn write_waveform(
        &self,
        analog: ArrayView1<f64>,
        markers: ArrayView1<u8>,
        name: &str,
        channel: u8,
        timeres_ns: u32,
    ) -> SeqResult<PathBuf> {
        let bytes = encode_waveform(analog, markers, timeres_ns)?;
        let path = self.dir.join(format!("{}_{}.wfm", name, channel));
        let mut file = File::create(&path)?;
        file.write_all(&bytes)?;
        debug!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Writes the program file `<name>.seq` and returns its path.
    pub fn write_program(
        &self,
        entries: &[ProgramEntry],
        name: &str,
        jump: &JumpOptions,
    ) -> SeqResult<PathBuf> {
        let bytes = encode_program(entries, jump);
        let path = self.dir.join(format!("{}.seq", name));
        let mut file = File::create(&path)?;
        file.write_all(&bytes)?;
        debug!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Writes a full compiled sequence: both channel files for every distinct
    /// stored segment exactly once (regardless of how many entries reference
    /// it), then the program file. Returns the program file path.
    pub fn write_sequence(
        &self,
        program: &SeqProgram,
        name: &str,
        timeres_ns: u32,
        jump: &JumpOptions,
    ) -> SeqResult<PathBuf> {
        for (id, waveform) in program.waveforms.iter() {
            self.write_waveform(
                waveform.analog.view(),
                waveform.markers.view(),
                id,
                1,
                timeres_ns,
            )?;
            let ch2 = ndarray::Array1::from_elem(waveform.len(), program.ch2_fill);
            let ch2_markers = ndarray::Array1::zeros(waveform.len());
            self.write_waveform(ch2.view(), ch2_markers.view(), id, 2, timeres_ns)?;
        }
        let path = self.write_program(&program.entries, name, jump)?;
        info!(
            "wrote sequence '{}': {} waveform pairs, {} program entries, at {}",
            name,
            program.waveforms.len(),
            program.entries.len(),
            self.dir.display()
        );
        Ok(path)
    }
}
