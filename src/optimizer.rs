//! Memory/repetition optimizer: turns a timeline plus its region list into a
//! storage plan honoring the hardware ceilings.
//!
//! The two ceilings are hard: total distinct stored samples must fit the device
//! waveform memory and the instruction table holds a bounded number of entries.
//! Long idle stretches are traded against table entries by replaying a shared
//! short "silence" waveform with a repeat count; everything else is stored
//! literally. Durations are preserved exactly — a repeat count is never rounded
//! up or down. On ceiling violation the optimizer fails with
//! [`SeqError::HardwareConstraint`] naming the exceeded ceiling; there is no
//! silent truncation or lossy fallback.

use indexmap::IndexMap;
use log::{debug, info};
use ndarray::Array1;

use crate::error::{SeqError, SeqResult};
use crate::region::{analyze, RegionKind, Resolution};
use crate::timeline::BaseTimeline;

/// Onboard waveform memory of the target device, in samples.
pub const AWG_MEMORY_CEILING: usize = 4_194_304;
/// Maximum number of rows in the device instruction table.
pub const AWG_ENTRY_CEILING: usize = 1000;

/// Hardware constants and compression knobs, always passed as a value —
/// never read from process-wide state.
#[derive(Clone, Debug)]
pub struct SeqConstraints {
    /// Aggregate distinct stored-sample ceiling.
    pub memory_ceiling: usize,
    /// Program-entry-count ceiling.
    pub entry_ceiling: usize,
    /// Dead regions shorter than this are stored literally (high resolution).
    pub dead_threshold: usize,
    /// Length of the shared silence reference waveform, in samples.
    pub silence_unit: usize,
    /// Constant fill value for channel 2 of every stored segment; `None` means 0.0.
    pub ch2_fill: Option<f64>,
}

impl Default for SeqConstraints {
    fn default() -> Self {
        Self {
            memory_ceiling: AWG_MEMORY_CEILING,
            entry_ceiling: AWG_ENTRY_CEILING,
            dead_threshold: 1000,
            silence_unit: 1000,
            ch2_fill: None,
        }
    }
}

/// One stored waveform segment: literal channel-1 samples plus derived marker bits.
///
/// Channel 2 is synthesized at write time from [`SeqProgram::ch2_fill`] with the
/// same length, so per-channel memory occupancy is identical and the memory
/// ceiling is checked once over distinct segment ids.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredWaveform {
    pub analog: Array1<f64>,
    pub markers: Array1<u8>,
}

impl StoredWaveform {
    pub fn len(&self) -> usize {
        self.analog.len()
    }
    pub fn is_empty(&self) -> bool {
        self.analog.is_empty()
    }

    fn silence(length: usize) -> Self {
        Self {
            analog: Array1::zeros(length),
            markers: Array1::zeros(length),
        }
    }
}

/// One row of the hardware playback instruction table.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramEntry {
    pub ch1_wfm: String,
    pub ch2_wfm: String,
    /// 0 or 1 both mean single play.
    pub repeat: u32,
    pub wait_trig: u32,
    /// 1-based target row; 0 falls through to the next row.
    pub goto_target: u32,
    pub logic_jump: u32,
}

impl ProgramEntry {
    /// Entry referencing segment `id` on both channels with a given repeat count
    /// and all jump fields cleared.
    pub fn new(id: &str, repeat: u32) -> Self {
        Self {
            ch1_wfm: format!("{}_1.wfm", id),
            ch2_wfm: format!("{}_2.wfm", id),
            repeat,
            wait_trig: 0,
            goto_target: 0,
            logic_jump: 0,
        }
    }
}

/// The optimizer's output: distinct stored segments (keyed by id, in emission
/// order) plus the ordered instruction table referencing them.
#[derive(Debug)]
pub struct SeqProgram {
    pub waveforms: IndexMap<String, StoredWaveform>,
    pub entries: Vec<ProgramEntry>,
    /// Constant channel-2 fill value for every segment.
    pub ch2_fill: f64,
}

impl SeqProgram {
    /// Total distinct stored samples, the quantity checked against the memory
    /// ceiling. A segment referenced by many entries is counted once.
    pub fn stored_samples(&self) -> usize {
        self.waveforms.values().map(|w| w.len()).sum()
    }

    /// Total playback duration in samples: segment length times repeat count,
    /// summed over the instruction table. Always equals the compiled timeline
    /// length — compression preserves duration exactly.
    pub fn represented_samples(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| {
                let id = entry.ch1_wfm.trim_end_matches("_1.wfm");
                let len = self.waveforms.get(id).map_or(0, |w| w.len());
                len * entry.repeat.max(1) as usize
            })
            .sum()
    }
}

/// Compiles `timeline` into a [`SeqProgram`] under `constraints`.
///
/// Per region:
/// 1. active → one literal segment (windowed render), one entry with repeat 0;
/// 2. high-resolution dead → one literal segment of its exact length, repeat 0;
/// 3. low-resolution dead of length `L` with silence unit `u` → the shared
///    silence segment repeated `L / u` times, plus — when `u` does not divide
///    `L` — the remainder `L % u` stored as its own literal silence segment.
///    The represented duration is exactly `L`.
///
/// A dead window carrying any marker bit is stored literally regardless of
/// resolution, since the shared silence segment has all-zero markers and a
/// repeat-compressed marker would be silently dropped.
///
/// The optimizer samples pulses only through the timeline's generic rendering
/// capability; any shape that can produce samples is supported uniformly.
pub fn optimize<T: BaseTimeline>(
    timeline: &T,
    constraints: &SeqConstraints,
) -> SeqResult<SeqProgram> {
    let regions = analyze(timeline, constraints.dead_threshold);
    debug!(
        "optimizing timeline of {} samples across {} regions",
        timeline.length(),
        regions.len()
    );

    let mut waveforms: IndexMap<String, StoredWaveform> = IndexMap::new();
    let mut entries: Vec<ProgramEntry> = Vec::new();
    let mut active_count = 0usize;
    let mut dead_count = 0usize;

    for region in &regions {
        let compressible = region.kind == RegionKind::Dead
            && region.resolution == Resolution::Low
            && region.length >= constraints.silence_unit
            && !timeline.has_marker_in(region.start, region.length);

        if !compressible {
            // Literal storage, exact length
            let (analog, markers) = timeline.render_window(region.start, region.length);
            let id = match region.kind {
                RegionKind::Active => {
                    active_count += 1;
                    format!("active_{:04}", active_count - 1)
                }
                RegionKind::Dead => {
                    dead_count += 1;
                    format!("dead_{:04}", dead_count - 1)
                }
            };
            waveforms.insert(id.clone(), StoredWaveform { analog, markers });
            entries.push(ProgramEntry::new(&id, 0));
            continue;
        }

        let unit = constraints.silence_unit;
        let repeat = region.length / unit;
        let remainder = region.length % unit;
        debug!(
            "dead region at {} ({} samples): {} x {} + {}",
            region.start, region.length, repeat, unit, remainder
        );

        // Shared silence segment, content-addressed by its length: stored once
        // no matter how many regions replay it.
        let silence_id = format!("silence_{}", unit);
        waveforms
            .entry(silence_id.clone())
            .or_insert_with(|| StoredWaveform::silence(unit));
        entries.push(ProgramEntry::new(&silence_id, repeat as u32));

        if remainder > 0 {
            // Remainder policy: emit the non-multiple tail as its own literal
            // segment instead of rounding the repeat count. Deduplicated by
            // length — the window is known marker-free and all-zero.
            let tail_id = format!("silence_{}", remainder);
            waveforms
                .entry(tail_id.clone())
                .or_insert_with(|| StoredWaveform::silence(remainder));
            entries.push(ProgramEntry::new(&tail_id, 0));
        }
    }

    let memory = waveforms.values().map(|w| w.len()).sum::<usize>();
    if memory > constraints.memory_ceiling {
        return Err(SeqError::HardwareConstraint {
            resource: "waveform memory",
            used: memory,
            limit: constraints.memory_ceiling,
        });
    }
    if entries.len() > constraints.entry_ceiling {
        return Err(SeqError::HardwareConstraint {
            resource: "program entries",
            used: entries.len(),
            limit: constraints.entry_ceiling,
        });
    }

    info!(
        "compiled {} segments ({} stored samples) into {} program entries",
        waveforms.len(),
        memory,
        entries.len()
    );
    Ok(SeqProgram {
        waveforms,
        entries,
        ch2_fill: constraints.ch2_fill.unwrap_or(0.0),
    })
}

#[cfg(test)]
/// The optimizer trades instruction-table rows against stored samples, so the
/// tests below pin down both sides of that trade: how many distinct segments
/// end up in memory, how many rows reference them, and that the represented
/// playback duration always equals the timeline length sample for sample.
mod test {
    mod compression {
        use crate::optimizer::*;
        use crate::pulse::{MarkerInterval, Pulse};
        use crate::timeline::{BaseTimeline, Timeline};

        fn one_pulse_timeline(total: usize, pulse_len: usize) -> Timeline {
            let mut tl = Timeline::new(total);
            tl.add_pulse(0, Pulse::new_square("p", pulse_len, 1.0, false).unwrap())
                .unwrap();
            tl
        }

        #[test]
        /// Dead length is an exact multiple of the silence unit: a single
        /// repeat entry covers it, and `r * u == L` with `(r - 1) * u < L`.
        fn exact_multiple_repeat() {
            let tl = one_pulse_timeline(1_001_000, 1000);
            let cons = SeqConstraints::default();
            let prog = optimize(&tl, &cons).unwrap();

            assert_eq!(prog.entries.len(), 2);
            let dead_entry = &prog.entries[1];
            let r = dead_entry.repeat as usize;
            let u = cons.silence_unit;
            let l = 1_000_000;
            assert!(r * u >= l && (r - 1) * u < l);
            assert_eq!(r * u, l);
            assert_eq!(prog.represented_samples(), tl.length());
        }

        #[test]
        /// Non-multiple dead length: floor repeats plus a literal remainder
        /// segment, never a rounded repeat count.
        fn remainder_split() {
            let tl = one_pulse_timeline(3500, 1000);
            let prog = optimize(&tl, &SeqConstraints::default()).unwrap();

            // active, silence x2, 500-sample remainder
            assert_eq!(prog.entries.len(), 3);
            assert_eq!(prog.entries[1].ch1_wfm, "silence_1000_1.wfm");
            assert_eq!(prog.entries[1].repeat, 2);
            assert_eq!(prog.entries[2].ch1_wfm, "silence_500_1.wfm");
            assert_eq!(prog.entries[2].repeat, 0);
            assert_eq!(prog.waveforms.get("silence_500").unwrap().len(), 500);
            assert_eq!(prog.represented_samples(), 3500);
        }

        #[test]
        /// The shared silence segment is stored once no matter how many dead
        /// regions replay it.
        fn silence_deduplicated() {
            let mut tl = Timeline::new(12_000);
            tl.add_pulse(5000, Pulse::new_square("p", 1000, 1.0, false).unwrap())
                .unwrap();
            let prog = optimize(&tl, &SeqConstraints::default()).unwrap();

            // dead(5000) -> 5 repeats, active(1000), dead(6000) -> 6 repeats
            assert_eq!(prog.entries.len(), 3);
            assert_eq!(prog.waveforms.len(), 2);
            assert_eq!(prog.stored_samples(), 2000);
            assert_eq!(prog.represented_samples(), 12_000);
        }

        #[test]
        /// A marker firing inside a dead stretch forces literal storage there:
        /// the shared silence segment has no marker bits to replay.
        fn marker_in_dead_region_stored_literally() {
            let mut tl = Timeline::new(4000);
            tl.add_pulse(0, Pulse::new_square("p", 1000, 1.0, false).unwrap())
                .unwrap();
            tl.add_marker(MarkerInterval::new("gate", 4000, 2000, 2100))
                .unwrap();
            let prog = optimize(&tl, &SeqConstraints::default()).unwrap();

            assert_eq!(prog.entries.len(), 2);
            let dead = prog.waveforms.get("dead_0000").unwrap();
            assert_eq!(dead.len(), 3000);
            assert_eq!(dead.markers[999], 0);
            assert_eq!(dead.markers[1000], 1); // timeline index 2000
            assert_eq!(dead.markers[1099], 1);
            assert_eq!(dead.markers[1100], 0);
        }

        #[test]
        /// A low-resolution dead region shorter than the silence unit falls
        /// back to literal storage.
        fn dead_shorter_than_unit_is_literal() {
            let tl = one_pulse_timeline(1600, 1000);
            let cons = SeqConstraints {
                dead_threshold: 500,
                silence_unit: 1000,
                ..SeqConstraints::default()
            };
            let prog = optimize(&tl, &cons).unwrap();
            assert_eq!(prog.entries.len(), 2);
            assert_eq!(prog.waveforms.get("dead_0000").unwrap().len(), 600);
        }
    }

    mod limits {
        use crate::error::SeqError;
        use crate::optimizer::*;
        use crate::pulse::Pulse;
        use crate::timeline::{BaseTimeline, Timeline};

        #[test]
        fn entry_ceiling_violation() {
            let mut tl = Timeline::new(100_000);
            // Isolated pulses: each contributes an active entry plus dead gaps
            for i in 0..10 {
                tl.add_pulse(i * 10_000, Pulse::new_square("p", 100, 1.0, false).unwrap())
                    .unwrap();
            }
            let cons = SeqConstraints {
                entry_ceiling: 5,
                ..SeqConstraints::default()
            };
            match optimize(&tl, &cons) {
                Err(SeqError::HardwareConstraint {
                    resource, limit, ..
                }) => {
                    assert_eq!(resource, "program entries");
                    assert_eq!(limit, 5);
                }
                other => panic!("expected entry-ceiling violation, got {:?}", other.is_ok()),
            }
        }

        #[test]
        fn memory_ceiling_violation() {
            let mut tl = Timeline::new(10_000);
            tl.add_pulse(0, Pulse::new_square("p", 5000, 1.0, false).unwrap())
                .unwrap();
            let cons = SeqConstraints {
                memory_ceiling: 4000,
                ..SeqConstraints::default()
            };
            match optimize(&tl, &cons) {
                Err(SeqError::HardwareConstraint {
                    resource,
                    used,
                    limit,
                }) => {
                    assert_eq!(resource, "waveform memory");
                    assert_eq!(limit, 4000);
                    assert!(used > limit);
                }
                other => panic!("expected memory-ceiling violation, got {:?}", other.is_ok()),
            }
        }

        #[test]
        /// Ten-megasample timeline with one short pulse compiles to a handful
        /// of entries and a few thousand stored samples — never a single
        /// multi-megasample literal segment.
        fn long_dead_time_never_stored_literally() {
            let mut tl = Timeline::new(10_000_000);
            tl.add_pulse(0, Pulse::new_square("p", 1000, 1.0, false).unwrap())
                .unwrap();
            let prog = optimize(&tl, &SeqConstraints::default()).unwrap();

            assert_eq!(prog.entries.len(), 2);
            assert!(prog.stored_samples() <= 2000);
            assert!(prog.waveforms.values().all(|w| w.len() <= 1000));
            assert_eq!(prog.represented_samples(), 10_000_000);
        }
    }
}
