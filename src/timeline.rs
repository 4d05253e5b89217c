//! Fixed-length container of pulse placements and marker intervals.
//!
//! A [`Timeline`] is the editable unit the caller builds up via
//! [`BaseTimeline::add_pulse`] / [`BaseTimeline::add_marker`] and renders on demand.
//! Rendering is pure: it never mutates the timeline and repeated calls yield
//! identical arrays. [`BaseTimeline::render_window`] is the restriction of a full
//! render to a sub-range, so downstream stages can sample multi-megasample
//! timelines region by region without materializing the dead stretches.

use ndarray::Array1;

use crate::error::{SeqError, SeqResult};
use crate::pulse::{MarkerInterval, Pulse};

pub trait BaseTimeline {
    // Field methods
    fn length(&self) -> usize;
    fn placements(&self) -> &Vec<(usize, Pulse)>;
    fn markers(&self) -> &Vec<MarkerInterval>;
    // Mutable field references
    fn placements_(&mut self) -> &mut Vec<(usize, Pulse)>;
    fn markers_(&mut self) -> &mut Vec<MarkerInterval>;

    /// Places `pulse` with its first sample at index `start`.
    ///
    /// Placements may overlap (amplitudes sum at render time) and a pulse extending
    /// past the timeline end is truncated at render time. The start index itself
    /// must lie within bounds.
    fn add_pulse(&mut self, start: usize, pulse: Pulse) -> SeqResult<()> {
        if start >= self.length() {
            return Err(SeqError::Range {
                start,
                length: self.length(),
            });
        }
        self.placements_().push((start, pulse));
        Ok(())
    }

    /// Registers a marker interval; its declared length must equal the timeline length.
    fn add_marker(&mut self, marker: MarkerInterval) -> SeqResult<()> {
        if marker.length != self.length() {
            return Err(SeqError::LengthMismatch {
                marker: marker.name.clone(),
                marker_len: marker.length,
                timeline_len: self.length(),
            });
        }
        self.markers_().push(marker);
        Ok(())
    }

    /// Renders the full timeline into a zero-based analog array and a marker bit array.
    ///
    /// Pulse samples are added at their start offsets (overlaps sum, no clamping);
    /// marker bits are combined by logical OR.
    fn render(&self) -> (Array1<f64>, Array1<u8>) {
        let mut analog = Array1::zeros(self.length());
        let mut bits: Array1<u8> = Array1::zeros(self.length());
        for (start, pulse) in self.placements().iter() {
            let samples = pulse.generate_samples();
            let span = pulse.length.min(self.length() - start);
            for i in 0..span {
                analog[start + i] += samples[i];
            }
        }
        for marker in self.markers().iter() {
            let marker_bits = marker.generate_markers();
            for i in 0..self.length() {
                bits[i] |= marker_bits[i];
            }
        }
        (analog, bits)
    }

    /// Renders only the window `[start, start + len)`.
    ///
    /// Agrees sample for sample with the corresponding slice of [`BaseTimeline::render`].
    fn render_window(&self, start: usize, len: usize) -> (Array1<f64>, Array1<u8>) {
        assert!(
            start + len <= self.length(),
            "render window {}..{} exceeds timeline length {}",
            start,
            start + len,
            self.length()
        );
        let w_end = start + len;
        let mut analog = Array1::zeros(len);
        let mut bits: Array1<u8> = Array1::zeros(len);
        for (p_start, pulse) in self.placements().iter() {
            let p_end = (p_start + pulse.length).min(self.length());
            let lo = (*p_start).max(start);
            let hi = p_end.min(w_end);
            if lo >= hi {
                continue;
            }
            let samples = pulse.generate_samples();
            for i in lo..hi {
                analog[i - start] += samples[i - p_start];
            }
        }
        for marker in self.markers().iter() {
            let lo = marker.on_index.min(marker.off_index).max(start);
            let hi = marker.off_index.min(marker.length).min(w_end);
            for i in lo..hi {
                bits[i - start] = 1;
            }
        }
        (analog, bits)
    }

    /// Whether any marker bit is set inside `[start, start + len)`.
    fn has_marker_in(&self, start: usize, len: usize) -> bool {
        let w_end = start + len;
        self.markers().iter().any(|marker| {
            let lo = marker.on_index.max(start);
            let hi = marker.off_index.min(marker.length).min(w_end);
            lo < hi
        })
    }

    /// Discards all placements and markers; the length stays unchanged.
    fn clear(&mut self) {
        self.placements_().clear();
        self.markers_().clear();
    }
}

pub struct Timeline {
    length: usize,
    placements: Vec<(usize, Pulse)>,
    markers: Vec<MarkerInterval>,
}

impl BaseTimeline for Timeline {
    fn length(&self) -> usize {
        self.length
    }
    fn placements(&self) -> &Vec<(usize, Pulse)> {
        &self.placements
    }
    fn markers(&self) -> &Vec<MarkerInterval> {
        &self.markers
    }
    fn placements_(&mut self) -> &mut Vec<(usize, Pulse)> {
        &mut self.placements
    }
    fn markers_(&mut self) -> &mut Vec<MarkerInterval> {
        &mut self.markers
    }
}

impl Timeline {
    /// Creates an empty timeline of a fixed sample length.
    ///
    /// ```
    /// use awgcompiler_backend::timeline::*;
    /// use awgcompiler_backend::pulse::Pulse;
    ///
    /// let mut tl = Timeline::new(1000);
    /// tl.add_pulse(0, Pulse::new_square("gate", 100, 1.0, false).unwrap()).unwrap();
    /// let (analog, markers) = tl.render();
    /// assert_eq!(analog.len(), 1000);
    /// assert!(markers.iter().all(|&b| b == 0));
    /// ```
    pub fn new(length: usize) -> Self {
        Self {
            length,
            placements: Vec::new(),
            markers: Vec::new(),
        }
    }
}
