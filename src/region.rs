//! Partitions a timeline into alternating active (pulse-bearing) and dead (idle)
//! regions and assigns each a storage resolution.
//!
//! The analysis is structural: it inspects only the placement list, never rendered
//! samples, so a 10-megasample timeline with one short pulse costs a sort of one
//! element. The resulting list covers the timeline exactly, with no gaps and no
//! overlaps, alternating between the two kinds.

use crate::timeline::BaseTimeline;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RegionKind {
    Active,
    Dead,
}

/// Storage resolution assigned to a region.
///
/// `High` regions are always stored literally; `Low` regions are eligible for
/// repetition-based compression against the shared silence waveform.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resolution {
    High,
    Low,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Region {
    pub kind: RegionKind,
    pub start: usize,
    pub length: usize,
    pub resolution: Resolution,
}

impl Region {
    fn new(kind: RegionKind, start: usize, end: usize, dead_threshold: usize) -> Self {
        let length = end - start;
        let resolution = if length < dead_threshold {
            Resolution::High
        } else {
            Resolution::Low
        };
        Region {
            kind,
            start,
            length,
            resolution,
        }
    }
}

/// Partitions `timeline` into an ordered region list.
///
/// Placements are sorted by start index; overlapping or adjacent placements merge
/// into contiguous active spans (clipped at the timeline end). The gaps before the
/// first, between successive, and after the last active span become dead regions.
/// An all-dead timeline yields a single dead region spanning the whole length.
///
/// Regions shorter than `dead_threshold` samples are marked [`Resolution::High`].
pub fn analyze<T: BaseTimeline>(timeline: &T, dead_threshold: usize) -> Vec<Region> {
    let total = timeline.length();
    let mut spans: Vec<(usize, usize)> = timeline
        .placements()
        .iter()
        .map(|(start, pulse)| (*start, (start + pulse.length).min(total)))
        .collect();
    spans.sort();

    // Merge overlapping/adjacent placements into contiguous active spans
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in spans {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => *last_end = (*last_end).max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut regions = Vec::new();
    let mut cursor = 0;
    for (start, end) in merged {
        if start > cursor {
            regions.push(Region::new(RegionKind::Dead, cursor, start, dead_threshold));
        }
        regions.push(Region::new(RegionKind::Active, start, end, dead_threshold));
        cursor = end;
    }
    if cursor < total {
        regions.push(Region::new(RegionKind::Dead, cursor, total, dead_threshold));
    }
    regions
}
