//! Provides definitions and implementations for pulse-related functionalities.
//!
//! ## Main Structures and Enumerations:
//!
//! - `PulseType`: An enumeration that defines the supported envelope shapes, including
//!   `GAUSSIAN`, `SECH`, `LORENTZIAN`, `SQUARE` and `EXTERNAL` for curves sourced from
//!   a two-column data resource.
//!
//! - `Pulse`: Represents a named envelope of a fixed sample length, composed of a type
//!   (`PulseType`) and a set of shape arguments (`ShapeArgs`). It offers convenience
//!   constructors per shape and a generic [`Pulse::generate_samples`] evaluation method.
//!   Downstream stages (timeline rendering, region analysis, optimization) dispatch only
//!   through `generate_samples` and never inspect the concrete shape.
//!
//! - `MarkerInterval`: A digital 0/1 channel derived from an on/off index range,
//!   independent of the analog envelope.
//!
//! ## Utilities:
//!
//! - The `ShapeArgs` type alias provides a convenient way to define shape arguments
//!   using a dictionary with string keys and float values.
//!
//! - The `DataResolver` trait injects the lookup of external curve resources, so pulse
//!   construction is the only place that may touch the filesystem and the rest of the
//!   pipeline stays pure.

use std::collections::HashMap;
use std::fmt;
use std::fs;

use maplit::hashmap;
use ndarray::Array1;

use crate::error::{SeqError, SeqResult};

/// Type alias for shape arguments: a dictionary with key-value pairs of
/// string (argument name) and float (value)
pub type ShapeArgs = HashMap<String, f64>;

/// Enum type for the supported envelope shapes.
#[derive(Clone, PartialEq, Debug)]
pub enum PulseType {
    GAUSSIAN,
    SECH,
    LORENTZIAN,
    SQUARE,
    EXTERNAL,
}
impl fmt::Display for PulseType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PulseType::GAUSSIAN => "GAUSSIAN",
                PulseType::SECH => "SECH",
                PulseType::LORENTZIAN => "LORENTZIAN",
                PulseType::SQUARE => "SQUARE",
                PulseType::EXTERNAL => "EXTERNAL",
            }
        )
    }
}

/// Capability for resolving an external two-column (time, amplitude) curve resource.
///
/// The resolver is passed into [`Pulse::new_external`]; resolution happens once at
/// construction so that [`Pulse::generate_samples`] stays pure and I/O-free. Tests
/// inject in-memory fixtures through this trait.
pub trait DataResolver {
    fn resolve(&self, source: &str) -> SeqResult<Vec<(f64, f64)>>;
}

/// Resolves curve resources as whitespace-separated two-column text files on disk.
///
/// Empty lines and lines starting with `#` are skipped.
pub struct FileResolver;

impl DataResolver for FileResolver {
    fn resolve(&self, source: &str) -> SeqResult<Vec<(f64, f64)>> {
        let text = fs::read_to_string(source).map_err(|e| SeqError::Resource {
            source_name: source.to_string(),
            reason: format!("cannot read: {}", e),
        })?;
        let mut points = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line.split_whitespace();
            let parse = |tok: Option<&str>| -> SeqResult<f64> {
                tok.and_then(|t| t.parse::<f64>().ok())
                    .ok_or_else(|| SeqError::Resource {
                        source_name: source.to_string(),
                        reason: format!("line {}: expected two float columns", lineno + 1),
                    })
            };
            let t = parse(cols.next())?;
            let a = parse(cols.next())?;
            points.push((t, a));
        }
        Ok(points)
    }
}

/// Struct for a general pulse envelope, consisting of name, sample length, shape type
/// and shape arguments.
///
/// Different pulse types expect different fields in their argument dictionary.
/// Behavior for minimally expected keys is defined in `Pulse::new`, behavior of
/// default values in `Pulse::generate_samples`.
///
/// ## Implemented pulse types and their expected fields:
/// 1. `PulseType::GAUSSIAN`:
///    - `sigma`
///    - `amplitude`: Default is `1.0`
/// 2. `PulseType::SECH`:
///    - `width`
///    - `amplitude`: Default is `1.0`
/// 3. `PulseType::LORENTZIAN`:
///    - `gamma`
///    - `amplitude`: Default is `1.0`
/// 4. `PulseType::SQUARE`:
///    - `amplitude`
/// 5. `PulseType::EXTERNAL`: no dictionary fields; carries a resolved
///    (time, amplitude) curve instead. `amplitude` (default `1.0`) scales the curve.
///
/// A pulse is immutable once built and owned by the timeline entry that places it.
#[derive(Clone, PartialEq, Debug)]
pub struct Pulse {
    pub name: String,
    pub length: usize,
    pub pulse_type: PulseType,
    pub args: ShapeArgs,
    /// Fixed-timing flag: the caller declares this pulse's placement must not be
    /// shifted by any later scheduling layer. Carried as metadata, never interpreted
    /// by the compiler itself.
    pub fixed: bool,
    /// Resolved (time, amplitude) curve for `EXTERNAL` pulses, sorted by time.
    curve: Option<Vec<(f64, f64)>>,
}

impl Pulse {
    /// Constructs a `Pulse` object.
    ///
    /// This method serves as the foundational constructor upon which the per-shape
    /// convenience wrappers are built. For each pulse type it ensures that the `args`
    /// dictionary contains the required keys; missing keys are a programmer error and
    /// panic. A zero sample length is an input error and fails with [`SeqError::Value`].
    ///
    /// # Examples
    ///
    /// ```
    /// use awgcompiler_backend::pulse::*;
    /// use maplit::hashmap;
    ///
    /// let pulse = Pulse::new(
    ///     "pi_half",
    ///     200,
    ///     PulseType::GAUSSIAN,
    ///     hashmap! {"sigma".to_string() => 25.0},
    ///     false,
    /// ).unwrap();
    /// assert_eq!(pulse.length, 200);
    /// ```
    ///
    /// A zero-length pulse is rejected:
    ///
    /// ```
    /// # use awgcompiler_backend::pulse::*;
    /// # use maplit::hashmap;
    /// let result = Pulse::new("empty", 0, PulseType::SQUARE,
    ///                         hashmap! {"amplitude".to_string() => 1.0}, false);
    /// assert!(result.is_err());
    /// ```
    pub fn new(
        name: &str,
        length: usize,
        pulse_type: PulseType,
        args: ShapeArgs,
        fixed: bool,
    ) -> SeqResult<Self> {
        if length == 0 {
            return Err(SeqError::Value(format!("zero-length pulse '{}'", name)));
        }
        let panic_key = |key| {
            if !args.contains_key(key) {
                panic!("Expected pulse type {} to contain key {}", pulse_type, key)
            }
        };
        match pulse_type {
            PulseType::GAUSSIAN => panic_key("sigma"),
            PulseType::SECH => panic_key("width"),
            PulseType::LORENTZIAN => panic_key("gamma"),
            PulseType::SQUARE => panic_key("amplitude"),
            PulseType::EXTERNAL => {}
        };
        Ok(Pulse {
            name: name.to_string(),
            length,
            pulse_type,
            args,
            fixed,
            curve: None,
        })
    }

    /// Wrapper for conveniently creating Gaussian pulses:
    /// `amplitude * exp(-(t - center)^2 / (2 sigma^2))` with `center = (length-1)/2`.
    pub fn new_gaussian(
        name: &str,
        length: usize,
        amplitude: f64,
        sigma: f64,
        fixed: bool,
    ) -> SeqResult<Self> {
        Pulse::new(
            name,
            length,
            PulseType::GAUSSIAN,
            hashmap! {"amplitude".to_string() => amplitude, "sigma".to_string() => sigma},
            fixed,
        )
    }

    /// Wrapper for hyperbolic-secant pulses: `amplitude / cosh((t - center) / width)`.
    pub fn new_sech(
        name: &str,
        length: usize,
        amplitude: f64,
        width: f64,
        fixed: bool,
    ) -> SeqResult<Self> {
        Pulse::new(
            name,
            length,
            PulseType::SECH,
            hashmap! {"amplitude".to_string() => amplitude, "width".to_string() => width},
            fixed,
        )
    }

    /// Wrapper for Lorentzian pulses: `amplitude * gamma^2 / ((t - center)^2 + gamma^2)`.
    pub fn new_lorentzian(
        name: &str,
        length: usize,
        amplitude: f64,
        gamma: f64,
        fixed: bool,
    ) -> SeqResult<Self> {
        Pulse::new(
            name,
            length,
            PulseType::LORENTZIAN,
            hashmap! {"amplitude".to_string() => amplitude, "gamma".to_string() => gamma},
            fixed,
        )
    }

    /// Wrapper for square pulses: a constant `amplitude` over the full length.
    ///
    /// ```
    /// # use awgcompiler_backend::pulse::*;
    /// let sq = Pulse::new_square("gate", 100, 1.0, false).unwrap();
    /// let samps = sq.generate_samples();
    /// assert!(samps.iter().all(|&v| v == 1.0));
    /// ```
    pub fn new_square(name: &str, length: usize, amplitude: f64, fixed: bool) -> SeqResult<Self> {
        Pulse::new(
            name,
            length,
            PulseType::SQUARE,
            hashmap! {"amplitude".to_string() => amplitude},
            fixed,
        )
    }

    /// Constructs an externally-sourced pulse by resolving a two-column
    /// (time, amplitude) curve through the given resolver.
    ///
    /// Resolution happens here, at construction; sampling later resamples the stored
    /// curve by linear interpolation onto `length` uniformly spaced points spanning
    /// the source's time range. Fails with [`SeqError::Resource`] if the source is
    /// unreadable or holds fewer than 2 points.
    pub fn new_external(
        name: &str,
        length: usize,
        source: &str,
        amplitude: Option<f64>,
        fixed: bool,
        resolver: &dyn DataResolver,
    ) -> SeqResult<Self> {
        let mut curve = resolver.resolve(source)?;
        if curve.len() < 2 {
            return Err(SeqError::Resource {
                source_name: source.to_string(),
                reason: format!("expected at least 2 points, got {}", curve.len()),
            });
        }
        curve.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let mut args = ShapeArgs::new();
        if let Some(amplitude) = amplitude {
            args.insert("amplitude".to_string(), amplitude);
        }
        let mut pulse = Pulse::new(name, length, PulseType::EXTERNAL, args, fixed)?;
        pulse.curve = Some(curve);
        Ok(pulse)
    }

    /// Evaluates the envelope and returns `length` float-point samples.
    ///
    /// Deterministic and pure: calling this any number of times yields identical
    /// arrays. All analytic shapes are centered at `center = (length - 1) / 2`.
    pub fn generate_samples(&self) -> Array1<f64> {
        let center = (self.length as f64 - 1.0) / 2.0;
        let amplitude = *self.args.get("amplitude").unwrap_or(&1.0);
        match self.pulse_type {
            PulseType::GAUSSIAN => {
                let sigma = *self.args.get("sigma").unwrap();
                Array1::from_shape_fn(self.length, |i| {
                    let dt = i as f64 - center;
                    amplitude * (-dt * dt / (2.0 * sigma * sigma)).exp()
                })
            }
            PulseType::SECH => {
                let width = *self.args.get("width").unwrap();
                Array1::from_shape_fn(self.length, |i| {
                    amplitude / ((i as f64 - center) / width).cosh()
                })
            }
            PulseType::LORENTZIAN => {
                let gamma = *self.args.get("gamma").unwrap();
                Array1::from_shape_fn(self.length, |i| {
                    let dt = i as f64 - center;
                    amplitude * gamma * gamma / (dt * dt + gamma * gamma)
                })
            }
            PulseType::SQUARE => Array1::from_elem(self.length, amplitude),
            PulseType::EXTERNAL => {
                let curve = self
                    .curve
                    .as_ref()
                    .expect("EXTERNAL pulse constructed without a curve");
                let t_min = curve.first().unwrap().0;
                let t_max = curve.last().unwrap().0;
                // Uniform grid over the source time range; a single-sample pulse
                // degenerates to the curve start.
                let step = if self.length > 1 {
                    (t_max - t_min) / (self.length as f64 - 1.0)
                } else {
                    0.0
                };
                Array1::from_shape_fn(self.length, |i| {
                    amplitude * interp_linear(curve, t_min + step * i as f64)
                })
            }
        }
    }
}
impl fmt::Display for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let args_string = self
            .args
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<String>>()
            .join(", ");
        write!(
            f,
            "Pulse({}, {}, len={}, {{{}}})",
            self.name, self.pulse_type, self.length, args_string
        )
    }
}

/// Linear interpolation of a sorted (t, a) curve at time `t`.
/// Values outside the curve's range clamp to the end points.
fn interp_linear(curve: &[(f64, f64)], t: f64) -> f64 {
    if t <= curve[0].0 {
        return curve[0].1;
    }
    if t >= curve[curve.len() - 1].0 {
        return curve[curve.len() - 1].1;
    }
    let idx = curve.partition_point(|&(ct, _)| ct <= t);
    let (t0, a0) = curve[idx - 1];
    let (t1, a1) = curve[idx];
    if t1 == t0 {
        a0
    } else {
        a0 + (a1 - a0) * (t - t0) / (t1 - t0)
    }
}

/// A digital marker channel defined by an on/off index range.
///
/// Produces a 0/1 bit array of the declared total length with ones on
/// `[on_index, off_index)`, both indices clipped to the declared length.
#[derive(Clone, PartialEq, Debug)]
pub struct MarkerInterval {
    pub name: String,
    pub length: usize,
    pub on_index: usize,
    pub off_index: usize,
}

impl MarkerInterval {
    pub fn new(name: &str, length: usize, on_index: usize, off_index: usize) -> Self {
        MarkerInterval {
            name: name.to_string(),
            length,
            on_index,
            off_index,
        }
    }

    /// Evaluates the marker into a 0/1 bit array of `self.length`.
    ///
    /// ```
    /// # use awgcompiler_backend::pulse::*;
    /// let marker = MarkerInterval::new("laser", 10, 2, 5);
    /// let bits = marker.generate_markers();
    /// assert_eq!(bits.to_vec(), vec![0, 0, 1, 1, 1, 0, 0, 0, 0, 0]);
    /// ```
    pub fn generate_markers(&self) -> Array1<u8> {
        let mut bits = Array1::zeros(self.length);
        let on = self.on_index.min(self.length);
        let off = self.off_index.min(self.length);
        for i in on..off {
            bits[i] = 1;
        }
        bits
    }
}
impl fmt::Display for MarkerInterval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "MarkerInterval({}, len={}, on={}, off={})",
            self.name, self.length, self.on_index, self.off_index
        )
    }
}
