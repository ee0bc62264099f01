//! In-memory recording, bad-channel set and electrode layout.
//!
//! A [`Recording`] owns a `[C, T]` buffer whose row `c` belongs to
//! `ch_names[c]`.  The buffer is private: `new` and `with_data` check shape and
//! finiteness, and every transform afterwards keeps the shape and the sample
//! rate.
use std::collections::{BTreeMap, BTreeSet, HashSet};

use ndarray::{Array2, ArrayView1, ArrayViewMut2};

use crate::error::{Error, Result};

/// A multichannel time series.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    ch_names: Vec<String>,
    sfreq: f64,
    data: Array2<f64>,
}

fn check_finite(ch_names: &[String], data: &Array2<f64>) -> Result<()> {
    for (row, name) in data.rows().into_iter().zip(ch_names) {
        if let Some(t) = row.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidRecording(format!(
                "channel '{name}' sample {t} is not finite"
            )));
        }
    }
    Ok(())
}

impl Recording {
    /// Build a recording, rejecting malformed input with `InvalidRecording`.
    pub fn new(ch_names: Vec<String>, sfreq: f64, data: Array2<f64>) -> Result<Self> {
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(Error::InvalidRecording(format!(
                "sample rate must be positive, got {sfreq}"
            )));
        }
        let (n_ch, n_t) = data.dim();
        if n_ch == 0 || n_t == 0 {
            return Err(Error::InvalidRecording(format!(
                "empty buffer ({n_ch} channels × {n_t} samples)"
            )));
        }
        if n_ch != ch_names.len() {
            return Err(Error::InvalidRecording(format!(
                "{} channel names for {n_ch} rows",
                ch_names.len()
            )));
        }
        let mut seen = HashSet::with_capacity(n_ch);
        for name in &ch_names {
            if !seen.insert(name.as_str()) {
                return Err(Error::InvalidRecording(format!("duplicate channel name '{name}'")));
            }
        }
        check_finite(&ch_names, &data)?;
        Ok(Self { ch_names, sfreq, data })
    }

    /// `[C, T]` samples.
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// Mutable view of the samples.  The shape cannot change through it; use
    /// [`Recording::with_data`] to swap the buffer.
    pub fn data_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.data.view_mut()
    }

    pub fn ch_names(&self) -> &[String] {
        &self.ch_names
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn duration_secs(&self) -> f64 {
        self.n_samples() as f64 / self.sfreq
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    /// Samples of the channel called `name`.
    pub fn channel(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self
            .channel_index(name)
            .ok_or_else(|| Error::MissingChannel(name.to_string()))?;
        Ok(self.data.row(idx))
    }

    /// Replace the buffer with one of the same shape and finite samples.
    pub fn with_data(&self, data: Array2<f64>) -> Result<Self> {
        if data.dim() != self.data.dim() {
            return Err(Error::InvalidRecording(format!(
                "replacement buffer {:?} does not match {:?}",
                data.dim(),
                self.data.dim()
            )));
        }
        check_finite(&self.ch_names, &data)?;
        Ok(Self { ch_names: self.ch_names.clone(), sfreq: self.sfreq, data })
    }

    /// Keep only the named channels, in the order given.
    pub fn pick_channels(&self, names: &[&str]) -> Result<Self> {
        let idx: Vec<usize> = names
            .iter()
            .map(|n| self.channel_index(n).ok_or_else(|| Error::MissingChannel(n.to_string())))
            .collect::<Result<_>>()?;
        let data = self.data.select(ndarray::Axis(0), &idx);
        Recording::new(names.iter().map(|s| s.to_string()).collect(), self.sfreq, data)
    }

    /// Strip the trailing `.` padding EDF writers put on short labels
    /// (`"F3.."` → `"F3"`).
    ///
    /// A stripped name that would collide with an existing one is left as is.
    pub fn normalize_channel_names(&mut self) {
        let existing: HashSet<String> = self.ch_names.iter().cloned().collect();
        for name in self.ch_names.iter_mut() {
            let trimmed = name.trim_end_matches('.').trim();
            if trimmed != name.as_str() && !trimmed.is_empty() && !existing.contains(trimmed) {
                *name = trimmed.to_string();
            }
        }
    }
}

/// Channels flagged as unreliable.  Always a subset of the recording's
/// channel names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BadChannelSet(BTreeSet<String>);

impl BadChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from names, dropping any that are not channels of `rec`.
    pub fn from_names<I, S>(rec: &Recording, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .filter(|n| rec.channel_index(n.as_ref()).is_some())
                .map(|n| n.as_ref().to_string())
                .collect(),
        )
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Row indices of the flagged channels in `rec`, ascending.
    pub fn indices(&self, rec: &Recording) -> Vec<usize> {
        let mut idx: Vec<usize> = self.iter().filter_map(|n| rec.channel_index(n)).collect();
        idx.sort_unstable();
        idx
    }
}

/// Electrode positions in metres for some of a recording's channels.
///
/// 2-D layouts are stored with `z = 0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialLayout {
    positions: BTreeMap<String, [f64; 3]>,
}

impl SpatialLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, pos: [f64; 3]) {
        self.positions.insert(name.into(), pos);
    }

    pub fn insert_2d(&mut self, name: impl Into<String>, pos: [f64; 2]) {
        self.insert(name, [pos[0], pos[1], 0.0]);
    }

    pub fn position(&self, name: &str) -> Option<[f64; 3]> {
        self.positions.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, [f64; 3])> {
        self.positions.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, [f64; 3])> for SpatialLayout {
    fn from_iter<I: IntoIterator<Item = (String, [f64; 3])>>(iter: I) -> Self {
        Self { positions: iter.into_iter().collect() }
    }
}
