//! Safetensors storage for recordings.
//!
//! A recording file holds:
//!
//! | key        | dtype | shape    | content                                   |
//! |------------|-------|----------|-------------------------------------------|
//! | `data`     | F64   | `[C, T]` | samples                                   |
//! | `sfreq`    | F64   | `[1]`    | sample rate (Hz)                          |
//! | `ch_names` | U8    | `[n]`    | channel names joined by `\n`              |
//! | `chan_pos` | F64   | `[C, 3]` | optional; NaN rows = no position          |
//! | `bads`     | U8    | `[n]`    | optional; flagged channel names, `\n`     |
//!
//! Everything is stored at f64, so a write/read cycle is lossless.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::recording::{BadChannelSet, Recording, SpatialLayout};

// ── Low-level safetensors parser ──────────────────────────────────────────────

struct Entry {
    dtype: String,
    shape: Vec<usize>,
    start: usize,
    end: usize,
}

fn format_err(msg: impl Into<String>) -> Error {
    Error::Format(msg.into())
}

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, Entry>, usize)> {
    let len_bytes: [u8; 8] = bytes
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| format_err("file too small for a safetensors header"))?;
    let header_end = usize::try_from(u64::from_le_bytes(len_bytes))
        .ok()
        .and_then(|n| n.checked_add(8))
        .ok_or_else(|| format_err("header length exceeds file size"))?;
    let header_bytes = bytes
        .get(8..header_end)
        .ok_or_else(|| format_err("header length exceeds file size"))?;
    let header: HashMap<String, serde_json::Value> = serde_json::from_slice(header_bytes)
        .map_err(|e| format_err(format!("failed to parse safetensors header: {e}")))?;

    let mut entries = HashMap::new();
    for (key, val) in header {
        if key == "__metadata__" {
            continue;
        }
        let dtype = val["dtype"]
            .as_str()
            .ok_or_else(|| format_err(format!("'{key}': missing dtype")))?
            .to_string();
        let shape = val["shape"]
            .as_array()
            .ok_or_else(|| format_err(format!("'{key}': missing shape")))?
            .iter()
            .map(|v| v.as_u64().map(|d| d as usize))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| format_err(format!("'{key}': bad shape")))?;
        let offsets = val["data_offsets"]
            .as_array()
            .filter(|o| o.len() == 2)
            .and_then(|o| Some((o[0].as_u64()? as usize, o[1].as_u64()? as usize)))
            .ok_or_else(|| format_err(format!("'{key}': bad data_offsets")))?;
        entries.insert(key, Entry { dtype, shape, start: offsets.0, end: offsets.1 });
    }
    Ok((entries, header_end))
}

fn raw_bytes<'a>(bytes: &'a [u8], data_start: usize, e: &Entry) -> Result<&'a [u8]> {
    let start = data_start.checked_add(e.start);
    let end = data_start.checked_add(e.end);
    start
        .zip(end)
        .and_then(|(start, end)| bytes.get(start..end))
        .ok_or_else(|| format_err("tensor data out of bounds"))
}

fn read_f64_tensor(bytes: &[u8], data_start: usize, key: &str, e: &Entry) -> Result<Vec<f64>> {
    if e.dtype != "F64" {
        return Err(format_err(format!("'{key}': expected F64, found {}", e.dtype)));
    }
    let raw = raw_bytes(bytes, data_start, e)?;
    let expected = e
        .shape
        .iter()
        .try_fold(8usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| format_err(format!("'{key}': shape {:?} overflows", e.shape)))?;
    if raw.len() != expected {
        return Err(format_err(format!("'{key}': {} bytes for shape {:?}", raw.len(), e.shape)));
    }
    Ok(raw
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect())
}

fn read_lines(bytes: &[u8], data_start: usize, key: &str, e: &Entry) -> Result<Vec<String>> {
    let raw = raw_bytes(bytes, data_start, e)?;
    let text = std::str::from_utf8(raw)
        .map_err(|err| format_err(format!("'{key}': not UTF-8: {err}")))?;
    Ok(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// A recording plus whatever the file carried alongside it.
#[derive(Debug, Clone)]
pub struct LoadedRecording {
    pub recording: Recording,
    pub layout: Option<SpatialLayout>,
    pub bads: BadChannelSet,
}

/// Read a recording written by [`write_recording`] (or an equivalent
/// exporter).
pub fn read_recording(path: &Path) -> Result<LoadedRecording> {
    let bytes = std::fs::read(path)?;
    let (header, data_start) = parse_header(&bytes)?;
    let get = |key: &str| {
        header
            .get(key)
            .ok_or_else(|| format_err(format!("{}: missing '{key}'", path.display())))
    };

    let data_entry = get("data")?;
    if data_entry.shape.len() != 2 {
        return Err(format_err(format!("'data' must be 2-D, got {:?}", data_entry.shape)));
    }
    let (n_ch, n_t) = (data_entry.shape[0], data_entry.shape[1]);
    let data = Array2::from_shape_vec(
        (n_ch, n_t),
        read_f64_tensor(&bytes, data_start, "data", data_entry)?,
    )
    .map_err(|e| format_err(e.to_string()))?;

    let sfreq = read_f64_tensor(&bytes, data_start, "sfreq", get("sfreq")?)?
        .first()
        .copied()
        .ok_or_else(|| format_err("'sfreq' is empty"))?;

    let ch_names = read_lines(&bytes, data_start, "ch_names", get("ch_names")?)?;
    let recording = Recording::new(ch_names, sfreq, data)?;

    let layout = match header.get("chan_pos") {
        Some(e) if e.shape == [n_ch, 3] => {
            let pos = read_f64_tensor(&bytes, data_start, "chan_pos", e)?;
            let layout: SpatialLayout = recording
                .ch_names()
                .iter()
                .zip(pos.chunks_exact(3))
                .filter(|(_, p)| p.iter().all(|v| v.is_finite()))
                .map(|(n, p)| (n.clone(), [p[0], p[1], p[2]]))
                .collect();
            (!layout.is_empty()).then_some(layout)
        }
        Some(e) => {
            return Err(format_err(format!("'chan_pos' shape {:?}, expected [{n_ch}, 3]", e.shape)))
        }
        None => None,
    };

    let bads = match header.get("bads") {
        Some(e) => BadChannelSet::from_names(&recording, read_lines(&bytes, data_start, "bads", e)?),
        None => BadChannelSet::new(),
    };

    Ok(LoadedRecording { recording, layout, bads })
}

/// Supplies recordings to the cohort driver.
pub trait RecordingSource: Sync {
    fn load(&self, path: &Path) -> Result<LoadedRecording>;
}

/// Reads safetensors recordings from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetensorsSource;

impl RecordingSource for SafetensorsSource {
    fn load(&self, path: &Path) -> Result<LoadedRecording> {
        read_recording(path)
    }
}

/// Subject identifier from a file name: the part before the first `_`
/// (`S001_preprocessed.safetensors` → `S001`), or the whole stem.
pub fn subject_id_from_path(path: &Path) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    stem.split('_').next().unwrap_or(stem).to_string()
}

/// Expand a glob pattern into sorted file paths.
pub fn discover(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern)
        .map_err(|e| Error::InvalidConfiguration(format!("bad glob '{pattern}': {e}")))?;
    let mut out = Vec::new();
    for entry in paths {
        match entry {
            Ok(p) => out.push(p),
            Err(e) => log::warn!("unreadable path while globbing: {e}"),
        }
    }
    out.sort();
    Ok(out)
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors writer for F64 and U8 tensors.
///
/// ```rust,no_run
/// use faa::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f64("signal", &[1.0, 2.0, 3.0], &[1, 3]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    /// Store strings joined by `\n` as a U8 tensor.
    pub fn add_lines<S: AsRef<str>>(&mut self, name: &str, lines: &[S]) {
        let joined = lines.iter().map(|s| s.as_ref()).collect::<Vec<&str>>().join("\n");
        let bytes = joined.into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(
                name.clone(),
                serde_json::json!({
                    "dtype": dtype,
                    "shape": shape,
                    "data_offsets": [offset, offset + data.len()],
                }),
            );
            offset += data.len();
        }
        let hdr_bytes =
            serde_json::to_vec(&header_map).map_err(|e| format_err(e.to_string()))?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> =
            hdr_bytes.into_iter().chain(std::iter::repeat(b' ').take(pad)).collect();
        let mut f = std::io::BufWriter::new(std::fs::File::create(path)?);
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        f.flush()?;
        Ok(())
    }
}

/// Persist a recording, its layout and its remaining bad channels.
pub fn write_recording(
    rec: &Recording,
    layout: Option<&SpatialLayout>,
    bads: &BadChannelSet,
    path: &Path,
) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f64_arr2("data", rec.data());
    w.add_f64("sfreq", &[rec.sfreq()], &[1]);
    w.add_lines("ch_names", rec.ch_names());
    if let Some(layout) = layout {
        let pos: Vec<f64> = rec
            .ch_names()
            .iter()
            .flat_map(|n| layout.position(n).unwrap_or([f64::NAN; 3]))
            .collect();
        w.add_f64("chan_pos", &pos, &[rec.n_channels(), 3]);
    }
    if !bads.is_empty() {
        let names: Vec<&str> = bads.iter().collect();
        w.add_lines("bads", &names);
    }
    w.write(path)
}
