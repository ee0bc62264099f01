//! Artifact separation with FastICA.
//!
//! The conditioned `[C, T]` buffer is centred, reduced to its leading PCA
//! components and decomposed by `linfa-ica`'s parallel FastICA with the
//! `logcosh` contrast.  Which components count as artifacts is
//! decided outside the fit by a [`ComponentSelector`]; the default selects
//! nothing.
//!
//! Reconstruction follows `ica.apply()` with every PCA component retained:
//!
//! ```text
//! X_clean = mean + A[:, kept] · S[kept, :] + (X_c − U Uᵀ X_c)
//! ```
//!
//! where `U` spans the fitted PCA subspace, so an empty exclusion set gives
//! back the input up to rounding.
use std::collections::BTreeSet;

use linfa::prelude::*;
use linfa_ica::fast_ica::{FastIca, GFunc};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::recording::Recording;

/// PCA eigenvalues at or below this fraction of the largest are treated as
/// zero when counting the rank of the data.
const RANK_TOL: f64 = 1e-10;

/// A fitted decomposition of one recording.
///
/// Created by [`fit_ica`], inspected by a [`ComponentSelector`], then
/// consumed by [`Decomposition::apply`].
#[derive(Debug, Clone)]
pub struct Decomposition {
    input: Recording,
    /// `[C]` channel means removed before whitening.
    mean: Array1<f64>,
    /// `[C, N]` leading PCA eigenvectors.
    basis: Array2<f64>,
    /// `[N, C]` sensor-space unmixing matrix.
    unmixing: Array2<f64>,
    /// `[C, N]` sensor-space mixing matrix.
    mixing: Array2<f64>,
    /// `[N, T]` unit-variance component time courses.
    sources: Array2<f64>,
    residual: f64,
}

impl Decomposition {
    pub fn n_components(&self) -> usize {
        self.sources.nrows()
    }

    /// Change a further fixed-point step would make; below `ica_tol` for
    /// every returned fit.
    pub fn residual(&self) -> f64 {
        self.residual
    }

    pub fn mixing(&self) -> &Array2<f64> {
        &self.mixing
    }

    pub fn unmixing(&self) -> &Array2<f64> {
        &self.unmixing
    }

    pub fn sources(&self) -> &Array2<f64> {
        &self.sources
    }

    pub fn source(&self, idx: usize) -> Option<ArrayView1<'_, f64>> {
        (idx < self.n_components()).then(|| self.sources.row(idx))
    }

    pub fn ch_names(&self) -> &[String] {
        self.input.ch_names()
    }

    /// The decomposed (pre-cleaning) samples of a channel.
    pub fn channel(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.input.channel(name).ok()
    }

    /// Rebuild the recording without the components in `exclude`.
    ///
    /// Indices outside `0..n_components()` are ignored.
    pub fn apply(self, exclude: &BTreeSet<usize>) -> Result<Recording> {
        let n = self.n_components();
        let kept: Vec<usize> = (0..n).filter(|i| !exclude.contains(i)).collect();

        let mean_col = self.mean.view().insert_axis(Axis(1));
        let xc = self.input.data() - &mean_col;

        // Part of the signal outside the fitted PCA subspace passes through.
        let in_subspace = self.basis.dot(&self.basis.t().dot(&xc));
        let mut out = xc - &in_subspace + &mean_col;

        if !kept.is_empty() {
            let a = self.mixing.select(Axis(1), &kept);
            let src = self.sources.select(Axis(0), &kept);
            out += &a.dot(&src);
        }
        self.input.with_data(out)
    }
}

/// Decides which components of a decomposition are artifacts.
///
/// Implemented for closures, so an ad-hoc heuristic is just
/// `|d: &Decomposition| -> BTreeSet<usize> { … }`.
pub trait ComponentSelector: Sync {
    fn select(&self, decomposition: &Decomposition) -> BTreeSet<usize>;
}

impl<F> ComponentSelector for F
where
    F: Fn(&Decomposition) -> BTreeSet<usize> + Sync,
{
    fn select(&self, decomposition: &Decomposition) -> BTreeSet<usize> {
        self(decomposition)
    }
}

/// Excludes nothing.  The default: components are reviewed by a human.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExcludeNone;

impl ComponentSelector for ExcludeNone {
    fn select(&self, _: &Decomposition) -> BTreeSet<usize> {
        BTreeSet::new()
    }
}

/// A fixed list of component indices, e.g. from a manual review.
#[derive(Debug, Clone, Default)]
pub struct ManualExclusion(pub BTreeSet<usize>);

impl ManualExclusion {
    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        Self(indices.into_iter().collect())
    }
}

impl ComponentSelector for ManualExclusion {
    fn select(&self, _: &Decomposition) -> BTreeSet<usize> {
        self.0.clone()
    }
}

/// Excludes components whose time course correlates with a reference
/// channel (typically an EOG or Fp1/Fp2 electrode for blinks).
#[derive(Debug, Clone)]
pub struct CorrelationSelector {
    pub channel: String,
    /// Minimum |Pearson r| for exclusion.
    pub threshold: f64,
}

impl CorrelationSelector {
    pub fn new(channel: impl Into<String>) -> Self {
        Self { channel: channel.into(), threshold: 0.8 }
    }
}

impl ComponentSelector for CorrelationSelector {
    fn select(&self, d: &Decomposition) -> BTreeSet<usize> {
        let Some(reference) = d.channel(&self.channel) else {
            log::warn!("artifact reference channel '{}' not present; excluding nothing", self.channel);
            return BTreeSet::new();
        };
        d.sources
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, src)| pearson(src.view(), reference).abs() >= self.threshold)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Pearson correlation; `0` when either series is constant.
pub fn pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let a = a.slice(s![..n]);
    let b = b.slice(s![..n]);
    let (ma, mb) = (a.mean().unwrap_or(0.0), b.mean().unwrap_or(0.0));
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa <= 0.0 || sbb <= 0.0 { 0.0 } else { sab / (saa * sbb).sqrt() }
}

/// Fit FastICA to a conditioned recording.
///
/// The centred data are projected onto their leading PCA components (capped
/// at the data rank) and the projection is handed to `linfa-ica`.  The
/// returned sources are scaled to unit variance and checked with one more
/// fixed-point step; a fit that still moves by `ica_tol` or more is reported
/// as [`Error::DecompositionFailed`].
pub fn fit_ica(rec: &Recording, cfg: &PipelineConfig) -> Result<Decomposition> {
    let (n_ch, n_t) = rec.data().dim();
    let requested = cfg.ica_components_for(n_ch);
    if requested == 0 || requested > n_ch {
        return Err(Error::InvalidConfiguration(format!(
            "{requested} ICA components requested for {n_ch} channels"
        )));
    }
    if n_t < 2 {
        return Err(Error::DecompositionFailed(format!("{n_t} sample(s) cannot be whitened")));
    }

    let mean = rec
        .data()
        .mean_axis(Axis(1))
        .ok_or_else(|| Error::InvalidRecording("empty buffer".into()))?;
    let xc = rec.data() - &mean.view().insert_axis(Axis(1));

    let cov = xc.dot(&xc.t()) / n_t as f64;
    let (eigvals, eigvecs) = sorted_eigh(&cov);
    let max_ev = eigvals[0];
    if !(max_ev > 0.0) {
        return Err(Error::DecompositionFailed("recording has no variance".into()));
    }
    let rank = eigvals.iter().take_while(|&&v| v > RANK_TOL * max_ev).count();
    let n = requested.min(rank);
    if n < requested {
        log::debug!("ICA: data rank {rank}, fitting {n} of {requested} requested components");
    }

    let basis = eigvecs.slice(s![.., ..n]).to_owned(); // [C, N]
    let projected = basis.t().dot(&xc); // [N, T]
    let samples = projected.t().to_owned(); // [T, N]

    let model = FastIca::params()
        .ncomponents(n)
        .gfunc(GFunc::Logcosh(1.0))
        .max_iter(cfg.ica_max_iter)
        .tol(cfg.ica_tol)
        .random_state(cfg.ica_seed as usize)
        .fit(&DatasetBase::from(samples.clone()))
        .map_err(|e| Error::DecompositionFailed(format!("FastICA: {e}")))?;
    let raw: Array2<f64> = model.predict(&samples).reversed_axes(); // [N, T]

    // Unit-variance sources.
    let scale: Array1<f64> = raw.map_axis(Axis(1), |row| row.std(0.0));
    if scale.iter().any(|&v| !(v > 0.0)) {
        return Err(Error::DecompositionFailed("FastICA returned a flat component".into()));
    }
    let sources = &raw / &scale.view().insert_axis(Axis(1));

    // `projected` rows are orthogonal with energy n_t·λ, so the least-squares
    // map from PCA scores to sources is S·Pᵀ / (n_t·λ).
    let ev: Array1<f64> = eigvals[..n].iter().map(|v| v * n_t as f64).collect();
    let pca_unmixing = sources.dot(&projected.t()) / &ev.view().insert_axis(Axis(0)); // [N, N]
    let pca_mixing = invert(&pca_unmixing)?;
    let unmixing = pca_unmixing.dot(&basis.t());
    let mixing = basis.dot(&pca_mixing);

    let residual = fixed_point_residual(&sources)?;
    if !(residual < cfg.ica_tol) {
        return Err(Error::DecompositionFailed(format!(
            "FastICA did not converge in {} iterations (last change {residual:.2e})",
            cfg.ica_max_iter
        )));
    }
    log::debug!("FastICA: {n} components, fixed-point residual {residual:.2e}");

    Ok(Decomposition {
        input: rec.clone(),
        mean,
        basis,
        unmixing,
        mixing,
        sources,
        residual,
    })
}

/// Fit, ask `selector` for the artifact components and reconstruct without
/// them.  Returns the cleaned recording and the exclusion set actually
/// applied.
pub fn remove_artifacts(
    rec: &Recording,
    cfg: &PipelineConfig,
    selector: &dyn ComponentSelector,
) -> Result<(Recording, BTreeSet<usize>)> {
    let decomposition = fit_ica(rec, cfg)?;
    let n = decomposition.n_components();

    let mut exclude = selector.select(&decomposition);
    let out_of_range: Vec<usize> = exclude.iter().copied().filter(|&i| i >= n).collect();
    if !out_of_range.is_empty() {
        log::warn!("ignoring component indices {out_of_range:?} (only {n} components)");
        exclude.retain(|&i| i < n);
    }
    log::info!(
        "ICA: {n} components (residual {:.1e}), excluding {:?}",
        decomposition.residual(),
        exclude
    );

    let cleaned = decomposition.apply(&exclude)?;
    Ok((cleaned, exclude))
}

// ── Linear algebra helpers ───────────────────────────────────────────────────

/// Eigen-decomposition of a symmetric matrix, eigenvalues descending.
/// Eigenvectors are the columns of the returned matrix.
fn sorted_eigh(m: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = m.nrows();
    let eig = SymmetricEigen::new(DMatrix::from_fn(n, n, |i, j| m[[i, j]]));
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let values = order.iter().map(|&k| eig.eigenvalues[k]).collect();
    let vectors = Array2::from_shape_fn((n, n), |(i, j)| eig.eigenvectors[(i, order[j])]);
    (values, vectors)
}

fn invert(m: &Array2<f64>) -> Result<Array2<f64>> {
    let n = m.nrows();
    let inv = DMatrix::from_fn(n, n, |i, j| m[[i, j]])
        .try_inverse()
        .ok_or_else(|| Error::DecompositionFailed("unmixing matrix is singular".into()))?;
    Ok(Array2::from_shape_fn((n, n), |(i, j)| inv[(i, j)]))
}

/// `W ← (W Wᵀ)^{-1/2} W`
fn sym_decorrelate(w: &Array2<f64>) -> Result<Array2<f64>> {
    let (d, e) = sorted_eigh(&w.dot(&w.t()));
    let max = d.first().copied().unwrap_or(0.0);
    if !(max > 0.0) || d.iter().any(|&v| v <= max * 1e-14) {
        return Err(Error::DecompositionFailed("unmixing matrix became singular".into()));
    }
    let inv_sqrt: Array1<f64> = d.iter().map(|v| 1.0 / v.sqrt()).collect();
    let scaled = &e * &inv_sqrt.view().insert_axis(Axis(0));
    Ok(scaled.dot(&e.t()).dot(w))
}

/// Change one more `logcosh` fixed-point step would make to unit-variance
/// sources `y` (`[N, T]`): `max |1 − |diag(W₊)||` starting from `W = I`.
fn fixed_point_residual(y: &Array2<f64>) -> Result<f64> {
    let n_t = y.ncols() as f64;
    let g = y.mapv(f64::tanh);
    let g_prime_mean: Array1<f64> =
        g.map_axis(Axis(1), |row| row.iter().map(|v| 1.0 - v * v).sum::<f64>() / n_t);
    let step = g.dot(&y.t()) / n_t - &Array2::from_diag(&g_prime_mean);
    let next = sym_decorrelate(&step)?;
    Ok(next.diag().iter().map(|d| (d.abs() - 1.0).abs()).fold(0.0, f64::max))
}
