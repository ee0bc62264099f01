//! DC-offset removal and linear detrending.
//!
//! `remove_dc_inplace`      — `data[c, :] -= mean(data[c, :])`
//!
//! `detrend_linear_inplace` — matches `mne.filter.detrend(data, order=1)`:
//!   for each channel, subtract the ordinary-least-squares line fitted
//!   against the sample index.
use ndarray::{Array2, ArrayViewMut1, Axis};

/// Subtract each channel's mean.  Returns the removed means (`[C]`).
pub fn remove_dc_inplace(data: &mut Array2<f64>) -> Vec<f64> {
    let mut means = Vec::with_capacity(data.nrows());
    for mut row in data.axis_iter_mut(Axis(0)) {
        let m = row.mean().unwrap_or(0.0);
        row.mapv_inplace(|v| v - m);
        means.push(m);
    }
    means
}

/// Subtract the best-fit line from every channel.
pub fn detrend_linear_inplace(data: &mut Array2<f64>) {
    for row in data.axis_iter_mut(Axis(0)) {
        detrend_row(row);
    }
}

fn detrend_row(mut row: ArrayViewMut1<f64>) {
    let n = row.len();
    if n == 0 {
        return;
    }
    let t_mean = (n - 1) as f64 / 2.0;
    let y_mean = row.mean().unwrap_or(0.0);

    // Σ (t - t̄)² has a closed form: n (n² - 1) / 12.
    let sxx = n as f64 * ((n * n) as f64 - 1.0) / 12.0;
    let slope = if sxx > 0.0 {
        let sxy: f64 = row
            .iter()
            .enumerate()
            .map(|(t, &y)| (t as f64 - t_mean) * (y - y_mean))
            .sum();
        sxy / sxx
    } else {
        0.0
    };

    for (t, y) in row.iter_mut().enumerate() {
        *y -= y_mean + slope * (t as f64 - t_mean);
    }
}
