mod common;
use common::{noise, sine};
use faa::normalize::{detrend_linear_inplace, remove_dc_inplace};
use ndarray::{Array2, Axis};

#[test]
fn dc_removal_zeroes_every_channel_mean() {
    let mut data = Array2::from_shape_fn((6, 777), |(c, t)| {
        50.0 * c as f64 - 3.0 + (t as f64 * 0.37 + c as f64).sin()
    });
    let means = remove_dc_inplace(&mut data);
    assert_eq!(means.len(), 6);
    for (c, m) in data.mean_axis(Axis(1)).unwrap().iter().enumerate() {
        assert!(m.abs() < 1e-12, "channel {c} mean {m:.2e} after DC removal");
    }
}

#[test]
fn detrend_removes_slope_and_keeps_noise_shape() {
    let n = 2000;
    let hiss = noise(7, n);
    let tone = sine(1.0, 10.0, 250.0, n);
    let row: Vec<f64> = (0..n).map(|t| 5.0 - 0.02 * t as f64 + hiss[t] + tone[t]).collect();
    let mut data = Array2::from_shape_vec((1, n), row).unwrap();
    detrend_linear_inplace(&mut data);

    // Fitted slope of the residual is ~0.
    let x_mean = (n - 1) as f64 / 2.0;
    let y = data.row(0);
    let y_mean = y.mean().unwrap();
    let (sxy, sxx) = y.iter().enumerate().fold((0.0, 0.0), |(sxy, sxx), (t, v)| {
        let dx = t as f64 - x_mean;
        (sxy + dx * (v - y_mean), sxx + dx * dx)
    });
    assert!((sxy / sxx).abs() < 1e-12, "residual slope {:.2e}", sxy / sxx);
    assert!(y_mean.abs() < 1e-9);
}
