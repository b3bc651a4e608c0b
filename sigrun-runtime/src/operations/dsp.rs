//! Numeric building blocks shared by the spectral operations

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    pub fn from_polar(magnitude: f64, angle: f64) -> Self {
        Self::new(magnitude * angle.cos(), magnitude * angle.sin())
    }

    pub fn norm(&self) -> f64 {
        self.re.hypot(self.im)
    }

    pub fn scale(self, factor: f64) -> Self {
        Self::new(self.re * factor, self.im * factor)
    }
}

impl Add for Complex {
    type Output = Complex;
    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Complex;
    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Complex;
    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// Iterative radix-2 Cooley-Tukey transform. `buf.len()` must be a power of two.
/// The inverse transform is scaled by `1/n`.
pub fn fft_in_place(buf: &mut [Complex], inverse: bool) {
    let n = buf.len();
    debug_assert!(n.is_power_of_two() || n == 0);
    if n <= 1 {
        return;
    }

    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            buf.swap(i, j);
        }
    }

    let sign = if inverse { 1.0 } else { -1.0 };
    let mut len = 2;
    while len <= n {
        let step = Complex::from_polar(1.0, sign * 2.0 * PI / len as f64);
        for start in (0..n).step_by(len) {
            let mut w = Complex::new(1.0, 0.0);
            for k in 0..len / 2 {
                let u = buf[start + k];
                let v = buf[start + k + len / 2] * w;
                buf[start + k] = u + v;
                buf[start + k + len / 2] = u - v;
                w = w * step;
            }
        }
        len <<= 1;
    }

    if inverse {
        let scale = 1.0 / n as f64;
        for value in buf.iter_mut() {
            *value = value.scale(scale);
        }
    }
}

/// Zero-padded complex copy of `values`, length rounded up to a power of two
pub fn padded(values: &[f64]) -> Vec<Complex> {
    let n = values.len().next_power_of_two();
    let mut buf: Vec<Complex> = values.iter().map(|&v| Complex::new(v, 0.0)).collect();
    buf.resize(n, Complex::default());
    buf
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    #[default]
    Hann,
    Rectangular,
}

impl Window {
    pub fn coefficients(&self, n: usize) -> Vec<f64> {
        match self {
            Window::Rectangular => vec![1.0; n],
            Window::Hann if n <= 1 => vec![1.0; n],
            Window::Hann => (0..n)
                .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (n - 1) as f64).cos()))
                .collect(),
        }
    }
}

/// Single-sided amplitude spectrum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub frequencies: Vec<f64>,
    pub magnitudes: Vec<f64>,
    /// Bin width in Hz
    pub resolution: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub frequency: f64,
    pub magnitude: f64,
}

impl Spectrum {
    /// Amplitude-corrected spectrum of `values` sampled at `sample_rate` Hz
    pub fn of(values: &[f64], sample_rate: f64, window: Window) -> Self {
        let n = values.len();
        let coefficients = window.coefficients(n);
        let gain = coefficients.iter().sum::<f64>() / n.max(1) as f64;

        let windowed: Vec<f64> = values
            .iter()
            .zip(&coefficients)
            .map(|(v, w)| v * w)
            .collect();
        let mut buf = padded(&windowed);
        fft_in_place(&mut buf, false);

        let n_fft = buf.len().max(1);
        let resolution = sample_rate / n_fft as f64;
        let bins = n_fft / 2 + 1;
        let norm = n as f64 * gain;

        let mut frequencies = Vec::with_capacity(bins);
        let mut magnitudes = Vec::with_capacity(bins);
        for (k, value) in buf.iter().take(bins).enumerate() {
            let one_sided = if k == 0 || k == n_fft / 2 { 1.0 } else { 2.0 };
            frequencies.push(k as f64 * resolution);
            magnitudes.push(if norm > 0.0 { one_sided * value.norm() / norm } else { 0.0 });
        }

        Self {
            frequencies,
            magnitudes,
            resolution,
        }
    }

    /// Largest local maxima above DC, strongest first
    pub fn peaks(&self, limit: usize) -> Vec<Peak> {
        let m = &self.magnitudes;
        let mut peaks: Vec<Peak> = (1..m.len())
            .filter(|&k| {
                let left = m[k - 1];
                let right = m.get(k + 1).copied().unwrap_or(f64::NEG_INFINITY);
                m[k] > left && m[k] >= right
            })
            .map(|k| Peak {
                frequency: self.frequencies[k],
                magnitude: m[k],
            })
            .collect();
        peaks.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
        peaks.truncate(limit);
        peaks
    }

    pub fn dominant(&self) -> Option<Peak> {
        self.peaks(1).into_iter().next()
    }
}

/// Magnitude of the analytic signal (Hilbert envelope)
pub fn hilbert_envelope(values: &[f64]) -> Vec<f64> {
    let mut buf = padded(values);
    let n = buf.len();
    if n < 2 {
        return values.iter().map(|v| v.abs()).collect();
    }

    fft_in_place(&mut buf, false);
    for (k, value) in buf.iter_mut().enumerate() {
        let h = match k {
            0 => 1.0,
            k if k == n / 2 => 1.0,
            k if k < n / 2 => 2.0,
            _ => 0.0,
        };
        *value = value.scale(h);
    }
    fft_in_place(&mut buf, true);

    buf.iter().take(values.len()).map(Complex::norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f64, amplitude: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_fft_inverse_restores_signal() {
        let values = vec![1.0, -2.0, 3.5, 0.25, 0.0, 4.0, -1.0, 2.0];
        let mut buf = padded(&values);
        fft_in_place(&mut buf, false);
        fft_in_place(&mut buf, true);
        for (original, restored) in values.iter().zip(&buf) {
            assert!((original - restored.re).abs() < 1e-9);
            assert!(restored.im.abs() < 1e-9);
        }
    }

    #[test]
    fn test_bin_aligned_sine_amplitude() {
        let values = sine(64.0, 1.5, 1024.0, 1024);
        let spectrum = Spectrum::of(&values, 1024.0, Window::Rectangular);

        assert_eq!(spectrum.resolution, 1.0);
        assert_eq!(spectrum.frequencies.len(), 513);
        let dominant = spectrum.dominant().unwrap();
        assert_eq!(dominant.frequency, 64.0);
        assert!((dominant.magnitude - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_hann_window_finds_off_bin_tone() {
        let values = sine(50.0, 1.0, 1000.0, 1000);
        let spectrum = Spectrum::of(&values, 1000.0, Window::Hann);
        let dominant = spectrum.dominant().unwrap();
        assert!((dominant.frequency - 50.0).abs() <= spectrum.resolution);
    }

    #[test]
    fn test_envelope_of_modulated_carrier() {
        let fs = 2048.0;
        let values: Vec<f64> = (0..2048)
            .map(|i| {
                let t = i as f64 / fs;
                (1.0 + 0.5 * (2.0 * PI * 10.0 * t).cos()) * (2.0 * PI * 200.0 * t).cos()
            })
            .collect();
        let envelope = hilbert_envelope(&values);

        assert_eq!(envelope.len(), values.len());
        let max = envelope.iter().cloned().fold(f64::MIN, f64::max);
        let min = envelope.iter().cloned().fold(f64::MAX, f64::min);
        assert!((max - 1.5).abs() < 1e-6);
        assert!((min - 0.5).abs() < 1e-3);
    }
}
