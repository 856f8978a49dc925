//! KDJ stochastic oscillator.
//!
//! RSV = 100 × (C - LL(n)) / (HH(n) - LL(n)), 0 when HH == LL
//! K = ((m1 - 1) × K_prev + RSV) / m1
//! D = ((m2 - 1) × D_prev + K) / m2
//! J = 3K - 2D
//!
//! K and D start from 50. Warmup: first (n-1) positions are NaN. A window
//! containing a missing price yields NaN and leaves the smoothing state alone.

const SEED: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct KdjOutput {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
    pub j: Vec<f64>,
}

pub fn calculate_kdj(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> KdjOutput {
    let len = closes.len();
    let mut out = KdjOutput {
        k: vec![f64::NAN; len],
        d: vec![f64::NAN; len],
        j: vec![f64::NAN; len],
    };
    if k_period == 0 || k_smooth == 0 || d_smooth == 0 || len < k_period {
        return out;
    }
    if highs.len() != len || lows.len() != len {
        return out;
    }

    let m1 = k_smooth as f64;
    let m2 = d_smooth as f64;
    let mut k_prev = SEED;
    let mut d_prev = SEED;

    for i in (k_period - 1)..len {
        let start = i + 1 - k_period;
        let high_window = &highs[start..=i];
        let low_window = &lows[start..=i];
        if closes[i].is_nan()
            || high_window.iter().any(|v| v.is_nan())
            || low_window.iter().any(|v| v.is_nan())
        {
            continue;
        }

        let highest = high_window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lowest = low_window.iter().copied().fold(f64::INFINITY, f64::min);
        let range = highest - lowest;
        let rsv = if range == 0.0 {
            0.0
        } else {
            100.0 * (closes[i] - lowest) / range
        };

        let k = ((m1 - 1.0) * k_prev + rsv) / m1;
        let d = ((m2 - 1.0) * d_prev + k) / m2;
        out.k[i] = k;
        out.d[i] = d;
        out.j[i] = 3.0 * k - 2.0 * d;
        k_prev = k;
        d_prev = d;
    }
    out
}
