//! Bollinger Bands.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (width × StdDev)
//! - Lower: Middle - (width × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//! Warmup: first (period-1) positions are NaN.

use crate::domain::indicator::calculate_sma;
use crate::domain::indicator::stddev::calculate_stddev;

#[derive(Debug, Clone)]
pub struct BollingerOutput {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn calculate_bollinger(closes: &[f64], period: usize, width: f64) -> BollingerOutput {
    let middle = calculate_sma(closes, period);
    let stddev = calculate_stddev(closes, period);

    let upper = middle
        .iter()
        .zip(&stddev)
        .map(|(m, s)| m + width * s)
        .collect();
    let lower = middle
        .iter()
        .zip(&stddev)
        .map(|(m, s)| m - width * s)
        .collect();

    BollingerOutput {
        upper,
        middle,
        lower,
    }
}
