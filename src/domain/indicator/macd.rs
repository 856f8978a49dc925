//! MACD (Moving Average Convergence Divergence).
//!
//! DIF = EMA(fast) - EMA(slow)
//! DEA = EMA(signal) of DIF
//! MACD = 2 × (DIF - DEA)
//!
//! Warmup: DIF is NaN for the first max(fast, slow) - 1 positions; DEA and
//! MACD for the first max(fast, slow) - 1 + signal - 1.

use crate::domain::indicator::calculate_ema;

#[derive(Debug, Clone)]
pub struct MacdOutput {
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    pub macd: Vec<f64>,
}

pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdOutput {
    let len = closes.len();
    let mut out = MacdOutput {
        dif: vec![f64::NAN; len],
        dea: vec![f64::NAN; len],
        macd: vec![f64::NAN; len],
    };
    if fast == 0 || slow == 0 || signal == 0 {
        return out;
    }

    let dif_start = fast.max(slow) - 1;
    if len <= dif_start {
        return out;
    }

    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    for i in dif_start..len {
        out.dif[i] = ema_fast[i] - ema_slow[i];
    }

    let dea_tail = calculate_ema(&out.dif[dif_start..], signal);
    for (offset, dea) in dea_tail.into_iter().enumerate() {
        let i = dif_start + offset;
        out.dea[i] = dea;
        out.macd[i] = 2.0 * (out.dif[i] - dea);
    }
    out
}
