//! RSI (Relative Strength Index).
//!
//! Average gain and average loss are simple means of the up-moves and
//! down-moves over the trailing n price changes.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n positions are NaN (n changes need n+1 closes).

pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    for i in period..values.len() {
        let window = &values[i - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }

        let mut gain = 0.0;
        let mut loss = 0.0;
        for pair in window.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gain += change;
            } else {
                loss -= change;
            }
        }
        let avg_gain = gain / period as f64;
        let avg_loss = loss / period as f64;

        out[i] = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
    }
    out
}
