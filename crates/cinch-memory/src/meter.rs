//! Length meters: measure rendered memory in the unit its budget uses.
//!
//! A condensed memory block compares the measured length of its rendered
//! contents against `token_limit`. The meter decides what a "token" is:
//! [`TokenEstimator`] approximates model tokens from character counts,
//! [`CharMeter`] counts characters exactly. Callers with a real tokenizer
//! implement [`LengthMeter`] themselves.

/// Default characters per token (conservative estimate for English text).
/// Most tokenizers average 3-4 chars per token; we use 3.5 as a middle ground.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.5;

/// Measures text in the unit a budget is expressed in.
///
/// Must be monotonic: appending text never decreases the measured length.
pub trait LengthMeter: Send + Sync {
    fn measure(&self, text: &str) -> usize;
}

/// Counts Unicode scalar values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharMeter;

impl LengthMeter for CharMeter {
    fn measure(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// Estimates tokens from the character count with a fixed ratio.
///
/// Rounds up, so any non-empty text costs at least one token.
#[derive(Debug, Clone, Copy)]
pub struct TokenEstimator {
    chars_per_token: f64,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }
}

impl TokenEstimator {
    /// Use a calibrated chars-per-token ratio. Non-positive ratios fall back
    /// to the default.
    pub fn with_chars_per_token(chars_per_token: f64) -> Self {
        if chars_per_token > 0.0 {
            Self { chars_per_token }
        } else {
            Self::default()
        }
    }

    pub fn chars_per_token(&self) -> f64 {
        self.chars_per_token
    }
}

impl LengthMeter for TokenEstimator {
    fn measure(&self, text: &str) -> usize {
        let chars = text.chars().count();
        (chars as f64 / self.chars_per_token).ceil() as usize
    }
}
