use rand::Rng;
use std::time::Duration;

pub const DEFAULT_SILENCE_THRESHOLD: Duration = Duration::from_millis(1200);
pub const DEFAULT_MIN_SPEECH_LENGTH: usize = 3;
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Turn-taking policy for one session.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Quiet period after the last final transcript before a reply is dispatched.
    pub silence_threshold: Duration,
    /// Final transcripts with fewer characters are treated as noise.
    pub min_speech_length: usize,
    /// Maximum number of history entries kept for prompts.
    pub history_limit: usize,
    /// Optional pause before each generation call.
    pub thinking_delay: Option<ThinkingDelay>,
    pub generation_timeout: Duration,
    /// Greet the candidate and ask the first question as soon as the session starts.
    pub greet_on_start: bool,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            min_speech_length: DEFAULT_MIN_SPEECH_LENGTH,
            history_limit: DEFAULT_HISTORY_LIMIT,
            thinking_delay: None,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            greet_on_start: true,
        }
    }
}

/// Uniform random pause range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThinkingDelay {
    min: Duration,
    max: Duration,
}

impl ThinkingDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thinking_delay_orders_bounds() {
        let delay = ThinkingDelay::new(Duration::from_millis(900), Duration::from_millis(300));
        assert_eq!(delay.min(), Duration::from_millis(300));
        assert_eq!(delay.max(), Duration::from_millis(900));
    }

    #[test]
    fn test_thinking_delay_sample_stays_in_range() {
        let delay = ThinkingDelay::new(Duration::from_millis(200), Duration::from_millis(400));
        for _ in 0..100 {
            let pause = delay.sample();
            assert!(pause >= delay.min() && pause <= delay.max());
        }
    }
}
