/// A burst of repeated interactions on one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RageClick {
    pub element: String,
    pub count: usize,
}

#[derive(Debug, Clone)]
struct Click {
    element: String,
    timestamp: u64,
}

/// Sliding-window repeated-interaction detector.
#[derive(Debug)]
pub struct RageClickDetector {
    threshold: usize,
    window_ms: u64,
    history: Vec<Click>,
}

impl RageClickDetector {
    pub fn new(threshold: usize, window_ms: u64) -> Self {
        Self {
            threshold: threshold.max(1),
            window_ms: window_ms.max(1),
            history: Vec::new(),
        }
    }

    /// Record an interaction at `now` (epoch ms). Fires at most once per burst:
    /// the whole history is cleared when a rage click is reported.
    pub fn observe(&mut self, element: &str, now: u64) -> Option<RageClick> {
        self.history.push(Click {
            element: element.to_string(),
            timestamp: now,
        });

        let window = self.window_ms;
        self.history
            .retain(|click| now.saturating_sub(click.timestamp) < window);

        let count = self
            .history
            .iter()
            .filter(|click| click.element == element)
            .count();

        if count >= self.threshold {
            self.history.clear();
            return Some(RageClick {
                element: element.to_string(),
                count,
            });
        }
        None
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
