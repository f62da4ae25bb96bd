use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NpsSummary {
    pub responses: u32,
    pub promoters: u32,
    pub passives: u32,
    pub detractors: u32,
    /// Percentage of promoters minus percentage of detractors, -100..=100.
    pub score: f64,
}

impl NpsSummary {
    /// Promoters answer 9-10, passives 7-8, detractors 0-6. Scores above 10
    /// are dropped.
    pub fn from_scores(scores: &[u8]) -> Self {
        let mut summary = Self::default();

        for &score in scores {
            match score {
                9..=10 => summary.promoters += 1,
                7..=8 => summary.passives += 1,
                0..=6 => summary.detractors += 1,
                _ => {
                    warn!("Ignoring out-of-range NPS score {}", score);
                    continue;
                }
            }
            summary.responses += 1;
        }

        summary.score = if summary.responses == 0 {
            0.0
        } else {
            (summary.promoters as f64 - summary.detractors as f64) / summary.responses as f64
                * 100.0
        };

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nps_buckets() {
        let summary = NpsSummary::from_scores(&[10, 9, 8, 7, 6, 0, 10, 10]);
        assert_eq!(summary.responses, 8);
        assert_eq!(summary.promoters, 4);
        assert_eq!(summary.passives, 2);
        assert_eq!(summary.detractors, 2);
        assert_eq!(summary.score, 25.0);
    }

    #[test]
    fn test_no_responses_scores_zero() {
        let summary = NpsSummary::from_scores(&[]);
        assert_eq!(summary.score, 0.0);

        let only_invalid = NpsSummary::from_scores(&[11, 42]);
        assert_eq!(only_invalid.responses, 0);
        assert_eq!(only_invalid.score, 0.0);
    }
}
