//! Feedback ingested by the Learning Loop (C8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model_definition::TaskType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Partial,
    Failure,
}

impl Outcome {
    /// Base score before quality/PR/rating adjustments.
    pub fn base_score(self) -> f64 {
        match self {
            Self::Success => 1.0,
            Self::Partial => 0.5,
            Self::Failure => 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackData {
    pub request_id: Uuid,
    pub model_id: String,
    pub task_type: TaskType,
    pub outcome: Outcome,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub actual_cost: Option<f64>,
    #[serde(default)]
    pub actual_latency_ms: Option<u64>,
    #[serde(default)]
    pub pr_merged: bool,
    #[serde(default)]
    pub pr_reverted: bool,
    #[serde(default)]
    pub user_rating: Option<u8>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackData {
    /// Blends `outcome`, `quality_score`, PR signal, and `user_rating` into
    /// a single `[0, 1]` score for the learning loop's EMA update.
    pub fn score(&self) -> f64 {
        let mut score = self.outcome.base_score();
        if let Some(quality) = self.quality_score {
            score = (score + quality) / 2.0;
        }
        if self.pr_merged {
            score += 0.2;
        }
        if self.pr_reverted {
            score -= 0.5;
        }
        if let Some(rating) = self.user_rating {
            score = (score + f64::from(rating) / 5.0) / 2.0;
        }
        score.clamp(0.0, 1.0)
    }
}
