//! Learning Loop (C8): EMA-weighted learned preference per `(model_id,
//! task_type)`, plus a lightweight A/B test registry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::models::{FeedbackData, TaskType};

const DEFAULT_WEIGHT: f64 = 0.5;
const DEFAULT_WIN_MARGIN: f64 = 0.05;

type WeightKey = (String, TaskType);

/// Which arm of an A/B test a request was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    A,
    B,
}

#[derive(Debug, Clone)]
pub struct AbTest {
    pub test_id: Uuid,
    pub model_a: String,
    pub model_b: String,
    pub task_type: TaskType,
    pub traffic_split: f64,
    pub min_samples: usize,
    pub duration_days: u32,
    pub started_at: DateTime<Utc>,
    samples_a: Vec<FeedbackData>,
    samples_b: Vec<FeedbackData>,
}

/// Winner declared by `analyze_ab_test`, or lack thereof.
#[derive(Debug, Clone, PartialEq)]
pub enum AbTestOutcome {
    WinnerA,
    WinnerB,
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbTestAnalysis {
    pub samples_a: usize,
    pub samples_b: usize,
    pub success_rate_a: f64,
    pub success_rate_b: f64,
    pub mean_score_a: f64,
    pub mean_score_b: f64,
    pub outcome: AbTestOutcome,
}

/// EMA-weighted learned preference store plus A/B test registry.
pub struct LearningLoop {
    alpha: f64,
    win_margin: f64,
    default_weight: f64,
    weights: Arc<RwLock<HashMap<WeightKey, f64>>>,
    tests: Arc<RwLock<HashMap<Uuid, AbTest>>>,
}

impl LearningLoop {
    pub fn new(alpha: f64, default_weight: f64) -> Self {
        Self {
            alpha,
            win_margin: DEFAULT_WIN_MARGIN,
            default_weight,
            weights: Arc::new(RwLock::new(HashMap::new())),
            tests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(0.1, DEFAULT_WEIGHT)
    }

    fn key(model_id: &str, task_type: &TaskType) -> WeightKey {
        (model_id.to_string(), task_type.clone())
    }

    /// Ingests one feedback event and updates `(model_id, task_type)`'s
    /// learned weight by `w <- alpha*score + (1-alpha)*w_prev`. If
    /// `feedback.task_type`/`request_id` also belong to a running A/B test,
    /// the sample is recorded against the matching arm.
    pub async fn ingest(&self, feedback: FeedbackData) {
        let score = feedback.score();
        let key = Self::key(&feedback.model_id, &feedback.task_type);
        let mut weights = self.weights.write().await;
        let prev = *weights.get(&key).unwrap_or(&self.default_weight);
        weights.insert(key, self.alpha * score + (1.0 - self.alpha) * prev);
        drop(weights);

        let mut tests = self.tests.write().await;
        for test in tests.values_mut() {
            if test.task_type != feedback.task_type {
                continue;
            }
            if feedback.model_id == test.model_a {
                test.samples_a.push(feedback.clone());
            } else if feedback.model_id == test.model_b {
                test.samples_b.push(feedback.clone());
            }
        }
    }

    pub async fn get_model_weight(&self, model_id: &str, task_type: &TaskType) -> f64 {
        let key = Self::key(model_id, task_type);
        *self.weights.read().await.get(&key).unwrap_or(&self.default_weight)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn start_ab_test(
        &self,
        model_a: impl Into<String>,
        model_b: impl Into<String>,
        task_type: TaskType,
        traffic_split: f64,
        min_samples: usize,
        duration_days: u32,
    ) -> Uuid {
        let test_id = Uuid::new_v4();
        let test = AbTest {
            test_id,
            model_a: model_a.into(),
            model_b: model_b.into(),
            task_type,
            traffic_split,
            min_samples,
            duration_days,
            started_at: Utc::now(),
            samples_a: vec![],
            samples_b: vec![],
        };
        self.tests.write().await.insert(test_id, test);
        test_id
    }

    /// Randomly assigns a variant subject to `traffic_split` (the
    /// probability of landing in arm A).
    pub async fn assign_variant(&self, test_id: Uuid) -> Option<Variant> {
        let tests = self.tests.read().await;
        let test = tests.get(&test_id)?;
        let roll: f64 = rand::thread_rng().gen_range(0.0..1.0);
        Some(if roll < test.traffic_split { Variant::A } else { Variant::B })
    }

    /// Non-blocking/read-only. Requires >= `min_samples` per arm; declares a
    /// winner when the success-rate difference exceeds `win_margin`
    /// (default 5 percentage points), otherwise inconclusive.
    pub async fn analyze_ab_test(&self, test_id: Uuid) -> Option<AbTestAnalysis> {
        let tests = self.tests.read().await;
        let test = tests.get(&test_id)?;

        if test.samples_a.len() < test.min_samples || test.samples_b.len() < test.min_samples {
            return Some(AbTestAnalysis {
                samples_a: test.samples_a.len(),
                samples_b: test.samples_b.len(),
                success_rate_a: success_rate(&test.samples_a),
                success_rate_b: success_rate(&test.samples_b),
                mean_score_a: mean_score(&test.samples_a),
                mean_score_b: mean_score(&test.samples_b),
                outcome: AbTestOutcome::Inconclusive,
            });
        }

        let rate_a = success_rate(&test.samples_a);
        let rate_b = success_rate(&test.samples_b);
        let outcome = if rate_a - rate_b > self.win_margin {
            AbTestOutcome::WinnerA
        } else if rate_b - rate_a > self.win_margin {
            AbTestOutcome::WinnerB
        } else {
            AbTestOutcome::Inconclusive
        };

        Some(AbTestAnalysis {
            samples_a: test.samples_a.len(),
            samples_b: test.samples_b.len(),
            success_rate_a: rate_a,
            success_rate_b: rate_b,
            mean_score_a: mean_score(&test.samples_a),
            mean_score_b: mean_score(&test.samples_b),
            outcome,
        })
    }
}

fn success_rate(samples: &[FeedbackData]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let successes = samples.iter().filter(|f| f.outcome == crate::domain::models::Outcome::Success).count();
    successes as f64 / samples.len() as f64
}

fn mean_score(samples: &[FeedbackData]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(FeedbackData::score).sum::<f64>() / samples.len() as f64
}

impl Default for LearningLoop {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Outcome;

    pub(super) fn feedback(model_id: &str, outcome: Outcome) -> FeedbackData {
        FeedbackData {
            request_id: Uuid::new_v4(),
            model_id: model_id.to_string(),
            task_type: TaskType::CodeGeneration,
            outcome,
            quality_score: None,
            actual_cost: None,
            actual_latency_ms: None,
            pr_merged: false,
            pr_reverted: false,
            user_rating: None,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unseen_model_defaults_to_neutral_weight() {
        let loop_ = LearningLoop::with_defaults();
        assert_eq!(loop_.get_model_weight("claude-sonnet", &TaskType::CodeGeneration).await, 0.5);
    }

    #[tokio::test]
    async fn successful_feedback_raises_the_learned_weight() {
        let loop_ = LearningLoop::with_defaults();
        loop_.ingest(feedback("claude-sonnet", Outcome::Success)).await;
        let weight = loop_.get_model_weight("claude-sonnet", &TaskType::CodeGeneration).await;
        assert!(weight > 0.5);
    }

    #[tokio::test]
    async fn zero_alpha_leaves_weights_unchanged() {
        let loop_ = LearningLoop::new(0.0, 0.5);
        for _ in 0..10 {
            loop_.ingest(feedback("claude-sonnet", Outcome::Success)).await;
        }
        assert_eq!(loop_.get_model_weight("claude-sonnet", &TaskType::CodeGeneration).await, 0.5);
    }

    #[tokio::test]
    async fn analysis_is_inconclusive_below_min_samples() {
        let loop_ = LearningLoop::with_defaults();
        let test_id = loop_.start_ab_test("model-a", "model-b", TaskType::CodeGeneration, 0.5, 30, 7).await;
        loop_.ingest(feedback("model-a", Outcome::Success)).await;

        let analysis = loop_.analyze_ab_test(test_id).await.unwrap();
        assert_eq!(analysis.outcome, AbTestOutcome::Inconclusive);
    }

    #[tokio::test]
    async fn winner_declared_when_success_rate_gap_exceeds_margin() {
        let loop_ = LearningLoop::with_defaults();
        let test_id = loop_.start_ab_test("model-a", "model-b", TaskType::CodeGeneration, 0.5, 5, 7).await;

        for _ in 0..10 {
            loop_.ingest(feedback("model-a", Outcome::Success)).await;
        }
        for _ in 0..10 {
            loop_.ingest(feedback("model-b", Outcome::Failure)).await;
        }

        let analysis = loop_.analyze_ab_test(test_id).await.unwrap();
        assert_eq!(analysis.outcome, AbTestOutcome::WinnerA);
    }

    #[tokio::test]
    async fn ab_symmetry_swapping_arms_swaps_the_winner() {
        let loop_a_first = LearningLoop::with_defaults();
        let test_1 = loop_a_first.start_ab_test("strong", "weak", TaskType::CodeGeneration, 0.5, 5, 7).await;
        for _ in 0..10 {
            loop_a_first.ingest(feedback("strong", Outcome::Success)).await;
        }
        for _ in 0..10 {
            loop_a_first.ingest(feedback("weak", Outcome::Failure)).await;
        }
        let analysis_1 = loop_a_first.analyze_ab_test(test_1).await.unwrap();

        let loop_b_first = LearningLoop::with_defaults();
        let test_2 = loop_b_first.start_ab_test("weak", "strong", TaskType::CodeGeneration, 0.5, 5, 7).await;
        for _ in 0..10 {
            loop_b_first.ingest(feedback("weak", Outcome::Failure)).await;
        }
        for _ in 0..10 {
            loop_b_first.ingest(feedback("strong", Outcome::Success)).await;
        }
        let analysis_2 = loop_b_first.analyze_ab_test(test_2).await.unwrap();

        assert_eq!(analysis_1.outcome, AbTestOutcome::WinnerA);
        assert_eq!(analysis_2.outcome, AbTestOutcome::WinnerB);
    }
}
