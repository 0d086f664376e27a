//! Score aggregation: deterministic weighted sum over the ten dimensions.
//!
//! overall = round_half_up(Σ(score × weight) / 10), clamped to [0, 100].
//! The model's own `overallScore` / `recommendation` are never trusted; they are
//! recomputed here from the validated dimension scores.

use std::collections::BTreeMap;

use tracing::debug;

use crate::compatibility::models::{
    CompatibilityAnalysis, Dimension, DimensionResult, Recommendation,
};
use crate::compatibility::validator::ValidatedOutput;

const LIST_LEN: usize = 3;

/// Weighted sum of dimension scores. Missing dimensions contribute nothing;
/// the validator guarantees all ten are present before this is reached.
pub fn weighted_sum(dimensions: &BTreeMap<Dimension, DimensionResult>) -> u32 {
    dimensions
        .iter()
        .map(|(dimension, result)| u32::from(result.score) * dimension.weight())
        .sum()
}

pub fn aggregate(dimensions: &BTreeMap<Dimension, DimensionResult>) -> (u8, Recommendation) {
    // Integer round-half-up of weighted_sum / 10.
    let overall = ((weighted_sum(dimensions) + 5) / 10).min(100) as u8;
    (overall, Recommendation::from_score(overall))
}

/// Builds the immutable analysis from validated model output.
pub fn build_analysis(output: ValidatedOutput) -> CompatibilityAnalysis {
    let (overall, recommendation) = aggregate(&output.dimensions);

    if (output.claimed_overall - f64::from(overall)).abs() > 1.0
        || output.claimed_recommendation != recommendation
    {
        debug!(
            claimed_overall = output.claimed_overall,
            claimed_recommendation = %output.claimed_recommendation,
            overall,
            %recommendation,
            "Model-claimed score differs from aggregated score; using aggregated"
        );
    }

    let mut strengths = output.strengths;
    strengths.truncate(LIST_LEN);
    let mut gaps = output.gaps;
    gaps.truncate(LIST_LEN);

    CompatibilityAnalysis::from_parts(
        output.dimensions,
        overall,
        recommendation,
        strengths,
        gaps,
        output.red_flags,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::test_support::dimensions_from;
    use crate::compatibility::validator::validate;

    // Weights in ALL order: 30, 15, 20, 10, 5, 5, 5, 5, 3, 2
    fn overall_for(scores: [u8; 10]) -> (u8, Recommendation) {
        aggregate(&dimensions_from(scores))
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let dims = dimensions_from([9, 6, 7, 10, 5, 4, 8, 7, 6, 3]);
        let first = aggregate(&dims);
        for _ in 0..10 {
            assert_eq!(aggregate(&dims), first);
        }
    }

    #[test]
    fn test_uniform_scores_map_to_score_times_ten() {
        for score in 1..=10u8 {
            let (overall, _) = overall_for([score; 10]);
            assert_eq!(overall, score * 10);
        }
    }

    #[test]
    fn test_all_eights_is_strong_at_80() {
        assert_eq!(overall_for([8; 10]), (80, Recommendation::Strong));
    }

    #[test]
    fn test_boundary_79_80() {
        // all 8 except location 7: 800 - 10 = 790
        assert_eq!(
            overall_for([8, 8, 8, 7, 8, 8, 8, 8, 8, 8]),
            (79, Recommendation::Good)
        );
    }

    #[test]
    fn test_boundary_64_65() {
        // all 6 + skill 7 + experience 7: 600 + 30 + 20 = 650
        assert_eq!(
            overall_for([7, 6, 7, 6, 6, 6, 6, 6, 6, 6]),
            (65, Recommendation::Good)
        );
        // all 6 + skill 7 + location 7: 600 + 30 + 10 = 640
        assert_eq!(
            overall_for([7, 6, 6, 7, 6, 6, 6, 6, 6, 6]),
            (64, Recommendation::Moderate)
        );
    }

    #[test]
    fn test_boundary_49_50() {
        assert_eq!(overall_for([5; 10]), (50, Recommendation::Moderate));
        // all 5 except location 4: 500 - 10 = 490
        assert_eq!(
            overall_for([5, 5, 5, 4, 5, 5, 5, 5, 5, 5]),
            (49, Recommendation::Weak)
        );
    }

    #[test]
    fn test_boundary_34_35_with_half_up_rounding() {
        // all 3 + industry 4 + experience 4 + location 4: 300 + 15 + 20 + 10 = 345 → 35
        assert_eq!(
            overall_for([3, 4, 4, 4, 3, 3, 3, 3, 3, 3]),
            (35, Recommendation::Weak)
        );
        // all 3 + industry 4 + experience 4 + growth 4 + scale 4: 300 + 15 + 20 + 3 + 2 = 340
        assert_eq!(
            overall_for([3, 4, 4, 3, 3, 3, 3, 3, 4, 4]),
            (34, Recommendation::Poor)
        );
        // 300 + 15 + 20 + 5 + 3 = 343 → 34
        assert_eq!(
            overall_for([3, 4, 4, 3, 4, 3, 3, 3, 4, 3]),
            (34, Recommendation::Poor)
        );
    }

    #[test]
    fn test_recommendation_partition_covers_every_score() {
        let expected = |s: u8| match s {
            0..=34 => Recommendation::Poor,
            35..=49 => Recommendation::Weak,
            50..=64 => Recommendation::Moderate,
            65..=79 => Recommendation::Good,
            _ => Recommendation::Strong,
        };
        for score in 0..=100u8 {
            assert_eq!(Recommendation::from_score(score), expected(score), "score {score}");
        }
    }

    #[test]
    fn test_minimum_and_maximum() {
        assert_eq!(overall_for([1; 10]), (10, Recommendation::Poor));
        assert_eq!(overall_for([10; 10]), (100, Recommendation::Strong));
    }

    #[test]
    fn test_build_analysis_recomputes_model_claims() {
        let mut value = crate::compatibility::test_support::uniform_output(6);
        value["overallScore"] = serde_json::json!(95);
        value["recommendation"] = serde_json::json!("Strong Match");
        value["strengths"] = serde_json::json!(["a", "b", "c", "d", "e"]);

        let analysis = build_analysis(validate(&value.to_string()).unwrap());
        assert_eq!(analysis.overall_score(), 60);
        assert_eq!(analysis.recommendation(), Recommendation::Moderate);
        assert_eq!(analysis.strengths(), ["a", "b", "c"]);
        assert_eq!(analysis.gaps().len(), 3);
        assert_eq!(analysis.dimensions().len(), 10);
    }
}
