//! Unit tests for prediction accuracy scoring

use stockpulse::evaluation::evaluate;

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_neutral_within_two_percent_scores_full() {
    assert_close(evaluate("neutral", Some(100.0), 101.0, 0.5), 1.0);
}

#[test]
fn test_neutral_bands() {
    assert_close(evaluate("neutral", Some(100.0), 104.0, 0.5), 0.8);
    assert_close(evaluate("neutral", Some(100.0), 92.0, 0.5), 0.6);
    assert_close(evaluate("neutral", Some(100.0), 112.0, 0.5), 0.3);
}

#[test]
fn test_bullish_direction_match() {
    assert_close(evaluate("bullish", Some(100.0), 110.0, 0.8), 0.72);
}

#[test]
fn test_bearish_direction_miss() {
    assert_close(evaluate("bearish", Some(100.0), 110.0, 0.9), 0.1);
}

#[test]
fn test_bearish_direction_match() {
    // 2% below target: (0.7 + 0.28) * 0.5
    assert_close(evaluate("bearish", Some(100.0), 98.0, 0.5), 0.49);
}

#[test]
fn test_miss_with_low_confidence() {
    assert_close(evaluate("bullish", Some(100.0), 90.0, 0.2), 0.3);
}

#[test]
fn test_match_is_capped_at_one() {
    let score = evaluate("bullish", Some(100.0), 100.5, 1.0);
    assert!(score <= 1.0);
    assert_close(score, 0.995);
}

#[test]
fn test_missing_target_scores_half() {
    assert_close(evaluate("neutral", None, 100.0, 0.7), 0.5);
    assert_close(evaluate("bullish", None, 100.0, 0.7), 0.5);
    assert_close(evaluate("bearish", None, 100.0, 0.7), 0.5);
}

#[test]
fn test_unknown_type_scores_half() {
    assert_close(evaluate("sideways", Some(100.0), 150.0, 0.9), 0.5);
}

#[test]
fn test_type_must_match_exactly() {
    assert_close(evaluate("BULLISH", Some(100.0), 110.0, 0.8), 0.5);
    assert_close(evaluate(" neutral ", Some(100.0), 100.0, 0.8), 0.5);
    assert_close(evaluate("Bearish", Some(100.0), 90.0, 0.8), 0.5);
}

#[test]
fn test_direction_miss_grades_without_positive_target() {
    // Realized 5 sits above both targets, so a bearish call missed
    assert_close(evaluate("bearish", Some(0.0), 5.0, 0.1), 0.4);
    assert_close(evaluate("bearish", Some(-10.0), 5.0, 0.1), 0.4);
    assert_close(evaluate("bullish", Some(0.0), -1.0, 0.9), 0.1);
}

#[test]
fn test_direction_match_without_positive_target_scores_zero() {
    assert_close(evaluate("bullish", Some(0.0), 5.0, 0.5), 0.0);
    assert_close(evaluate("bearish", Some(-10.0), -20.0, 0.5), 0.0);
    assert_close(evaluate("neutral", Some(0.0), 0.0, 0.5), 0.0);
}

#[test]
fn test_invalid_inputs_score_zero() {
    assert_close(evaluate("bullish", Some(0.0), 110.0, 0.8), 0.0);
    assert_close(evaluate("neutral", Some(-5.0), 110.0, 0.8), 0.0);
    assert_close(evaluate("bullish", Some(100.0), f64::NAN, 0.8), 0.0);
    assert_close(evaluate("bearish", Some(100.0), 110.0, 1.5), 0.0);
}

#[test]
fn test_scores_stay_in_unit_interval() {
    let types = ["bullish", "bearish", "neutral", "other"];
    let targets = [None, Some(1.0), Some(50.0), Some(100.0), Some(1000.0)];
    let realized = [0.5, 10.0, 99.0, 100.0, 101.0, 250.0, 5000.0];
    let confidences = [0.0, 0.1, 0.5, 0.9, 1.0];

    for kind in types {
        for target in targets {
            for price in realized {
                for confidence in confidences {
                    let score = evaluate(kind, target, price, confidence);
                    assert!(
                        (0.0..=1.0).contains(&score),
                        "{} {:?} {} {} scored {}",
                        kind,
                        target,
                        price,
                        confidence,
                        score
                    );
                }
            }
        }
    }
}
