//! Response scoring.
//!
//! `score` is a pure function of a raw response and the item's key. It
//! never fails: ambiguous responses are scored zero and flagged so the
//! caller can count them.

use serde::{Deserialize, Serialize};

use crate::model::{ItemMetadata, ItemType, ScoredResponse};
use crate::parser::ParsedStudent;

/// Outcome of scoring a single response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub is_correct: bool,
    pub points_earned: f64,
    /// Multiple-choice response with more than one selection (e.g. "A C").
    pub is_multiple: bool,
    /// Constructed-response value that is not a number.
    pub is_unparsable: bool,
}

impl Score {
    fn zero() -> Self {
        Self {
            is_correct: false,
            points_earned: 0.0,
            is_multiple: false,
            is_unparsable: false,
        }
    }
}

/// Score one raw response against an item.
///
/// `raw` is expected to be trimmed and upper-cased already.
pub fn score(raw: &str, item: &ItemMetadata) -> Score {
    if raw.is_empty() {
        return Score::zero();
    }

    match item.item_type {
        ItemType::ConstructedResponse => {
            let Some(value) = parse_points(raw) else {
                return Score {
                    is_unparsable: true,
                    ..Score::zero()
                };
            };
            Score {
                is_correct: value == item.max_points,
                points_earned: value.clamp(0.0, item.max_points),
                is_multiple: false,
                is_unparsable: false,
            }
        }
        ItemType::MultipleChoice => {
            if raw.contains(' ') || raw.chars().count() > 1 {
                return Score {
                    is_multiple: true,
                    ..Score::zero()
                };
            }
            let is_correct = item.correct_answer.as_deref() == Some(raw);
            Score {
                is_correct,
                points_earned: if is_correct { 1.0 } else { 0.0 },
                is_multiple: false,
                is_unparsable: false,
            }
        }
    }
}

/// Parse a constructed-response value. The whole string must be a finite
/// number; "inf", "NaN" and trailing garbage are rejected.
fn parse_points(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Counts of responses that were scored zero for being ambiguous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringSummary {
    pub responses_scored: usize,
    pub multiple_responses: usize,
    pub unparsable_responses: usize,
}

impl ScoringSummary {
    fn record(&mut self, score: &Score) {
        self.responses_scored += 1;
        if score.is_multiple {
            self.multiple_responses += 1;
        }
        if score.is_unparsable {
            self.unparsable_responses += 1;
        }
    }
}

/// Score every item for one student, in item order.
///
/// Returns the responses and the total score; the total is the sum of the
/// returned `points_earned` values.
pub fn score_student<'a, I>(
    student: &ParsedStudent,
    items: I,
    summary: &mut ScoringSummary,
) -> (Vec<ScoredResponse>, f64)
where
    I: IntoIterator<Item = (&'a str, &'a ItemMetadata)>,
{
    let mut total = 0.0;
    let responses = items
        .into_iter()
        .map(|(code, metadata)| {
            let raw = student.responses.get(code).cloned().unwrap_or_default();
            let s = score(&raw, metadata);
            summary.record(&s);
            total += s.points_earned;
            ScoredResponse {
                item_code: code.to_string(),
                raw_value: raw,
                is_correct: s.is_correct,
                points_earned: s.points_earned,
            }
        })
        .collect();
    (responses, total)
}
