use crate::data::assessment::{Assessment, AssessmentKind};
use serde::{Serialize, Serializer};
use std::{collections::HashMap, fmt, hash::Hash};
use uuid::Uuid;

/// Sum of the four assessment kinds, each out of 100.
pub const TOTAL_POSSIBLE: f64 = 400.0;

/// One student's normalised (0-100) scores in one course. Blank entries count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreSheet {
    pub midterm: Option<f64>,
    pub assignment: Option<f64>,
    pub project: Option<f64>,
    #[serde(rename = "final")]
    pub final_exam: Option<f64>,
}

impl ScoreSheet {
    pub const fn get(&self, kind: AssessmentKind) -> Option<f64> {
        match kind {
            AssessmentKind::Midterm => self.midterm,
            AssessmentKind::Assignment => self.assignment,
            AssessmentKind::Project => self.project,
            AssessmentKind::Final => self.final_exam,
        }
    }

    pub fn set(&mut self, kind: AssessmentKind, score: f64) {
        let slot = match kind {
            AssessmentKind::Midterm => &mut self.midterm,
            AssessmentKind::Assignment => &mut self.assignment,
            AssessmentKind::Project => &mut self.project,
            AssessmentKind::Final => &mut self.final_exam,
        };
        *slot = Some(score);
    }

    pub fn sum(&self) -> f64 {
        AssessmentKind::ALL
            .iter()
            .map(|kind| self.get(*kind).unwrap_or(0.0))
            .sum()
    }
}

/// Groups a course's stored assessments by student, scaling each `score / max_score` to 0-100.
pub fn score_sheets(assessments: &[Assessment]) -> HashMap<Uuid, ScoreSheet> {
    let mut sheets: HashMap<Uuid, ScoreSheet> = HashMap::new();
    for assessment in assessments {
        let normalised = if assessment.max_score > 0.0 {
            (assessment.score / assessment.max_score * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        sheets
            .entry(assessment.student_id)
            .or_default()
            .set(assessment.assessment_type, normalised);
    }
    sheets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Letter {
    A,
    B,
    C,
    D,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterGrade {
    Graded(Letter, Option<Modifier>),
    NotAvailable,
}

impl LetterGrade {
    pub fn from_percent(percent: f64) -> Self {
        let letter = if percent >= 90.0 {
            Letter::A
        } else if percent >= 80.0 {
            Letter::B
        } else if percent >= 70.0 {
            Letter::C
        } else if percent >= 60.0 {
            Letter::D
        } else {
            Letter::F
        };

        //taken on the already-rounded percent, so 87.5 is a B+
        let remainder = percent % 10.0;
        let modifier = if letter == Letter::F {
            None
        } else if remainder >= 7.0 && letter != Letter::A {
            Some(Modifier::Plus)
        } else if remainder < 3.0 {
            Some(Modifier::Minus)
        } else {
            None
        };

        Self::Graded(letter, modifier)
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self::Graded(letter, modifier) = self else {
            return f.write_str("N/A");
        };
        let letter = match letter {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
            Letter::F => "F",
        };
        f.write_str(letter)?;
        match modifier {
            Some(Modifier::Plus) => f.write_str("+"),
            Some(Modifier::Minus) => f.write_str("-"),
            None => Ok(()),
        }
    }
}

impl Serialize for LetterGrade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl maud::Render for LetterGrade {
    fn render_to(&self, buffer: &mut String) {
        use std::fmt::Write;
        let _ = write!(buffer, "{self}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverallGrade {
    pub percent: f64,
    pub letter: LetterGrade,
}

pub fn round_to_one_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub fn calculate_overall_grade<K: Hash + Eq>(
    sheets: &HashMap<K, ScoreSheet>,
    student_id: &K,
) -> OverallGrade {
    let Some(sheet) = sheets.get(student_id) else {
        return OverallGrade {
            percent: 0.0,
            letter: LetterGrade::NotAvailable,
        };
    };

    let percent = round_to_one_decimal(sheet.sum() / TOTAL_POSSIBLE * 100.0);
    OverallGrade {
        percent,
        letter: LetterGrade::from_percent(percent),
    }
}

/// `Σscore / Σmax_score` as a percentage, `None` when nothing has a maximum.
pub fn weighted_average(scores: impl IntoIterator<Item = (f64, f64)>) -> Option<f64> {
    let (got, possible) = scores
        .into_iter()
        .fold((0.0, 0.0), |(got, possible), (score, max)| {
            (got + score, possible + max)
        });

    if possible > 0.0 {
        Some(round_to_one_decimal(got / possible * 100.0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(midterm: f64, assignment: f64, project: f64, final_exam: f64) -> ScoreSheet {
        ScoreSheet {
            midterm: Some(midterm),
            assignment: Some(assignment),
            project: Some(project),
            final_exam: Some(final_exam),
        }
    }

    fn grade_for(sheet: ScoreSheet) -> OverallGrade {
        let sheets = HashMap::from([("s1", sheet)]);
        calculate_overall_grade(&sheets, &"s1")
    }

    #[test]
    fn mid_band_has_no_modifier() {
        let grade = grade_for(sheet(80.0, 90.0, 70.0, 100.0));
        assert_eq!(grade.percent, 85.0);
        assert_eq!(grade.letter.to_string(), "B");
    }

    #[test]
    fn all_zero_is_f() {
        let grade = grade_for(sheet(0.0, 0.0, 0.0, 0.0));
        assert_eq!(grade.percent, 0.0);
        assert_eq!(grade.letter.to_string(), "F");
    }

    #[test]
    fn unknown_student_is_not_available() {
        let sheets: HashMap<&str, ScoreSheet> = HashMap::new();
        let grade = calculate_overall_grade(&sheets, &"nobody");
        assert_eq!(grade.percent, 0.0);
        assert_eq!(grade.letter.to_string(), "N/A");
    }

    #[test]
    fn blanks_count_as_zero() {
        let grade = grade_for(ScoreSheet {
            midterm: Some(100.0),
            final_exam: Some(100.0),
            ..ScoreSheet::default()
        });
        assert_eq!(grade.percent, 50.0);
        assert_eq!(grade.letter.to_string(), "F");
    }

    #[test]
    fn modifiers() {
        assert_eq!(LetterGrade::from_percent(88.0).to_string(), "B+");
        assert_eq!(LetterGrade::from_percent(81.0).to_string(), "B-");
        assert_eq!(LetterGrade::from_percent(75.0).to_string(), "C");
        assert_eq!(LetterGrade::from_percent(72.9).to_string(), "C-");
        assert_eq!(LetterGrade::from_percent(62.0).to_string(), "D-");
        assert_eq!(LetterGrade::from_percent(97.0).to_string(), "A");
        assert_eq!(LetterGrade::from_percent(91.0).to_string(), "A-");
        assert_eq!(LetterGrade::from_percent(100.0).to_string(), "A-");
        assert_eq!(LetterGrade::from_percent(58.0).to_string(), "F");
        assert_eq!(LetterGrade::from_percent(51.0).to_string(), "F");
    }

    #[test]
    fn fractional_percent_uses_raw_remainder() {
        assert_eq!(LetterGrade::from_percent(87.5).to_string(), "B+");
        assert_eq!(LetterGrade::from_percent(82.9).to_string(), "B-");
    }

    #[test]
    fn percent_is_rounded_to_one_decimal() {
        //345.5 / 400 = 86.375%
        let grade = grade_for(sheet(90.0, 90.0, 90.0, 75.5));
        assert_eq!(grade.percent, 86.4);
        assert_eq!(grade.letter.to_string(), "B");
    }

    #[test]
    fn every_grade_is_in_range_and_known() {
        const KNOWN: &[&str] = &[
            "A+", "A", "A-", "B+", "B", "B-", "C+", "C", "C-", "D+", "D", "D-", "F", "N/A",
        ];

        for a in (0..=100).step_by(7) {
            for b in (0..=100).step_by(11) {
                let grade = grade_for(sheet(f64::from(a), f64::from(b), 55.5, 100.0));
                assert!((0.0..=100.0).contains(&grade.percent));
                assert!(KNOWN.contains(&grade.letter.to_string().as_str()));
            }
        }
    }

    #[test]
    fn letter_serialises_as_string() {
        let grade = grade_for(sheet(80.0, 90.0, 70.0, 100.0));
        let json = serde_json::to_value(grade).expect("serialise grade");
        assert_eq!(json["letter"], "B");
        assert_eq!(json["percent"], 85.0);
    }

    #[test]
    fn weighted_average_uses_max_scores() {
        assert_eq!(weighted_average([(45.0, 50.0), (15.0, 50.0)]), Some(60.0));
        assert_eq!(weighted_average([(9.0, 10.0), (80.0, 100.0)]), Some(80.9));
        assert_eq!(weighted_average(std::iter::empty()), None);
    }
}
