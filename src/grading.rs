use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    E,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grade {
    pub letter: Letter,
    pub remark: &'static str,
}

// (minimum percentage, letter, remark), highest band first.
const GRADE_BANDS: [(f64, Letter, &str); 5] = [
    (70.0, Letter::A, "Excellent"),
    (60.0, Letter::B, "Very Good"),
    (50.0, Letter::C, "Good"),
    (45.0, Letter::D, "Pass"),
    (40.0, Letter::E, "Weak Pass"),
];

const FAIL: Grade = Grade {
    letter: Letter::F,
    remark: "Fail",
};

/// Lower band edges are inclusive. Compared as `score * 100 >= pct * max`
/// so that exact edges like 14/20 land in the upper band.
pub fn grade(score: f64, max_score: f64) -> Grade {
    if max_score <= 0.0 || !score.is_finite() {
        return FAIL;
    }
    for (min_pct, letter, remark) in GRADE_BANDS {
        if score * 100.0 >= min_pct * max_score {
            return Grade { letter, remark };
        }
    }
    FAIL
}

pub fn percentage(score: f64, max_score: f64) -> f64 {
    if max_score > 0.0 {
        100.0 * score / max_score
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MeritLevel {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

pub fn merit_level(net_points: i64) -> MeritLevel {
    match net_points {
        p if p >= 501 => MeritLevel::Diamond,
        p if p >= 301 => MeritLevel::Platinum,
        p if p >= 151 => MeritLevel::Gold,
        p if p >= 51 => MeritLevel::Silver,
        _ => MeritLevel::Bronze,
    }
}

/// VB6-style 1-decimal rounding: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}
