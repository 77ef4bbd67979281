use time::Date;

use crate::profiles::repo::Tier;

/// Base points for a correct solo answer.
const CORRECT_POINTS: i32 = 10;
/// Penalty for a wrong solo answer.
const WRONG_POINTS: i32 = -3;
/// Bonus awarded every `STREAK_INTERVAL` consecutive correct answers.
const STREAK_BONUS: i32 = 5;
const STREAK_INTERVAL: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredAnswer {
    pub points_earned: i32,
    pub streak_bonus: i32,
    pub new_streak: i32,
}

/// Tier bracket for a running point total.
pub fn tier_for_points(points: i32) -> Tier {
    if points < 100 {
        Tier::Beginner
    } else if points < 300 {
        Tier::Student
    } else if points < 700 {
        Tier::Scholar
    } else if points < 1500 {
        Tier::Chacham
    } else {
        Tier::Gadol
    }
}

/// Points and streak movement for a solo answer.
pub fn score_answer(correct: bool, current_streak: i32) -> ScoredAnswer {
    let base = if correct { CORRECT_POINTS } else { WRONG_POINTS };
    let new_streak = if correct { current_streak + 1 } else { 0 };
    let streak_bonus = if correct && new_streak > 0 && new_streak % STREAK_INTERVAL == 0 {
        STREAK_BONUS
    } else {
        0
    };
    ScoredAnswer {
        points_earned: base + streak_bonus,
        streak_bonus,
        new_streak,
    }
}

/// The daily counter resets when the stored reset date is not today.
pub fn should_reset_daily(reset_date: Option<Date>, today: Date) -> bool {
    match reset_date {
        Some(d) => d != today,
        None => true,
    }
}

/// Points a head-to-head question is worth, by the tier it was generated for.
pub fn question_points(tier: Tier) -> i32 {
    match tier {
        Tier::Beginner => 10,
        Tier::Student => 20,
        Tier::Scholar => 30,
        Tier::Chacham => 40,
        Tier::Gadol => 50,
    }
}

/// Difficulty label passed to the question generator for a tier.
pub fn tier_difficulty(tier: Tier) -> &'static str {
    match tier {
        Tier::Beginner => "easy",
        Tier::Student => "medium",
        Tier::Scholar => "medium",
        Tier::Chacham | Tier::Gadol => "hard",
    }
}

/// Jeopardy-style tier spread for a 10-question head-to-head game.
pub fn game_tier_distribution() -> [Tier; 10] {
    [
        Tier::Beginner,
        Tier::Beginner,
        Tier::Student,
        Tier::Student,
        Tier::Student,
        Tier::Scholar,
        Tier::Scholar,
        Tier::Scholar,
        Tier::Chacham,
        Tier::Chacham,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn tier_thresholds() {
        assert_eq!(tier_for_points(0), Tier::Beginner);
        assert_eq!(tier_for_points(99), Tier::Beginner);
        assert_eq!(tier_for_points(100), Tier::Student);
        assert_eq!(tier_for_points(299), Tier::Student);
        assert_eq!(tier_for_points(300), Tier::Scholar);
        assert_eq!(tier_for_points(699), Tier::Scholar);
        assert_eq!(tier_for_points(700), Tier::Chacham);
        assert_eq!(tier_for_points(1499), Tier::Chacham);
        assert_eq!(tier_for_points(1500), Tier::Gadol);
    }

    #[test]
    fn correct_answer_earns_base_points_and_extends_streak() {
        let scored = score_answer(true, 2);
        assert_eq!(scored.points_earned, 10);
        assert_eq!(scored.streak_bonus, 0);
        assert_eq!(scored.new_streak, 3);
    }

    #[test]
    fn wrong_answer_costs_points_and_resets_streak() {
        let scored = score_answer(false, 7);
        assert_eq!(scored.points_earned, -3);
        assert_eq!(scored.streak_bonus, 0);
        assert_eq!(scored.new_streak, 0);
    }

    #[test]
    fn every_fifth_correct_answer_earns_bonus() {
        let scored = score_answer(true, 4);
        assert_eq!(scored.new_streak, 5);
        assert_eq!(scored.streak_bonus, 5);
        assert_eq!(scored.points_earned, 15);

        let scored = score_answer(true, 9);
        assert_eq!(scored.new_streak, 10);
        assert_eq!(scored.streak_bonus, 5);
    }

    #[test]
    fn daily_reset_rules() {
        let today = date!(2026 - 08 - 07);
        assert!(should_reset_daily(None, today));
        assert!(should_reset_daily(Some(date!(2026 - 08 - 06)), today));
        assert!(!should_reset_daily(Some(today), today));
    }

    #[test]
    fn game_distribution_covers_ten_questions() {
        let spread = game_tier_distribution();
        assert_eq!(spread.len(), 10);
        assert_eq!(spread.iter().filter(|t| **t == Tier::Beginner).count(), 2);
        assert_eq!(spread.iter().filter(|t| **t == Tier::Student).count(), 3);
        assert_eq!(spread.iter().filter(|t| **t == Tier::Scholar).count(), 3);
        assert_eq!(spread.iter().filter(|t| **t == Tier::Chacham).count(), 2);
    }
}
