//! Meal and rest break heuristic.
//!
//! Rules are checked in order and the first match wins:
//!
//! | worked today      | break today | result                              |
//! |-------------------|-------------|-------------------------------------|
//! | < 30 min          | any         | no break yet                        |
//! | >= 5 h            | < 30 min    | meal break required (lunch)         |
//! | >= 2 h            | any         | any break, lunch suggested from 5 h |
//! | >= 30 min         | any         | coffee break                        |

use serde::{Deserialize, Serialize};

use crate::entry::BreakKind;

/// Minutes of work before the first break is earned.
pub const FIRST_BREAK_AFTER_MINUTES: i64 = 30;

/// Minutes of work after which any break kind may be taken.
pub const EARNED_BREAK_AFTER_MINUTES: i64 = 120;

/// Minutes of work after which a meal break is required.
pub const MEAL_BREAK_AFTER_MINUTES: i64 = 300;

/// Break minutes that satisfy the meal break requirement.
pub const MEAL_BREAK_MINUTES: i64 = 30;

/// Break entitlement derived from today's totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakRequirements {
    pub can_take_break: bool,
    pub requires_meal_break: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_break_kind: Option<BreakKind>,
    pub compliance_message: String,
    /// Minutes of work left before the first break is earned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_break_in: Option<i64>,
}

/// Evaluates break entitlement from minutes worked and on break today.
pub fn compute_break_requirements(total_worked_today: i64, total_break_today: i64) -> BreakRequirements {
    if total_worked_today < FIRST_BREAK_AFTER_MINUTES {
        return BreakRequirements {
            can_take_break: false,
            requires_meal_break: false,
            suggested_break_kind: None,
            compliance_message: "work 30+ minutes to earn first break".to_string(),
            next_break_in: Some(FIRST_BREAK_AFTER_MINUTES - total_worked_today.max(0)),
        };
    }

    if total_worked_today >= MEAL_BREAK_AFTER_MINUTES && total_break_today < MEAL_BREAK_MINUTES {
        return BreakRequirements {
            can_take_break: true,
            requires_meal_break: true,
            suggested_break_kind: Some(BreakKind::Lunch),
            compliance_message: "meal break required after 5 hours".to_string(),
            next_break_in: None,
        };
    }

    if total_worked_today >= EARNED_BREAK_AFTER_MINUTES {
        let suggested = if total_worked_today >= MEAL_BREAK_AFTER_MINUTES {
            BreakKind::Lunch
        } else {
            BreakKind::Coffee
        };
        return BreakRequirements {
            can_take_break: true,
            requires_meal_break: false,
            suggested_break_kind: Some(suggested),
            compliance_message: "you've earned break time".to_string(),
            next_break_in: None,
        };
    }

    BreakRequirements {
        can_take_break: true,
        requires_meal_break: false,
        suggested_break_kind: Some(BreakKind::Coffee),
        compliance_message: "short break available".to_string(),
        next_break_in: None,
    }
}
