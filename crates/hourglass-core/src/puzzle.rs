//! Drawing sub-puzzle state machine
//!
//! `advance` is a pure function of the current sub-state, at most one
//! classified category, and the stage PIN table. It never second-guesses
//! the classification; it only applies the stage rules:
//!
//! | stage | category | outcome |
//! |---|---|---|
//! | 0 | new basic | mark found; 5th find moves to stage 1 and reveals PIN 0 |
//! | 0 | seen basic | unchanged, "drawn before" text |
//! | 1 | basic | unchanged, "already gave you a PIN" text |
//! | 1 | special | stage 2, reveals PIN 1, response text replaced by "" |
//! | 2 | any | unchanged |

use crate::types::{
    BasicCategory, Category, Puzzle1b, PuzzleStage, StagePins, BASIC_CATEGORY_COUNT,
};

/// Appended when the fifth basic category is found
pub const STAGE_ONE_COMPLETE_TEXT: &str =
    "All five drawings? Wowza, you did it! Now where did I put that PIN... oh, here it is!";

/// Appended for any basic category once stage 1 is reached
pub const PIN_ALREADY_GIVEN_TEXT: &str =
    "A PIN? Oh! I already gave you one! ...I think. Maybe. Probably?";

/// What happened in a single `advance` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing was identified
    NoMatch,
    /// A basic category was found for the first time
    Found {
        category: BasicCategory,
        remaining: u8,
    },
    /// A basic category that was already found
    AlreadyFound(BasicCategory),
    /// Stage 0 finished: all basic categories found
    StageOneComplete,
    /// Stage 1 with an ordinary category: nothing to give
    PinAlreadyGiven,
    /// Stage 1 finished by the special category
    StageTwoComplete,
    /// Called on a solved puzzle, or with a category outside the stage vocabulary
    Ignored,
}

/// Result of a single `advance` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance {
    /// Next sub-state
    pub puzzle: Puzzle1b,
    /// Narrative text to return to the player
    pub response: String,
    /// Which rule fired
    pub transition: Transition,
}

impl Advance {
    /// Whether the sub-state differs from the input
    #[inline]
    #[must_use]
    pub fn changed(&self) -> bool {
        matches!(
            self.transition,
            Transition::Found { .. } | Transition::StageOneComplete | Transition::StageTwoComplete
        )
    }

    /// PIN revealed by this call, if any
    #[must_use]
    pub fn revealed_pin(&self) -> Option<&str> {
        match self.transition {
            Transition::StageOneComplete | Transition::StageTwoComplete => {
                self.puzzle.pins.last().map(String::as_str)
            }
            _ => None,
        }
    }
}

fn found_text(category: BasicCategory, remaining: u8) -> String {
    format!("You found the {category} drawing, only {remaining} more to go... right? I think so!")
}

fn seen_before_text(category: BasicCategory) -> String {
    format!("Heyyy, deja blue! You've drawn {category} before, try something new!")
}

fn append(mut narrative: String, paragraph: &str) -> String {
    narrative.push_str("\n\n");
    narrative.push_str(paragraph);
    narrative
}

/// Apply one classification to the sub-puzzle
///
/// `narrative` is the classifier's free text; it passes through untouched
/// when no rule appends to or replaces it.
#[must_use]
pub fn advance(
    puzzle: &Puzzle1b,
    category: Option<Category>,
    pins: &StagePins,
    narrative: String,
) -> Advance {
    let unchanged = |response: String, transition: Transition| Advance {
        puzzle: puzzle.clone(),
        response,
        transition,
    };

    let Some(category) = category else {
        return unchanged(narrative, Transition::NoMatch);
    };

    match (puzzle.completed_stage, category) {
        (PuzzleStage::Classifying, Category::Basic(basic)) => {
            if puzzle.stage1_progress.get(basic) {
                return unchanged(
                    append(narrative, &seen_before_text(basic)),
                    Transition::AlreadyFound(basic),
                );
            }

            let mut next = puzzle.clone();
            next.stage1_progress.mark(basic);
            // Rederived from the flags; the stored count is only a cache.
            next.stage1_count = next.stage1_progress.found_count();

            if next.stage1_count >= BASIC_CATEGORY_COUNT {
                next.completed_stage = PuzzleStage::AwaitingSpecial;
                if let Some(pin) = pins.revealed_at(PuzzleStage::AwaitingSpecial) {
                    next.pins.push(pin.to_string());
                }
                Advance {
                    puzzle: next,
                    response: append(narrative, STAGE_ONE_COMPLETE_TEXT),
                    transition: Transition::StageOneComplete,
                }
            } else {
                let remaining = BASIC_CATEGORY_COUNT.saturating_sub(next.stage1_count);
                Advance {
                    puzzle: next,
                    response: append(narrative, &found_text(basic, remaining)),
                    transition: Transition::Found {
                        category: basic,
                        remaining,
                    },
                }
            }
        }
        (PuzzleStage::AwaitingSpecial, Category::Jesus) => {
            let mut next = puzzle.clone();
            next.completed_stage = PuzzleStage::Solved;
            if let Some(pin) = pins.revealed_at(PuzzleStage::Solved) {
                next.pins.push(pin.to_string());
            }
            Advance {
                puzzle: next,
                response: String::new(),
                transition: Transition::StageTwoComplete,
            }
        }
        (PuzzleStage::AwaitingSpecial, Category::Basic(_)) => unchanged(
            append(narrative, PIN_ALREADY_GIVEN_TEXT),
            Transition::PinAlreadyGiven,
        ),
        // The special category is not in the stage 0 vocabulary, and a
        // solved puzzle accepts nothing.
        (PuzzleStage::Classifying, Category::Jesus) | (PuzzleStage::Solved, _) => {
            unchanged(narrative, Transition::Ignored)
        }
    }
}
