//! Core types for Hourglass Realm
//!
//! Defines the persisted game record and its parts:
//! - The singleton `GameState` and the secrets it carries
//! - The drawing sub-puzzle (`Puzzle1b`) and its stage
//! - The closed category vocabulary the classifier answers with

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of basic categories that must be drawn to clear stage 0
pub const BASIC_CATEGORY_COUNT: u8 = 5;

/// Opaque session token (UUID v4 rendered as text)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    /// Generate a fresh random token
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Token text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix safe to put in logs
    #[must_use]
    pub fn redacted(&self) -> &str {
        let end = self.0.char_indices().nth(8).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The five categories drawn during stage 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BasicCategory {
    Car,
    House,
    Love,
    Money,
    Family,
}

impl BasicCategory {
    /// All basic categories in display order
    pub const ALL: [BasicCategory; 5] = [
        BasicCategory::Car,
        BasicCategory::House,
        BasicCategory::Love,
        BasicCategory::Money,
        BasicCategory::Family,
    ];

    /// Upper-case label used on the wire and in narrative text
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BasicCategory::Car => "CAR",
            BasicCategory::House => "HOUSE",
            BasicCategory::Love => "LOVE",
            BasicCategory::Money => "MONEY",
            BasicCategory::Family => "FAMILY",
        }
    }
}

impl fmt::Display for BasicCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classification outcome
///
/// `Jesus` is the special category: it only exists in the stage 1
/// vocabulary and the classifier applies stricter evidence rules to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// One of the five ordinary categories
    Basic(BasicCategory),
    /// The special category that completes stage 1
    Jesus,
}

const STAGE0_VOCABULARY: [Category; 5] = [
    Category::Basic(BasicCategory::Car),
    Category::Basic(BasicCategory::House),
    Category::Basic(BasicCategory::Love),
    Category::Basic(BasicCategory::Money),
    Category::Basic(BasicCategory::Family),
];

const STAGE1_VOCABULARY: [Category; 6] = [
    Category::Basic(BasicCategory::Car),
    Category::Basic(BasicCategory::House),
    Category::Basic(BasicCategory::Love),
    Category::Basic(BasicCategory::Money),
    Category::Basic(BasicCategory::Family),
    Category::Jesus,
];

impl Category {
    /// Categories the classifier may answer with at `stage`
    ///
    /// Empty once the puzzle is solved.
    #[must_use]
    pub fn vocabulary(stage: PuzzleStage) -> &'static [Category] {
        match stage {
            PuzzleStage::Classifying => &STAGE0_VOCABULARY,
            PuzzleStage::AwaitingSpecial => &STAGE1_VOCABULARY,
            PuzzleStage::Solved => &[],
        }
    }

    /// Whether this category belongs to the vocabulary of `stage`
    #[inline]
    #[must_use]
    pub fn allowed_at(self, stage: PuzzleStage) -> bool {
        Self::vocabulary(stage).contains(&self)
    }

    /// Upper-case label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Basic(basic) => basic.as_str(),
            Category::Jesus => "JESUS",
        }
    }

    /// Parse a label, case-insensitively; `NONE` and unknown labels yield `None`
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("JESUS") {
            return Some(Category::Jesus);
        }
        BasicCategory::ALL
            .into_iter()
            .find(|c| label.eq_ignore_ascii_case(c.as_str()))
            .map(Category::Basic)
    }

    /// Basic category, if this is one
    #[inline]
    #[must_use]
    pub fn basic(self) -> Option<BasicCategory> {
        match self {
            Category::Basic(basic) => Some(basic),
            Category::Jesus => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of the drawing sub-puzzle
///
/// Serialized as its integer value. Stages only move forward; a full
/// reset is the sole way back to `Classifying`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum PuzzleStage {
    /// Stage 0: collecting the five basic drawings
    #[default]
    Classifying,
    /// Stage 1: first PIN revealed, waiting for the special drawing
    AwaitingSpecial,
    /// Stage 2: both PINs revealed
    Solved,
}

impl PuzzleStage {
    /// Integer value used on the wire
    #[inline]
    #[must_use]
    pub fn value(self) -> u8 {
        match self {
            PuzzleStage::Classifying => 0,
            PuzzleStage::AwaitingSpecial => 1,
            PuzzleStage::Solved => 2,
        }
    }

    /// Number of PINs revealed once this stage is reached
    #[inline]
    #[must_use]
    pub fn revealed_pins(self) -> usize {
        usize::from(self.value())
    }
}

impl From<PuzzleStage> for u8 {
    fn from(stage: PuzzleStage) -> Self {
        stage.value()
    }
}

impl TryFrom<u8> for PuzzleStage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PuzzleStage::Classifying),
            1 => Ok(PuzzleStage::AwaitingSpecial),
            2 => Ok(PuzzleStage::Solved),
            other => Err(format!("invalid puzzle stage: {other}")),
        }
    }
}

impl fmt::Display for PuzzleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Per-category "already found" flags for stage 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage1Progress {
    #[serde(rename = "CAR")]
    pub car: bool,
    #[serde(rename = "HOUSE")]
    pub house: bool,
    #[serde(rename = "LOVE")]
    pub love: bool,
    #[serde(rename = "MONEY")]
    pub money: bool,
    #[serde(rename = "FAMILY")]
    pub family: bool,
}

impl Stage1Progress {
    /// Whether `category` has been found
    #[inline]
    #[must_use]
    pub fn get(&self, category: BasicCategory) -> bool {
        match category {
            BasicCategory::Car => self.car,
            BasicCategory::House => self.house,
            BasicCategory::Love => self.love,
            BasicCategory::Money => self.money,
            BasicCategory::Family => self.family,
        }
    }

    fn slot_mut(&mut self, category: BasicCategory) -> &mut bool {
        match category {
            BasicCategory::Car => &mut self.car,
            BasicCategory::House => &mut self.house,
            BasicCategory::Love => &mut self.love,
            BasicCategory::Money => &mut self.money,
            BasicCategory::Family => &mut self.family,
        }
    }

    /// Mark `category` found; returns false if it already was
    pub fn mark(&mut self, category: BasicCategory) -> bool {
        let slot = self.slot_mut(category);
        let newly_found = !*slot;
        *slot = true;
        newly_found
    }

    /// Number of categories found
    #[must_use]
    pub fn found_count(&self) -> u8 {
        let mut count = 0;
        for category in BasicCategory::ALL {
            if self.get(category) {
                count += 1;
            }
        }
        count
    }
}

/// The drawing sub-puzzle state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle1b {
    /// Found flags per basic category
    pub stage1_progress: Stage1Progress,
    /// Cached count of found categories
    pub stage1_count: u8,
    /// Highest completed stage
    pub completed_stage: PuzzleStage,
    /// PINs revealed so far, in stage order
    pub pins: Vec<String>,
}

impl Puzzle1b {
    /// Check the stored invariants
    ///
    /// - `stage1_count` equals the number of found flags
    /// - `pins.len()` equals the completed stage
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.stage1_count == self.stage1_progress.found_count()
            && self.pins.len() == self.completed_stage.revealed_pins()
    }

    /// Player-facing progress summary
    #[must_use]
    pub fn summary(&self) -> PuzzleSummary {
        PuzzleSummary {
            count: self.stage1_count,
            pins: self.pins.clone(),
        }
    }
}

/// Progress summary returned by `fetch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleSummary {
    /// Basic categories found
    pub count: u8,
    /// PINs revealed
    pub pins: Vec<String>,
}

/// The two stage PINs: `[0]` reveals on reaching stage 1, `[1]` on stage 2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagePins(pub [String; 2]);

impl StagePins {
    /// Create from the two PINs
    #[inline]
    #[must_use]
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self([first.into(), second.into()])
    }

    /// PIN revealed when the puzzle reaches `stage`
    #[must_use]
    pub fn revealed_at(&self, stage: PuzzleStage) -> Option<&str> {
        match stage {
            PuzzleStage::Classifying => None,
            PuzzleStage::AwaitingSpecial => Some(&self.0[0]),
            PuzzleStage::Solved => Some(&self.0[1]),
        }
    }
}

impl TryFrom<Vec<String>> for StagePins {
    type Error = String;

    fn try_from(pins: Vec<String>) -> Result<Self, Self::Error> {
        let len = pins.len();
        <[String; 2]>::try_from(pins)
            .map(StagePins)
            .map_err(|_| format!("exactly two stage pins are required, got {len}"))
    }
}

/// Secrets compared against player input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterCodes {
    /// Room passphrase (compared case-insensitively)
    pub passphrase: String,
    /// Drawing sub-puzzle PINs
    pub puzzle_1b_pins: StagePins,
}

impl MasterCodes {
    /// Case-insensitive passphrase check; surrounding whitespace in the
    /// attempt is ignored
    #[must_use]
    pub fn passphrase_matches(&self, attempt: &str) -> bool {
        attempt.trim().to_lowercase() == self.passphrase.to_lowercase()
    }
}

/// The singleton game record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    /// The only session token currently accepted
    pub active_token: SessionToken,
    /// When `active_token` was issued
    pub token_claim_time: DateTime<Utc>,
    /// Countdown deadline
    pub target_time: DateTime<Utc>,
    /// Hints in display order
    pub hints: Vec<String>,
    /// Room secrets
    pub master_codes: MasterCodes,
    /// Drawing sub-puzzle
    pub puzzle_1b: Puzzle1b,
    /// Set once the correct passphrase is entered
    pub complete: bool,
    /// Optimistic-concurrency fencing token
    pub version: u64,
    /// Creation time of this record
    pub created_at: DateTime<Utc>,
    /// Last accepted write
    pub updated_at: DateTime<Utc>,
}

impl GameState {
    /// Fresh record: random token, deadline `countdown` from `now`, version 1
    #[must_use]
    pub fn fresh(master_codes: MasterCodes, countdown: Duration, now: DateTime<Utc>) -> Self {
        Self {
            active_token: SessionToken::generate(),
            token_claim_time: now,
            target_time: now + countdown,
            hints: Vec::new(),
            master_codes,
            puzzle_1b: Puzzle1b::default(),
            complete: false,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}
