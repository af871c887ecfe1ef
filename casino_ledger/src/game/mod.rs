//! Game catalogue: which wagers exist and how they are stored.
//!
//! A [`Wager`] is a game plus the bet made on it. It is persisted on the
//! settlement queue as two strings (`game_key`, `bet_key`) and recovered with
//! [`Wager::parse`]. Payout arithmetic lives in [`payout`].

pub mod payout;

pub use payout::GameOutcome;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coefficient games and the chance that the winning face comes up.
pub const CUSTOM_COEFFICIENTS: [(u8, f64); 8] = [
    (2, 0.40),
    (3, 0.25),
    (5, 0.15),
    (10, 0.08),
    (20, 0.05),
    (30, 0.03),
    (50, 0.02),
    (100, 0.01),
];

/// Wager could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WagerParseError {
    #[error("Unknown game '{0}'")]
    UnknownGame(String),

    #[error("Unknown bet '{bet}' for {game}")]
    UnknownBet { game: String, bet: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CubeBet {
    Even,
    Odd,
    /// 4, 5 or 6
    High,
    /// 1, 2 or 3
    Low,
    /// Sector 1 is (1, 2), sector 2 is (3, 4), sector 3 is (5, 6)
    Sector(u8),
    Exact(u8),
    /// Graded payout by face value
    Plinko,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TwoDiceBet {
    Draw,
    FirstWins,
    SecondWins,
    BothEven,
    BothOdd,
    /// Both below 4
    BothLow,
    /// Both above 3
    BothHigh,
    /// Product of 18 or more
    Product18,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hand {
    Rock,
    Scissors,
    Paper,
}

impl Hand {
    /// Bot throw from a 1..=3 roll.
    pub fn from_roll(value: u8) -> Self {
        match value {
            2 => Hand::Scissors,
            3 => Hand::Paper,
            _ => Hand::Rock,
        }
    }

    pub fn beats(self, other: Hand) -> bool {
        matches!(
            (self, other),
            (Hand::Rock, Hand::Scissors) | (Hand::Scissors, Hand::Paper) | (Hand::Paper, Hand::Rock)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasketballBet {
    /// Swish, face 5
    CleanGoal,
    /// Ball stuck on the rim, face 3
    Stuck,
    Goal,
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DartsBet {
    Miss,
    White,
    Red,
    Bullseye,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BowlingBet {
    /// Graded payout by pins knocked down
    Ladder,
    Strike,
    Miss,
    /// Player roll against a house roll
    DuelWin,
    DuelLose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FootballBet {
    Goal,
    Miss,
}

/// A game and the bet placed on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wager {
    Cube(CubeBet),
    TwoDice(TwoDiceBet),
    RockPaperScissors(Hand),
    Basketball(BasketballBet),
    Darts(DartsBet),
    Slots,
    Bowling(BowlingBet),
    Football(FootballBet),
    /// Wins `coefficient`× when a 1..=coefficient roll lands on the coefficient
    Custom { coefficient: u8 },
}

/// How many values the outcome source must draw, and from which range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollPlan {
    pub rolls: u8,
    /// Values are drawn from `1..=faces`
    pub faces: u8,
}

/// Raw values drawn for one wager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rolls {
    pub first: u8,
    pub second: Option<u8>,
}

impl Rolls {
    pub fn single(value: u8) -> Self {
        Self {
            first: value,
            second: None,
        }
    }

    pub fn pair(first: u8, second: u8) -> Self {
        Self {
            first,
            second: Some(second),
        }
    }
}

impl Wager {
    /// Decode the stored `(game, bet)` pair.
    pub fn parse(game: &str, bet: &str) -> Result<Self, WagerParseError> {
        let game = game.trim().to_ascii_lowercase();
        let bet = bet.trim().to_ascii_lowercase();
        let unknown_bet = || WagerParseError::UnknownBet {
            game: game.clone(),
            bet: bet.clone(),
        };

        let wager = match game.as_str() {
            "cube" => Wager::Cube(match bet.as_str() {
                "even" => CubeBet::Even,
                "odd" => CubeBet::Odd,
                "high" => CubeBet::High,
                "low" => CubeBet::Low,
                "plinko" => CubeBet::Plinko,
                "sector1" => CubeBet::Sector(1),
                "sector2" => CubeBet::Sector(2),
                "sector3" => CubeBet::Sector(3),
                face => match face.parse::<u8>() {
                    Ok(n @ 1..=6) => CubeBet::Exact(n),
                    _ => return Err(unknown_bet()),
                },
            }),
            "two_dice" => Wager::TwoDice(match bet.as_str() {
                "draw" => TwoDiceBet::Draw,
                "first" => TwoDiceBet::FirstWins,
                "second" => TwoDiceBet::SecondWins,
                "both_even" => TwoDiceBet::BothEven,
                "both_odd" => TwoDiceBet::BothOdd,
                "both_low" => TwoDiceBet::BothLow,
                "both_high" => TwoDiceBet::BothHigh,
                "product18" => TwoDiceBet::Product18,
                _ => return Err(unknown_bet()),
            }),
            "rps" => Wager::RockPaperScissors(match bet.as_str() {
                "rock" => Hand::Rock,
                "scissors" => Hand::Scissors,
                "paper" => Hand::Paper,
                _ => return Err(unknown_bet()),
            }),
            "basketball" => Wager::Basketball(match bet.as_str() {
                "clean_goal" => BasketballBet::CleanGoal,
                "stuck" => BasketballBet::Stuck,
                "goal" => BasketballBet::Goal,
                "miss" => BasketballBet::Miss,
                _ => return Err(unknown_bet()),
            }),
            "darts" => Wager::Darts(match bet.as_str() {
                "miss" => DartsBet::Miss,
                "white" => DartsBet::White,
                "red" => DartsBet::Red,
                "bullseye" => DartsBet::Bullseye,
                _ => return Err(unknown_bet()),
            }),
            "slots" => match bet.as_str() {
                "spin" => Wager::Slots,
                _ => return Err(unknown_bet()),
            },
            "bowling" => Wager::Bowling(match bet.as_str() {
                "ladder" => BowlingBet::Ladder,
                "strike" => BowlingBet::Strike,
                "miss" => BowlingBet::Miss,
                "duel_win" => BowlingBet::DuelWin,
                "duel_lose" => BowlingBet::DuelLose,
                _ => return Err(unknown_bet()),
            }),
            "football" => Wager::Football(match bet.as_str() {
                "goal" => FootballBet::Goal,
                "miss" => FootballBet::Miss,
                _ => return Err(unknown_bet()),
            }),
            "custom" => {
                let coefficient = bet
                    .strip_prefix('x')
                    .and_then(|raw| raw.parse::<u8>().ok())
                    .filter(|coef| CUSTOM_COEFFICIENTS.iter().any(|(c, _)| c == coef))
                    .ok_or_else(unknown_bet)?;
                Wager::Custom { coefficient }
            }
            _ => return Err(WagerParseError::UnknownGame(game.clone())),
        };

        Ok(wager)
    }

    /// Stored game column.
    pub fn game_key(&self) -> &'static str {
        match self {
            Wager::Cube(_) => "cube",
            Wager::TwoDice(_) => "two_dice",
            Wager::RockPaperScissors(_) => "rps",
            Wager::Basketball(_) => "basketball",
            Wager::Darts(_) => "darts",
            Wager::Slots => "slots",
            Wager::Bowling(_) => "bowling",
            Wager::Football(_) => "football",
            Wager::Custom { .. } => "custom",
        }
    }

    /// Stored bet column.
    pub fn bet_key(&self) -> String {
        let key = match self {
            Wager::Cube(bet) => match bet {
                CubeBet::Even => "even",
                CubeBet::Odd => "odd",
                CubeBet::High => "high",
                CubeBet::Low => "low",
                CubeBet::Plinko => "plinko",
                CubeBet::Sector(n) => return format!("sector{}", n),
                CubeBet::Exact(n) => return n.to_string(),
            },
            Wager::TwoDice(bet) => match bet {
                TwoDiceBet::Draw => "draw",
                TwoDiceBet::FirstWins => "first",
                TwoDiceBet::SecondWins => "second",
                TwoDiceBet::BothEven => "both_even",
                TwoDiceBet::BothOdd => "both_odd",
                TwoDiceBet::BothLow => "both_low",
                TwoDiceBet::BothHigh => "both_high",
                TwoDiceBet::Product18 => "product18",
            },
            Wager::RockPaperScissors(hand) => match hand {
                Hand::Rock => "rock",
                Hand::Scissors => "scissors",
                Hand::Paper => "paper",
            },
            Wager::Basketball(bet) => match bet {
                BasketballBet::CleanGoal => "clean_goal",
                BasketballBet::Stuck => "stuck",
                BasketballBet::Goal => "goal",
                BasketballBet::Miss => "miss",
            },
            Wager::Darts(bet) => match bet {
                DartsBet::Miss => "miss",
                DartsBet::White => "white",
                DartsBet::Red => "red",
                DartsBet::Bullseye => "bullseye",
            },
            Wager::Slots => "spin",
            Wager::Bowling(bet) => match bet {
                BowlingBet::Ladder => "ladder",
                BowlingBet::Strike => "strike",
                BowlingBet::Miss => "miss",
                BowlingBet::DuelWin => "duel_win",
                BowlingBet::DuelLose => "duel_lose",
            },
            Wager::Football(bet) => match bet {
                FootballBet::Goal => "goal",
                FootballBet::Miss => "miss",
            },
            Wager::Custom { coefficient } => return format!("x{}", coefficient),
        };
        key.to_string()
    }

    /// What the outcome source has to draw for this wager.
    pub fn roll_plan(&self) -> RollPlan {
        match self {
            Wager::TwoDice(_) => RollPlan { rolls: 2, faces: 6 },
            Wager::Bowling(BowlingBet::DuelWin | BowlingBet::DuelLose) => {
                RollPlan { rolls: 2, faces: 6 }
            }
            Wager::Cube(_) | Wager::Darts(_) | Wager::Bowling(_) => RollPlan { rolls: 1, faces: 6 },
            Wager::Basketball(_) | Wager::Football(_) => RollPlan { rolls: 1, faces: 5 },
            Wager::RockPaperScissors(_) => RollPlan { rolls: 1, faces: 3 },
            Wager::Slots => RollPlan { rolls: 1, faces: 64 },
            Wager::Custom { coefficient } => RollPlan {
                rolls: 1,
                faces: *coefficient,
            },
        }
    }
}

impl std::fmt::Display for Wager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.game_key(), self.bet_key())
    }
}
