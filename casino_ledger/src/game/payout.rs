//! Payout tables.
//!
//! Pure functions from a wager and its rolls to a multiplier of the stake.
//! Payouts are truncated to whole cents.

use super::{
    BasketballBet, BowlingBet, CubeBet, DartsBet, FootballBet, Hand, Rolls, TwoDiceBet, Wager,
};
use crate::ledger::Cents;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Slot faces that pay for three of a kind, besides the jackpots.
const SLOT_TRIPLES: [u8; 5] = [43, 22, 52, 27, 38];

/// Settled result of one wager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    /// Any non-zero multiplier, including partial refunds on ties
    pub won: bool,
    pub multiplier: Decimal,
    pub payout: Cents,
}

/// `stake × multiplier`, truncated to the cent.
pub fn payout_for(stake: Cents, multiplier: Decimal) -> Cents {
    if stake <= 0 || multiplier <= Decimal::ZERO {
        return 0;
    }
    Decimal::from(stake)
        .checked_mul(multiplier)
        .and_then(|amount| amount.floor().to_i64())
        .unwrap_or(0)
}

fn when(condition: bool, multiplier: Decimal) -> Decimal {
    if condition { multiplier } else { Decimal::ZERO }
}

/// Player wins `win`, ties return `tie`.
fn duel(player_ahead: bool, tied: bool, win: Decimal, tie: Decimal) -> Decimal {
    if player_ahead {
        win
    } else if tied {
        tie
    } else {
        Decimal::ZERO
    }
}

fn cube(bet: CubeBet, face: u8) -> Decimal {
    match bet {
        CubeBet::Even => when(face % 2 == 0, dec!(1.85)),
        CubeBet::Odd => when(face % 2 == 1, dec!(1.85)),
        CubeBet::High => when(face > 3, dec!(1.85)),
        CubeBet::Low => when(face <= 3, dec!(1.85)),
        CubeBet::Sector(sector) => {
            let low = sector.saturating_mul(2).saturating_sub(1);
            when(face == low || face == low + 1, dec!(2.5))
        }
        CubeBet::Exact(n) => when(face == n, dec!(4)),
        CubeBet::Plinko => match face {
            2 => dec!(0.3),
            3 => dec!(0.9),
            4 => dec!(1.1),
            5 => dec!(1.4),
            6 => dec!(1.95),
            _ => Decimal::ZERO,
        },
    }
}

fn two_dice(bet: TwoDiceBet, first: u8, second: u8) -> Decimal {
    match bet {
        TwoDiceBet::Draw => when(first == second, dec!(3)),
        TwoDiceBet::FirstWins => duel(first > second, first == second, dec!(1.85), dec!(0.7)),
        TwoDiceBet::SecondWins => duel(second > first, first == second, dec!(1.85), dec!(0.7)),
        TwoDiceBet::BothEven => when(first % 2 == 0 && second % 2 == 0, dec!(2.5)),
        TwoDiceBet::BothOdd => when(first % 2 == 1 && second % 2 == 1, dec!(2.5)),
        TwoDiceBet::BothLow => when(first < 4 && second < 4, dec!(2.5)),
        TwoDiceBet::BothHigh => when(first > 3 && second > 3, dec!(2.5)),
        TwoDiceBet::Product18 => when(u16::from(first) * u16::from(second) >= 18, dec!(3)),
    }
}

fn rock_paper_scissors(player: Hand, bot_roll: u8) -> Decimal {
    let bot = Hand::from_roll(bot_roll);
    duel(player.beats(bot), player == bot, dec!(2.5), dec!(0.7))
}

fn basketball(bet: BasketballBet, face: u8) -> Decimal {
    let scored = face == 4 || face == 5;
    match bet {
        BasketballBet::CleanGoal => when(face == 5, dec!(3.5)),
        BasketballBet::Stuck => when(face == 3, dec!(3.5)),
        BasketballBet::Goal => when(scored, dec!(1.85)),
        BasketballBet::Miss => when(!scored, dec!(1.4)),
    }
}

fn darts(bet: DartsBet, face: u8) -> Decimal {
    match bet {
        DartsBet::Miss => when(face == 1, dec!(2.5)),
        DartsBet::White => when(face == 3 || face == 5, dec!(1.85)),
        DartsBet::Red => when(face == 2 || face == 4, dec!(1.85)),
        DartsBet::Bullseye => when(face == 6, dec!(2.5)),
    }
}

fn slots(face: u8) -> Decimal {
    match face {
        64 => dec!(10),
        1 => dec!(5),
        f if SLOT_TRIPLES.contains(&f) => dec!(5),
        _ => Decimal::ZERO,
    }
}

fn bowling(bet: BowlingBet, first: u8, second: Option<u8>) -> Decimal {
    match bet {
        BowlingBet::Ladder => match first {
            2 => dec!(0.4),
            3 => dec!(0.9),
            4 => dec!(1.3),
            5 => dec!(1.6),
            6 => dec!(1.95),
            _ => Decimal::ZERO,
        },
        BowlingBet::Strike => when(first == 6, dec!(4)),
        BowlingBet::Miss => when(first == 1, dec!(4)),
        BowlingBet::DuelWin => match second {
            Some(house) => duel(first > house, first == house, dec!(1.85), dec!(0.7)),
            None => Decimal::ZERO,
        },
        BowlingBet::DuelLose => match second {
            Some(house) => duel(first < house, first == house, dec!(1.85), dec!(0.7)),
            None => Decimal::ZERO,
        },
    }
}

fn football(bet: FootballBet, face: u8) -> Decimal {
    match bet {
        FootballBet::Goal => when((3..=5).contains(&face), dec!(1.4)),
        FootballBet::Miss => when(face == 1 || face == 2, dec!(1.85)),
    }
}

impl Wager {
    /// Stake multiplier for these rolls; zero is a loss.
    ///
    /// Two-roll wagers settled with a single roll lose.
    pub fn multiplier(&self, rolls: &Rolls) -> Decimal {
        let first = rolls.first;
        match *self {
            Wager::Cube(bet) => cube(bet, first),
            Wager::TwoDice(bet) => match rolls.second {
                Some(second) => two_dice(bet, first, second),
                None => Decimal::ZERO,
            },
            Wager::RockPaperScissors(hand) => rock_paper_scissors(hand, first),
            Wager::Basketball(bet) => basketball(bet, first),
            Wager::Darts(bet) => darts(bet, first),
            Wager::Slots => slots(first),
            Wager::Bowling(bet) => bowling(bet, first, rolls.second),
            Wager::Football(bet) => football(bet, first),
            Wager::Custom { coefficient } => when(first == coefficient, Decimal::from(coefficient)),
        }
    }

    /// Settle a stake against drawn values.
    pub fn settle(&self, stake: Cents, rolls: &Rolls) -> GameOutcome {
        let multiplier = self.multiplier(rolls);
        GameOutcome {
            won: multiplier > Decimal::ZERO,
            multiplier,
            payout: payout_for(stake, multiplier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{CUSTOM_COEFFICIENTS, RollPlan};
    use proptest::prelude::*;

    #[test]
    fn test_cube_even_pays_185() {
        let outcome = Wager::Cube(CubeBet::Even).settle(1000, &Rolls::single(4));
        assert!(outcome.won);
        assert_eq!(outcome.payout, 1850);

        let outcome = Wager::Cube(CubeBet::Even).settle(1000, &Rolls::single(3));
        assert!(!outcome.won);
        assert_eq!(outcome.payout, 0);
    }

    #[test]
    fn test_cube_sectors() {
        let sector = Wager::Cube(CubeBet::Sector(2));
        assert_eq!(sector.settle(100, &Rolls::single(3)).payout, 250);
        assert_eq!(sector.settle(100, &Rolls::single(4)).payout, 250);
        assert_eq!(sector.settle(100, &Rolls::single(5)).payout, 0);
    }

    #[test]
    fn test_plinko_face_one_loses() {
        let plinko = Wager::Cube(CubeBet::Plinko);
        assert!(!plinko.settle(100, &Rolls::single(1)).won);
        assert_eq!(plinko.settle(100, &Rolls::single(2)).payout, 30);
        assert_eq!(plinko.settle(100, &Rolls::single(6)).payout, 195);
    }

    #[test]
    fn test_two_dice_tie_refunds_seventy_percent() {
        let first = Wager::TwoDice(TwoDiceBet::FirstWins);
        assert_eq!(first.settle(1000, &Rolls::pair(5, 2)).payout, 1850);
        assert_eq!(first.settle(1000, &Rolls::pair(4, 4)).payout, 700);
        assert_eq!(first.settle(1000, &Rolls::pair(1, 2)).payout, 0);
        assert_eq!(first.settle(1000, &Rolls::single(6)).payout, 0);
    }

    #[test]
    fn test_product18() {
        let bet = Wager::TwoDice(TwoDiceBet::Product18);
        assert_eq!(bet.settle(100, &Rolls::pair(3, 6)).payout, 300);
        assert_eq!(bet.settle(100, &Rolls::pair(4, 4)).payout, 0);
    }

    #[test]
    fn test_rock_paper_scissors() {
        let rock = Wager::RockPaperScissors(Hand::Rock);
        assert_eq!(rock.settle(100, &Rolls::single(2)).payout, 250);
        assert_eq!(rock.settle(100, &Rolls::single(1)).payout, 70);
        assert_eq!(rock.settle(100, &Rolls::single(3)).payout, 0);
    }

    #[test]
    fn test_basketball_and_football() {
        assert_eq!(
            Wager::Basketball(BasketballBet::CleanGoal).settle(100, &Rolls::single(5)).payout,
            350
        );
        assert_eq!(
            Wager::Basketball(BasketballBet::Miss).settle(100, &Rolls::single(3)).payout,
            140
        );
        assert_eq!(
            Wager::Football(FootballBet::Miss).settle(100, &Rolls::single(2)).payout,
            185
        );
        assert_eq!(
            Wager::Football(FootballBet::Goal).settle(100, &Rolls::single(2)).payout,
            0
        );
    }

    #[test]
    fn test_slots() {
        assert_eq!(Wager::Slots.settle(100, &Rolls::single(64)).payout, 1000);
        assert_eq!(Wager::Slots.settle(100, &Rolls::single(22)).payout, 500);
        assert_eq!(Wager::Slots.settle(100, &Rolls::single(23)).payout, 0);
    }

    #[test]
    fn test_bowling() {
        assert_eq!(
            Wager::Bowling(BowlingBet::Ladder).settle(100, &Rolls::single(4)).payout,
            130
        );
        assert_eq!(
            Wager::Bowling(BowlingBet::Strike).settle(100, &Rolls::single(6)).payout,
            400
        );
        assert_eq!(
            Wager::Bowling(BowlingBet::DuelLose).settle(100, &Rolls::pair(2, 5)).payout,
            185
        );
        assert_eq!(
            Wager::Bowling(BowlingBet::DuelWin).settle(100, &Rolls::pair(3, 3)).payout,
            70
        );
    }

    #[test]
    fn test_custom_coefficient() {
        let bet = Wager::Custom { coefficient: 20 };
        assert_eq!(bet.settle(100, &Rolls::single(20)).payout, 2000);
        assert_eq!(bet.settle(100, &Rolls::single(19)).payout, 0);
    }

    #[test]
    fn test_payout_truncates_to_cent() {
        assert_eq!(payout_for(33, dec!(1.85)), 61);
        assert_eq!(payout_for(0, dec!(4)), 0);
        assert_eq!(payout_for(100, Decimal::ZERO), 0);
    }

    fn any_wager() -> impl Strategy<Value = Wager> {
        prop_oneof![
            (1u8..=6).prop_map(|n| Wager::Cube(CubeBet::Exact(n))),
            (1u8..=3).prop_map(|n| Wager::Cube(CubeBet::Sector(n))),
            Just(Wager::Cube(CubeBet::Plinko)),
            Just(Wager::TwoDice(TwoDiceBet::Draw)),
            Just(Wager::TwoDice(TwoDiceBet::SecondWins)),
            Just(Wager::RockPaperScissors(Hand::Paper)),
            Just(Wager::Basketball(BasketballBet::Goal)),
            Just(Wager::Darts(DartsBet::Red)),
            Just(Wager::Slots),
            Just(Wager::Bowling(BowlingBet::DuelWin)),
            Just(Wager::Bowling(BowlingBet::Ladder)),
            Just(Wager::Football(FootballBet::Goal)),
            (0usize..CUSTOM_COEFFICIENTS.len())
                .prop_map(|i| Wager::Custom { coefficient: CUSTOM_COEFFICIENTS[i].0 }),
        ]
    }

    proptest! {
        #[test]
        fn prop_payout_bounded_by_best_multiplier(
            wager in any_wager(),
            stake in 30i64..=100_000,
            a in any::<u8>(),
            b in any::<u8>(),
        ) {
            let RollPlan { rolls, faces } = wager.roll_plan();
            let first = a % faces + 1;
            let drawn = if rolls == 2 { Rolls::pair(first, b % faces + 1) } else { Rolls::single(first) };
            let outcome = wager.settle(stake, &drawn);

            prop_assert!(outcome.payout >= 0);
            prop_assert!(outcome.payout <= stake * 100);
            prop_assert_eq!(outcome.won, outcome.multiplier > Decimal::ZERO);
            if !outcome.won {
                prop_assert_eq!(outcome.payout, 0);
            }
        }
    }
}
