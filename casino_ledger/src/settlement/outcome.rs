//! Where game results come from, and who hears about them.

use super::models::{QueueEntry, SettledBet};
use crate::game::{CUSTOM_COEFFICIENTS, Rolls, Wager};
use crate::notify::{Notifier, Recipient, notify_quietly};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Produces the raw values a queued wager is settled against.
#[async_trait]
pub trait OutcomeSource: Send + Sync {
    async fn roll(&self, entry: &QueueEntry, wager: &Wager) -> Rolls;
}

/// Hook run after a bet settles. Failures are logged by the worker.
#[async_trait]
pub trait BetObserver: Send + Sync {
    async fn bet_settled(&self, bet: &SettledBet) -> anyhow::Result<()>;
}

/// Uniform draws over each game's faces, announced to the results channel
/// with a pause before each roll.
pub struct RandomOutcomeSource {
    notifier: Arc<dyn Notifier>,
    pacing: Duration,
}

impl RandomOutcomeSource {
    pub fn new(notifier: Arc<dyn Notifier>, pacing: Duration) -> Self {
        Self { notifier, pacing }
    }
}

/// Draw values for a wager.
///
/// Coefficient games hit their coefficient with the configured chance and
/// otherwise land on a lower face.
pub fn draw(wager: &Wager) -> Rolls {
    let mut rng = rand::rng();

    if let Wager::Custom { coefficient } = *wager {
        let chance = CUSTOM_COEFFICIENTS
            .iter()
            .find(|(coef, _)| *coef == coefficient)
            .map_or(0.0, |(_, chance)| *chance);
        let value = if coefficient <= 1 || rng.random_bool(chance) {
            coefficient
        } else {
            rng.random_range(1..coefficient)
        };
        return Rolls::single(value);
    }

    let plan = wager.roll_plan();
    let first = rng.random_range(1..=plan.faces);
    if plan.rolls >= 2 {
        Rolls::pair(first, rng.random_range(1..=plan.faces))
    } else {
        Rolls::single(first)
    }
}

#[async_trait]
impl OutcomeSource for RandomOutcomeSource {
    async fn roll(&self, entry: &QueueEntry, wager: &Wager) -> Rolls {
        let rolls = draw(wager);

        notify_quietly(
            self.notifier.as_ref(),
            Recipient::Channel,
            &format!("Bet #{} ({}): rolling {}", entry.id, wager, rolls.first),
        )
        .await;
        tokio::time::sleep(self.pacing).await;

        if let Some(second) = rolls.second {
            notify_quietly(
                self.notifier.as_ref(),
                Recipient::Channel,
                &format!("Bet #{}: second roll {}", entry.id, second),
            )
            .await;
            tokio::time::sleep(self.pacing).await;
        }

        rolls
    }
}
