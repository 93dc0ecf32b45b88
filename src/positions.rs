use crate::models::{PositionPick, RoundId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::debug;

/// Which side of the dice-sum range a prediction commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Big sums (Tài)
    A,
    /// Small sums (Xỉu)
    B,
}

/// Labels the engine uses for the two concrete outcomes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeLabels {
    pub a: String,
    pub b: String,
}

impl Default for OutcomeLabels {
    fn default() -> Self {
        Self {
            a: "Tài".to_string(),
            b: "Xỉu".to_string(),
        }
    }
}

impl OutcomeLabels {
    /// `None` for the no-signal sentinel or any unknown label
    pub fn side(&self, label: &str) -> Option<Side> {
        let label = label.trim();
        if label == self.a {
            Some(Side::A)
        } else if label == self.b {
            Some(Side::B)
        } else {
            None
        }
    }
}

/// Dice-sum domains and sampling limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    pub a_min: u8,
    pub a_max: u8,
    pub b_min: u8,
    pub b_max: u8,
    /// Number of positions recommended
    pub picks: usize,
    /// Redraws allowed when a draw repeats the previous pick
    pub max_redraws: u32,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            a_min: 11,
            a_max: 18,
            b_min: 4,
            b_max: 10,
            picks: 4,
            max_redraws: 16,
        }
    }
}

impl PositionConfig {
    pub fn domain(&self, side: Side) -> RangeInclusive<u8> {
        match side {
            Side::A => self.a_min..=self.a_max,
            Side::B => self.b_min..=self.b_max,
        }
    }
}

/// Round-gated, anti-repeat position recommendation
///
/// The pick only moves when a new round id arrives together with a concrete
/// prediction; the no-signal sentinel holds the previous pick.
pub struct PositionSelector<R = StdRng> {
    config: PositionConfig,
    labels: OutcomeLabels,
    pick: Option<PositionPick>,
    last_round: Option<RoundId>,
    rng: R,
}

impl PositionSelector<StdRng> {
    pub fn new(config: PositionConfig, labels: OutcomeLabels) -> Self {
        Self::with_rng(config, labels, StdRng::from_entropy())
    }
}

impl<R: Rng> PositionSelector<R> {
    pub fn with_rng(config: PositionConfig, labels: OutcomeLabels, rng: R) -> Self {
        Self {
            config,
            labels,
            pick: None,
            last_round: None,
            rng,
        }
    }

    pub fn current(&self) -> Option<&PositionPick> {
        self.pick.as_ref()
    }

    fn current_values(&self) -> Vec<u8> {
        self.pick.as_ref().map(|p| p.values.clone()).unwrap_or_default()
    }

    /// Positions for `predicted_label` in round `round_id`
    pub fn select(&mut self, predicted_label: &str, round_id: Option<&RoundId>) -> Vec<u8> {
        let Some(round_id) = round_id else {
            return self.current_values();
        };
        if self.last_round.as_ref() == Some(round_id) {
            return self.current_values();
        }
        self.last_round = Some(round_id.clone());

        let Some(side) = self.labels.side(predicted_label) else {
            debug!("Round {}: no concrete prediction, holding positions", round_id);
            return self.current_values();
        };

        let previous = self.pick.as_ref().map(|p| p.values.clone());
        let values = self.draw(side, previous.as_deref());
        debug!("Round {}: {} -> positions {:?}", round_id, predicted_label, values);

        self.pick = Some(PositionPick {
            values: values.clone(),
            label: predicted_label.trim().to_string(),
            round_id: Some(round_id.clone()),
        });
        values
    }

    /// Uniform k-subset of the side's domain, redrawn while it equals
    /// `previous`, up to `max_redraws` times
    fn draw(&mut self, side: Side, previous: Option<&[u8]>) -> Vec<u8> {
        let domain: Vec<u8> = self.config.domain(side).collect();
        let k = self.config.picks.min(domain.len());

        let mut attempt = 0;
        loop {
            let mut values: Vec<u8> = rand::seq::index::sample(&mut self.rng, domain.len(), k)
                .into_iter()
                .map(|i| domain[i])
                .collect();
            values.sort_unstable();

            if previous != Some(values.as_slice()) || attempt >= self.config.max_redraws {
                return values;
            }
            attempt += 1;
        }
    }
}
