//! Suspicious-activity pattern detection.
//!
//! Four independent analyses over one case's transaction set — velocity,
//! volume, structuring, network topology — feed a deterministic typology
//! rule table and a weighted risk score in [0, 10]. Everything here is a pure
//! function of the case context plus [`DetectionConfig`]; no hidden state,
//! no I/O. All thresholds and weights are configuration, not literals.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::info;

use crate::case::{CaseContext, Customer, Transaction};
use crate::txn_graph::TransactionGraph;

/// Thresholds for the detection algorithms. Defaults reflect Indian CTR
/// practice (₹50K reporting threshold); calibration is a regulatory decision,
/// which is why none of these live in code as literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Reporting threshold that structuring keeps under (₹).
    pub structuring_threshold: f64,
    /// Lower edge of the near-threshold band as a ratio of the threshold.
    pub near_threshold_ratio: f64,
    /// Fraction of near-threshold transactions above which structuring flags.
    pub structuring_likelihood_cutoff: f64,
    /// Per-node distinct-source count above which smurfing flags.
    pub fan_in_threshold: usize,
    /// Per-node distinct-destination count above which fan-out flags.
    pub fan_out_threshold: usize,
    /// Fan-in / fan-out floor for the round-tripping node test.
    pub round_trip_fan_in: usize,
    pub round_trip_fan_out: usize,
    /// Degree-centrality cutoff for funnel-account detection.
    pub hub_centrality_cutoff: f64,
    /// Span bands for velocity risk classification (days).
    pub velocity_high_span_days: i64,
    pub velocity_medium_span_days: i64,
    /// Layering: span under the high band plus more than this many sources.
    pub layering_min_sources: usize,
    /// Integration: more than this total (₹) within the day window.
    pub integration_total: f64,
    pub integration_max_span_days: i64,
    /// Volume flag: absolute total ceiling (₹) and stated-income multiple.
    pub volume_high_total: f64,
    pub income_multiple: f64,
    pub weights: RiskWeights,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            structuring_threshold: 50_000.0,
            near_threshold_ratio: 0.90,
            structuring_likelihood_cutoff: 0.30,
            fan_in_threshold: 15,
            fan_out_threshold: 15,
            round_trip_fan_in: 3,
            round_trip_fan_out: 3,
            hub_centrality_cutoff: 0.5,
            velocity_high_span_days: 7,
            velocity_medium_span_days: 30,
            layering_min_sources: 5,
            integration_total: 5_000_000.0,
            integration_max_span_days: 14,
            volume_high_total: 10_000_000.0,
            income_multiple: 3.0,
            weights: RiskWeights::default(),
        }
    }
}

/// Sub-score weights and band edges for the aggregate risk score.
/// Velocity contributes 0-30, volume 0-25, structuring 0-25, network 0-20;
/// the sum is divided by `scale_divisor` and capped at `cap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskWeights {
    pub velocity_high: f64,
    pub velocity_medium: f64,
    pub velocity_rate: f64,
    pub rate_cutoff: f64,
    pub volume_high: f64,
    pub volume_medium: f64,
    pub volume_low: f64,
    pub volume_high_edge: f64,
    pub volume_medium_edge: f64,
    pub volume_low_edge: f64,
    pub structuring_max: f64,
    pub network_fan: f64,
    pub network_hub: f64,
    pub scale_divisor: f64,
    pub cap: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        RiskWeights {
            velocity_high: 30.0,
            velocity_medium: 15.0,
            velocity_rate: 10.0,
            rate_cutoff: 5.0,
            volume_high: 25.0,
            volume_medium: 18.0,
            volume_low: 10.0,
            volume_high_edge: 10_000_000.0,
            volume_medium_edge: 5_000_000.0,
            volume_low_edge: 1_000_000.0,
            structuring_max: 25.0,
            network_fan: 15.0,
            network_hub: 5.0,
            scale_divisor: 10.0,
            cap: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VelocityRisk {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityReport {
    pub span_days: i64,
    pub per_day: f64,
    pub risk: VelocityRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeReport {
    pub total: f64,
    pub mean: f64,
    pub max: f64,
    pub count: usize,
    pub flagged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuringReport {
    pub near_threshold_count: usize,
    pub likelihood: f64,
    pub suspicious: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkReport {
    pub unique_sources: usize,
    pub unique_destinations: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub max_fan_in: usize,
    pub max_fan_out: usize,
    pub max_centrality: f64,
    pub fan_in_high: bool,
    pub fan_out_high: bool,
    pub round_trip: bool,
    pub funnel: bool,
    pub cycle_detected: bool,
}

/// Named money-laundering pattern categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Typology {
    Layering,
    Structuring,
    Smurfing,
    Integration,
    RoundTripping,
    FunnelAccount,
    GeneralSuspicious,
}

impl Typology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Typology::Layering => "layering",
            Typology::Structuring => "structuring",
            Typology::Smurfing => "smurfing",
            Typology::Integration => "integration",
            Typology::RoundTripping => "round_tripping",
            Typology::FunnelAccount => "funnel_account",
            Typology::GeneralSuspicious => "general_suspicious",
        }
    }
}

impl fmt::Display for Typology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure-function output of pattern detection over one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternResult {
    pub velocity: VelocityReport,
    pub volume: VolumeReport,
    pub structuring: StructuringReport,
    pub network: NetworkReport,
    pub typologies: Vec<Typology>,
    pub risk_score: f64,
}

pub struct PatternDetector {
    config: DetectionConfig,
}

impl PatternDetector {
    pub fn new(config: DetectionConfig) -> Self {
        PatternDetector { config }
    }

    /// Run all four analyses, match typologies, and score the case.
    pub fn detect(&self, ctx: &CaseContext) -> PatternResult {
        let transactions = &ctx.transactions;

        if transactions.is_empty() {
            return PatternResult {
                velocity: VelocityReport {
                    span_days: 0,
                    per_day: 0.0,
                    risk: VelocityRisk::Low,
                },
                volume: VolumeReport {
                    total: 0.0,
                    mean: 0.0,
                    max: 0.0,
                    count: 0,
                    flagged: false,
                },
                structuring: StructuringReport {
                    near_threshold_count: 0,
                    likelihood: 0.0,
                    suspicious: false,
                },
                network: NetworkReport {
                    unique_sources: 0,
                    unique_destinations: 0,
                    node_count: 0,
                    edge_count: 0,
                    max_fan_in: 0,
                    max_fan_out: 0,
                    max_centrality: 0.0,
                    fan_in_high: false,
                    fan_out_high: false,
                    round_trip: false,
                    funnel: false,
                    cycle_detected: false,
                },
                typologies: Vec::new(),
                risk_score: 0.0,
            };
        }

        let velocity = self.analyze_velocity(transactions);
        let volume = self.analyze_volume(transactions, &ctx.customer);
        let structuring = self.detect_structuring(transactions);
        let network = self.analyze_network(transactions);

        let typologies = self.match_typologies(&velocity, &volume, &structuring, &network);
        let risk_score = self.risk_score(&velocity, &volume, &structuring, &network);

        info!(
            case_id = %ctx.case_id,
            risk_score,
            typology_count = typologies.len(),
            "pattern analysis complete"
        );

        PatternResult {
            velocity,
            volume,
            structuring,
            network,
            typologies,
            risk_score,
        }
    }

    /// Time-based analysis of how quickly funds moved. The span is floored at
    /// one day so a single transaction, or a same-day burst, never divides by
    /// zero.
    pub fn analyze_velocity(&self, transactions: &[Transaction]) -> VelocityReport {
        let (min_ts, max_ts) = match transactions
            .iter()
            .map(|t| t.timestamp)
            .fold(None, |acc: Option<(_, _)>, ts| match acc {
                None => Some((ts, ts)),
                Some((lo, hi)) => Some((lo.min(ts), hi.max(ts))),
            }) {
            Some(bounds) => bounds,
            None => {
                return VelocityReport {
                    span_days: 0,
                    per_day: 0.0,
                    risk: VelocityRisk::Low,
                }
            }
        };

        let span_days = (max_ts - min_ts).num_days().max(1);
        let per_day = round2(transactions.len() as f64 / span_days as f64);

        let risk = if span_days < self.config.velocity_high_span_days {
            VelocityRisk::High
        } else if span_days < self.config.velocity_medium_span_days {
            VelocityRisk::Medium
        } else {
            VelocityRisk::Low
        };

        VelocityReport {
            span_days,
            per_day,
            risk,
        }
    }

    /// Aggregate amount statistics; flags when the total breaches the absolute
    /// ceiling or the mean is out of proportion to the stated income.
    pub fn analyze_volume(&self, transactions: &[Transaction], customer: &Customer) -> VolumeReport {
        let count = transactions.len();
        if count == 0 {
            return VolumeReport {
                total: 0.0,
                mean: 0.0,
                max: 0.0,
                count: 0,
                flagged: false,
            };
        }

        let total: f64 = transactions.iter().map(|t| t.amount).sum();
        let mean = total / count as f64;
        let max = transactions.iter().map(|t| t.amount).fold(0.0, f64::max);

        let income_breach = match customer.stated_income {
            Some(income) if income > 0.0 => mean > self.config.income_multiple * income,
            _ => false,
        };
        let flagged = total > self.config.volume_high_total || income_breach;

        VolumeReport {
            total: round2(total),
            mean: round2(mean),
            max: round2(max),
            count,
            flagged,
        }
    }

    /// Amounts deliberately kept in the band just below the reporting
    /// threshold. Flags when the near-threshold fraction strictly exceeds the
    /// configured cutoff.
    pub fn detect_structuring(&self, transactions: &[Transaction]) -> StructuringReport {
        if transactions.is_empty() {
            return StructuringReport {
                near_threshold_count: 0,
                likelihood: 0.0,
                suspicious: false,
            };
        }

        let threshold = self.config.structuring_threshold;
        let band_floor = threshold * self.config.near_threshold_ratio;

        let near_threshold_count = transactions
            .iter()
            .filter(|t| t.amount >= band_floor && t.amount < threshold)
            .count();

        let likelihood = near_threshold_count as f64 / transactions.len() as f64;
        let suspicious = likelihood > self.config.structuring_likelihood_cutoff;

        StructuringReport {
            near_threshold_count,
            likelihood: round3(likelihood),
            suspicious,
        }
    }

    /// Graph topology of the money flow: per-node counterparty fan-in and
    /// fan-out, hub centrality, and cycle presence.
    pub fn analyze_network(&self, transactions: &[Transaction]) -> NetworkReport {
        let graph = TransactionGraph::build(transactions);

        let unique_sources: HashSet<&str> = transactions
            .iter()
            .map(|t| t.source_account.as_str())
            .collect();
        let unique_destinations: HashSet<&str> = transactions
            .iter()
            .map(|t| t.destination_account.as_str())
            .collect();

        let fan_in = graph.fan_in();
        let fan_out = graph.fan_out();
        let max_fan_in = fan_in.values().copied().max().unwrap_or(0);
        let max_fan_out = fan_out.values().copied().max().unwrap_or(0);
        let max_centrality = graph.max_centrality();
        let cycle_detected = graph.has_cycle();

        let round_trip_node = fan_in.iter().any(|(account, &inbound)| {
            inbound >= self.config.round_trip_fan_in
                && fan_out.get(account).copied().unwrap_or(0) >= self.config.round_trip_fan_out
        });

        NetworkReport {
            unique_sources: unique_sources.len(),
            unique_destinations: unique_destinations.len(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            max_fan_in,
            max_fan_out,
            max_centrality: round3(max_centrality),
            fan_in_high: max_fan_in > self.config.fan_in_threshold,
            fan_out_high: max_fan_out > self.config.fan_out_threshold,
            round_trip: round_trip_node || cycle_detected,
            funnel: max_centrality > self.config.hub_centrality_cutoff,
            cycle_detected,
        }
    }

    /// Deterministic rule table mapping detection flags to typologies.
    /// Several may co-occur; a non-empty transaction set that matches no rule
    /// is reported as generally suspicious.
    pub fn match_typologies(
        &self,
        velocity: &VelocityReport,
        volume: &VolumeReport,
        structuring: &StructuringReport,
        network: &NetworkReport,
    ) -> Vec<Typology> {
        let mut typologies = Vec::new();

        if velocity.span_days < self.config.velocity_high_span_days
            && network.unique_sources > self.config.layering_min_sources
        {
            typologies.push(Typology::Layering);
        }

        if structuring.suspicious {
            typologies.push(Typology::Structuring);
        }

        if network.fan_in_high {
            typologies.push(Typology::Smurfing);
        }

        if volume.total > self.config.integration_total
            && velocity.span_days < self.config.integration_max_span_days
        {
            typologies.push(Typology::Integration);
        }

        if network.round_trip {
            typologies.push(Typology::RoundTripping);
        }

        if network.funnel {
            typologies.push(Typology::FunnelAccount);
        }

        if typologies.is_empty() {
            typologies.push(Typology::GeneralSuspicious);
        }

        typologies
    }

    /// Weighted sum of the four sub-scores, scaled into [0, cap] and rounded
    /// to one decimal.
    pub fn risk_score(
        &self,
        velocity: &VelocityReport,
        volume: &VolumeReport,
        structuring: &StructuringReport,
        network: &NetworkReport,
    ) -> f64 {
        let w = &self.config.weights;
        let mut score = 0.0;

        if velocity.span_days < self.config.velocity_high_span_days {
            score += w.velocity_high;
        } else if velocity.span_days < self.config.velocity_medium_span_days {
            score += w.velocity_medium;
        } else if velocity.per_day > w.rate_cutoff {
            score += w.velocity_rate;
        }

        if volume.total > w.volume_high_edge {
            score += w.volume_high;
        } else if volume.total > w.volume_medium_edge {
            score += w.volume_medium;
        } else if volume.total > w.volume_low_edge {
            score += w.volume_low;
        }

        score += structuring.likelihood * w.structuring_max;

        if network.fan_in_high || network.fan_out_high {
            score += w.network_fan;
        }
        if network.funnel {
            score += w.network_hub;
        }

        round1(score / w.scale_divisor).min(w.cap)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
