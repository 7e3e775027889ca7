//! Regulatory advisory registry: maps detected typologies to the advisories
//! that give them formal regulatory grounding, per jurisdiction.
//!
//! Selection order: the requested jurisdiction first, falling back to `IN`
//! when nothing matched there, with `Global` advisories always included.
//! Matches sort by risk weight and the top three feed the generation prompt
//! as evidence lines.

use serde::{Deserialize, Serialize};

use crate::pattern_detector::Typology;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryAdvisory {
    pub advisory_id: String,
    pub title: String,
    pub issuer: String,
    pub typology: String,
    pub jurisdiction: String,
    pub description: String,
    /// 0.0-2.5, used to rank evidence relevance.
    pub risk_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypologyContext {
    pub advisories: Vec<RegulatoryAdvisory>,
    pub evidence_text: String,
    pub insight_text: String,
    pub confidence: f64,
}

pub struct AdvisoryRegistry {
    advisories: Vec<RegulatoryAdvisory>,
}

impl AdvisoryRegistry {
    /// Built-in registry covering the core typologies.
    pub fn builtin() -> Self {
        let mut advisories = Vec::new();
        let mut add = |id: &str, title: &str, issuer: &str, typology: &str, jurisdiction: &str, description: &str, weight: f64| {
            advisories.push(RegulatoryAdvisory {
                advisory_id: id.to_string(),
                title: title.to_string(),
                issuer: issuer.to_string(),
                typology: typology.to_string(),
                jurisdiction: jurisdiction.to_string(),
                description: description.to_string(),
                risk_weight: weight,
            });
        };

        add(
            "ADV-LAY-001",
            "Placement to Layering Transition",
            "FATF",
            "layering",
            "Global",
            "Detecting movement into complex layers per FATF standards.",
            1.5,
        );
        add(
            "ADV-LAY-002",
            "Shell Company Layering",
            "FIU-IND",
            "layering",
            "IN",
            "Multiple rapid circular transfers between shell companies per FIU-IND 2023 Note.",
            1.8,
        );
        add(
            "ADV-LAY-003",
            "Inter-Account Transfers",
            "FinCEN",
            "layering",
            "US",
            "Rapid fund movement between multiple accounts per FinCEN Advisory FIN-2023-A001.",
            1.3,
        );
        add(
            "ADV-LAY-004",
            "UK Layering via Intermediaries",
            "NCA",
            "layering",
            "UK",
            "Rapid multi-hop fund movements through intermediary accounts per JMLSG Guidance.",
            1.7,
        );
        add(
            "ADV-STR-001",
            "Sub-Threshold Cash Deposits",
            "FIU-IND",
            "structuring",
            "IN",
            "Intentional breaking of cash transactions per PMLA Section 3.",
            2.0,
        );
        add(
            "ADV-STR-002",
            "Currency Transaction Structuring",
            "FinCEN",
            "structuring",
            "US",
            "Pattern designed to evade CTR filing requirements under 31 CFR 1010.314.",
            1.9,
        );
        add(
            "ADV-SMU-001",
            "Cuckoo Smurfing",
            "NCA",
            "smurfing",
            "UK",
            "Third-party deposits into unwitting accounts per NCA-2023-SAR-012.",
            2.2,
        );
        add(
            "ADV-SMU-002",
            "Multi-Source Fan-In",
            "FIU-IND",
            "smurfing",
            "IN",
            "Many small credits from distinct remitters aggregating in one account.",
            1.6,
        );
        add(
            "ADV-INT-001",
            "Real Estate Integration",
            "AMLA",
            "integration",
            "EU",
            "Re-entry of layered funds through asset purchases per 6AMLD.",
            1.4,
        );
        add(
            "ADV-RT-001",
            "Circular Fund Flows",
            "FIU-IND",
            "round_tripping",
            "IN",
            "Funds returning to origin through intermediary accounts.",
            1.8,
        );
        add(
            "ADV-FUN-001",
            "Funnel Account Consolidation",
            "FIU-IND",
            "funnel_account",
            "IN",
            "Single account concentrating inflows from a wide counterparty set.",
            1.7,
        );

        AdvisoryRegistry { advisories }
    }

    /// Advisories and rendered evidence for the given typologies.
    pub fn typology_context(&self, typologies: &[Typology], jurisdiction: &str) -> TypologyContext {
        let names: Vec<&str> = typologies.iter().map(|t| t.as_str()).collect();
        let for_typology =
            |adv: &RegulatoryAdvisory| names.contains(&adv.typology.as_str());

        let mut matched: Vec<&RegulatoryAdvisory> = self
            .advisories
            .iter()
            .filter(|adv| for_typology(adv) && adv.jurisdiction == jurisdiction)
            .collect();

        if matched.is_empty() && jurisdiction != "IN" {
            matched = self
                .advisories
                .iter()
                .filter(|adv| for_typology(adv) && adv.jurisdiction == "IN")
                .collect();
        }

        for adv in self
            .advisories
            .iter()
            .filter(|adv| for_typology(adv) && adv.jurisdiction == "Global")
        {
            if !matched.iter().any(|m| m.advisory_id == adv.advisory_id) {
                matched.push(adv);
            }
        }

        matched.sort_by(|a, b| {
            b.risk_weight
                .partial_cmp(&a.risk_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if matched.is_empty() {
            return TypologyContext {
                advisories: Vec::new(),
                evidence_text: "No specific regulatory advisories matched for these typologies."
                    .to_string(),
                insight_text: "No graph-mapped typology evidence beyond the detection flags."
                    .to_string(),
                confidence: 0.3,
            };
        }

        let top: Vec<RegulatoryAdvisory> = matched.iter().take(3).map(|a| (*a).clone()).collect();
        let evidence_text = top
            .iter()
            .map(|a| format!("- [{}] {}: {}", a.advisory_id, a.typology, a.description))
            .collect::<Vec<_>>()
            .join("\n");

        let confidence = (0.6 + matched.len() as f64 * 0.1).min(0.95);

        TypologyContext {
            advisories: top,
            evidence_text,
            insight_text: format!("Found {} regulatory pattern matches.", matched.len()),
            confidence: (confidence * 100.0).round() / 100.0,
        }
    }
}
