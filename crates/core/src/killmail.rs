use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type KillmailId = i64;

/// Normalized, read-only projection of one killmail.
///
/// Produced by the ingestion side and never mutated while profiles are
/// evaluated against it. Every attribute except the id is optional: a
/// criteria leaf that references an absent attribute simply does not match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KillmailFact {
    pub killmail_id: KillmailId,
    #[serde(alias = "killmail_time")]
    pub timestamp: DateTime<Utc>,
    pub total_value: Option<f64>,
    pub solar_system_id: Option<i64>,

    pub victim_character_id: Option<i64>,
    pub victim_corporation_id: Option<i64>,
    pub victim_alliance_id: Option<i64>,
    pub victim_ship_type_id: Option<i64>,

    pub attacker_character_ids: Vec<i64>,
    pub attacker_corporation_ids: Vec<i64>,
    pub attacker_alliance_ids: Vec<i64>,
    /// Ship types of the victim and every attacker.
    pub ship_type_ids: Vec<i64>,
    pub attacker_count: Option<u32>,

    pub is_npc: Option<bool>,
    pub is_solo: Option<bool>,
}

impl KillmailFact {
    /// zKillboard link for this killmail, used in notification bodies.
    pub fn zkb_url(&self) -> String {
        format!("https://zkillboard.com/kill/{}/", self.killmail_id)
    }
}
