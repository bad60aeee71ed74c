//! Killmail attributes addressable from a criteria leaf.

use std::fmt;
use std::str::FromStr;

use killwatch_core::KillmailFact;

/// Closed set of killmail attributes a leaf may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TotalValue,
    SolarSystemId,
    AttackerCount,
    VictimCharacterId,
    VictimCorporationId,
    VictimAllianceId,
    VictimShipTypeId,
    AttackerCharacterIds,
    AttackerCorporationIds,
    AttackerAllianceIds,
    ShipTypeIds,
    IsNpc,
    IsSolo,
}

/// Shape of a field's value, used to type-check operators at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single number (ISK value, counts, single ids).
    Scalar,
    /// Zero or more ids; matches when any element does.
    IdList,
    Flag,
}

/// A field value extracted from one killmail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Ids(&'a [i64]),
    Flag(bool),
}

impl Field {
    pub fn kind(self) -> FieldKind {
        match self {
            Field::AttackerCharacterIds
            | Field::AttackerCorporationIds
            | Field::AttackerAllianceIds
            | Field::ShipTypeIds => FieldKind::IdList,
            Field::IsNpc | Field::IsSolo => FieldKind::Flag,
            _ => FieldKind::Scalar,
        }
    }

    /// Pull this field out of a fact. `None` means the fact does not carry it;
    /// an empty id list counts as absent.
    pub fn extract(self, fact: &KillmailFact) -> Option<FieldValue<'_>> {
        match self {
            Field::TotalValue => fact.total_value.filter(|v| v.is_finite()).map(FieldValue::Number),
            Field::SolarSystemId => id_value(fact.solar_system_id),
            Field::AttackerCount => fact.attacker_count.map(|c| FieldValue::Number(c as f64)),
            Field::VictimCharacterId => id_value(fact.victim_character_id),
            Field::VictimCorporationId => id_value(fact.victim_corporation_id),
            Field::VictimAllianceId => id_value(fact.victim_alliance_id),
            Field::VictimShipTypeId => id_value(fact.victim_ship_type_id),
            Field::AttackerCharacterIds => id_list(&fact.attacker_character_ids),
            Field::AttackerCorporationIds => id_list(&fact.attacker_corporation_ids),
            Field::AttackerAllianceIds => id_list(&fact.attacker_alliance_ids),
            Field::ShipTypeIds => id_list(&fact.ship_type_ids),
            Field::IsNpc => fact.is_npc.map(FieldValue::Flag),
            Field::IsSolo => fact.is_solo.map(FieldValue::Flag),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::TotalValue => "total_value",
            Field::SolarSystemId => "solar_system_id",
            Field::AttackerCount => "attacker_count",
            Field::VictimCharacterId => "victim_character_id",
            Field::VictimCorporationId => "victim_corporation_id",
            Field::VictimAllianceId => "victim_alliance_id",
            Field::VictimShipTypeId => "victim_ship_type_id",
            Field::AttackerCharacterIds => "attacker_character_ids",
            Field::AttackerCorporationIds => "attacker_corporation_ids",
            Field::AttackerAllianceIds => "attacker_alliance_ids",
            Field::ShipTypeIds => "ship_type_ids",
            Field::IsNpc => "is_npc",
            Field::IsSolo => "is_solo",
        }
    }
}

fn id_value(id: Option<i64>) -> Option<FieldValue<'static>> {
    id.map(|x| FieldValue::Number(x as f64))
}

fn id_list(ids: &[i64]) -> Option<FieldValue<'_>> {
    if ids.is_empty() {
        None
    } else {
        Some(FieldValue::Ids(ids))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "total_value" | "value" => Ok(Field::TotalValue),
            "solar_system_id" | "system_id" => Ok(Field::SolarSystemId),
            "attacker_count" => Ok(Field::AttackerCount),
            "victim_character_id" => Ok(Field::VictimCharacterId),
            "victim_corporation_id" => Ok(Field::VictimCorporationId),
            "victim_alliance_id" => Ok(Field::VictimAllianceId),
            "victim_ship_type_id" => Ok(Field::VictimShipTypeId),
            "attacker_character_id" | "attacker_character_ids" => Ok(Field::AttackerCharacterIds),
            "attacker_corporation_id" | "attacker_corporation_ids" => {
                Ok(Field::AttackerCorporationIds)
            }
            "attacker_alliance_id" | "attacker_alliance_ids" => Ok(Field::AttackerAllianceIds),
            "ship_type_id" | "ship_type_ids" => Ok(Field::ShipTypeIds),
            "is_npc" | "npc" => Ok(Field::IsNpc),
            "is_solo" | "solo" => Ok(Field::IsSolo),
            other => Err(format!("unknown field '{}'", other)),
        }
    }
}
