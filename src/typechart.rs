//! Pure elemental type chart (C1).
//!
//! `damage` is the only entry point: total, deterministic, no I/O. The
//! multiplier table covers the mandatory Fire > Grass > Water > Fire ring
//! plus a few extra types so the chart isn't a degenerate 3x3. Anything
//! not listed defaults to a neutral (1x) multiplier, including a type
//! against itself.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Fire,
    Water,
    Grass,
    Electric,
    Rock,
    Normal,
}

/// `(attacker, defender) -> multiplier`. Entries not present mean neutral (1x).
static ADVANTAGE: Lazy<HashMap<(CardType, CardType), f64>> = Lazy::new(|| {
    use CardType::*;
    let strong = [
        (Fire, Grass),
        (Grass, Water),
        (Water, Fire),
        (Electric, Water),
        (Rock, Fire),
    ];
    let mut table = HashMap::new();
    for (attacker, defender) in strong {
        table.insert((attacker, defender), 2.0);
        table.insert((defender, attacker), 0.5);
    }
    table
});

/// Damage dealt by an attack of base power `attack` from `attacker_type`
/// against `defender_type`. Floored, never negative.
pub fn damage(attack: i64, attacker_type: CardType, defender_type: CardType) -> i64 {
    let multiplier = ADVANTAGE
        .get(&(attacker_type, defender_type))
        .copied()
        .unwrap_or(1.0);
    let raw = (attack as f64 * multiplier).floor() as i64;
    raw.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_beats_grass() {
        assert_eq!(damage(50, CardType::Fire, CardType::Grass), 100);
    }

    #[test]
    fn grass_beats_water() {
        assert_eq!(damage(50, CardType::Grass, CardType::Water), 100);
    }

    #[test]
    fn water_beats_fire() {
        assert_eq!(damage(50, CardType::Water, CardType::Fire), 100);
    }

    #[test]
    fn weak_matchup_halves_and_floors() {
        assert_eq!(damage(51, CardType::Fire, CardType::Water), 25);
    }

    #[test]
    fn same_type_is_neutral() {
        for t in [
            CardType::Fire,
            CardType::Water,
            CardType::Grass,
            CardType::Electric,
            CardType::Rock,
            CardType::Normal,
        ] {
            assert_eq!(damage(37, t, t), 37);
        }
    }

    #[test]
    fn unrelated_types_are_neutral() {
        assert_eq!(damage(40, CardType::Normal, CardType::Rock), 40);
    }

    #[test]
    fn damage_never_negative() {
        assert_eq!(damage(0, CardType::Water, CardType::Fire), 0);
    }
}
