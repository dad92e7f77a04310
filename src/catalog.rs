//! Role catalog and table setups
//!
//! This module holds the static data of the game: the closed set of roles
//! with their teams and descriptions, and for every supported table size
//! the role multiset that gets dealt, the team sizes of the five ordinary
//! quests and the team size of the final quest.

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::constants::{quests::QUEST_COUNT, seats};

/// The two sides of the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Team {
    /// Arthur's loyal knights
    Good,
    /// Mordred's forces
    Evil,
}

impl Team {
    /// Human readable name of the team
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Good => "Forces of Good",
            Self::Evil => "Forces of Evil",
        }
    }
}

/// Every role that can be dealt to a seat
///
/// Role-specific behaviour (visibility, magic immunity, amulet disguise)
/// is always decided by an exhaustive match on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Enum, Serialize, Deserialize)]
pub enum Role {
    /// Plain good role without abilities
    LoyalServant,
    /// Good role with final quest flavour
    Duke,
    /// Good role with final quest flavour
    GrandDuke,
    /// Evil role unaffected by magic tokens
    Morgan,
    /// Evil role that does not know its own team
    Prince,
    /// Evil role hidden from evil and blind to evil
    Shapeshifter,
    /// Evil role that knows Morgan and the Prince
    MordredMinion,
}

impl Role {
    /// Display name of the role
    pub const fn name(self) -> &'static str {
        match self {
            Self::LoyalServant => "Loyal Servant of Arthur",
            Self::Duke => "Duke",
            Self::GrandDuke => "Grand Duke",
            Self::Morgan => "Morgan le Fay",
            Self::Prince => "Prince",
            Self::Shapeshifter => "Shapeshifter",
            Self::MordredMinion => "Minion of Mordred",
        }
    }

    /// The team the role plays for
    pub const fn team(self) -> Team {
        match self {
            Self::LoyalServant | Self::Duke | Self::GrandDuke => Team::Good,
            Self::Morgan | Self::Prince | Self::Shapeshifter | Self::MordredMinion => Team::Evil,
        }
    }

    /// Rules text shown to the holder of the role
    pub const fn description(self) -> &'static str {
        match self {
            Self::LoyalServant => "A righteous knight sworn to King Arthur.",
            Self::Duke => "During the final quest may make one player lower a hand.",
            Self::GrandDuke => {
                "During the final quest, once evil is revealed, may redirect one player's hand."
            }
            Self::Morgan => "Unaffected by magic tokens and may always fail a quest.",
            Self::Prince => "Does not know who is evil, but evil knows the Prince.",
            Self::Shapeshifter => {
                "Evil does not know the Shapeshifter and the Shapeshifter does not know evil."
            }
            Self::MordredMinion => "Knows Morgan and the Prince, but not the Shapeshifter.",
        }
    }

    /// Whether a spent magic token leaves this role's quest vote untouched
    pub const fn ignores_magic(self) -> bool {
        match self {
            Self::Morgan => true,
            Self::LoyalServant
            | Self::Duke
            | Self::GrandDuke
            | Self::Prince
            | Self::Shapeshifter
            | Self::MordredMinion => false,
        }
    }

    /// The team an amulet check reports for this role
    pub const fn amulet_team(self) -> Team {
        match self {
            Self::Shapeshifter => Team::Good,
            Self::LoyalServant
            | Self::Duke
            | Self::GrandDuke
            | Self::Morgan
            | Self::Prince
            | Self::MordredMinion => self.team(),
        }
    }
}

use Role::{Duke, GrandDuke, LoyalServant, MordredMinion, Morgan, Prince, Shapeshifter};

const FOUR: &[Role] = &[LoyalServant, LoyalServant, Morgan, Prince];
const FIVE: &[Role] = &[LoyalServant, LoyalServant, LoyalServant, Morgan, Prince];
const SIX: &[Role] = &[
    LoyalServant,
    LoyalServant,
    LoyalServant,
    Morgan,
    Shapeshifter,
    MordredMinion,
];
const SEVEN: &[Role] = &[
    LoyalServant,
    LoyalServant,
    LoyalServant,
    Duke,
    Morgan,
    Shapeshifter,
    MordredMinion,
];
const EIGHT: &[Role] = &[
    LoyalServant,
    LoyalServant,
    LoyalServant,
    LoyalServant,
    Duke,
    Morgan,
    Shapeshifter,
    MordredMinion,
];
const NINE: &[Role] = &[
    LoyalServant,
    LoyalServant,
    LoyalServant,
    LoyalServant,
    Duke,
    GrandDuke,
    Morgan,
    Shapeshifter,
    MordredMinion,
];
const TEN: &[Role] = &[
    LoyalServant,
    LoyalServant,
    LoyalServant,
    LoyalServant,
    Duke,
    GrandDuke,
    Morgan,
    Shapeshifter,
    MordredMinion,
    MordredMinion,
];

/// Everything the engine needs to know about a table of a given size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setup {
    player_count: usize,
    roles: &'static [Role],
    quest_sizes: [usize; QUEST_COUNT],
    final_quest_size: usize,
}

impl Setup {
    /// Looks up the setup for a table size
    ///
    /// # Returns
    ///
    /// `None` when the player count is outside the supported range
    pub fn for_players(player_count: usize) -> Option<Self> {
        let (roles, quest_sizes, final_quest_size) = match player_count {
            4 => (FOUR, [2, 3, 2, 3, 3], 3),
            5 => (FIVE, [2, 3, 2, 3, 3], 3),
            6 => (SIX, [2, 3, 4, 3, 4], 4),
            7 => (SEVEN, [2, 3, 3, 4, 4], 4),
            8 => (EIGHT, [3, 4, 4, 5, 5], 5),
            9 => (NINE, [3, 4, 4, 5, 5], 5),
            10 => (TEN, [3, 4, 4, 5, 5], 5),
            _ => return None,
        };
        debug_assert!((seats::MIN_PLAYER_COUNT..=seats::MAX_PLAYER_COUNT).contains(&player_count));
        Some(Self {
            player_count,
            roles,
            quest_sizes,
            final_quest_size,
        })
    }

    /// Number of seats at the table
    pub fn player_count(&self) -> usize {
        self.player_count
    }

    /// The role multiset in catalog order
    pub fn roles(&self) -> &'static [Role] {
        self.roles
    }

    /// Team sizes of the five ordinary quests
    pub fn quest_sizes(&self) -> [usize; QUEST_COUNT] {
        self.quest_sizes
    }

    /// Required team size of a 1-based quest number
    pub fn quest_size(&self, quest_number: usize) -> Option<usize> {
        quest_number
            .checked_sub(1)
            .and_then(|i| self.quest_sizes.get(i))
            .copied()
    }

    /// Required team size of the final quest
    pub fn final_quest_size(&self) -> usize {
        self.final_quest_size
    }

    /// Number of roles dealt per team
    pub fn team_counts(&self) -> EnumMap<Team, usize> {
        let mut counts = EnumMap::default();
        for role in self.roles {
            counts[role.team()] += 1;
        }
        counts
    }

    /// Shuffles the role multiset uniformly at random
    pub fn deal(&self, rng: &mut fastrand::Rng) -> Vec<Role> {
        let mut roles = self.roles.to_vec();
        rng.shuffle(&mut roles);
        roles
    }

    /// Counts how often each role appears in the multiset
    pub fn role_counts(&self) -> EnumMap<Role, usize> {
        let mut counts = EnumMap::default();
        for (role, count) in self.roles.iter().counts() {
            counts[*role] = count;
        }
        counts
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_setup_exists_for_supported_counts() {
        for count in seats::MIN_PLAYER_COUNT..=seats::MAX_PLAYER_COUNT {
            let setup = Setup::for_players(count).unwrap();
            assert_eq!(setup.player_count(), count);
            assert_eq!(setup.roles().len(), count);
        }
    }

    #[test]
    fn test_setup_rejects_unsupported_counts() {
        assert!(Setup::for_players(0).is_none());
        assert!(Setup::for_players(3).is_none());
        assert!(Setup::for_players(11).is_none());
    }

    #[test]
    fn test_team_counts() {
        let expected = [
            (4, 2, 2),
            (5, 3, 2),
            (6, 3, 3),
            (7, 4, 3),
            (8, 5, 3),
            (9, 6, 3),
            (10, 6, 4),
        ];
        for (count, good, evil) in expected {
            let counts = Setup::for_players(count).unwrap().team_counts();
            assert_eq!(counts[Team::Good], good, "good count for {count} players");
            assert_eq!(counts[Team::Evil], evil, "evil count for {count} players");
        }
    }

    #[test]
    fn test_quest_sizes() {
        let setup = Setup::for_players(5).unwrap();
        assert_eq!(setup.quest_sizes(), [2, 3, 2, 3, 3]);
        assert_eq!(setup.quest_size(1), Some(2));
        assert_eq!(setup.quest_size(5), Some(3));
        assert_eq!(setup.quest_size(0), None);
        assert_eq!(setup.quest_size(6), None);

        assert_eq!(Setup::for_players(7).unwrap().quest_sizes(), [2, 3, 3, 4, 4]);
        assert_eq!(Setup::for_players(10).unwrap().quest_sizes(), [3, 4, 4, 5, 5]);
    }

    #[test]
    fn test_final_quest_sizes() {
        let expected = [(4, 3), (5, 3), (6, 4), (7, 4), (8, 5), (9, 5), (10, 5)];
        for (count, size) in expected {
            assert_eq!(Setup::for_players(count).unwrap().final_quest_size(), size);
        }
    }

    #[test]
    fn test_deal_preserves_multiset() {
        let mut rng = fastrand::Rng::with_seed(7);
        for count in seats::MIN_PLAYER_COUNT..=seats::MAX_PLAYER_COUNT {
            let setup = Setup::for_players(count).unwrap();
            let dealt = setup.deal(&mut rng);
            assert_eq!(
                dealt.iter().copied().sorted().collect_vec(),
                setup.roles().iter().copied().sorted().collect_vec()
            );
        }
    }

    #[test]
    fn test_every_table_has_one_morgan() {
        for count in seats::MIN_PLAYER_COUNT..=seats::MAX_PLAYER_COUNT {
            assert_eq!(Setup::for_players(count).unwrap().role_counts()[Role::Morgan], 1);
        }
        assert_eq!(Setup::for_players(10).unwrap().role_counts()[Role::MordredMinion], 2);
    }

    #[test]
    fn test_role_properties() {
        assert_eq!(Role::Morgan.team(), Team::Evil);
        assert_eq!(Role::Duke.team(), Team::Good);
        assert!(Role::Morgan.ignores_magic());
        assert!(!Role::Prince.ignores_magic());
        assert_eq!(Role::Shapeshifter.amulet_team(), Team::Good);
        assert_eq!(Role::MordredMinion.amulet_team(), Team::Evil);
        assert_eq!(Role::LoyalServant.amulet_team(), Team::Good);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Morgan).unwrap(), "\"Morgan\"");
        assert_eq!(serde_json::to_string(&Team::Evil).unwrap(), "\"Evil\"");
    }
}
