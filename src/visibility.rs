//! Hidden-role visibility
//!
//! Every player sees a different picture of the table. This module
//! computes that picture for one observer at a time. The result is meant
//! for the observer only and must never be broadcast.

use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{
    catalog::{Role, Team},
    roster::Roster,
};

/// What an observer knows about one seat
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    /// Name of the seated player
    pub name: String,
    /// 1-based seat number
    pub number: usize,
    /// Whether the seat currently leads
    pub is_leader: bool,
    /// Whether this entry describes the observer
    pub is_self: bool,
    /// The role, when the observer may know it
    pub role: Option<Role>,
    /// Display name of the role, when known
    pub role_name: Option<&'static str>,
    /// Rules text of the role, only for the observer's own entry
    pub role_description: Option<&'static str>,
    /// The team, when the observer may know it
    pub team: Option<Team>,
}

/// Whether `observer` learns team and role of a player holding `other`
fn reveals(observer: Role, other: Role) -> bool {
    match observer {
        Role::Morgan => other.team() == Team::Evil && other != Role::Shapeshifter,
        Role::MordredMinion => matches!(other, Role::Morgan | Role::Prince),
        Role::Prince | Role::Shapeshifter => false,
        Role::LoyalServant | Role::Duke | Role::GrandDuke => false,
    }
}

/// Computes everything `observer` may see, one entry per seat
///
/// Roles that have not been dealt yet reveal nothing, not even to the
/// observer themselves.
pub fn visible_info(roster: &Roster, leader: Option<usize>, observer: usize) -> Vec<PlayerView> {
    let observer_role = roster.get(observer).and_then(|p| p.role());

    roster
        .iter()
        .enumerate()
        .map(|(seat, other)| {
            let is_self = seat == observer;
            let mut view = PlayerView {
                name: other.name().to_owned(),
                number: seat + 1,
                is_leader: leader == Some(seat),
                is_self,
                role: None,
                role_name: None,
                role_description: None,
                team: None,
            };

            match (observer_role, other.role()) {
                (Some(_), Some(role)) if is_self => {
                    view.role = Some(role);
                    view.role_name = Some(role.name());
                    view.role_description = Some(role.description());
                    view.team = Some(role.team());
                }
                (Some(observer_role), Some(role)) if reveals(observer_role, role) => {
                    view.role = Some(role);
                    view.role_name = Some(role.name());
                    view.team = Some(role.team());
                }
                _ => {}
            }

            view
        })
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    /// Seats one player per role, in the given order
    fn roster_with(roles: &[Role]) -> Roster {
        let mut roster = Roster::default();
        for (i, role) in roles.iter().enumerate() {
            let seat = roster.seat(&format!("P{}", i + 1), 1).unwrap();
            roster.get_mut(seat).unwrap().set_role(*role);
        }
        roster
    }

    const TEN: [Role; 10] = [
        Role::LoyalServant,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::LoyalServant,
        Role::Duke,
        Role::GrandDuke,
        Role::Morgan,
        Role::Shapeshifter,
        Role::MordredMinion,
        Role::MordredMinion,
    ];

    fn revealed_seats(views: &[PlayerView]) -> Vec<usize> {
        views
            .iter()
            .filter(|v| !v.is_self && v.team.is_some())
            .map(|v| v.number - 1)
            .collect()
    }

    #[test]
    fn test_self_is_fully_disclosed() {
        let roster = roster_with(&TEN);
        for observer in 0..TEN.len() {
            let views = visible_info(&roster, Some(0), observer);
            let own = views.iter().find(|v| v.is_self).unwrap();
            assert_eq!(own.role, Some(TEN[observer]));
            assert_eq!(own.team, Some(TEN[observer].team()));
            assert_eq!(own.role_description, Some(TEN[observer].description()));
        }
    }

    #[test]
    fn test_morgan_sees_evil_except_shapeshifter() {
        let roster = roster_with(&TEN);
        let views = visible_info(&roster, None, 6);
        assert_eq!(revealed_seats(&views), vec![8, 9]);
        assert_eq!(views[8].role, Some(Role::MordredMinion));
        assert_eq!(views[7].team, None);
    }

    #[test]
    fn test_minion_sees_morgan_and_prince() {
        let roster = roster_with(&[
            Role::LoyalServant,
            Role::Prince,
            Role::Morgan,
            Role::MordredMinion,
            Role::Shapeshifter,
            Role::MordredMinion,
        ]);
        let views = visible_info(&roster, None, 3);
        assert_eq!(revealed_seats(&views), vec![1, 2]);
        assert_eq!(views[1].role_name, Some(Role::Prince.name()));
    }

    #[test]
    fn test_blind_roles_see_nothing() {
        let roster = roster_with(&TEN);
        for observer in [0, 4, 5, 7] {
            let views = visible_info(&roster, None, observer);
            assert!(revealed_seats(&views).is_empty(), "seat {observer} saw someone");
        }

        let roster = roster_with(&[
            Role::LoyalServant,
            Role::LoyalServant,
            Role::LoyalServant,
            Role::Morgan,
            Role::Prince,
        ]);
        assert!(revealed_seats(&visible_info(&roster, None, 4)).is_empty());
    }

    #[test]
    fn test_morgan_sees_prince() {
        let roster = roster_with(&[
            Role::LoyalServant,
            Role::LoyalServant,
            Role::LoyalServant,
            Role::Morgan,
            Role::Prince,
        ]);
        let views = visible_info(&roster, None, 3);
        assert_eq!(revealed_seats(&views), vec![4]);
        assert_eq!(views[4].role_description, None);
    }

    #[test]
    fn test_leader_and_numbers() {
        let roster = roster_with(&TEN);
        let views = visible_info(&roster, Some(3), 0);
        assert_eq!(views.len(), 10);
        assert!(views[3].is_leader);
        assert_eq!(views.iter().filter(|v| v.is_leader).count(), 1);
        assert_eq!(views[9].number, 10);
        assert_eq!(views[9].name, "P10");
    }

    #[test]
    fn test_unassigned_roles_reveal_nothing() {
        let mut roster = Roster::default();
        roster.seat("P1", 1).unwrap();
        roster.seat("P2", 1).unwrap();
        let views = visible_info(&roster, None, 0);
        assert!(views.iter().all(|v| v.role.is_none() && v.team.is_none()));
    }

    #[test]
    fn test_hidden_fields_are_not_serialized() {
        let roster = roster_with(&TEN);
        let views = visible_info(&roster, None, 0);
        let json = serde_json::to_string(&views[6]).unwrap();
        assert!(!json.contains("Morgan"));
        assert!(!json.contains("team"));
    }
}
