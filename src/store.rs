//! Registry of running matches
//!
//! The store owns every match and hands out codes for new ones. It does no
//! locking itself; the transport serializes access to it.

use std::collections::HashMap;

use tracing::info;

use crate::{
    config::Options,
    game::{Error, Game},
    game_id::GameId,
};

/// Running matches keyed by their code
#[derive(Debug, Default)]
pub struct MatchStore {
    games: HashMap<GameId, Game>,
    rng: fastrand::Rng,
}

impl MatchStore {
    /// Creates an empty store drawing codes and shuffles from `rng`
    pub fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            games: HashMap::new(),
            rng,
        }
    }

    /// Creates a match under a fresh code
    ///
    /// # Errors
    ///
    /// Same as [`Game::new`]. No code is taken when creation fails.
    pub fn create(&mut self, player_count: usize, options: Options) -> Result<GameId, Error> {
        let game = Game::with_rng(player_count, options, self.rng.fork())?;
        let id = loop {
            let id = GameId::with_rng(&mut self.rng);
            if !self.games.contains_key(&id) {
                break id;
            }
        };
        self.games.insert(id, game);
        info!(%id, player_count, "match created");
        Ok(id)
    }

    /// The match with the given code
    pub fn get(&self, id: GameId) -> Option<&Game> {
        self.games.get(&id)
    }

    /// Mutable access to the match with the given code
    pub fn get_mut(&mut self, id: GameId) -> Option<&mut Game> {
        self.games.get_mut(&id)
    }

    /// Destroys a match and returns it
    pub fn remove(&mut self, id: GameId) -> Option<Game> {
        let game = self.games.remove(&id);
        if game.is_some() {
            info!(%id, "match removed");
        }
        game
    }

    /// Number of running matches
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Whether no match is running
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::game::Phase;

    #[test]
    fn test_create_and_lookup() {
        let mut store = MatchStore::with_rng(fastrand::Rng::with_seed(3));
        let first = store.create(5, Options::default()).unwrap();
        let second = store.create(7, Options::default()).unwrap();

        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(first).unwrap().setup().player_count(), 5);
        assert_eq!(store.get(second).unwrap().phase(), Phase::Setup);

        store.get_mut(first).unwrap().add_player("Alice").unwrap();
        assert_eq!(store.get(first).unwrap().roster().len(), 1);
    }

    #[test]
    fn test_failed_create_takes_no_code() {
        let mut store = MatchStore::default();
        assert!(matches!(
            store.create(2, Options::default()),
            Err(Error::UnsupportedPlayerCount)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove() {
        let mut store = MatchStore::default();
        let id = store.create(4, Options::default()).unwrap();
        assert!(store.remove(id).is_some());
        assert!(store.remove(id).is_none());
        assert!(store.get(id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_codes_unique_under_load() {
        let mut store = MatchStore::with_rng(fastrand::Rng::with_seed(11));
        let ids = (0..500)
            .map(|_| store.create(4, Options::default()).unwrap())
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(ids.len(), 500);
    }
}
