//! # Avalon Quest Rules Engine
//!
//! This library provides the rules engine for an Avalon-style social
//! deduction game with the Quest variant roles (Morgan, Prince,
//! Shapeshifter, Minion of Mordred, Duke and Grand Duke). It handles
//! seating, role dealing and per-player visibility, team proposals and
//! votes, quest execution with magic tokens, amulet identity checks, the
//! optional final quest and optional per-phase deadlines.
//!
//! The engine performs no I/O. A transport feeds player actions in through
//! [`game::Game::receive_message`], schedules the alarms the match hands
//! out and delivers them back through [`game::Game::receive_alarm`].

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

pub mod amulet;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod final_quest;
pub mod game;
pub mod game_id;
pub mod ledger;
pub mod player;
pub mod quest;
pub mod roster;
pub mod store;
pub mod timer;
pub mod visibility;

pub use catalog::{Role, Team};
pub use config::{Options, TimerOptions};
pub use game::{Error, Game, IncomingMessage, Phase, Response};
pub use game_id::GameId;
pub use store::MatchStore;
pub use timer::AlarmMessage;
