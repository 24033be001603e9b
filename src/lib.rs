//! Guideline falling-block rules engine
//!
//! SRS rotation with wall kicks, 7-bag generation, hold, lock delay with
//! extended placement, T-Spin detection, guideline scoring and versus
//! garbage, plus a small TCP relay for two-player matches.

pub mod autoplay;
pub mod bag;
pub mod board;
pub mod engine;
pub mod garbage;
pub mod hold;
pub mod input;
pub mod multiplayer;
pub mod piece;
pub mod playfield;
pub mod relay;
pub mod rules;
pub mod score;
pub mod settings;
pub mod srs;
pub mod tetromino;
pub mod timer;
