// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod listening;
pub mod soundtrack;
pub mod user;

pub use activity::ActivityWindow;
pub use listening::{PlayEvent, TrackRecord};
pub use soundtrack::SoundtrackRecord;
pub use user::{Provider, User, UserTokens};
