//! Market briefs: a deterministic template and an optional hosted generator.

pub mod composer;
pub mod generator;

pub use composer::{compose, BriefWindow};
pub use generator::{BriefGenerator, HostedBriefGenerator};
