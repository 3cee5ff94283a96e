//! Topic classification and analytics
//!
//! One half classifies each student message against the course's topic
//! taxonomy; the other aggregates the resulting topic weights into
//! percentage breakdowns per student, group, and course.

mod classifier;
mod stats;

pub use classifier::*;
pub use stats::*;
