//! Selectable categories and category plan construction
//!
//! A session plays an ordered plan of categories, each tagged with how it
//! entered the plan. The plan is either auto-sampled by the server at
//! start or proposed by players before start; both variants are
//! configurations of [`PlanPolicy`].

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{constants, player::Id};

/// A selectable category with a short description for the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    /// Display label, also used as the generation prompt subject
    pub label: &'static str,
    /// One-line description of what the category covers
    pub description: &'static str,
}

/// The static list of selectable categories
pub const SELECTABLE: &[Category] = &[
    Category {
        label: "Geography",
        description: "Questions about countries, cities, and landmarks.",
    },
    Category {
        label: "History",
        description: "Questions about historical events and figures.",
    },
    Category {
        label: "AI",
        description: "Questions about artificial intelligence and machine learning.",
    },
    Category {
        label: "Chemistry",
        description: "Questions about chemical elements and reactions.",
    },
    Category {
        label: "Biology",
        description: "Questions about living organisms and ecosystems.",
    },
    Category {
        label: "Physics",
        description: "Questions about matter, energy, and forces.",
    },
    Category {
        label: "Australia",
        description: "Questions about Australia",
    },
    Category {
        label: "Food",
        description: "Questions about food and cooking.",
    },
    Category {
        label: "Music",
        description: "Questions about music and musicians.",
    },
    Category {
        label: "Movies",
        description: "Questions about movies and actors.",
    },
    Category {
        label: "Books",
        description: "Questions about books and authors.",
    },
    Category {
        label: "Art",
        description: "Questions about art and artists.",
    },
    Category {
        label: "Basketball",
        description: "Questions about basketball.",
    },
    Category {
        label: "Football",
        description: "Questions about football.",
    },
    Category {
        label: "Soccer",
        description: "Questions about soccer.",
    },
    Category {
        label: "Squash",
        description: "Questions about the game squash.",
    },
];

/// One entry of a session's category plan
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    /// The category label
    pub category: String,
    /// The player who proposed it; absent for auto-sampled entries
    pub chosen_by: Option<Id>,
}

/// How a session's category plan gets populated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanPolicy {
    /// The server samples categories without replacement at start
    AutoSample {
        /// How many categories to draw
        count: usize,
    },
    /// Players propose categories before start via `selectCategory`
    PlayerProposed,
}

impl Default for PlanPolicy {
    fn default() -> Self {
        Self::AutoSample {
            count: constants::plan::AUTO_SAMPLE_COUNT,
        }
    }
}

/// Samples `count` distinct categories from the selectable list
///
/// Sampling is without replacement; asking for more categories than
/// exist yields the whole list in random order.
pub fn sample_plan(count: usize) -> Vec<PlanEntry> {
    let mut indices: Vec<usize> = (0..SELECTABLE.len()).collect();
    fastrand::shuffle(&mut indices);
    indices
        .into_iter()
        .take(count)
        .map(|i| PlanEntry {
            category: SELECTABLE[i].label.to_owned(),
            chosen_by: None,
        })
        .collect()
}
