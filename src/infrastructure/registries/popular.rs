//! Popular-package corpus for typosquat candidate selection
//!
//! The corpus is bundled with the binary: a ranked list of well-known names
//! per ecosystem, most popular first. The core contract is only the edit
//! distance rule and the popularity tiebreaker; the corpus itself is
//! provider-defined and intentionally small.

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::warn;

use crate::application::policy::levenshtein;
use crate::domain::trust::entities::CloseName;
use crate::domain::trust::Ecosystem;

const TOP_PACKAGES_JSON: &str = include_str!("../../../data/top_packages.json");

pub struct PopularNameIndex {
    /// Normalized names per ecosystem in rank order.
    ranked: HashMap<Ecosystem, Vec<String>>,
}

impl PopularNameIndex {
    /// The bundled corpus, parsed once per process.
    pub fn bundled() -> &'static PopularNameIndex {
        static INDEX: OnceLock<PopularNameIndex> = OnceLock::new();
        INDEX.get_or_init(|| PopularNameIndex::from_json(TOP_PACKAGES_JSON))
    }

    pub fn from_json(raw: &str) -> Self {
        let parsed: HashMap<String, Vec<String>> = match serde_json::from_str(raw) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(%error, "popular package corpus unreadable; typosquat checks disabled");
                HashMap::new()
            }
        };
        let mut ranked = HashMap::new();
        for (ecosystem_name, names) in parsed {
            let Some(ecosystem) = Ecosystem::parse(&ecosystem_name) else {
                continue;
            };
            let normalized = names
                .iter()
                .map(|name| ecosystem.normalize_name(name))
                .collect();
            ranked.insert(ecosystem, normalized);
        }
        Self { ranked }
    }

    /// Rank of a normalized name in the corpus, if listed.
    pub fn rank_of(&self, ecosystem: Ecosystem, normalized_name: &str) -> Option<usize> {
        self.ranked
            .get(&ecosystem)?
            .iter()
            .position(|name| name == normalized_name)
    }

    /// Popular names within `max_distance` edits of `normalized_name` that
    /// are strictly more popular than it. A name absent from the corpus
    /// counts as least popular. Candidates are ordered by distance, then
    /// shorter name, then rank.
    pub fn candidates(
        &self,
        ecosystem: Ecosystem,
        normalized_name: &str,
        max_distance: u32,
    ) -> Vec<CloseName> {
        let Some(names) = self.ranked.get(&ecosystem) else {
            return Vec::new();
        };
        let own_rank = self.rank_of(ecosystem, normalized_name);
        let mut candidates: Vec<CloseName> = names
            .iter()
            .enumerate()
            .filter(|(rank, name)| {
                name.as_str() != normalized_name
                    && own_rank.map_or(true, |own| *rank < own)
            })
            .filter_map(|(rank, name)| {
                let distance = levenshtein(normalized_name, name, max_distance);
                (distance <= max_distance).then(|| CloseName {
                    name: name.clone(),
                    rank,
                    distance,
                })
            })
            .collect();
        candidates.sort_by_key(|candidate| {
            (candidate.distance, candidate.name.len(), candidate.rank)
        });
        candidates
    }
}
