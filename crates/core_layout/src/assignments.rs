use crate::AppId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from tile index to the app shown in that tile.
///
/// Entries for indices beyond the current mode's tile count are kept until
/// overwritten; consumers only ever read indices below the tile count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileAssignments {
    tiles: BTreeMap<usize, AppId>,
}

impl TileAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build assignments from a stored tile list, where the list position is
    /// the tile index and an empty string marks an unassigned tile.
    pub fn from_tile_list<S: AsRef<str>>(list: &[S]) -> Self {
        let tiles = list
            .iter()
            .enumerate()
            .filter(|(_, app_id)| !app_id.as_ref().is_empty())
            .map(|(index, app_id)| (index, app_id.as_ref().to_string()))
            .collect();
        Self { tiles }
    }

    /// Ordered tile list for persistence. Gaps are written as empty strings
    /// so every app keeps its index on restore.
    pub fn to_tile_list(&self) -> Vec<String> {
        let Some((&last, _)) = self.tiles.last_key_value() else {
            return Vec::new();
        };
        (0..=last)
            .map(|index| self.tiles.get(&index).cloned().unwrap_or_default())
            .collect()
    }

    /// Record an app for a tile, returning the previous occupant.
    pub fn assign(&mut self, index: usize, app_id: impl Into<AppId>) -> Option<AppId> {
        self.tiles.insert(index, app_id.into())
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.tiles.get(&index).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }
}
