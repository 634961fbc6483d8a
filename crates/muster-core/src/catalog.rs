//! Game-data catalog: unit types and promotions.
//!
//! The catalog is a small JSON document kept next to the campaign database:
//!
//! ```json
//! {
//!   "unit_types": {
//!     "Warrior": { "display": "Warrior", "class": "Melee", "strength": 2, "move": 1, "cost": 15 }
//!   },
//!   "promotions": ["Combat I", "Drill I"]
//! }
//! ```
//!
//! Events refer to unit types by key; the catalog supplies display names
//! (as a [`DisplayResolver`]) and base strengths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TroopError;
use crate::resolver::{DisplayResolver, KeyCatalog};

/// Definition of one unit type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTypeRecord {
    /// Name shown in views and reports.
    pub display: String,
    /// Unit class (melee, mounted, siege, ...).
    pub class: String,
    /// Base combat strength.
    pub strength: u32,
    /// Movement points.
    #[serde(rename = "move")]
    pub movement: u32,
    /// Production cost.
    pub cost: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    unit_types: BTreeMap<String, UnitTypeRecord>,
    #[serde(default)]
    promotions: Vec<String>,
}

/// Unit-type and promotion definitions, optionally backed by a file.
#[derive(Debug, Clone, Default)]
pub struct GameCatalog {
    path: Option<PathBuf>,
    data: CatalogDocument,
}

impl GameCatalog {
    /// An empty catalog with no backing file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the catalog stored at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TroopError> {
        let mut catalog = Self {
            path: Some(path.into()),
            data: CatalogDocument::default(),
        };
        catalog.reload()?;
        Ok(catalog)
    }

    /// Load the catalog at `path`, or start an empty one bound to it when
    /// the file does not exist yet.
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Result<Self, TroopError> {
        let path = path.into();
        if path.exists() {
            Self::open(path)
        } else {
            tracing::info!(path = %path.display(), "catalog file absent, starting empty");
            Ok(Self {
                path: Some(path),
                data: CatalogDocument::default(),
            })
        }
    }

    /// Re-read the backing file. A catalog without a file is left as is.
    pub fn reload(&mut self) -> Result<(), TroopError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = std::fs::read_to_string(path)?;
        self.data = serde_json::from_str(&contents)?;
        tracing::debug!(
            path = %path.display(),
            unit_types = self.data.unit_types.len(),
            promotions = self.data.promotions.len(),
            "catalog loaded"
        );
        Ok(())
    }

    /// Write the catalog to its file, or to `rename` (which then becomes
    /// the backing file).
    pub fn save(&mut self, rename: Option<&Path>) -> Result<(), TroopError> {
        if let Some(rename) = rename {
            self.path = Some(rename.to_path_buf());
        }
        let Some(path) = &self.path else {
            return Err(TroopError::InvariantViolation(
                "catalog has no file to save to".to_owned(),
            ));
        };
        let json = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "catalog saved");
        Ok(())
    }

    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Define a unit type. Existing keys are only replaced with `overwrite`.
    pub fn set_unit_type(
        &mut self,
        key: &str,
        record: UnitTypeRecord,
        overwrite: bool,
    ) -> Result<(), TroopError> {
        if !overwrite && self.data.unit_types.contains_key(key) {
            return Err(TroopError::DuplicateState(format!(
                "unit type '{key}' already exists"
            )));
        }
        self.data.unit_types.insert(key.to_owned(), record);
        Ok(())
    }

    /// Look up a unit type.
    pub fn unit_type(&self, key: &str) -> Option<&UnitTypeRecord> {
        self.data.unit_types.get(key)
    }

    /// Remove a unit type and return its definition.
    pub fn del_unit_type(&mut self, key: &str) -> Result<UnitTypeRecord, TroopError> {
        self.data
            .unit_types
            .remove(key)
            .ok_or_else(|| TroopError::NotFound {
                what: "unit type",
                id: key.to_owned(),
            })
    }

    /// All unit-type keys in sorted order.
    pub fn unit_types(&self) -> Vec<&str> {
        self.data.unit_types.keys().map(String::as_str).collect()
    }

    /// Add a promotion name.
    pub fn add_promotion(&mut self, name: &str) -> Result<(), TroopError> {
        if self.data.promotions.iter().any(|p| p == name) {
            return Err(TroopError::DuplicateState(format!(
                "promotion '{name}' already exists"
            )));
        }
        self.data.promotions.push(name.to_owned());
        Ok(())
    }

    /// Remove a promotion name.
    pub fn del_promotion(&mut self, name: &str) -> Result<(), TroopError> {
        let before = self.data.promotions.len();
        self.data.promotions.retain(|p| p != name);
        if self.data.promotions.len() == before {
            return Err(TroopError::NotFound {
                what: "promotion",
                id: name.to_owned(),
            });
        }
        Ok(())
    }

    /// Promotion names in insertion order.
    pub fn promotions(&self) -> &[String] {
        &self.data.promotions
    }
}

impl DisplayResolver for GameCatalog {
    fn unit_type_display(&self, key: &str) -> String {
        self.unit_type(key)
            .filter(|record| !record.display.is_empty())
            .map_or_else(|| key.to_owned(), |record| record.display.clone())
    }

    fn owner_display(&self, key: &str) -> String {
        key.to_owned()
    }
}

impl KeyCatalog for GameCatalog {
    fn has_unit_type(&self, key: &str) -> bool {
        self.data.unit_types.contains_key(key)
    }

    fn has_promotion(&self, name: &str) -> bool {
        self.data.promotions.iter().any(|p| p == name)
    }
}
