use std::collections::HashMap;

use crate::error::TrainingError;
use crate::model::unit::UnitModel;

/// Stable handle of a unit inside a [`ModelDictionary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) usize);

impl UnitId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Every unit of the model set, addressed by name or by [`UnitId`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDictionary {
    units: Vec<UnitModel>,
    index: HashMap<String, UnitId>,
}

impl ModelDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units(units: impl IntoIterator<Item = UnitModel>) -> Result<Self, TrainingError> {
        let mut dictionary = Self::new();
        for unit in units {
            dictionary.insert(unit)?;
        }
        Ok(dictionary)
    }

    /// Adds a unit; names must be unique and all units must share one feature dimension.
    pub fn insert(&mut self, unit: UnitModel) -> Result<UnitId, TrainingError> {
        if self.index.contains_key(unit.name()) {
            return Err(TrainingError::invalid_model(
                unit.name(),
                "defined more than once",
            ));
        }
        if let Some(dim) = self.dim() {
            if unit.dim() != dim {
                return Err(TrainingError::invalid_model(
                    unit.name(),
                    format!("feature dimension {} differs from {}", unit.dim(), dim),
                ));
            }
        }
        let id = UnitId(self.units.len());
        self.index.insert(unit.name().to_string(), id);
        self.units.push(unit);
        Ok(id)
    }

    pub fn id(&self, name: &str) -> Option<UnitId> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&UnitModel> {
        self.id(name).map(|id| self.unit(id))
    }

    pub fn unit(&self, id: UnitId) -> &UnitModel {
        &self.units[id.0]
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> &mut UnitModel {
        &mut self.units[id.0]
    }

    /// Maps a transcript's unit names to handles; an unknown name fails the lookup.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<UnitId>, TrainingError> {
        names
            .iter()
            .map(|name| {
                self.id(name.as_ref()).ok_or_else(|| TrainingError::UnknownUnit {
                    name: name.as_ref().to_string(),
                })
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitId, &UnitModel)> + '_ {
        self.units.iter().enumerate().map(|(i, u)| (UnitId(i), u))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Shared feature dimension, `None` while the dictionary is empty.
    pub fn dim(&self) -> Option<usize> {
        self.units.first().map(UnitModel::dim)
    }
}
