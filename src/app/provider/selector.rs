//! Provider configuration selector strings
//!
//! The provider addresses entities through a `;`-separated template of
//! `Field=value` pairs. Only the `Type` and `Id` fields vary per request.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::provider;

/// Fixed part of every selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorTemplate {
    pub configuration_name: String,
    pub theme_id: String,
    pub observation_period: String,
    pub observation_period_offset: String,
}

impl Default for SelectorTemplate {
    fn default() -> Self {
        Self {
            configuration_name: provider::DEFAULT_CONFIGURATION_NAME.to_string(),
            theme_id: provider::DEFAULT_THEME_ID.to_string(),
            observation_period: provider::DEFAULT_OBSERVATION_PERIOD.to_string(),
            observation_period_offset: provider::DEFAULT_OBSERVATION_PERIOD_OFFSET.to_string(),
        }
    }
}

impl SelectorTemplate {
    /// Selector for a single entity id
    pub fn select(&self, id: impl Into<String>) -> ConfigSelector {
        ConfigSelector {
            template: self.clone(),
            entity_type: None,
            id: id.into(),
        }
    }

    /// Selector for an entity id with an explicit `Type` field
    pub fn select_typed(
        &self,
        entity_type: impl Into<String>,
        id: impl Into<String>,
    ) -> ConfigSelector {
        ConfigSelector {
            template: self.clone(),
            entity_type: Some(entity_type.into()),
            id: id.into(),
        }
    }
}

/// A fully rendered provider selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSelector {
    template: SelectorTemplate,
    entity_type: Option<String>,
    id: String,
}

impl ConfigSelector {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }
}

impl fmt::Display for ConfigSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigurationName={};ThemeId={};ObservationPeriod={};ObservationPeriodOffset={};",
            self.template.configuration_name,
            self.template.theme_id,
            self.template.observation_period,
            self.template.observation_period_offset
        )?;
        if let Some(entity_type) = &self.entity_type {
            write!(f, "Type={};", entity_type)?;
        }
        write!(f, "Id={}", self.id)
    }
}
