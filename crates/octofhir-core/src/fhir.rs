use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::error::CoreError;

/// Resource types with a built-in profile
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Patient,
    Practitioner,
    Organization,
    Location,
    HealthcareService,
    ValueSet,
    #[serde(untagged)]
    Custom(String),
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceType::Patient => write!(f, "Patient"),
            ResourceType::Practitioner => write!(f, "Practitioner"),
            ResourceType::Organization => write!(f, "Organization"),
            ResourceType::Location => write!(f, "Location"),
            ResourceType::HealthcareService => write!(f, "HealthcareService"),
            ResourceType::ValueSet => write!(f, "ValueSet"),
            ResourceType::Custom(name) => write!(f, "{}", name),
        }
    }
}

impl FromStr for ResourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Patient" => Ok(ResourceType::Patient),
            "Practitioner" => Ok(ResourceType::Practitioner),
            "Organization" => Ok(ResourceType::Organization),
            "Location" => Ok(ResourceType::Location),
            "HealthcareService" => Ok(ResourceType::HealthcareService),
            "ValueSet" => Ok(ResourceType::ValueSet),
            _ => {
                let starts_upper = s.chars().next().is_some_and(|c| c.is_ascii_uppercase());
                if starts_upper && s.chars().all(|c| c.is_ascii_alphanumeric()) {
                    Ok(ResourceType::Custom(s.to_string()))
                } else {
                    Err(CoreError::invalid_resource_type(s))
                }
            }
        }
    }
}
