use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotelmenu_core::{DomainError, DomainResult, Entity, HotelId, UserId};

use crate::normalize::is_valid_slug;

/// A property that lists rooms and food.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: HotelId,
    pub name: String,
    pub slug: String,
    pub address: String,
    pub city: Option<String>,
    pub timezone: String,
}

/// Input for registering a hotel.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewHotel {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub address: String,
    pub city: Option<String>,
    pub timezone: Option<String>,
}

impl Hotel {
    pub fn create(id: HotelId, input: NewHotel) -> DomainResult<Self> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("hotel name cannot be empty"));
        }
        if name.chars().count() > 200 {
            return Err(DomainError::validation("hotel name is longer than 200 characters"));
        }
        if !is_valid_slug(&input.slug) {
            return Err(DomainError::validation(format!("invalid slug '{}'", input.slug)));
        }

        let city = input
            .city
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let timezone = input
            .timezone
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "UTC".to_string());

        Ok(Self {
            id,
            name,
            slug: input.slug,
            address: input.address.trim().to_string(),
            city,
            timezone,
        })
    }

    pub fn display_name(&self) -> String {
        match &self.city {
            Some(city) => format!("{} ({city})", self.name),
            None => self.name.clone(),
        }
    }
}

impl Entity for Hotel {
    type Id = HotelId;

    fn id(&self) -> HotelId {
        self.id
    }
}

/// A user's staff membership in a hotel.
///
/// Members may list products for the hotel and see every booking made on them;
/// managers may additionally add members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelMembership {
    pub user_id: UserId,
    pub hotel_id: HotelId,
    pub is_manager: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, slug: &str) -> NewHotel {
        NewHotel {
            name: name.to_string(),
            slug: slug.to_string(),
            address: String::new(),
            city: Some("Nairobi".to_string()),
            timezone: None,
        }
    }

    #[test]
    fn create_defaults_timezone_to_utc() {
        let hotel = Hotel::create(HotelId::new(), input("Test Hotel", "test-hotel")).unwrap();
        assert_eq!(hotel.timezone, "UTC");
        assert_eq!(hotel.display_name(), "Test Hotel (Nairobi)");
    }

    #[test]
    fn create_rejects_blank_name() {
        let err = Hotel::create(HotelId::new(), input("   ", "test-hotel")).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_bad_slug() {
        let err = Hotel::create(HotelId::new(), input("Test", "Test Hotel")).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
