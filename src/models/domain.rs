use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Opaque profile identifier (the `users.id` serial)
pub type ProfileId = i32;

/// Gender of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    Man,
    Woman,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Man => "Man",
            Gender::Woman => "Woman",
        }
    }

    /// Parse a stored or submitted gender, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "man" => Some(Gender::Man),
            "woman" => Some(Gender::Woman),
            _ => None,
        }
    }
}

/// Sexual orientation, stored as its canonical phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[serde(rename = "likes men")]
    LikesMen,
    #[serde(rename = "likes women")]
    LikesWomen,
    #[serde(rename = "likes men and women")]
    LikesBoth,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::LikesMen => "likes men",
            Orientation::LikesWomen => "likes women",
            Orientation::LikesBoth => "likes men and women",
        }
    }
}

/// Profile record as held by the profile store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub verified: bool,
    pub gender: Option<Gender>,
    pub orientation: Option<Orientation>,
    pub birthday: Option<NaiveDate>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub fame_rating: f64,
}

impl Profile {
    pub fn birth_year(&self) -> Option<i32> {
        self.birthday.map(|d| d.year())
    }
}

/// Last known location of a profile (one row per profile)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "accuracy")]
    pub accuracy_m: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Bare coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&Location> for Coordinates {
    fn from(location: &Location) -> Self {
        Self {
            latitude: location.latitude,
            longitude: location.longitude,
        }
    }
}

/// A profile row together with its optional location, as returned by candidate queries
#[derive(Debug, Clone)]
pub struct Candidate {
    pub profile: Profile,
    pub location: Option<Location>,
}

/// Profile enriched with its tag set and location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedProfile {
    #[serde(flatten)]
    pub profile: Profile,
    pub tags: Vec<String>,
    pub location: Option<Location>,
}

/// Nearby search hit with its great-circle distance from the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyMatch {
    #[serde(flatten)]
    pub profile: EnrichedProfile,
    pub distance_km: f64,
}

/// Aggregated social signals for a profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub views: i64,
    pub likes: i64,
    pub fame_rating: f64,
}

/// Validated location write
#[derive(Debug, Clone, Copy)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: Option<f64>,
}

/// Partial profile update; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub gender: Option<Gender>,
    pub orientation: Option<Orientation>,
    pub bio: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birthday: Option<NaiveDate>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.gender.is_none()
            && self.orientation.is_none()
            && self.bio.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.birthday.is_none()
    }
}

/// Outcome of removing a tag from a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRemoval {
    Removed,
    UnknownTag,
    NotAssigned,
}

/// Longitude extent of a bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LongitudeSpan {
    /// No longitude bound (the circle reaches a pole)
    Any,
    /// `min <= lon <= max`
    Range { min: f64, max: f64 },
    /// Crosses the antimeridian: `lon >= min || lon <= max`
    Wrapped { min: f64, max: f64 },
}

impl LongitudeSpan {
    pub fn contains(&self, lon: f64) -> bool {
        match *self {
            LongitudeSpan::Any => true,
            LongitudeSpan::Range { min, max } => lon >= min && lon <= max,
            LongitudeSpan::Wrapped { min, max } => lon >= min || lon <= max,
        }
    }
}

/// Geospatial bounding box enclosing a great-circle radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub longitude: LongitudeSpan,
}
