use std::fmt;

use foundation::geo::GeoPoint;
use foundation::ids::EntityId;
use serde::{Deserialize, Serialize};

/// The five point-of-interest collections the map can show.
///
/// Ordering contract:
/// - `Category::ALL` and `Ord` follow tab order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Listings,
    Laundries,
    Drives,
    Chargers,
    Stations,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Listings,
        Category::Laundries,
        Category::Drives,
        Category::Chargers,
        Category::Stations,
    ];

    /// Route segment / wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Listings => "listings",
            Category::Laundries => "laundries",
            Category::Drives => "drives",
            Category::Chargers => "chargers",
            Category::Stations => "stations",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum power for a charger to count as "fast".
pub const FAST_CHARGER_MIN_KW: f64 = 50.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PowerClass {
    Slow,
    Fast,
    Ultra,
}

impl PowerClass {
    pub fn from_kw(kw: f64) -> Option<Self> {
        if !kw.is_finite() || kw <= 0.0 {
            return None;
        }
        Some(if kw < 22.0 {
            PowerClass::Slow
        } else if kw < 100.0 {
            PowerClass::Fast
        } else {
            PowerClass::Ultra
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            PowerClass::Slow => "AC",
            PowerClass::Fast => "DC fast",
            PowerClass::Ultra => "DC ultra",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingAttributes {
    pub category_id: Option<i64>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    /// Mechanic comes to the customer.
    pub on_site: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LaundryAttributes {
    pub price_from: Option<f64>,
    pub self_service: bool,
    pub box_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveAttributes {
    pub venue_type: Option<String>,
    pub price_from: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargerAttributes {
    pub power_kw: Option<f64>,
}

impl ChargerAttributes {
    pub fn power_class(&self) -> Option<PowerClass> {
        self.power_kw.and_then(PowerClass::from_kw)
    }

    pub fn is_fast(&self) -> bool {
        self.power_kw.is_some_and(|kw| kw >= FAST_CHARGER_MIN_KW)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StationAttributes {
    pub open_24h: bool,
}

/// Category-specific attributes. The variant is the entity's category and
/// travels as the `category` tag on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Attributes {
    Listings(ListingAttributes),
    Laundries(LaundryAttributes),
    Drives(DriveAttributes),
    Chargers(ChargerAttributes),
    Stations(StationAttributes),
}

impl Attributes {
    pub fn category(&self) -> Category {
        match self {
            Attributes::Listings(_) => Category::Listings,
            Attributes::Laundries(_) => Category::Laundries,
            Attributes::Drives(_) => Category::Drives,
            Attributes::Chargers(_) => Category::Chargers,
            Attributes::Stations(_) => Category::Stations,
        }
    }

    pub fn default_for(category: Category) -> Self {
        match category {
            Category::Listings => Attributes::Listings(ListingAttributes::default()),
            Category::Laundries => Attributes::Laundries(LaundryAttributes::default()),
            Category::Drives => Attributes::Drives(DriveAttributes::default()),
            Category::Chargers => Attributes::Chargers(ChargerAttributes::default()),
            Category::Stations => Attributes::Stations(StationAttributes::default()),
        }
    }
}

/// A point of interest as delivered by its provider.
///
/// Notes:
/// - `coordinates = None` keeps the entity in lists and counts but off the map.
/// - `tags` carries the category's set-valued attribute (services, connector
///   types, fuel types).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub photos: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>, display_name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            coordinates: None,
            address: None,
            city: None,
            district: None,
            brand: None,
            description: None,
            rating: None,
            photos: None,
            tags: Vec::new(),
            attributes,
        }
    }

    /// Entity with default attributes for `category`.
    pub fn of(category: Category, id: impl Into<EntityId>, display_name: impl Into<String>) -> Self {
        Self::new(id, display_name, Attributes::default_for(category))
    }

    pub fn at(mut self, lat: f64, lon: f64) -> Self {
        self.coordinates = Some(GeoPoint::new(lat, lon));
        self
    }

    pub fn in_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn in_district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_photos<I, S>(mut self, photos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.photos = Some(photos.into_iter().map(Into::into).collect());
        self
    }

    pub fn category(&self) -> Category {
        self.attributes.category()
    }

    /// Position to place a marker at, if any.
    pub fn map_position(&self) -> Option<GeoPoint> {
        self.coordinates.filter(GeoPoint::is_valid)
    }

    pub fn is_map_eligible(&self) -> bool {
        self.map_position().is_some()
    }

    pub fn first_photo(&self) -> Option<&str> {
        self.photos
            .as_deref()
            .and_then(|p| p.iter().find(|url| !url.trim().is_empty()))
            .map(String::as_str)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
