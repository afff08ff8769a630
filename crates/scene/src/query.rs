use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::entity::{Attributes, Entity};

/// Which text fields free-text search looks at, per category.
pub trait SearchProfile {
    fn searchable_fields<'e>(&self, entity: &'e Entity) -> Vec<&'e str>;
}

/// Search over name, description, address and brand. Categories without a
/// dedicated profile use this.
#[derive(Debug, Copy, Clone, Default)]
pub struct DefaultSearchProfile;

impl SearchProfile for DefaultSearchProfile {
    fn searchable_fields<'e>(&self, entity: &'e Entity) -> Vec<&'e str> {
        let mut out = vec![entity.display_name.as_str()];
        out.extend(entity.description.as_deref());
        out.extend(entity.address.as_deref());
        out.extend(entity.brand.as_deref());
        out
    }
}

/// Declarative filter criteria for one category.
///
/// Every field is optional and the default value filters nothing. Criteria
/// combine conjunctively: an entity is kept only if it passes all of them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    /// Case-insensitive substring over the category's searchable fields.
    pub query: String,
    pub category_id: Option<i64>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub venue_type: Option<String>,
    /// Entity brand must be one of these.
    pub brands: BTreeSet<String>,
    /// Entity must carry every one of these tags.
    pub tags: BTreeSet<String>,
    pub on_site_only: bool,
    pub fast_charger_only: bool,
    pub open_24h_only: bool,
    #[serde(deserialize_with = "lenient_rating")]
    pub min_rating: Option<f64>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.query.trim().is_empty()
            && self.category_id.is_none()
            && is_unset(self.city.as_deref())
            && is_unset(self.district.as_deref())
            && is_unset(self.venue_type.as_deref())
            && self.brands.is_empty()
            && self.tags.is_empty()
            && !self.on_site_only
            && !self.fast_charger_only
            && !self.open_24h_only
            && self.min_rating.is_none()
    }

    /// Sets the rating threshold from raw user input. Anything that is not a
    /// finite number clears the threshold instead of failing.
    pub fn set_min_rating_input(&mut self, raw: &str) {
        self.min_rating = parse_rating(raw);
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_min_rating(mut self, rating: f64) -> Self {
        self.min_rating = coerce_rating(rating);
        self
    }
}

pub fn parse_rating(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().and_then(coerce_rating)
}

fn coerce_rating(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn lenient_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(v)) => coerce_rating(v),
        Some(Raw::Text(s)) => parse_rating(&s),
        Some(Raw::Other(_)) | None => None,
    })
}

fn is_unset(v: Option<&str>) -> bool {
    v.is_none_or(|s| s.trim().is_empty())
}

fn text_matches(
    entity: &Entity,
    needle_lower: &str,
    profile: &(impl SearchProfile + ?Sized),
) -> bool {
    if needle_lower.is_empty() {
        return true;
    }
    profile
        .searchable_fields(entity)
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle_lower))
}

fn equals_if_set(filter: Option<&str>, value: Option<&str>) -> bool {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        None => true,
        Some(f) => value == Some(f),
    }
}

fn flags_match(entity: &Entity, state: &FilterState) -> bool {
    if state.on_site_only && !matches!(&entity.attributes, Attributes::Listings(a) if a.on_site) {
        return false;
    }
    if state.fast_charger_only
        && !matches!(&entity.attributes, Attributes::Chargers(a) if a.is_fast())
    {
        return false;
    }
    if state.open_24h_only && !matches!(&entity.attributes, Attributes::Stations(a) if a.open_24h)
    {
        return false;
    }
    true
}

fn category_id_matches(entity: &Entity, wanted: Option<i64>) -> bool {
    let Some(wanted) = wanted else {
        return true;
    };
    matches!(&entity.attributes, Attributes::Listings(a) if a.category_id == Some(wanted))
}

fn venue_type_matches(entity: &Entity, wanted: Option<&str>) -> bool {
    let venue = match &entity.attributes {
        Attributes::Drives(a) => a.venue_type.as_deref(),
        _ => None,
    };
    equals_if_set(wanted, venue)
}

fn rating_matches(entity: &Entity, min: Option<f64>) -> bool {
    match min {
        None => true,
        Some(min) => entity.rating.is_some_and(|r| r >= min),
    }
}

/// Single-entity predicate; `needle_lower` is the already lowercased query.
fn matches_with_needle(
    entity: &Entity,
    state: &FilterState,
    needle_lower: &str,
    profile: &(impl SearchProfile + ?Sized),
) -> bool {
    text_matches(entity, needle_lower, profile)
        && category_id_matches(entity, state.category_id)
        && equals_if_set(state.city.as_deref(), entity.city.as_deref())
        && equals_if_set(state.district.as_deref(), entity.district.as_deref())
        && venue_type_matches(entity, state.venue_type.as_deref())
        && (state.brands.is_empty()
            || entity
                .brand
                .as_ref()
                .is_some_and(|b| state.brands.contains(b)))
        && state.tags.iter().all(|t| entity.has_tag(t))
        && flags_match(entity, state)
        && rating_matches(entity, state.min_rating)
}

pub fn entity_matches(
    entity: &Entity,
    state: &FilterState,
    profile: &(impl SearchProfile + ?Sized),
) -> bool {
    let needle = state.query.trim().to_lowercase();
    matches_with_needle(entity, state, &needle, profile)
}

/// Reduces a raw entity array to the entities passing `state`.
///
/// Ordering contract:
/// - Output preserves the relative order of `raw`.
pub fn filter_entities<'a>(
    raw: &'a [Entity],
    state: &FilterState,
    profile: &(impl SearchProfile + ?Sized),
) -> Vec<&'a Entity> {
    let needle = state.query.trim().to_lowercase();
    raw.iter()
        .filter(|e| matches_with_needle(e, state, &needle, profile))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{DefaultSearchProfile, FilterState, entity_matches, filter_entities};
    use crate::entity::{
        Attributes, Category, ChargerAttributes, Entity, ListingAttributes, StationAttributes,
    };
    use pretty_assertions::assert_eq;

    fn ids(entities: &[&Entity]) -> Vec<String> {
        entities.iter().map(|e| e.id.to_string()).collect()
    }

    fn listing(id: i64, name: &str, city: &str) -> Entity {
        Entity::of(Category::Listings, id, name).in_city(city)
    }

    #[test]
    fn default_state_is_identity() {
        let raw = vec![listing(1, "a", "Tbilisi"), listing(2, "b", "Batumi")];
        let state = FilterState::default();
        assert!(state.is_identity());
        assert_eq!(filter_entities(&raw, &state, &DefaultSearchProfile).len(), 2);
    }

    #[test]
    fn city_filter_keeps_matching_rows_in_order() {
        let cities = [
            "Tbilisi", "Batumi", "Tbilisi", "Kutaisi", "Tbilisi", "Tbilisi", "Rustavi",
            "Tbilisi", "Batumi", "Tbilisi",
        ];
        let raw: Vec<Entity> = cities
            .iter()
            .enumerate()
            .map(|(i, c)| listing(i as i64, "shop", c))
            .collect();
        let state = FilterState::new().with_city("Tbilisi");
        let out = filter_entities(&raw, &state, &DefaultSearchProfile);
        assert_eq!(ids(&out), vec!["0", "2", "4", "5", "7", "9"]);
    }

    #[test]
    fn text_search_is_case_insensitive_over_profile_fields() {
        let raw = vec![
            listing(1, "Brake Masters", "Tbilisi"),
            listing(2, "Tyre Shop", "Tbilisi").with_description("brakes and pads"),
            listing(3, "Oil Change", "Tbilisi").with_address("Brake st. 5"),
            listing(4, "Detailing", "Tbilisi"),
        ];
        let state = FilterState::new().with_query("  BRAKE ");
        let out = filter_entities(&raw, &state, &DefaultSearchProfile);
        assert_eq!(ids(&out), vec!["1", "2", "3"]);
    }

    #[test]
    fn blank_categorical_values_do_not_filter() {
        let raw = vec![listing(1, "a", "Tbilisi")];
        let mut state = FilterState::new().with_city("  ");
        state.district = Some(String::new());
        assert_eq!(filter_entities(&raw, &state, &DefaultSearchProfile).len(), 1);
    }

    #[test]
    fn rating_threshold_rejects_unrated() {
        let raw = vec![
            listing(1, "a", "x").with_rating(4.5),
            listing(2, "b", "x"),
            listing(3, "c", "x").with_rating(3.9),
        ];
        let state = FilterState::new().with_min_rating(4.0);
        let out = filter_entities(&raw, &state, &DefaultSearchProfile);
        assert_eq!(ids(&out), vec!["1"]);
    }

    #[test]
    fn malformed_rating_input_is_ignored() {
        let mut state = FilterState::new();
        state.set_min_rating_input("four");
        assert_eq!(state.min_rating, None);
        state.set_min_rating_input("NaN");
        assert_eq!(state.min_rating, None);
        state.set_min_rating_input(" 4.5 ");
        assert_eq!(state.min_rating, Some(4.5));
    }

    #[test]
    fn malformed_rating_json_is_coerced() {
        let s: FilterState = serde_json::from_str(r#"{"min_rating": "abc"}"#).unwrap();
        assert_eq!(s.min_rating, None);
        let s: FilterState = serde_json::from_str(r#"{"min_rating": [1, 2]}"#).unwrap();
        assert_eq!(s.min_rating, None);
        let s: FilterState = serde_json::from_str(r#"{"min_rating": "3.5"}"#).unwrap();
        assert_eq!(s.min_rating, Some(3.5));
        let s: FilterState = serde_json::from_str(r#"{"min_rating": 4}"#).unwrap();
        assert_eq!(s.min_rating, Some(4.0));
        let s: FilterState = serde_json::from_str(r#"{"min_rating": null}"#).unwrap();
        assert_eq!(s.min_rating, None);
    }

    #[test]
    fn flags_require_matching_attributes() {
        let on_site = Entity::new(
            1,
            "mobile",
            Attributes::Listings(ListingAttributes {
                on_site: true,
                ..Default::default()
            }),
        );
        let garage = Entity::of(Category::Listings, 2, "garage");
        let mut state = FilterState::new();
        state.on_site_only = true;
        assert!(entity_matches(&on_site, &state, &DefaultSearchProfile));
        assert!(!entity_matches(&garage, &state, &DefaultSearchProfile));

        let fast = Entity::new(
            3,
            "dc",
            Attributes::Chargers(ChargerAttributes {
                power_kw: Some(120.0),
            }),
        );
        let slow = Entity::new(4, "ac", Attributes::Chargers(ChargerAttributes { power_kw: Some(7.4) }));
        let mut state = FilterState::new();
        state.fast_charger_only = true;
        assert!(entity_matches(&fast, &state, &DefaultSearchProfile));
        assert!(!entity_matches(&slow, &state, &DefaultSearchProfile));

        let always_open = Entity::new(5, "gulf", Attributes::Stations(StationAttributes { open_24h: true }));
        let mut state = FilterState::new();
        state.open_24h_only = true;
        assert!(entity_matches(&always_open, &state, &DefaultSearchProfile));
    }

    #[test]
    fn brand_set_and_tags_are_membership_checks() {
        let raw = vec![
            Entity::of(Category::Stations, 1, "a")
                .with_brand("Gulf")
                .with_tags(["diesel", "lpg"]),
            Entity::of(Category::Stations, 2, "b")
                .with_brand("Rompetrol")
                .with_tags(["diesel"]),
            Entity::of(Category::Stations, 3, "c").with_tags(["diesel", "lpg"]),
        ];
        let mut state = FilterState::new();
        state.brands.insert("Gulf".into());
        state.brands.insert("Rompetrol".into());
        assert_eq!(ids(&filter_entities(&raw, &state, &DefaultSearchProfile)), vec!["1", "2"]);

        state.tags.insert("lpg".into());
        assert_eq!(ids(&filter_entities(&raw, &state, &DefaultSearchProfile)), vec!["1"]);
    }

    #[test]
    fn composition_is_conjunctive() {
        let e = listing(1, "Brake Masters", "Tbilisi").with_rating(4.8);
        let pass = FilterState::new()
            .with_query("brake")
            .with_city("Tbilisi")
            .with_min_rating(4.0);
        assert!(entity_matches(&e, &pass, &DefaultSearchProfile));

        // Failing any single predicate excludes the entity.
        for fail in [
            pass.clone().with_query("tyre"),
            pass.clone().with_city("Batumi"),
            pass.clone().with_min_rating(4.9),
        ] {
            assert!(!entity_matches(&e, &fail, &DefaultSearchProfile));
        }
    }
}
