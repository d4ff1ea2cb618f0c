//! Cache key construction and parsing
//!
//! Every cached entity is addressed by `<namespace>:<kind>[:<identifier>]`.
//! Keys are pure functions of their inputs, so identical inputs always map to
//! the same key. Multi-id keys join the ids in the order given, which means
//! permutations of the same id set are cached under different keys.

use std::fmt;
use std::str::FromStr;

use crate::constants::store::{ID_LIST_SEPARATOR, KEY_NAMESPACE, KEY_SEPARATOR};

/// Kind of entity stored under a cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// List of all catchment ids
    CatchmentIds,
    /// Metadata for one or more catchments
    CatchmentDetails,
    /// Station feature collection for a catchment
    CatchmentStations,
    /// Time series for a single station
    StationData,
    /// Aggregated stations-with-forecasts collection for a catchment
    CatchmentData,
}

impl EntityKind {
    /// Tag used in the key string
    pub fn tag(&self) -> &'static str {
        match self {
            EntityKind::CatchmentIds => "catchmentids",
            EntityKind::CatchmentDetails => "catchmentdetails",
            EntityKind::CatchmentStations => "catchmentstations",
            EntityKind::StationData => "stationsdata",
            EntityKind::CatchmentData => "catchmentdata",
        }
    }

    /// All kinds, in key-tag order
    pub fn all() -> [EntityKind; 5] {
        [
            EntityKind::CatchmentIds,
            EntityKind::CatchmentDetails,
            EntityKind::CatchmentStations,
            EntityKind::StationData,
            EntityKind::CatchmentData,
        ]
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::all()
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| format!("Unknown entity kind: {}", s))
    }
}

/// Fully qualified cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    kind: EntityKind,
    identifier: Option<String>,
}

impl CacheKey {
    /// Build a key in the default namespace
    pub fn new(kind: EntityKind, identifier: Option<String>) -> Self {
        Self::with_namespace(KEY_NAMESPACE, kind, identifier)
    }

    /// Build a key in a custom namespace
    pub fn with_namespace(
        namespace: impl Into<String>,
        kind: EntityKind,
        identifier: Option<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            identifier,
        }
    }

    /// Build a key whose identifier is a list of ids joined in the given order
    pub fn from_ids<S: AsRef<str>>(namespace: &str, kind: EntityKind, ids: &[S]) -> Self {
        let joined = ids
            .iter()
            .map(|id| id.as_ref())
            .collect::<Vec<_>>()
            .join(ID_LIST_SEPARATOR);
        Self::with_namespace(namespace, kind, Some(joined))
    }

    pub fn catchment_ids(namespace: &str) -> Self {
        Self::with_namespace(namespace, EntityKind::CatchmentIds, None)
    }

    pub fn catchment_details<S: AsRef<str>>(namespace: &str, ids: &[S]) -> Self {
        Self::from_ids(namespace, EntityKind::CatchmentDetails, ids)
    }

    pub fn catchment_stations(namespace: &str, catchment_id: &str) -> Self {
        Self::with_namespace(
            namespace,
            EntityKind::CatchmentStations,
            Some(catchment_id.to_string()),
        )
    }

    pub fn station_data(namespace: &str, station_path: &str) -> Self {
        Self::with_namespace(
            namespace,
            EntityKind::StationData,
            Some(station_path.to_string()),
        )
    }

    pub fn catchment_data(namespace: &str, catchment_id: &str) -> Self {
        Self::with_namespace(
            namespace,
            EntityKind::CatchmentData,
            Some(catchment_id.to_string()),
        )
    }

    /// Parse a raw key belonging to `namespace`
    ///
    /// Returns `None` for keys from other namespaces or with unknown kinds.
    /// The identifier is everything after the kind tag, so identifiers may
    /// themselves contain the separator.
    pub fn parse(namespace: &str, raw: &str) -> Option<Self> {
        let rest = raw
            .strip_prefix(namespace)?
            .strip_prefix(KEY_SEPARATOR)?;

        let (tag, identifier) = match rest.split_once(KEY_SEPARATOR) {
            Some((tag, id)) => (tag, Some(id.to_string())),
            None => (rest, None),
        };

        let kind = tag.parse().ok()?;
        Some(Self::with_namespace(namespace, kind, identifier))
    }

    /// Prefix shared by all keys of `kind` in `namespace`
    pub fn kind_prefix(namespace: &str, kind: EntityKind) -> String {
        format!("{}{}{}{}", namespace, KEY_SEPARATOR, kind.tag(), KEY_SEPARATOR)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Render the key string used by the store
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, KEY_SEPARATOR, self.kind.tag())?;
        if let Some(id) = &self.identifier {
            write!(f, "{}{}", KEY_SEPARATOR, id)?;
        }
        Ok(())
    }
}

/// Path identifying a station within its catchment (`catchmentId/stationId`)
pub fn station_path(catchment_id: &str, station_id: &str) -> String {
    format!("{}/{}", catchment_id, station_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout_per_kind() {
        assert_eq!(CacheKey::catchment_ids("mike").to_string(), "mike:catchmentids");
        assert_eq!(
            CacheKey::catchment_stations("mike", "42").to_string(),
            "mike:catchmentstations:42"
        );
        assert_eq!(
            CacheKey::station_data("mike", &station_path("42", "B")).to_string(),
            "mike:stationsdata:42/B"
        );
        assert_eq!(
            CacheKey::catchment_data("mike", "123").to_string(),
            "mike:catchmentdata:123"
        );
    }

    #[test]
    fn test_identical_inputs_produce_identical_keys() {
        let a = CacheKey::catchment_details("mike", &["1", "2", "3"]);
        let b = CacheKey::catchment_details("mike", &["1", "2", "3"]);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.to_string(), "mike:catchmentdetails:1$2$3");
    }

    #[test]
    fn test_multi_id_keys_are_order_sensitive() {
        let forward = CacheKey::catchment_details("mike", &["1", "2"]);
        let reversed = CacheKey::catchment_details("mike", &["2", "1"]);
        assert_ne!(forward.to_string(), reversed.to_string());
    }

    #[test]
    fn test_parse_round_trip() {
        let key = CacheKey::catchment_data("mike", "123");
        let parsed = CacheKey::parse("mike", &key.to_string()).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.identifier(), Some("123"));

        let ids = CacheKey::parse("mike", "mike:catchmentids").unwrap();
        assert_eq!(ids.kind(), EntityKind::CatchmentIds);
        assert_eq!(ids.identifier(), None);
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        assert!(CacheKey::parse("mike", "other:catchmentdata:1").is_none());
        assert!(CacheKey::parse("mike", "mikey:catchmentdata:1").is_none());
        assert!(CacheKey::parse("mike", "mike:unknown:1").is_none());
        assert!(CacheKey::parse("mike", "mike").is_none());
    }

    #[test]
    fn test_parse_keeps_separator_in_identifier() {
        let parsed = CacheKey::parse("mike", "mike:catchmentdata:a:b").unwrap();
        assert_eq!(parsed.identifier(), Some("a:b"));
    }

    #[test]
    fn test_kind_prefix() {
        assert_eq!(
            CacheKey::kind_prefix("mike", EntityKind::CatchmentData),
            "mike:catchmentdata:"
        );
    }
}
