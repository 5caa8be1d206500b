//! Domain data structures for positions, receptacles, viewers, and view state.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres, used for great-circle distances.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// A WGS84 coordinate pair.
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Position {
    /// Construct a position from latitude and longitude in degrees.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both coordinates are finite and inside the WGS84 ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` in metres (haversine).
    #[must_use]
    pub fn distance_m(&self, other: &Self) -> f64 {
        let lat_a = self.latitude.to_radians();
        let lat_b = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lng = (other.longitude - self.longitude).to_radians();

        let half_chord = (delta_lat / 2.0).sin().powi(2)
            + lat_a.cos() * lat_b.cos() * (delta_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * half_chord.sqrt().atan2((1.0 - half_chord).sqrt())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{},{}", self.latitude, self.longitude)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors produced when parsing a `"<latitude>,<longitude>"` string.
pub enum ParsePositionError {
    /// The input is not two comma separated values.
    #[error("expected \"<latitude>,<longitude>\"")]
    Format,
    /// One of the coordinates is not a number.
    #[error("invalid coordinate: {0}")]
    Number(String),
    /// The coordinates are outside the WGS84 ranges.
    #[error("coordinates out of range")]
    OutOfRange,
}

impl FromStr for Position {
    type Err = ParsePositionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (latitude, longitude) = raw.trim().split_once(',').ok_or(ParsePositionError::Format)?;
        let position = Self::new(parse_coordinate(latitude)?, parse_coordinate(longitude)?);
        if position.is_valid() {
            Ok(position)
        } else {
            Err(ParsePositionError::OutOfRange)
        }
    }
}

fn parse_coordinate(raw: &str) -> Result<f64, ParsePositionError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .map_err(|err| ParsePositionError::Number(format!("{trimmed}: {err}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a receptacle as assigned by the receptacle service.
pub struct ReceptacleId(pub u64);

impl fmt::Display for ReceptacleId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Identifier of a community member.
pub struct MemberId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>")]
/// Kind of waste a receptacle accepts.
pub enum CanType {
    /// General waste.
    #[default]
    General,
    /// Recyclables.
    Recyclable,
}

impl CanType {
    /// Map a service label to a can type. Anything not recognised as
    /// recyclable is a general waste bin.
    #[must_use]
    pub fn from_label(raw: &str) -> Self {
        let label = raw.trim();
        if label == "재활용" || label.eq_ignore_ascii_case("recyclable") {
            Self::Recyclable
        } else {
            Self::General
        }
    }
}

impl From<Option<String>> for CanType {
    fn from(raw: Option<String>) -> Self {
        raw.as_deref().map_or(Self::General, Self::from_label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Why a record cannot be shown on the map.
pub enum InvalidRecord {
    /// Latitude or longitude is absent.
    MissingCoordinates,
    /// Coordinates are present but not a usable WGS84 position.
    CoordinatesOutOfRange,
}

impl fmt::Display for InvalidRecord {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::MissingCoordinates => "missing coordinates",
            Self::CoordinatesOutOfRange => "coordinates out of range",
        };
        write!(formatter, "{reason}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Receptacle as returned by the receptacle service. Read-only input to the map view.
pub struct ReceptacleRecord {
    /// Service-assigned identifier.
    #[serde(alias = "trashCanId")]
    pub id: ReceptacleId,
    /// Latitude in degrees, if the service knows it.
    #[serde(default, alias = "Latitude")]
    pub latitude: Option<f64>,
    /// Longitude in degrees, if the service knows it.
    #[serde(default, alias = "Longitude")]
    pub longitude: Option<f64>,
    /// Accepted waste kind; selects the marker style.
    #[serde(default, rename = "canType", alias = "can_type")]
    pub can_type: CanType,
    /// Street address or landmark.
    #[serde(default)]
    pub address: Option<String>,
    /// Free text left by the reporter.
    #[serde(default)]
    pub description: Option<String>,
    /// Member who reported the receptacle.
    #[serde(default, alias = "memberId")]
    pub member_id: Option<MemberId>,
    /// When the receptacle was reported.
    #[serde(default, alias = "createdAt")]
    pub created_at: Option<NaiveDateTime>,
}

impl ReceptacleRecord {
    /// Minimal record at the given coordinates.
    #[must_use]
    pub fn new(id: u64, can_type: CanType, latitude: f64, longitude: f64) -> Self {
        Self {
            id: ReceptacleId(id),
            latitude: Some(latitude),
            longitude: Some(longitude),
            can_type,
            address: None,
            description: None,
            member_id: None,
            created_at: None,
        }
    }

    /// The map position of this record.
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidRecord`] reason when the coordinates are missing or unusable.
    pub fn position(&self) -> Result<Position, InvalidRecord> {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(InvalidRecord::MissingCoordinates);
        };
        let position = Position::new(latitude, longitude);
        if position.is_valid() {
            Ok(position)
        } else {
            Err(InvalidRecord::CoordinatesOutOfRange)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// The authenticated identity looking at the map, if any.
pub struct Viewer {
    /// Member id of the signed-in user; `None` when anonymous.
    pub member_id: Option<MemberId>,
}

impl Viewer {
    /// A viewer that is not signed in.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { member_id: None }
    }

    /// A signed-in member.
    #[must_use]
    pub const fn member(id: MemberId) -> Self {
        Self {
            member_id: Some(id),
        }
    }

    /// Whether the viewer is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.member_id.is_some()
    }

    /// Whether the viewer reported `record`.
    #[must_use]
    pub fn owns(&self, record: &ReceptacleRecord) -> bool {
        matches!((self.member_id, record.member_id), (Some(viewer), Some(owner)) if viewer == owner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Opaque handle of a map instantiated by a map SDK.
pub struct MapHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Opaque handle of a marker placed by a map SDK.
pub struct MarkerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// What the map view is currently showing.
pub enum ViewState {
    /// Waiting for the location and receptacle list.
    Loading,
    /// Map and markers are on screen.
    Ready,
    /// Location could not be acquired; the GPS prompt is shown.
    LocationError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_position_text() {
        let position: Position = " 37.5, 127.03 ".parse().expect("valid position");
        assert_eq!(position, Position::new(37.5, 127.03));
        assert_eq!("37.5".parse::<Position>(), Err(ParsePositionError::Format));
        assert_eq!("91,0".parse::<Position>(), Err(ParsePositionError::OutOfRange));
        assert!(matches!(
            "north,0".parse::<Position>(),
            Err(ParsePositionError::Number(_))
        ));
    }

    #[test]
    fn distance_between_nearby_points() {
        let gangnam = Position::new(37.4979, 127.0276);
        let nearby = Position::new(37.5079, 127.0276);
        let distance = gangnam.distance_m(&nearby);
        assert!((distance - 1_112.0).abs() < 5.0, "got {distance}");
        assert!(gangnam.distance_m(&gangnam).abs() < f64::EPSILON);
    }

    #[test]
    fn decodes_service_payload() {
        let payload = r#"[
            {"trashCanId": 7, "Latitude": 37.501, "Longitude": 127.031, "canType": "재활용",
             "address": "Gangnam station exit 2", "memberId": 3,
             "createdAt": "2023-05-01T12:34:56.789"},
            {"id": 8, "latitude": null, "longitude": 127.0, "canType": "일반"}
        ]"#;
        let records: Vec<ReceptacleRecord> = serde_json::from_str(payload).expect("valid payload");

        let first = records.first().expect("first record");
        assert_eq!(first.id, ReceptacleId(7));
        assert_eq!(first.can_type, CanType::Recyclable);
        assert_eq!(first.member_id, Some(MemberId(3)));
        assert!(first.created_at.is_some());
        assert_eq!(first.position(), Ok(Position::new(37.501, 127.031)));

        let second = records.get(1).expect("second record");
        assert_eq!(second.can_type, CanType::General);
        assert_eq!(second.position(), Err(InvalidRecord::MissingCoordinates));
    }

    #[test]
    fn null_or_missing_can_type_is_general() {
        let payload = r#"[
            {"id": 1, "latitude": 37.5, "longitude": 127.0, "canType": "재활용"},
            {"id": 2, "latitude": 37.5, "longitude": 127.0, "canType": null},
            {"id": 3, "latitude": 37.5, "longitude": 127.0}
        ]"#;
        let records: Vec<ReceptacleRecord> = serde_json::from_str(payload).expect("valid payload");

        let types: Vec<CanType> = records.iter().map(|record| record.can_type).collect();
        assert_eq!(types, vec![CanType::Recyclable, CanType::General, CanType::General]);
    }

    #[test]
    fn can_type_labels() {
        assert_eq!(CanType::from_label("RECYCLABLE"), CanType::Recyclable);
        assert_eq!(CanType::from_label(" 재활용 "), CanType::Recyclable);
        assert_eq!(CanType::from_label("GENERAL"), CanType::General);
        assert_eq!(CanType::from_label("something else"), CanType::General);
    }

    #[test]
    fn out_of_range_coordinates_are_invalid() {
        let record = ReceptacleRecord::new(1, CanType::General, 137.0, 127.0);
        assert_eq!(record.position(), Err(InvalidRecord::CoordinatesOutOfRange));
        let record = ReceptacleRecord::new(2, CanType::General, f64::NAN, 127.0);
        assert_eq!(record.position(), Err(InvalidRecord::CoordinatesOutOfRange));
    }

    #[test]
    fn viewer_ownership() {
        let mut record = ReceptacleRecord::new(1, CanType::General, 37.5, 127.0);
        assert!(!Viewer::anonymous().owns(&record));
        assert!(!Viewer::member(MemberId(4)).owns(&record));

        record.member_id = Some(MemberId(4));
        assert!(Viewer::member(MemberId(4)).owns(&record));
        assert!(!Viewer::member(MemberId(5)).owns(&record));
        assert!(!Viewer::anonymous().owns(&record));
    }
}
