//! Flat building record exchanged with file-format serializers.

use serde::{Deserialize, Deserializer, Serialize};

use super::{Building, BuildingId, Footprint, RectFootprint};
use crate::errors::RecordError;
use crate::types::{Meters, NumericError, wpt};

/// One building as written to and read from project files.
///
/// Numbers are accepted either as JSON numbers or as numeric strings. Round
/// buildings are written as their axis-aligned bounding square.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub x1: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub y1: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub a: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub b: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: f64,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub storeys: u32,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub rotation: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn into_f64(self) -> Result<f64, String> {
        match self {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("expected a number, found {s:?}")),
        }
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    NumberOrText::deserialize(d)?
        .into_f64()
        .map_err(serde::de::Error::custom)
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let n = NumberOrText::deserialize(d)?
        .into_f64()
        .map_err(serde::de::Error::custom)?;
    if n.is_finite() && n >= 0.0 && n <= u32::MAX as f64 {
        Ok(n.round() as u32)
    } else {
        Err(serde::de::Error::custom(format!("{n} is not a storey count")))
    }
}

impl BuildingRecord {
    pub fn list_from_json(json: &str) -> Result<Vec<BuildingRecord>, RecordError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn list_to_json(records: &[BuildingRecord]) -> Result<String, RecordError> {
        Ok(serde_json::to_string_pretty(records)?)
    }
}

impl From<&Building> for BuildingRecord {
    fn from(building: &Building) -> Self {
        let anchor = building.anchor();
        let (x1, y1, a, b, rotation) = match building.footprint() {
            Footprint::Rectangular(r) => (
                anchor.x.raw(),
                anchor.y.raw(),
                r.a().raw(),
                r.b().raw(),
                r.rotation(),
            ),
            Footprint::Round(r) => {
                let r = r.radius().raw();
                (anchor.x.raw() - r, anchor.y.raw() - r, 2.0 * r, 2.0 * r, 0.0)
            }
        };
        Self {
            id: Some(building.id().to_string()),
            x1,
            y1,
            a,
            b,
            height: building.height().raw(),
            storeys: building.storeys(),
            rotation,
        }
    }
}

impl TryFrom<BuildingRecord> for Building {
    type Error = RecordError;

    fn try_from(record: BuildingRecord) -> Result<Self, RecordError> {
        let id = record.id.unwrap_or_else(|| BuildingId::generate().to_string());
        let field = |field: &'static str, value: Result<Meters, NumericError>| {
            value.map_err(|source| RecordError::InvalidField {
                id: id.clone(),
                field,
                source,
            })
        };
        let x1 = field("x1", Meters::try_new(record.x1))?;
        let y1 = field("y1", Meters::try_new(record.y1))?;
        let a = field("a", Meters::try_new(record.a))?;
        let b = field("b", Meters::try_new(record.b))?;
        let height = field("height", Meters::try_non_negative(record.height))?;

        let footprint = RectFootprint::new(a, b, record.rotation)?;
        let mut building = Building::new(wpt(x1.raw(), y1.raw()), footprint.into())?.with_id(id);
        building.storeys = record.storeys;
        building.height = height;
        Ok(building)
    }
}
