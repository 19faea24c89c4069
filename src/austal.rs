//! Reading and writing the AUSTAL `austal.txt` keyword file.
//!
//! Only buildings and the geographic center are interpreted; every other
//! keyword is kept verbatim so a rewrite leaves the rest of the dispersion
//! model configuration alone.
//!
//! Buildings travel as axis-aligned boxes (`xb yb ab bb cb`), so exporting
//! drops rotation and replaces each footprint by its bounding box.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;

use crate::building::Building;
use crate::errors::{AustalError, SourceContext};
use crate::log::{debug, info, warn};
use crate::transform::geo_to_world;
use crate::types::{GeoPoint, Meters, WorldPt, wpt};
use crate::{AustalParser, Rule};

const CENTER_KEY: &str = "gg";
const BUILDING_KEYS: [&str; 5] = ["xb", "yb", "ab", "bb", "cb"];
const ROTATION_KEY: &str = "wb";

/// One value of a keyword line
#[derive(Debug, Clone, PartialEq)]
pub enum AustalValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for AustalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AustalValue::Number(n) => write!(f, "{n}"),
            AustalValue::Text(s) if s.is_empty() || s.contains(char::is_whitespace) => {
                write!(f, "\"{s}\"")
            }
            AustalValue::Text(s) => f.write_str(s),
        }
    }
}

/// A building as AUSTAL describes it: lower-left corner, extents, height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AustalBuilding {
    pub x: f64,
    pub y: f64,
    pub a: f64,
    pub b: f64,
    pub height: f64,
}

/// Parsed keyword file in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AustalFile {
    entries: Vec<(String, Vec<AustalValue>)>,
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push("~");
    PathBuf::from(name)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> AustalError + '_ {
    move |source| AustalError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl AustalFile {
    pub fn parse(name: &str, source: &str) -> Result<Self, AustalError> {
        let ctx = SourceContext::new(name, source);
        let pairs = AustalParser::parse(Rule::file, source).map_err(|e| {
            let (offset, len) = match e.location {
                InputLocation::Pos(p) => (p, 0),
                InputLocation::Span((start, end)) => (start, end - start),
            };
            AustalError::Syntax {
                message: e.variant.message().to_string(),
                src: ctx.named_source(),
                span: (offset, len).into(),
            }
        })?;

        let mut file = AustalFile::default();
        for pair in pairs.flatten().filter(|p| p.as_rule() == Rule::entry) {
            let (key, values) = parse_entry(pair);
            debug!(%key, count = values.len(), "austal entry");
            file.set(&key, values);
        }
        Ok(file)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self, AustalError> {
        let path = path.as_ref();
        info!(path = %path.display(), "reading austal file");
        let source = fs::read_to_string(path).map_err(io_error(path))?;
        Self::parse(&path.display().to_string(), &source)
    }

    /// Write the file, first moving an existing file at `path` to `path~`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), AustalError> {
        let path = path.as_ref();
        if path.exists() {
            let backup = backup_path(path);
            debug!(path = %backup.display(), "writing backup");
            fs::rename(path, &backup).map_err(io_error(&backup))?;
        }
        info!(path = %path.display(), "rewriting austal file");
        fs::write(path, self.to_text()).map_err(io_error(path))
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, values) in &self.entries {
            let values: Vec<String> = values.iter().map(ToString::to_string).collect();
            out.push_str(&format!("{key}  {}\n", values.join(" ")));
        }
        out
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, key: &str) -> Option<&[AustalValue]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// Replace the values of `key` in place, or append it.
    pub fn set(&mut self, key: &str, values: Vec<AustalValue>) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((key.to_string(), values)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Vec<AustalValue>> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Values of `key` as numbers; `None` when the keyword is absent.
    pub fn numbers(&self, key: &str) -> Result<Option<Vec<f64>>, AustalError> {
        let Some(values) = self.get(key) else {
            return Ok(None);
        };
        values
            .iter()
            .map(|v| match v {
                AustalValue::Number(n) => Ok(*n),
                AustalValue::Text(_) => Err(AustalError::NotNumeric { key: key.to_string() }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// The geographic center from `gg lat lon`
    pub fn center(&self) -> Result<Option<GeoPoint>, AustalError> {
        match self.numbers(CENTER_KEY)? {
            None => Ok(None),
            Some(v) if v.len() == 2 => Ok(Some(GeoPoint::new(v[0], v[1]))),
            Some(v) => Err(AustalError::WrongArity {
                key: CENTER_KEY.to_string(),
                expected: 2,
                found: v.len(),
            }),
        }
    }

    pub fn set_center(&mut self, center: GeoPoint) {
        self.set(
            CENTER_KEY,
            vec![AustalValue::Number(center.lat), AustalValue::Number(center.lon)],
        );
    }

    pub fn buildings(&self) -> Result<Vec<AustalBuilding>, AustalError> {
        let mut columns = Vec::with_capacity(BUILDING_KEYS.len());
        for key in BUILDING_KEYS {
            columns.push(self.numbers(key)?.unwrap_or_default());
        }
        let n = columns[0].len();
        if columns.iter().any(|c| c.len() != n) {
            return Err(AustalError::RaggedBuildingLists);
        }
        if let Some(angles) = self.numbers(ROTATION_KEY)? {
            if angles.iter().any(|w| *w != 0.0) {
                warn!("austal building rotation (wb) is not supported and is ignored");
            }
        }
        Ok((0..n)
            .map(|i| AustalBuilding {
                x: columns[0][i],
                y: columns[1][i],
                a: columns[2][i],
                b: columns[3][i],
                height: columns[4][i],
            })
            .collect())
    }

    /// Replace the building keywords. Any `wb` line is dropped.
    pub fn set_buildings(&mut self, buildings: &[AustalBuilding]) {
        let fields: [fn(&AustalBuilding) -> f64; 5] =
            [|b| b.x, |b| b.y, |b| b.a, |b| b.b, |b| b.height];
        for (key, field) in BUILDING_KEYS.iter().zip(fields) {
            let values = buildings.iter().map(|b| AustalValue::Number(field(b))).collect();
            self.set(key, values);
        }
        self.remove(ROTATION_KEY);
    }
}

fn parse_entry(pair: Pair<Rule>) -> (String, Vec<AustalValue>) {
    let mut inner = pair.into_inner();
    let key = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();

    let mut quoted_any = false;
    let tokens: Vec<String> = inner
        .map(|p| match p.as_rule() {
            Rule::quoted => {
                quoted_any = true;
                let s = p.as_str();
                s[1..s.len() - 1].to_string()
            }
            _ => p.as_str().to_string(),
        })
        .collect();

    // a line is numeric only if every token is a number
    let numbers: Option<Vec<f64>> = if quoted_any {
        None
    } else {
        tokens.iter().map(|t| t.parse::<f64>().ok()).collect()
    };
    let values = match numbers {
        Some(ns) => ns.into_iter().map(AustalValue::Number).collect(),
        None => tokens.into_iter().map(AustalValue::Text).collect(),
    };
    (key, values)
}

fn round_mm(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// World offset of the file's center relative to `reference`. Without a
/// `gg` line the file is assumed to share the project origin.
fn center_offset(file: &AustalFile, reference: GeoPoint) -> Result<WorldPt, AustalError> {
    match file.center()? {
        Some(center) => Ok(geo_to_world(center, reference)?),
        None => Ok(wpt(0.0, 0.0)),
    }
}

/// Buildings of `file` in the world frame centered on `reference`. Storeys
/// are derived from the height, at least one.
pub fn import_buildings(
    file: &AustalFile,
    reference: GeoPoint,
    storey_height: Meters,
) -> Result<Vec<Building>, AustalError> {
    let offset = center_offset(file, reference)?;
    let mut buildings = Vec::new();
    for (index, ab) in file.buildings()?.into_iter().enumerate() {
        let (x1, x2) = (ab.x.min(ab.x + ab.a), ab.x.max(ab.x + ab.a));
        let (y1, y2) = (ab.y.min(ab.y + ab.b), ab.y.max(ab.y + ab.b));
        let anchor = wpt(x1 + offset.x.raw(), y1 + offset.y.raw());
        let invalid = |source| AustalError::InvalidBuilding { index, source };
        let building = Building::rectangular(anchor, Meters(x2 - x1), Meters(y2 - y1), 0.0)
            .and_then(|b| b.with_height(Meters(ab.height), storey_height))
            .map_err(invalid)?;
        buildings.push(building);
    }
    debug!(count = buildings.len(), "imported austal buildings");
    Ok(buildings)
}

/// The AUSTAL boxes of `buildings`: the axis-aligned bounding box of each
/// footprint relative to the file `center`, rounded to millimeters.
pub fn export_buildings(
    buildings: &[Building],
    reference: GeoPoint,
    center: GeoPoint,
) -> Result<Vec<AustalBuilding>, AustalError> {
    let offset = geo_to_world(center, reference)?;
    Ok(buildings
        .iter()
        .map(|b| {
            let bbox = b.bounding_box();
            AustalBuilding {
                x: round_mm(bbox.min.x.raw() - offset.x.raw()),
                y: round_mm(bbox.min.y.raw() - offset.y.raw()),
                a: round_mm(bbox.width().raw()),
                b: round_mm(bbox.height().raw()),
                height: round_mm(b.height().raw()),
            }
        })
        .collect())
}
