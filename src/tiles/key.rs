//! Tile providers and tile addressing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::UnknownProvider;

/// A slippy-map imagery service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileProvider {
    OpenStreetMap,
    /// ArcGIS World Imagery
    Satellite,
    /// OpenTopoMap
    Terrain,
}

const SHARDS: [&str; 3] = ["a", "b", "c"];

impl TileProvider {
    pub const ALL: [TileProvider; 3] = [
        TileProvider::OpenStreetMap,
        TileProvider::Satellite,
        TileProvider::Terrain,
    ];

    /// Display name, also the provider's directory in the disk cache
    pub fn name(self) -> &'static str {
        match self {
            TileProvider::OpenStreetMap => "OpenStreetMap",
            TileProvider::Satellite => "Satellite",
            TileProvider::Terrain => "Terrain",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TileProvider::Satellite => "jpg",
            TileProvider::OpenStreetMap | TileProvider::Terrain => "png",
        }
    }

    pub fn url(self, zoom: u8, x: u32, y: u32) -> String {
        let shard = SHARDS[((x as u64 + y as u64) % SHARDS.len() as u64) as usize];
        match self {
            TileProvider::OpenStreetMap => {
                format!("https://{shard}.tile.openstreetmap.org/{zoom}/{x}/{y}.png")
            }
            TileProvider::Satellite => format!(
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{zoom}/{y}/{x}"
            ),
            TileProvider::Terrain => {
                format!("https://{shard}.tile.opentopomap.org/{zoom}/{x}/{y}.png")
            }
        }
    }
}

impl fmt::Display for TileProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TileProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "osm" | "openstreetmap" => Ok(TileProvider::OpenStreetMap),
            "satellite" | "arcgis" => Ok(TileProvider::Satellite),
            "terrain" | "opentopomap" => Ok(TileProvider::Terrain),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

/// Address of one tile. Keys are equal only if all four fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub provider: TileProvider,
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(provider: TileProvider, zoom: u8, x: u32, y: u32) -> Self {
        Self { provider, zoom, x, y }
    }

    pub fn url(&self) -> String {
        self.provider.url(self.zoom, self.x, self.y)
    }

    /// `<z>_<x>_<y>.<ext>`
    pub fn file_name(&self) -> String {
        format!("{}_{}_{}.{}", self.zoom, self.x, self.y, self.provider.extension())
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.provider, self.zoom, self.x, self.y)
    }
}
