//! Error types with rich diagnostics using miette
//!
//! AUSTAL parse errors carry source spans; the rest carry enough context to
//! be shown in a status bar.

use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::building::ShapeKind;
use crate::types::NumericError;

/// Source context for error reporting
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// Name of the source (filename or "<input>")
    pub name: String,
    /// The full source text
    pub source: String,
}

impl SourceContext {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Create a NamedSource for miette
    pub fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.source.clone())
    }
}

// ============================================================================
// Coordinate Errors
// ============================================================================

/// Input outside the domain of the Web Mercator projection
#[derive(Error, Diagnostic, Debug, Clone, Copy, PartialEq)]
pub enum DomainError {
    #[error("latitude {lat} is outside the projectable range")]
    #[diagnostic(
        code(citysketch::geo::latitude_out_of_range),
        help("Web Mercator is only defined for latitudes strictly between -85.05 and 85.05")
    )]
    LatitudeOutOfRange { lat: f64 },

    #[error("coordinate is NaN or infinite")]
    #[diagnostic(code(citysketch::geo::non_finite))]
    NonFinite,
}

// ============================================================================
// Geometry Errors
// ============================================================================

/// Errors from editing a building footprint
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("{operation} is not supported on {shape} buildings")]
    #[diagnostic(code(citysketch::geometry::unsupported))]
    Unsupported {
        operation: &'static str,
        shape: ShapeKind,
    },

    #[error("corner {index} cannot be dragged")]
    #[diagnostic(
        code(citysketch::geometry::invalid_corner),
        help("corners 1 to {count_minus_one} can be dragged; corner 0 is the anchor")
    )]
    InvalidCorner { index: usize, count_minus_one: usize },

    #[error("point is NaN or infinite")]
    #[diagnostic(code(citysketch::geometry::non_finite))]
    NonFinite,

    #[error("polygon has no vertices")]
    #[diagnostic(code(citysketch::geometry::empty_polygon))]
    EmptyPolygon,

    #[error("invalid dimension: {0}")]
    #[diagnostic(code(citysketch::geometry::invalid_dimension))]
    InvalidDimension(#[from] NumericError),
}

// ============================================================================
// Project Errors
// ============================================================================

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ProjectError {
    #[error("a building with id {id} already exists")]
    #[diagnostic(code(citysketch::project::duplicate_id))]
    DuplicateId { id: String },

    #[error("no building with id {id}")]
    #[diagnostic(code(citysketch::project::unknown_building))]
    UnknownBuilding { id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),
}

// ============================================================================
// Record Errors
// ============================================================================

/// Errors converting between [`crate::building::BuildingRecord`] and buildings
#[derive(Error, Diagnostic, Debug)]
pub enum RecordError {
    #[error("malformed building record: {0}")]
    #[diagnostic(code(citysketch::record::json))]
    Json(#[from] serde_json::Error),

    #[error("field `{field}` of building {id} is invalid: {source}")]
    #[diagnostic(code(citysketch::record::invalid_field))]
    InvalidField {
        id: String,
        field: &'static str,
        source: NumericError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Geometry(#[from] GeometryError),
}

// ============================================================================
// AUSTAL Errors
// ============================================================================

/// Errors reading or writing `austal.txt`
#[derive(Error, Diagnostic, Debug)]
pub enum AustalError {
    #[error("syntax error: {message}")]
    #[diagnostic(code(citysketch::austal::syntax))]
    Syntax {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("building keywords have different lengths")]
    #[diagnostic(
        code(citysketch::austal::ragged_building_lists),
        help("xb, yb, ab, bb and cb must list the same number of values")
    )]
    RaggedBuildingLists,

    #[error("keyword `{key}` expects numbers")]
    #[diagnostic(code(citysketch::austal::not_numeric))]
    NotNumeric { key: String },

    #[error("keyword `{key}` expects {expected} values, found {found}")]
    #[diagnostic(code(citysketch::austal::wrong_arity))]
    WrongArity {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("building {index} is invalid")]
    #[diagnostic(code(citysketch::austal::invalid_building))]
    InvalidBuilding {
        index: usize,
        #[source]
        source: GeometryError,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Domain(#[from] DomainError),

    #[error("failed to access {}", path.display())]
    #[diagnostic(code(citysketch::austal::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Tile Errors
// ============================================================================

/// Why a tile could not be produced. Recorded against the key, never
/// returned from [`crate::tiles::TileCache::get`].
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("server answered {status} for {url}")]
    #[diagnostic(code(citysketch::tiles::http_status))]
    Http { status: u16, url: String },

    #[error("request to {url} failed: {message}")]
    #[diagnostic(code(citysketch::tiles::network))]
    Network { url: String, message: String },

    #[error("request to {url} timed out")]
    #[diagnostic(code(citysketch::tiles::timeout))]
    Timeout { url: String },

    #[error("tile image could not be decoded: {0}")]
    #[diagnostic(code(citysketch::tiles::decode))]
    Decode(String),

    #[error("tile cache is shut down")]
    #[diagnostic(code(citysketch::tiles::shut_down))]
    ShutDown,
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
#[error("unknown tile provider: {0}")]
#[diagnostic(
    code(citysketch::tiles::unknown_provider),
    help("use one of: osm, satellite, terrain")
)]
pub struct UnknownProvider(pub String);

/// Errors building a [`crate::tiles::TileCache`]
#[derive(Error, Diagnostic, Debug)]
pub enum CacheError {
    #[error("cache directory {} is not usable", path.display())]
    #[diagnostic(code(citysketch::tiles::cache_dir))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start tile worker")]
    #[diagnostic(code(citysketch::tiles::spawn))]
    Spawn(#[source] std::io::Error),

    #[error("failed to build HTTP client: {0}")]
    #[diagnostic(code(citysketch::tiles::http_client))]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic;

    #[test]
    fn diagnostic_codes_are_namespaced() {
        let err = DomainError::LatitudeOutOfRange { lat: 86.0 };
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("citysketch::geo::latitude_out_of_range"));
    }

    #[test]
    fn invalid_corner_help_names_range() {
        let err = GeometryError::InvalidCorner {
            index: 0,
            count_minus_one: 3,
        };
        let help = err.help().map(|h| h.to_string());
        assert_eq!(
            help.as_deref(),
            Some("corners 1 to 3 can be dragged; corner 0 is the anchor")
        );
    }

    #[test]
    fn project_error_wraps_geometry() {
        let err: ProjectError = GeometryError::NonFinite.into();
        assert_eq!(err.to_string(), "point is NaN or infinite");
    }
}
