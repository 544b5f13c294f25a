//! GeoJSON to projected features.

use super::simplify::simplify;
use super::types::{ProjectedFeature, ProjectedGeometry, Ring, Vertex};
use crate::compute::projection::{lat_y, lng_x};
use crate::compute::validation::validate_position;
use crate::config::TileOptions;
use crate::error::Result;
use geojson::feature::Id;
use geojson::{Feature, GeoJson, JsonObject, Value};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Project every feature of `data`, tagging vertices with simplification
/// weights for `options.max_zoom`.
///
/// Features without geometry or with empty coordinates are skipped; any
/// malformed position fails the whole conversion.
pub(crate) fn convert(data: &GeoJson, options: &TileOptions) -> Result<Vec<ProjectedFeature>> {
    let tolerance =
        options.tolerance / ((1u64 << options.max_zoom) as f64 * options.extent as f64);
    let converter = Converter {
        options,
        sq_tolerance: tolerance * tolerance,
    };

    let mut features = Vec::new();
    match data {
        GeoJson::FeatureCollection(collection) => {
            for (i, feature) in collection.features.iter().enumerate() {
                converter.feature(&mut features, feature, Some(i))?;
            }
        }
        GeoJson::Feature(feature) => converter.feature(&mut features, feature, None)?,
        GeoJson::Geometry(geometry) => {
            let tags = Arc::new(JsonObject::new());
            let id = converter.generated_id(None);
            converter.geometry(&mut features, &geometry.value, id, tags)?;
        }
    }

    Ok(features)
}

struct Converter<'a> {
    options: &'a TileOptions,
    sq_tolerance: f64,
}

impl Converter<'_> {
    fn feature(
        &self,
        out: &mut Vec<ProjectedFeature>,
        feature: &Feature,
        index: Option<usize>,
    ) -> Result<()> {
        let Some(geometry) = &feature.geometry else {
            return Ok(());
        };

        let id = if let Some(key) = &self.options.promote_id {
            feature
                .properties
                .as_ref()
                .and_then(|p| p.get(key))
                .and_then(json_to_id)
        } else if self.options.generate_id {
            self.generated_id(index)
        } else {
            feature.id.clone()
        };
        let tags = Arc::new(feature.properties.clone().unwrap_or_default());

        self.geometry(out, &geometry.value, id, tags)
    }

    fn generated_id(&self, index: Option<usize>) -> Option<Id> {
        self.options
            .generate_id
            .then(|| Id::Number(index.unwrap_or(0).into()))
    }

    fn geometry(
        &self,
        out: &mut Vec<ProjectedFeature>,
        value: &Value,
        id: Option<Id>,
        tags: Arc<JsonObject>,
    ) -> Result<()> {
        let geometry = match value {
            Value::Point(coords) => {
                if coords.is_empty() {
                    return Ok(());
                }
                ProjectedGeometry::Point(vec![project(coords)?])
            }
            Value::MultiPoint(coords) => {
                if coords.is_empty() {
                    return Ok(());
                }
                let points = coords.iter().map(|c| project(c)).collect::<Result<_>>()?;
                ProjectedGeometry::MultiPoint(points)
            }
            Value::LineString(coords) => {
                if coords.is_empty() {
                    return Ok(());
                }
                ProjectedGeometry::LineString(self.line(coords, false)?)
            }
            Value::MultiLineString(lines) => {
                if lines.is_empty() {
                    return Ok(());
                }
                if self.options.line_metrics {
                    // Each part keeps its own length for clip metrics
                    for line in lines {
                        let geometry = ProjectedGeometry::LineString(self.line(line, false)?);
                        out.push(ProjectedFeature::new(id.clone(), geometry, tags.clone()));
                    }
                    return Ok(());
                }
                ProjectedGeometry::MultiLineString(self.lines(lines, false)?)
            }
            Value::Polygon(rings) => {
                if rings.is_empty() {
                    return Ok(());
                }
                ProjectedGeometry::Polygon(self.lines(rings, true)?)
            }
            Value::MultiPolygon(polygons) => {
                if polygons.is_empty() {
                    return Ok(());
                }
                let polygons = polygons
                    .iter()
                    .map(|rings| self.lines(rings, true))
                    .collect::<Result<_>>()?;
                ProjectedGeometry::MultiPolygon(polygons)
            }
            Value::GeometryCollection(geometries) => {
                for geometry in geometries {
                    self.geometry(out, &geometry.value, id.clone(), tags.clone())?;
                }
                return Ok(());
            }
        };

        out.push(ProjectedFeature::new(id, geometry, tags));
        Ok(())
    }

    fn lines(&self, lines: &[Vec<Vec<f64>>], is_polygon: bool) -> Result<Vec<Ring>> {
        lines.iter().map(|line| self.line(line, is_polygon)).collect()
    }

    /// Project a line or ring and measure it: length for lines, absolute
    /// shoelace area for polygon rings.
    fn line(&self, coords: &[Vec<f64>], is_polygon: bool) -> Result<Ring> {
        let mut points = Vec::with_capacity(coords.len());
        let mut size = 0.0;
        let (mut x0, mut y0) = (0.0, 0.0);

        for (j, position) in coords.iter().enumerate() {
            let Vertex { x, y, .. } = project(position)?;
            points.push(Vertex::new(x, y, 0.0));

            if j > 0 {
                if is_polygon {
                    size += (x0 * y - x * y0) / 2.0;
                } else {
                    size += ((x - x0).powi(2) + (y - y0).powi(2)).sqrt();
                }
            }
            x0 = x;
            y0 = y;
        }

        if let Some(last) = points.len().checked_sub(1) {
            points[0].z = 1.0;
            simplify(&mut points, 0, last, self.sq_tolerance);
            points[last].z = 1.0;
        }

        let size = size.abs();
        Ok(Ring {
            points,
            size,
            start: 0.0,
            end: size,
        })
    }
}

fn project(position: &[f64]) -> Result<Vertex> {
    let (lng, lat) = validate_position(position)?;
    Ok(Vertex::new(lng_x(lng), lat_y(lat), 0.0))
}

fn json_to_id(value: &JsonValue) -> Option<Id> {
    match value {
        JsonValue::Number(n) => Some(Id::Number(n.clone())),
        JsonValue::String(s) => Some(Id::String(s.clone())),
        _ => None,
    }
}
