//! Basin geometry: projection, area and point sampling.
//!
//! Boundaries arrive from NLDI in WGS84 longitude/latitude. Area is measured
//! on the CONUS Albers equal-area projection (EPSG:5070 parameters on the
//! GRS80 ellipsoid), and raster reductions sample the basin on a regular
//! longitude/latitude lattice clipped to the polygon.

use std::f64::consts::PI;

use geo::{Area, BoundingRect, Centroid, Contains, Coord, InteriorPoint, MapCoords, MultiPolygon, Point, Rect};
use proj4rs::proj::Proj;
use thiserror::Error;

const TO_RAD: f64 = PI / 180.0;

/// Approximate metres per degree of latitude.
const METRES_PER_DEG_LAT: f64 = 110_574.0;
/// Approximate metres per degree of longitude at the equator.
const METRES_PER_DEG_LON: f64 = 111_320.0;

const GEOGRAPHIC: &str = "+proj=longlat +ellps=GRS80 +no_defs";
/// EPSG:5070, NAD83 / Conus Albers.
const CONUS_ALBERS: &str =
    "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +ellps=GRS80 +units=m +no_defs";

/// MODIS land grid and geographic coordinates on its sphere.
const MODIS_SINUSOIDAL: &str = "+proj=sinu +lon_0=0 +x_0=0 +y_0=0 +R=6371007.181 +units=m +no_defs";
const MODIS_GEOGRAPHIC: &str = "+proj=longlat +R=6371007.181 +no_defs";

/// Upper bound on lattice cells visited while building a sample grid.
const MAX_LATTICE_CELLS: usize = 250_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("basin boundary contains no polygons")]
    Empty,
    #[error("basin boundary has zero area")]
    Degenerate,
    #[error("projection failed: {0}")]
    Projection(String),
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

/// Coordinate transform between two proj strings.
///
/// Geographic coordinates are taken and returned in degrees.
pub struct Projector {
    from: Proj,
    to: Proj,
    from_geographic: bool,
    to_geographic: bool,
}

impl Projector {
    fn new(from: &str, to: &str, from_geographic: bool, to_geographic: bool) -> Result<Self, GeometryError> {
        let build = |definition: &str| {
            Proj::from_proj_string(definition).map_err(|e| GeometryError::Projection(format!("{}: {}", definition, e)))
        };
        Ok(Self { from: build(from)?, to: build(to)?, from_geographic, to_geographic })
    }

    /// Longitude/latitude to CONUS Albers metres.
    pub fn conus_albers() -> Result<Self, GeometryError> {
        Self::new(GEOGRAPHIC, CONUS_ALBERS, true, false)
    }

    /// MODIS sinusoidal metres to longitude/latitude.
    pub fn modis_inverse() -> Result<Self, GeometryError> {
        Self::new(MODIS_SINUSOIDAL, MODIS_GEOGRAPHIC, false, true)
    }

    pub fn apply(&self, c: Coord<f64>) -> Result<Coord<f64>, GeometryError> {
        let mut point = if self.from_geographic {
            (c.x.to_radians(), c.y.to_radians(), 0.0)
        } else {
            (c.x, c.y, 0.0)
        };
        proj4rs::transform::transform(&self.from, &self.to, &mut point)
            .map_err(|e| GeometryError::Projection(format!("({}, {}): {}", c.x, c.y, e)))?;
        Ok(if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }
}

// ---------------------------------------------------------------------------
// Basin geometry
// ---------------------------------------------------------------------------

/// Drainage-basin boundary owned by one extraction run.
#[derive(Debug, Clone)]
pub struct BasinGeometry {
    boundary: MultiPolygon<f64>,
    area_km2: f64,
}

impl BasinGeometry {
    pub fn new(boundary: MultiPolygon<f64>) -> Result<Self, GeometryError> {
        if boundary.0.is_empty() {
            return Err(GeometryError::Empty);
        }
        let albers = Projector::conus_albers()?;
        let projected = boundary.try_map_coords(|c| albers.apply(c))?;
        let area_km2 = projected.unsigned_area() / 1.0e6;
        if !(area_km2 > 0.0) {
            return Err(GeometryError::Degenerate);
        }
        Ok(Self { boundary, area_km2 })
    }

    /// WGS84 boundary.
    pub fn boundary(&self) -> &MultiPolygon<f64> {
        &self.boundary
    }

    pub fn area_km2(&self) -> f64 {
        self.area_km2
    }

    pub fn bounds(&self) -> Rect<f64> {
        // non-empty, non-degenerate by construction
        self.boundary
            .bounding_rect()
            .unwrap_or_else(|| Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 0.0, y: 0.0 }))
    }

    /// Centroid of the boundary; falls back to an interior point for
    /// shapes whose centroid cannot be computed.
    pub fn centroid(&self) -> Point<f64> {
        self.boundary
            .centroid()
            .or_else(|| self.boundary.interior_point())
            .unwrap_or_else(|| self.bounds().center().into())
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.boundary.contains(&Point::new(lon, lat))
    }

    /// Half extents of the bounding box around the centroid, in kilometres,
    /// as (north-south, east-west).
    pub fn half_extent_km(&self) -> (f64, f64) {
        let b = self.bounds();
        let c = self.centroid();
        let ns = (b.max().y - c.y()).abs().max((c.y() - b.min().y).abs()) * METRES_PER_DEG_LAT;
        let ew = (b.max().x - c.x()).abs().max((c.x() - b.min().x).abs())
            * METRES_PER_DEG_LON
            * (c.y() * TO_RAD).cos();
        (ns / 1000.0, ew / 1000.0)
    }
}

// ---------------------------------------------------------------------------
// Sample lattice
// ---------------------------------------------------------------------------

/// Regular longitude/latitude lattice clipped to a basin.
///
/// `points` holds the cell centres that fall inside the basin; `index` maps
/// every lattice cell (row-major, row 0 at the south edge) to its position
/// in `points`.
#[derive(Debug, Clone)]
pub struct SampleGrid {
    origin: Coord<f64>,
    step: f64,
    nrows: usize,
    ncols: usize,
    index: Vec<Option<usize>>,
    points: Vec<Coord<f64>>,
}

impl SampleGrid {
    /// Builds a lattice whose cell size puts roughly `target_points`
    /// centres inside the basin.
    pub fn over(basin: &BasinGeometry, target_points: usize) -> Self {
        let bounds = basin.bounds();
        let target = target_points.max(1) as f64;
        let width = bounds.width();
        let height = bounds.height();

        let mut step = (basin.boundary().unsigned_area() / target).sqrt();
        if !(step > 0.0) || !step.is_finite() {
            return Self::single(basin);
        }
        let dims = |step: f64| {
            (
                ((height / step).ceil() as usize).max(1),
                ((width / step).ceil() as usize).max(1),
            )
        };
        let (mut nrows, mut ncols) = dims(step);
        while nrows * ncols > MAX_LATTICE_CELLS {
            step *= 1.5;
            (nrows, ncols) = dims(step);
        }

        let origin = Coord { x: bounds.min().x + step / 2.0, y: bounds.min().y + step / 2.0 };
        let mut index = vec![None; nrows * ncols];
        let mut points = Vec::new();
        for row in 0..nrows {
            for col in 0..ncols {
                let c = Coord { x: origin.x + col as f64 * step, y: origin.y + row as f64 * step };
                if basin.contains(c.x, c.y) {
                    index[row * ncols + col] = Some(points.len());
                    points.push(c);
                }
            }
        }

        if points.is_empty() {
            return Self::single(basin);
        }
        Self { origin, step, nrows, ncols, index, points }
    }

    fn single(basin: &BasinGeometry) -> Self {
        let p = basin.boundary().interior_point().unwrap_or_else(|| basin.centroid());
        Self {
            origin: p.0,
            step: 0.0,
            nrows: 1,
            ncols: 1,
            index: vec![Some(0)],
            points: vec![p.0],
        }
    }

    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Up to `n` points spread evenly through the interior points.
    pub fn spread(&self, n: usize) -> Vec<Coord<f64>> {
        let n = n.clamp(1, self.points.len());
        (0..n).map(|i| self.points[i * self.points.len() / n]).collect()
    }

    /// Mean terrain slope in m/km from values sampled at `points()`.
    ///
    /// Uses central differences where both neighbours are valid and
    /// one-sided differences at edges. Returns `None` when no cell has a
    /// valid neighbour.
    pub fn slope_mean(&self, values: &[Option<f64>]) -> Option<f64> {
        if self.step <= 0.0 || values.len() != self.points.len() {
            return None;
        }
        let lat_mid = self.origin.y + (self.nrows as f64 - 1.0) * self.step / 2.0;
        let dx = self.step * METRES_PER_DEG_LON * (lat_mid * TO_RAD).cos();
        let dy = self.step * METRES_PER_DEG_LAT;

        let at = |row: isize, col: isize| -> Option<f64> {
            if row < 0 || col < 0 || row as usize >= self.nrows || col as usize >= self.ncols {
                return None;
            }
            self.index[row as usize * self.ncols + col as usize].and_then(|i| values[i])
        };
        let gradient = |before: Option<f64>, here: f64, after: Option<f64>, spacing: f64| match (before, after) {
            (Some(b), Some(a)) => Some((a - b) / (2.0 * spacing)),
            (None, Some(a)) => Some((a - here) / spacing),
            (Some(b), None) => Some((here - b) / spacing),
            (None, None) => None,
        };

        let mut total = 0.0;
        let mut count = 0usize;
        for row in 0..self.nrows as isize {
            for col in 0..self.ncols as isize {
                let Some(z) = at(row, col) else { continue };
                let gx = gradient(at(row, col - 1), z, at(row, col + 1), dx);
                let gy = gradient(at(row - 1, col), z, at(row + 1, col), dy);
                if gx.is_none() && gy.is_none() {
                    continue;
                }
                total += gx.unwrap_or(0.0).hypot(gy.unwrap_or(0.0));
                count += 1;
            }
        }

        (count > 0).then(|| total / count as f64 * 1000.0)
    }
}
