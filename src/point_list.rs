//! Growable list of 2D or 3D coordinates

/// Coordinates in degrees (and metres for elevation) stored column-wise
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointList {
    lat: Vec<f64>,
    lon: Vec<f64>,
    ele: Vec<f64>,
    is_3d: bool,
}

impl PointList {
    pub fn new(is_3d: bool) -> Self {
        Self::with_capacity(0, is_3d)
    }

    pub fn with_capacity(capacity: usize, is_3d: bool) -> Self {
        Self {
            lat: Vec::with_capacity(capacity),
            lon: Vec::with_capacity(capacity),
            ele: if is_3d {
                Vec::with_capacity(capacity)
            } else {
                Vec::new()
            },
            is_3d,
        }
    }

    /// 2D list from `(lat, lon)` pairs
    pub fn from_coords(coords: &[(f64, f64)]) -> Self {
        let mut list = Self::with_capacity(coords.len(), false);
        for &(lat, lon) in coords {
            list.add(lat, lon, f64::NAN);
        }
        list
    }

    pub fn is_3d(&self) -> bool {
        self.is_3d
    }

    pub fn len(&self) -> usize {
        self.lat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lat.is_empty()
    }

    /// Append a point; `ele` is ignored for 2D lists
    pub fn add(&mut self, lat: f64, lon: f64, ele: f64) {
        self.lat.push(lat);
        self.lon.push(lon);
        if self.is_3d {
            self.ele.push(ele);
        }
    }

    /// Append point `index` of `other`
    pub fn add_from(&mut self, other: &PointList, index: usize) {
        self.add(other.lat(index), other.lon(index), other.ele(index));
    }

    pub fn lat(&self, index: usize) -> f64 {
        self.lat[index]
    }

    pub fn lon(&self, index: usize) -> f64 {
        self.lon[index]
    }

    /// Elevation, NaN for 2D lists
    pub fn ele(&self, index: usize) -> f64 {
        if self.is_3d {
            self.ele[index]
        } else {
            f64::NAN
        }
    }

    pub fn reverse(&mut self) {
        self.lat.reverse();
        self.lon.reverse();
        self.ele.reverse();
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.lat.iter().copied().zip(self.lon.iter().copied())
    }
}
