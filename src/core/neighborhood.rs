//! Pixel connectivity as an ordered set of integer displacements.

use crate::core::image::Image;

/// An ordered list of neighbor displacements `(dx, dy, dz)`.
///
/// Two caches are derived from the displacement list: flat linear offsets
/// against a bound image size, and per-axis `(negative, positive)` extents
/// used as border-pad widths. Insertion order is preserved; downstream code
/// is sensitive to it only for ties in queue insertion order, which does not
/// affect correctness.
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    deltas: Vec<(i64, i64, i64)>,
    offsets: Vec<i64>,
    bound: Option<(usize, usize, usize)>,
}

impl Neighborhood {
    pub fn new() -> Self {
        Neighborhood {
            deltas: Vec::new(),
            offsets: Vec::new(),
            bound: None,
        }
    }

    /// The 2D 8-connected preset: the 8 displacements `(±1, 0)`, `(0, ±1)`,
    /// `(±1, ±1)`. The origin is excluded.
    pub fn make_2d_n8() -> Self {
        let mut n = Neighborhood::new();
        n.add(-1, 0, 0);
        n.add(1, 0, 0);
        n.add(0, -1, 0);
        n.add(0, 1, 0);
        n.add(-1, -1, 0);
        n.add(1, -1, 0);
        n.add(-1, 1, 0);
        n.add(1, 1, 0);
        n
    }

    /// Appends a displacement, invalidating any bound offset cache.
    pub fn add(&mut self, dx: i64, dy: i64, dz: i64) {
        self.deltas.push((dx, dy, dz));
        self.offsets.clear();
        self.bound = None;
    }

    /// Recomputes the flat offset cache against the dimensions of `image`.
    pub fn bind_to<T: Copy>(&mut self, image: &Image<T>) {
        let (w, h) = (image.width() as i64, image.height() as i64);
        self.offsets = self
            .deltas
            .iter()
            .map(|&(dx, dy, dz)| dx + dy * w + dz * w * h)
            .collect();
        self.bound = Some((image.width(), image.height(), image.depth()));
    }

    /// The cached flat offsets.
    ///
    /// Only valid against the image the neighborhood was last bound to.
    pub fn offsets(&self) -> &[i64] {
        debug_assert!(self.bound.is_some(), "neighborhood is not bound");
        &self.offsets
    }

    pub fn deltas(&self) -> &[(i64, i64, i64)] {
        &self.deltas
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// The most negative displacement on each axis, clamped to zero.
    pub fn negative_extents(&self) -> (i64, i64, i64) {
        self.deltas.iter().fold((0, 0, 0), |acc, &(dx, dy, dz)| {
            (acc.0.min(dx), acc.1.min(dy), acc.2.min(dz))
        })
    }

    /// The most positive displacement on each axis, clamped to zero.
    pub fn positive_extents(&self) -> (i64, i64, i64) {
        self.deltas.iter().fold((0, 0, 0), |acc, &(dx, dy, dz)| {
            (acc.0.max(dx), acc.1.max(dy), acc.2.max(dz))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Neighborhood;
    use crate::core::image::Image;

    #[test]
    fn test_n8_preset() {
        let n = Neighborhood::make_2d_n8();
        assert_eq!(n.len(), 8);
        assert!(!n.deltas().contains(&(0, 0, 0)));
        assert_eq!(n.negative_extents(), (-1, -1, 0));
        assert_eq!(n.positive_extents(), (1, 1, 0));
    }

    #[test]
    fn test_bind() {
        let image = Image::new(5, 4, 1, 0_u8);
        let mut n = Neighborhood::make_2d_n8();
        n.bind_to(&image);
        assert_eq!(n.offsets(), &[-1, 1, -5, 5, -6, -4, 4, 6]);
    }

    #[test]
    fn test_add_invalidates_binding() {
        let image = Image::new(5, 4, 1, 0_u8);
        let mut n = Neighborhood::make_2d_n8();
        n.bind_to(&image);
        n.add(2, 0, 0);
        n.bind_to(&image);
        assert_eq!(n.offsets().len(), 9);
        assert_eq!(n.offsets()[8], 2);
        assert_eq!(n.positive_extents(), (2, 1, 0));
    }
}
