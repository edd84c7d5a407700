//! Attribute selection and the attribute-computation engine.
//!
//! Attributes are computed in a fixed dependency order after flooding.
//! Post-order recurrences run as a sweep over the per-level node index from
//! the brightest level downward, since every child sits strictly above its
//! parent; ascending recurrences run the same sweep in reverse.

use std::collections::VecDeque;
use std::f64::consts::PI;

use bitvec::prelude::*;

use crate::constants::{BORDER_STATUS, EPSILON};
use crate::core::image::Image;
use crate::core::node::Node;
use crate::core::number::Number;
use crate::core::tree::ComponentTree;
use crate::utils::helpers;

bitflags::bitflags! {
    /// The bundle of attributes to compute at build time.
    ///
    /// Dependencies are resolved automatically: every bundle that consumes
    /// subtree areas pulls in `AREA`, and `OTSU` triggers the
    /// neighborhood-ring statistics at the tree's ring radius.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttributeSet: u32 {
        /// Subtree areas, intensity sums, mean and variance.
        const AREA = 1 << 0;
        /// Area derivatives against the parent node.
        const AREA_DERIVATIVES = 1 << 1;
        /// Largest level difference to a leaf of the subtree.
        const CONTRAST = 1 << 2;
        /// Subtree volume.
        const VOLUME = 1 << 3;
        /// Contour-pixel saving for the border-gradient mean.
        const BORDER_GRADIENT = 1 << 4;
        /// Contour length, complexity and compacity.
        const COMPLEXITY_COMPACITY = 1 << 5;
        /// Axis-aligned bounding boxes.
        const BOUNDING_BOX = 1 << 6;
        /// Strict descendant counts.
        const SUB_NODES = 1 << 7;
        /// Separability against the neighborhood ring.
        const OTSU = 1 << 8;
        /// MSER stability over the Δ-step.
        const MSER = 1 << 9;
    }
}

impl AttributeSet {
    /// The default bundle: the cheap whole-tree sweeps.
    pub fn core() -> Self {
        AttributeSet::AREA
            | AttributeSet::CONTRAST
            | AttributeSet::VOLUME
            | AttributeSet::BOUNDING_BOX
            | AttributeSet::SUB_NODES
    }
}

/// Names one attribute slot of a node, for generic filtering and
/// attribute-indexed reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Level,
    Area,
    Sum,
    SumSquare,
    Mean,
    Variance,
    Contrast,
    Volume,
    SubNodes,
    AreaNghb,
    SumNghb,
    SumSquareNghb,
    MeanNghb,
    VarianceNghb,
    Otsu,
    Mser,
    AreaDerivativeH,
    AreaDerivativeAreaN,
    AreaDerivativeAreaNH,
    AreaDerivativeAreaNHDerivative,
    AreaDerivativeDeltaH,
    AreaDerivativeDeltaAreaF,
    ContourLength,
    Complexity,
    Compacity,
    MeanGradientBorder,
}

/// The named attribute of a node, widened to `f64`.
pub fn value(node: &Node, attribute: Attribute) -> f64 {
    match attribute {
        Attribute::Level => node.level as f64,
        Attribute::Area => node.area as f64,
        Attribute::Sum => node.sum as f64,
        Attribute::SumSquare => node.sum_square as f64,
        Attribute::Mean => node.mean,
        Attribute::Variance => node.variance,
        Attribute::Contrast => node.contrast as f64,
        Attribute::Volume => node.volume as f64,
        Attribute::SubNodes => node.sub_nodes as f64,
        Attribute::AreaNghb => node.area_nghb as f64,
        Attribute::SumNghb => node.sum_nghb as f64,
        Attribute::SumSquareNghb => node.sum_square_nghb as f64,
        Attribute::MeanNghb => node.mean_nghb,
        Attribute::VarianceNghb => node.variance_nghb,
        Attribute::Otsu => node.otsu,
        Attribute::Mser => node.mser,
        Attribute::AreaDerivativeH => node.area_derivative_h,
        Attribute::AreaDerivativeAreaN => node.area_derivative_area_n,
        Attribute::AreaDerivativeAreaNH => node.area_derivative_area_n_h,
        Attribute::AreaDerivativeAreaNHDerivative => node.area_derivative_area_n_h_derivative,
        Attribute::AreaDerivativeDeltaH => node.area_derivative_delta_h,
        Attribute::AreaDerivativeDeltaAreaF => node.area_derivative_delta_area_f,
        Attribute::ContourLength => node.contour_length as f64,
        Attribute::Complexity => node.complexity as f64,
        Attribute::Compacity => node.compacity as f64,
        Attribute::MeanGradientBorder => node.mean_gradient_border,
    }
}

/// Pulls in the implied prerequisites of a selection.
fn resolve(selection: AttributeSet) -> AttributeSet {
    let mut selection = selection;
    if selection.intersects(
        AttributeSet::OTSU
            | AttributeSet::MSER
            | AttributeSet::AREA_DERIVATIVES
            | AttributeSet::VOLUME
            | AttributeSet::COMPLEXITY_COMPACITY,
    ) {
        selection |= AttributeSet::AREA;
    }
    selection
}

/// Runs the attribute passes selected by the tree's bundle. Called by
/// `ComponentTree::build` while the bordered workspace is still alive.
pub(crate) fn compute<T: Number>(
    tree: &mut ComponentTree<T>,
    bordered: &Image<T>,
    bordered_status: &Image<i64>,
    pad: (usize, usize, usize),
) {
    let selection = resolve(tree.attributes);

    accumulate_subtrees(tree, selection);

    if selection.contains(AttributeSet::AREA) {
        for node in &mut tree.nodes {
            node.mean = node.sum as f64 / node.area as f64;
            node.variance = node.sum_square as f64 / node.area as f64 - node.mean * node.mean;
        }
    }
    if selection.contains(AttributeSet::VOLUME) {
        volumes(tree);
    }
    if selection.contains(AttributeSet::AREA_DERIVATIVES) {
        area_derivatives(tree);
    }
    if selection.contains(AttributeSet::MSER) {
        mser(tree);
    }
    if selection.intersects(AttributeSet::COMPLEXITY_COMPACITY | AttributeSet::BORDER_GRADIENT) {
        let save_pixels = selection.contains(AttributeSet::BORDER_GRADIENT);
        contour_scan(tree, bordered, bordered_status, pad, save_pixels);
    }
    if selection.contains(AttributeSet::COMPLEXITY_COMPACITY) {
        for node in &mut tree.nodes {
            if node.area > 0 {
                node.complexity = 1000 * node.contour_length as i64 / node.area as i64;
            }
            node.compacity = if node.contour_length > 0 {
                let contour = node.contour_length as f64;
                (1000. * 4. * PI * node.area as f64 / (contour * contour)).floor() as i64
            } else {
                0
            };
        }
    }
    if selection.contains(AttributeSet::OTSU) {
        ring_statistics(tree);
        for node in &mut tree.nodes {
            let diff = node.mean - node.mean_nghb;
            let denominator = (node.variance + node.variance_nghb).max(EPSILON);
            node.otsu = diff * diff / denominator;
        }
    }
}

/// One descending sweep folding children into parents: areas and sums,
/// contrast, descendant counts, bounding boxes.
fn accumulate_subtrees<T: Number>(tree: &mut ComponentTree<T>, selection: AttributeSet) {
    for level in (0..tree.index.len()).rev() {
        for i in 0..tree.index[level].len() {
            let id = tree.index[level][i];
            let node = &tree.nodes[id];
            let parent = node.parent;
            if parent == id {
                continue;
            }
            let (area, sum, sum_square) = (node.area, node.sum, node.sum_square);
            let reach = node.level + node.contrast;
            let sub_nodes = node.sub_nodes;
            let bounding_box = node.bounding_box;

            let p = &mut tree.nodes[parent];
            if selection.contains(AttributeSet::AREA) {
                p.area += area;
                p.sum += sum;
                p.sum_square += sum_square;
            }
            if selection.contains(AttributeSet::CONTRAST) {
                p.contrast = p.contrast.max(reach - p.level);
            }
            if selection.contains(AttributeSet::SUB_NODES) {
                p.sub_nodes += sub_nodes + 1;
            }
            if selection.contains(AttributeSet::BOUNDING_BOX) {
                p.bounding_box.union(&bounding_box);
            }
        }
    }
}

/// `volume(n) = area(n)·(h − parent.h) + Σ volume(child)`; the root takes
/// `h − 0` so the root volume equals the total image intensity.
fn volumes<T: Number>(tree: &mut ComponentTree<T>) {
    for id in 0..tree.nodes.len() {
        let parent = tree.nodes[id].parent;
        let base = if parent == id {
            0
        } else {
            tree.nodes[parent].level
        };
        tree.nodes[id].volume = tree.nodes[id].area as i64 * (tree.nodes[id].level - base);
    }
    for level in (0..tree.index.len()).rev() {
        for i in 0..tree.index[level].len() {
            let id = tree.index[level][i];
            let parent = tree.nodes[id].parent;
            if parent != id {
                let volume = tree.nodes[id].volume;
                tree.nodes[parent].volume += volume;
            }
        }
    }
}

/// Parent-relative area derivatives, parents before children.
fn area_derivatives<T: Number>(tree: &mut ComponentTree<T>) {
    for level in 0..tree.index.len() {
        for i in 0..tree.index[level].len() {
            let id = tree.index[level][i];
            let parent = tree.nodes[id].parent;
            if parent == id {
                continue;
            }
            let shed = (tree.nodes[parent].area - tree.nodes[id].area) as f64;
            let rise = (tree.nodes[id].level - tree.nodes[parent].level) as f64;
            let parent_slope = tree.nodes[parent].area_derivative_area_n_h;

            let node = &mut tree.nodes[id];
            let area = node.area as f64;
            node.area_derivative_h = shed / rise;
            node.area_derivative_area_n = shed / area;
            node.area_derivative_area_n_h = node.area_derivative_area_n / area;
            node.area_derivative_area_n_h_derivative = parent_slope - node.area_derivative_area_n_h;
        }
    }
}

/// Walks each node's ancestor chain until the level drop reaches Δ; the
/// stability ratio and its companions come from that ancestor, or `+∞` when
/// the root is reached first.
fn mser<T: Number>(tree: &mut ComponentTree<T>) {
    let delta = tree.delta;
    for id in 0..tree.nodes.len() {
        let level = tree.nodes[id].level;
        let mut ancestor = id;
        let found = loop {
            let parent = tree.nodes[ancestor].parent;
            if parent == ancestor {
                break None;
            }
            ancestor = parent;
            if level - tree.nodes[ancestor].level >= delta {
                break Some(ancestor);
            }
        };

        match found {
            Some(ancestor) => {
                let shed = (tree.nodes[ancestor].area - tree.nodes[id].area) as f64;
                let drop = (level - tree.nodes[ancestor].level) as f64;
                let ancestor_area = tree.nodes[ancestor].area as f64;
                let node = &mut tree.nodes[id];
                node.mser = shed / node.area as f64;
                node.area_derivative_delta_h = shed / drop;
                node.area_derivative_delta_area_f = shed / ancestor_area;
            }
            None => {
                let node = &mut tree.nodes[id];
                node.mser = f64::INFINITY;
                node.area_derivative_delta_h = f64::INFINITY;
                node.area_derivative_delta_area_f = f64::INFINITY;
            }
        }
    }
}

/// One pass over the bordered image. A pixel is contour when a neighbor is
/// strictly darker or falls on the border sentinel; the image frame counts
/// as infinitely dark, so border hits walk the whole ancestor chain.
fn contour_scan<T: Number>(
    tree: &mut ComponentTree<T>,
    bordered: &Image<T>,
    bordered_status: &Image<i64>,
    pad: (usize, usize, usize),
    save_pixels: bool,
) {
    let offsets = tree.neighborhood.offsets().to_vec();
    let (w, h) = (tree.image.width(), tree.image.height());

    for p in 0..bordered.len() {
        let label = bordered_status.get(p);
        if label == BORDER_STATUS {
            continue;
        }
        let v = bordered.get(p).as_i64();

        let mut hits_border = false;
        let mut min_value = i64::MAX;
        let mut darker = false;
        for &off in &offsets {
            let q = (p as i64 + off) as usize;
            if bordered_status.get(q) == BORDER_STATUS {
                hits_border = true;
            } else {
                let vq = bordered.get(q).as_i64();
                if vq < v {
                    darker = true;
                    min_value = min_value.min(vq);
                }
            }
        }
        if hits_border {
            min_value = tree.h_min;
        }
        if !hits_border && !darker {
            continue;
        }

        let (xb, yb, zb) = bordered.coords(p);
        let offset = (xb - pad.0) + (yb - pad.1) * w + (zb - pad.2) * w * h;

        let level = (v - tree.h_min) as usize;
        let mut n = tree.index[level][label as usize];
        loop {
            if !hits_border && tree.nodes[n].level <= min_value {
                break;
            }
            tree.nodes[n].contour_length += 1;
            if save_pixels {
                tree.nodes[n].pixels_border.push(offset);
            }
            let parent = tree.nodes[n].parent;
            if parent == n {
                break;
            }
            n = parent;
        }
    }
}

/// Statistics over the Euclidean ring around each node: subtree pixels are
/// masked off in a scratch bit image, then every still-active ball neighbor
/// is consumed exactly once.
fn ring_statistics<T: Number>(tree: &mut ComponentTree<T>) {
    let root = match tree.root {
        Some(root) => root,
        None => return,
    };
    let radius = tree.ring_radius.unwrap_or(tree.delta).max(0);

    let image = &tree.image;
    let zs = if image.depth() > 1 { -radius..=radius } else { 0..=0 };
    let mut ball = Vec::new();
    for dz in zs {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if (dx, dy, dz) != (0, 0, 0) && dx * dx + dy * dy + dz * dz <= radius * radius {
                    ball.push((dx, dy, dz));
                }
            }
        }
    }

    let mut scratch = bitvec![1; image.len()];
    let mut queue = VecDeque::from([root]);
    while let Some(id) = queue.pop_front() {
        queue.extend(tree.nodes[id].children.iter().copied());

        scratch.fill(true);
        let pixels = tree.subtree_pixels(id);
        for &p in &pixels {
            scratch.set(p, false);
        }

        let (mut area, mut sum, mut sum_square) = (0_usize, 0_i64, 0_i64);
        for &p in &pixels {
            let (x, y, z) = image.coords(p);
            for &(dx, dy, dz) in &ball {
                let (nx, ny, nz) = (x as i64 + dx, y as i64 + dy, z as i64 + dz);
                if !image.contains(nx, ny, nz) {
                    continue;
                }
                let q = image.offset(nx as usize, ny as usize, nz as usize);
                if scratch[q] {
                    scratch.set(q, false);
                    let v = image.get(q).as_i64();
                    area += 1;
                    sum += v;
                    sum_square += v * v;
                }
            }
        }

        let node = &mut tree.nodes[id];
        node.area_nghb = area;
        node.sum_nghb = sum;
        node.sum_square_nghb = sum_square;
        if area > 0 {
            node.mean_nghb = sum as f64 / area as f64;
            node.variance_nghb =
                sum_square as f64 / area as f64 - node.mean_nghb * node.mean_nghb;
        }
    }
}

impl<T: Number> ComponentTree<T> {
    /// Averages `gradient` over each node's recorded contour pixels.
    ///
    /// Requires a build with `BORDER_GRADIENT` selected, so the contour scan
    /// saved border pixels. The gradient image (typically a morphological
    /// gradient of the input) is supplied by the caller and must share the
    /// input's dimensions.
    pub fn compute_mean_gradient_border(&mut self, gradient: &Image<T>) {
        debug_assert_eq!(
            (gradient.width(), gradient.height(), gradient.depth()),
            (self.image.width(), self.image.height(), self.image.depth()),
            "gradient image dimensions do not match"
        );
        for node in &mut self.nodes {
            if node.pixels_border.is_empty() {
                continue;
            }
            let values = node
                .pixels_border
                .iter()
                .map(|&p| gradient.get(p).as_f64())
                .collect::<Vec<_>>();
            node.mean_gradient_border = helpers::mean(&values);
        }
    }
}
