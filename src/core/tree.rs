//! Component-tree construction by hierarchical-queue flooding.
//!
//! The builder is the flooding algorithm of Salembier et al.: pixels are
//! visited through one FIFO per intensity level, components close when their
//! level's queue drains, and parent links fall out of the order in which
//! levels empty. A single pass produces the full tree.

use std::collections::VecDeque;

use log::debug;

use crate::constants::{ACTIVE, BORDER_STATUS, NOT_ACTIVE};
use crate::core::attributes::{self, AttributeSet};
use crate::core::image::Image;
use crate::core::neighborhood::Neighborhood;
use crate::core::node::{Node, NodeId};
use crate::core::number::Number;

/// A max-tree over a grayscale image.
///
/// Nodes are the connected components of the upper level sets
/// `{p : I(p) >= h}`, ordered by inclusion; the min-tree is obtained by
/// building over `image.invert()`.
///
/// Typically one chains calls to `new`, the `with_*` configuration methods,
/// and finally `build`:
///
/// ```ignore
/// let tree = ComponentTree::new(image).with_delta(2).build();
/// ```
#[derive(Debug)]
pub struct ComponentTree<T: Number> {
    pub(crate) image: Image<T>,
    pub(crate) neighborhood: Neighborhood,
    pub(crate) attributes: AttributeSet,
    pub(crate) delta: i64,
    pub(crate) ring_radius: Option<i64>,

    pub(crate) nodes: Vec<Node>,
    pub(crate) root: Option<NodeId>,
    pub(crate) index: Vec<Vec<NodeId>>,
    pub(crate) h_min: i64,
    pub(crate) h_max: i64,
    pub(crate) status: Image<i64>,
}

impl<T: Number> ComponentTree<T> {
    /// Prepares a tree over `image` with the 2D 8-connected neighborhood and
    /// the core attribute bundle. No flooding happens until `build`.
    pub fn new(image: Image<T>) -> Self {
        ComponentTree {
            image,
            neighborhood: Neighborhood::make_2d_n8(),
            attributes: AttributeSet::core(),
            delta: 1,
            ring_radius: None,
            nodes: Vec::new(),
            root: None,
            index: Vec::new(),
            h_min: 0,
            h_max: 0,
            status: Image::new(0, 0, 0, BORDER_STATUS),
        }
    }

    /// Replaces the connectivity used for flooding.
    pub fn with_neighborhood(mut self, neighborhood: Neighborhood) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    /// Sets the MSER stability step and enables the MSER attribute. Unless
    /// overridden, `delta` is also the neighborhood-ring radius.
    pub fn with_delta(mut self, delta: i64) -> Self {
        self.delta = delta;
        self.attributes |= AttributeSet::MSER;
        self
    }

    /// Overrides the neighborhood-ring radius independently of `delta`.
    pub fn with_ring_radius(mut self, radius: i64) -> Self {
        self.ring_radius = Some(radius);
        self
    }

    /// Replaces the attribute bundle computed by `build`.
    pub fn with_attributes(mut self, attributes: AttributeSet) -> Self {
        self.attributes = attributes;
        self
    }

    /// Floods the image and computes the selected attribute bundle.
    ///
    /// Construction is total over valid input: a constant image yields a
    /// single root, an empty image a tree with no nodes.
    pub fn build(mut self) -> Self {
        if self.image.is_empty() {
            return self;
        }

        let mut flooder = Flooder::new(&self.image, &mut self.neighborhood);
        flooder.run();

        self.h_min = flooder.h_min;
        self.h_max = flooder.h_max;
        self.nodes = std::mem::take(&mut flooder.nodes);
        self.index = std::mem::take(&mut flooder.index);
        self.root = Some(self.index[0][0]);

        let (px, py, pz) = flooder.pad;
        let (w, h, d) = (self.image.width(), self.image.height(), self.image.depth());
        self.status = flooder.status.crop(px..px + w, py..py + h, pz..pz + d);

        debug!(
            "built component tree: {} nodes over levels [{}, {}]",
            self.nodes.len(),
            self.h_min,
            self.h_max
        );

        attributes::compute(&mut self, &flooder.bordered, &flooder.status, flooder.pad);
        self
    }

    pub fn image(&self) -> &Image<T> {
        &self.image
    }

    /// The per-pixel node labels, cropped back to the image dimensions.
    /// Together with the image values they resolve pixel ownership.
    pub fn status(&self) -> &Image<i64> {
        &self.status
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        self.nodes[id].parent == id
    }

    /// The `(hMin, hMax)` intensity span of the image.
    pub fn level_range(&self) -> (i64, i64) {
        (self.h_min, self.h_max)
    }

    pub fn delta(&self) -> i64 {
        self.delta
    }

    /// The radius used for neighborhood-ring statistics.
    pub fn ring_radius(&self) -> i64 {
        self.ring_radius.unwrap_or(self.delta)
    }

    pub fn attributes(&self) -> AttributeSet {
        self.attributes
    }

    /// The node owning the pixel at `(x, y, z)`.
    pub fn node_of(&self, x: usize, y: usize, z: usize) -> Option<NodeId> {
        if self.root.is_none() || !self.image.contains(x as i64, y as i64, z as i64) {
            return None;
        }
        Some(self.node_of_offset(self.image.offset(x, y, z)))
    }

    /// The node owning the pixel at a linear offset of the original image.
    pub(crate) fn node_of_offset(&self, offset: usize) -> NodeId {
        let label = self.status.get(offset);
        debug_assert!(label >= 0, "unassigned pixel in status image");
        let level = (self.image.get(offset).as_i64() - self.h_min) as usize;
        self.index[level][label as usize]
    }

    /// All pixel offsets of the subtree rooted at `id`, local lists included.
    pub fn subtree_pixels(&self, id: NodeId) -> Vec<usize> {
        let mut pixels = Vec::with_capacity(self.nodes[id].area.max(1));
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            pixels.extend_from_slice(&self.nodes[n].pixels);
            stack.extend_from_slice(&self.nodes[n].children);
        }
        pixels
    }

    /// All node ids of the subtree rooted at `id`, `id` included.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend_from_slice(&self.nodes[n].children);
        }
        out
    }
}

/// Construction-time workspace: the bordered image, its status image, and
/// the hierarchical queue. Private to one `build` call.
struct Flooder<T: Number> {
    bordered: Image<T>,
    status: Image<i64>,
    offsets: Vec<i64>,
    hq: Vec<VecDeque<usize>>,
    number_nodes: Vec<usize>,
    node_at_level: Vec<bool>,
    index: Vec<Vec<NodeId>>,
    nodes: Vec<Node>,
    h_min: i64,
    h_max: i64,
    pad: (usize, usize, usize),
    orig: (usize, usize, usize),
}

impl<T: Number> Flooder<T> {
    fn new(image: &Image<T>, neighborhood: &mut Neighborhood) -> Self {
        let negative = neighborhood.negative_extents();
        let positive = neighborhood.positive_extents();
        let pad = (
            (-negative.0) as usize,
            (-negative.1) as usize,
            (-negative.2) as usize,
        );

        let bordered = image.pad(negative, positive, T::min_value());
        neighborhood.bind_to(&bordered);

        let mut status = Image::new(
            bordered.width(),
            bordered.height(),
            bordered.depth(),
            BORDER_STATUS,
        );
        for z in 0..image.depth() {
            for y in 0..image.height() {
                for x in 0..image.width() {
                    status.set(bordered.offset(x + pad.0, y + pad.1, z + pad.2), ACTIVE);
                }
            }
        }

        let h_min = image.min().as_i64();
        let h_max = image.max().as_i64();
        let levels = (h_max - h_min + 1) as usize;

        // Per-level pixel counts pre-size the node index.
        let mut histogram = vec![0_usize; levels];
        for &v in image.data() {
            histogram[(v.as_i64() - h_min) as usize] += 1;
        }

        Flooder {
            bordered,
            status,
            offsets: neighborhood.offsets().to_vec(),
            hq: (0..levels).map(|_| VecDeque::new()).collect(),
            number_nodes: vec![0; levels],
            node_at_level: vec![false; levels],
            index: histogram.iter().map(|&c| Vec::with_capacity(c)).collect(),
            nodes: Vec::new(),
            h_min,
            h_max,
            pad,
            orig: (image.width(), image.height(), image.depth()),
        }
    }

    /// Seeds the queue with the first pixel at `hMin` and floods the image.
    fn run(&mut self) {
        let seed = self
            .bordered
            .data()
            .iter()
            .enumerate()
            .find(|&(p, &v)| self.status.get(p) == ACTIVE && v.as_i64() == self.h_min)
            .map(|(p, _)| p);
        let seed = match seed {
            Some(p) => p,
            None => return,
        };

        self.hq[0].push_back(seed);
        self.status.set(seed, NOT_ACTIVE);
        self.node_at_level[0] = true;

        let m = self.flood(0);
        debug_assert!(m < 0, "flood did not close at the root");
        debug_assert_eq!(self.number_nodes[0], 1, "disconnected base level");
    }

    /// Drains the level-`h` queue, recursing into brighter levels as they
    /// are discovered, then closes one component at level `h` and links it
    /// to its parent. Returns the next lower level holding an open node, or
    /// a negative value when the root just closed.
    fn flood(&mut self, h: usize) -> i64 {
        while let Some(p) = self.hq[h].pop_front() {
            self.status.set(p, self.number_nodes[h] as i64);
            let id = self.open_node(h);

            let (xb, yb, zb) = self.bordered.coords(p);
            let (x, y, z) = (xb - self.pad.0, yb - self.pad.1, zb - self.pad.2);
            let offset = x + y * self.orig.0 + z * self.orig.0 * self.orig.1;
            self.nodes[id].record_pixel(offset, x, y, z, self.bordered.get(p).as_i64());

            for k in 0..self.offsets.len() {
                let q = (p as i64 + self.offsets[k]) as usize;
                if self.status.get(q) != ACTIVE {
                    continue;
                }
                let level = (self.bordered.get(q).as_i64() - self.h_min) as usize;
                self.hq[level].push_back(q);
                self.status.set(q, NOT_ACTIVE);
                self.node_at_level[level] = true;
                if level > h {
                    // Flood the brighter component to completion before the
                    // remaining neighbors of `p`.
                    let mut m = level as i64;
                    while m != h as i64 {
                        m = self.flood(m as usize);
                    }
                }
            }
        }

        let closed = self.index[h][self.number_nodes[h]];
        self.number_nodes[h] += 1;

        let mut m = h as i64 - 1;
        while m >= 0 && !self.node_at_level[m as usize] {
            m -= 1;
        }

        if m >= 0 {
            let parent = self.open_node(m as usize);
            self.nodes[closed].parent = parent;
            self.nodes[parent].children.push(closed);
        } else {
            self.nodes[closed].parent = closed;
        }

        self.node_at_level[h] = false;
        m
    }

    /// The node currently open at `level`, materialized on first use.
    fn open_node(&mut self, level: usize) -> NodeId {
        if self.index[level].len() <= self.number_nodes[level] {
            let id = self.nodes.len();
            self.nodes.push(Node::new(id, self.h_min + level as i64));
            self.index[level].push(id);
        }
        self.index[level][self.number_nodes[level]]
    }
}
