//! Image reconstruction from a (possibly filtered) tree.

use std::collections::VecDeque;

use crate::core::attributes::{self, Attribute};
use crate::core::image::Image;
use crate::core::number::Number;
use crate::core::tree::ComponentTree;

/// How inactive descendants are repainted from their nearest active
/// ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Prune: an inactive child collapses its whole subtree to the parent's
    /// level.
    Min,
    /// Shift up: each leaf walks to its nearest active ancestor, whose
    /// subtree is painted at the ancestor's level.
    Max,
    /// Active nodes keep their own level; chains of inactive descendants
    /// take the level of the nearest active ancestor.
    Direct,
}

impl<T: Number> ComponentTree<T> {
    /// Reconstructs an image from the active nodes under the given rule.
    ///
    /// With every node active, `Rule::Direct` reproduces the input exactly.
    pub fn reconstruct(&self, rule: Rule) -> Image<T> {
        let image = self.image();
        let mut out = Image::new(image.width(), image.height(), image.depth(), T::zero());
        let root = match self.root {
            Some(root) => root,
            None => return out,
        };

        if !self.nodes[root].active {
            // No active ancestor exists anywhere; everything collapses to
            // the root level.
            out.fill(T::from_i64(self.nodes[root].level));
            return out;
        }

        match rule {
            Rule::Min => self.reconstruct_min(root, &mut out),
            Rule::Max => self.reconstruct_max(root, &mut out),
            Rule::Direct => self.reconstruct_direct(root, &mut out),
        }
        out
    }

    fn reconstruct_min(&self, root: usize, out: &mut Image<T>) {
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            let level = T::from_i64(self.nodes[id].level);
            for &p in &self.nodes[id].pixels {
                out.set(p, level);
            }
            for &child in &self.nodes[id].children {
                if self.nodes[child].active {
                    queue.push_back(child);
                } else {
                    for p in self.subtree_pixels(child) {
                        out.set(p, level);
                    }
                }
            }
        }
    }

    fn reconstruct_max(&self, root: usize, out: &mut Image<T>) {
        out.fill(T::from_i64(self.nodes[root].level));

        let mut leaves = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if self.nodes[id].children.is_empty() {
                leaves.push(id);
            }
            queue.extend(self.nodes[id].children.iter().copied());
        }

        for leaf in leaves {
            let mut id = leaf;
            while !self.nodes[id].active && self.nodes[id].parent != id {
                id = self.nodes[id].parent;
            }
            if !self.nodes[id].active {
                continue;
            }
            let level = T::from_i64(self.nodes[id].level);
            for p in self.subtree_pixels(id) {
                out.set(p, level);
            }
        }
    }

    fn reconstruct_direct(&self, root: usize, out: &mut Image<T>) {
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            let level = T::from_i64(self.nodes[id].level);
            for &p in &self.nodes[id].pixels {
                out.set(p, level);
            }
            for &child in &self.nodes[id].children {
                if self.nodes[child].active {
                    queue.push_back(child);
                    continue;
                }
                // Aggregate the connected chain of inactive descendants;
                // active nodes below resume independently.
                let mut stack = vec![child];
                while let Some(m) = stack.pop() {
                    for &p in &self.nodes[m].pixels {
                        out.set(p, level);
                    }
                    for &g in &self.nodes[m].children {
                        if self.nodes[g].active {
                            queue.push_back(g);
                        } else {
                            stack.push(g);
                        }
                    }
                }
            }
        }
    }

    /// Paints each pixel with an attribute of one node from its owning
    /// chain.
    ///
    /// The chain is walked from the owning node toward the root, stopping
    /// when the parent is the root; the root itself is never selected.
    /// `Rule::Min` / `Rule::Max` pick the chain node minimizing/maximizing
    /// `selection`; `Rule::Direct` picks the deepest chain node. When a
    /// `limit` band `(attribute, lo, hi)` is given, only chain nodes whose
    /// limit attribute lies inside `[lo, hi]` qualify. Pixels with no
    /// qualifying node are left at zero.
    pub fn reconstruct_attribute(
        &self,
        output: Attribute,
        selection: Attribute,
        rule: Rule,
        limit: Option<(Attribute, f64, f64)>,
    ) -> Image<f64> {
        let image = self.image();
        let mut out = Image::new(image.width(), image.height(), image.depth(), 0.);
        let root = match self.root {
            Some(root) => root,
            None => return out,
        };

        for p in 0..image.len() {
            let mut best: Option<usize> = None;
            let mut id = self.node_of_offset(p);
            while id != root {
                let node = &self.nodes[id];
                let qualifies = limit.map_or(true, |(attribute, lo, hi)| {
                    let v = attributes::value(node, attribute);
                    v >= lo && v <= hi
                });
                if qualifies {
                    let better = match (rule, best) {
                        (_, None) => true,
                        (Rule::Direct, Some(_)) => false,
                        (Rule::Min, Some(b)) => {
                            attributes::value(node, selection)
                                < attributes::value(&self.nodes[b], selection)
                        }
                        (Rule::Max, Some(b)) => {
                            attributes::value(node, selection)
                                > attributes::value(&self.nodes[b], selection)
                        }
                    };
                    if better {
                        best = Some(id);
                    }
                }
                let parent = self.nodes[id].parent;
                if parent == root || parent == id {
                    break;
                }
                id = parent;
            }
            if let Some(b) = best {
                out.set(p, attributes::value(&self.nodes[b], output));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};

    use super::Rule;
    use crate::core::attributes::Attribute;
    use crate::core::image::Image;
    use crate::core::tree::ComponentTree;

    fn central_peak() -> Image<u8> {
        Image::from_vec(3, 3, 1, vec![0, 0, 0, 0, 5, 0, 0, 0, 0])
    }

    #[test]
    fn test_direct_round_trip() {
        for image in [
            Image::new(3, 3, 1, 7_u8),
            central_peak(),
            Image::from_vec(4, 1, 1, vec![1_u8, 1, 2, 3]),
        ] {
            let tree = ComponentTree::new(image.clone()).build();
            assert_eq!(tree.reconstruct(Rule::Direct), image);
        }
    }

    #[test]
    fn test_direct_round_trip_full_attributes() {
        let image = central_peak();
        let tree = ComponentTree::new(image.clone())
            .with_attributes(crate::core::attributes::AttributeSet::all())
            .with_delta(1)
            .build();
        assert_eq!(tree.reconstruct(Rule::Direct), image);
    }

    #[test]
    fn test_direct_round_trip_random() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(13);
        let pixels = (0..10 * 7).map(|_| rng.gen_range(0..9_u8)).collect();
        let image = Image::from_vec(10, 7, 1, pixels);
        let tree = ComponentTree::new(image.clone()).build();
        assert_eq!(tree.reconstruct(Rule::Direct), image);
    }

    #[test]
    fn test_set_false_restore_round_trip() {
        let image = central_peak();
        let mut tree = ComponentTree::new(image.clone()).build();
        tree.set_false();
        tree.restore();
        assert_eq!(tree.reconstruct(Rule::Direct), image);
    }

    #[test]
    fn test_open_area_filter_is_identity() {
        let image = central_peak();
        let mut tree = ComponentTree::new(image.clone()).build();
        tree.area_filtering(0., f64::INFINITY);
        assert_eq!(tree.reconstruct(Rule::Direct), image);
    }

    #[test]
    fn test_filtered_peak() {
        let image = central_peak();
        let mut tree = ComponentTree::new(image).build();
        tree.area_filtering(2., 9.);

        let zeros = Image::new(3, 3, 1, 0_u8);
        assert_eq!(tree.reconstruct(Rule::Min), zeros);
        // The lone peak pixel takes its parent's level.
        assert_eq!(tree.reconstruct(Rule::Direct), zeros);
        assert_eq!(tree.reconstruct(Rule::Max), zeros);
    }

    #[test]
    fn test_all_inactive_collapses_to_root() {
        let image = central_peak();
        let mut tree = ComponentTree::new(image).build();
        tree.set_false();
        for rule in [Rule::Min, Rule::Max, Rule::Direct] {
            assert_eq!(tree.reconstruct(rule), Image::new(3, 3, 1, 0_u8));
        }
    }

    #[test]
    fn test_direct_resumes_below_inactive_chain() {
        // 1D profile with a nested bright plateau: deactivating only the
        // middle node leaves the top node painted at its own level.
        let image = Image::from_vec(5, 1, 1, vec![1_u8, 2, 4, 2, 1]);
        let mut tree = ComponentTree::new(image).build();
        let root = tree.root().unwrap();
        let mid = tree.node(root).children()[0];
        let top = tree.node(mid).children()[0];
        assert_eq!(tree.node(mid).level(), 2);
        assert_eq!(tree.node(top).level(), 4);

        tree.attribute_filtering(Attribute::Level, 0., 1.);
        // Only the root (level 1) stays active.
        assert!(tree.node(root).is_active());
        assert!(!tree.node(mid).is_active());
        assert!(!tree.node(top).is_active());

        let mut tree2 = ComponentTree::new(Image::from_vec(5, 1, 1, vec![1_u8, 2, 4, 2, 1])).build();
        let mid2 = tree2.node(tree2.root().unwrap()).children()[0];
        // Deactivate just the middle node; DIRECT flattens it onto the root
        // but keeps the top node.
        tree2.nodes[mid2].active = false;
        let out = tree2.reconstruct(Rule::Direct);
        assert_eq!(out.data(), &[1, 1, 4, 1, 1]);

        // MIN prunes the whole subtree instead.
        let out = tree2.reconstruct(Rule::Min);
        assert_eq!(out.data(), &[1, 1, 1, 1, 1]);

        // Under MAX the active leaf repaints itself at its own level over
        // the root-level prefill.
        let out = tree2.reconstruct(Rule::Max);
        assert_eq!(out.data(), &[1, 1, 4, 1, 1]);
    }

    #[test]
    fn test_attribute_indexed() {
        let tree = ComponentTree::new(central_peak()).build();

        let out = tree.reconstruct_attribute(Attribute::Area, Attribute::Area, Rule::Max, None);
        // Root-owned pixels have an empty chain; the peak maps to its leaf.
        assert_eq!(
            out.data(),
            &[0., 0., 0., 0., 1., 0., 0., 0., 0.]
        );

        let out = tree.reconstruct_attribute(
            Attribute::Level,
            Attribute::Area,
            Rule::Direct,
            None,
        );
        assert_eq!(out.get(4), 5.);

        // A limit band nobody satisfies leaves the image at zero.
        let out = tree.reconstruct_attribute(
            Attribute::Area,
            Attribute::Area,
            Rule::Max,
            Some((Attribute::Area, 2., 100.)),
        );
        assert!(out.data().iter().all(|&v| v == 0.));
    }
}
