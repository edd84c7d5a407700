//! Activity filters over the tree.
//!
//! Filters never delete nodes; they only toggle the `active` flags that the
//! reconstruction engine consumes.

use crate::core::attributes::{self, Attribute};
use crate::core::number::Number;
use crate::core::tree::ComponentTree;

impl<T: Number> ComponentTree<T> {
    /// Deactivates every node.
    pub fn set_false(&mut self) {
        for node in &mut self.nodes {
            node.active = false;
        }
    }

    /// Reactivates every node and resets levels to their build-time values.
    pub fn restore(&mut self) {
        for node in &mut self.nodes {
            node.active = true;
            node.level = node.ori_level;
        }
    }

    /// Deactivates nodes whose named attribute lies outside `[lo, hi]`.
    pub fn attribute_filtering(&mut self, attribute: Attribute, lo: f64, hi: f64) {
        for node in &mut self.nodes {
            let v = attributes::value(node, attribute);
            if v < lo || v > hi {
                node.active = false;
            }
        }
    }

    pub fn area_filtering(&mut self, lo: f64, hi: f64) {
        self.attribute_filtering(Attribute::Area, lo, hi);
    }

    pub fn volumic_filtering(&mut self, lo: f64, hi: f64) {
        self.attribute_filtering(Attribute::Volume, lo, hi);
    }

    pub fn contrast_filtering(&mut self, lo: f64, hi: f64) {
        self.attribute_filtering(Attribute::Contrast, lo, hi);
    }
}

#[cfg(test)]
mod tests {
    use crate::core::attributes::Attribute;
    use crate::core::image::Image;
    use crate::core::tree::ComponentTree;

    fn central_peak_tree() -> ComponentTree<u8> {
        let image = Image::from_vec(3, 3, 1, vec![0, 0, 0, 0, 5, 0, 0, 0, 0]);
        ComponentTree::new(image).build()
    }

    #[test]
    fn test_set_false_restore() {
        let mut tree = central_peak_tree();
        assert!(tree.nodes().iter().all(|n| n.is_active()));
        tree.set_false();
        assert!(tree.nodes().iter().all(|n| !n.is_active()));
        tree.restore();
        assert!(tree.nodes().iter().all(|n| n.is_active()));
    }

    #[test]
    fn test_area_filtering() {
        let mut tree = central_peak_tree();
        tree.area_filtering(2., 9.);
        let root = tree.root().unwrap();
        let child = tree.node(root).children()[0];
        assert!(tree.node(root).is_active());
        assert!(!tree.node(child).is_active());
    }

    #[test]
    fn test_filters_match_generic() {
        let mut named = central_peak_tree();
        named.contrast_filtering(1., 10.);
        let mut generic = central_peak_tree();
        generic.attribute_filtering(Attribute::Contrast, 1., 10.);

        let flags = |t: &ComponentTree<u8>| {
            t.nodes().iter().map(|n| n.is_active()).collect::<Vec<_>>()
        };
        assert_eq!(flags(&named), flags(&generic));
        // The peak leaf has contrast 0 and is filtered out.
        let root = named.root().unwrap();
        let child = named.node(root).children()[0];
        assert!(!named.node(child).is_active());
    }

    #[test]
    fn test_volumic_filtering() {
        let mut tree = central_peak_tree();
        tree.volumic_filtering(0., f64::INFINITY);
        assert!(tree.nodes().iter().all(|n| n.is_active()));
    }
}
