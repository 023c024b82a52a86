//! Nearest-color lookup: maps a pixel to the index of the closest palette
//! entry under a channel-weighted squared distance.
//!
//! Four strategies are available. `None` scans the palette for every pixel.
//! `Bits5`/`Bits6` keep a dense cache indexed by the coarse-quantized color
//! so repeated colors resolve in O(1). `CertLut` builds a kd-tree over the
//! palette and answers every query exactly with a backtracking search.
//!
//! A configured table is only coherent for the exact (palette, weights,
//! policy) it was built with; any change requires `configure` again.

use crate::LookupPolicy;

/// Luminance-derived channel weights (BT.601 scaled by 1000).
pub(crate) const DEFAULT_WEIGHTS: [i32; 3] = [299, 587, 114];

#[derive(Clone, Copy)]
struct KdNode {
    index: i32,
    axis: usize,
    left: i32,
    right: i32,
}

fn resolve_policy(policy: LookupPolicy) -> LookupPolicy {
    match policy {
        LookupPolicy::Auto => LookupPolicy::Bits6,
        other => other,
    }
}

fn cache_bits(policy: LookupPolicy) -> u32 {
    match policy {
        LookupPolicy::Bits5 => 5,
        _ => 6,
    }
}

/// Lookup table over an 8-bit RGB palette.
pub struct Lut {
    policy: LookupPolicy,
    ncolors: usize,
    palette: Vec<u8>,
    weights: [i64; 3],
    bits: u32,
    dense: Vec<i32>,
    kdnodes: Vec<KdNode>,
    kdroot: i32,
}

impl Lut {
    /// Create an unconfigured table with the given policy.
    pub fn new(policy: LookupPolicy) -> Self {
        Self {
            policy: resolve_policy(policy),
            ncolors: 0,
            palette: Vec::new(),
            weights: [
                DEFAULT_WEIGHTS[0] as i64,
                DEFAULT_WEIGHTS[1] as i64,
                DEFAULT_WEIGHTS[2] as i64,
            ],
            bits: 6,
            dense: Vec::new(),
            kdnodes: Vec::new(),
            kdroot: -1,
        }
    }

    /// Bind the table to a palette with the default luminance weights.
    /// `complexion` scales the red weight to bias matching toward skin
    /// tones; 1 leaves the defaults untouched.
    pub fn configure(&mut self, palette: &[u8], ncolors: usize, complexion: i32) {
        self.configure_with_weights(palette, ncolors, DEFAULT_WEIGHTS, complexion);
    }

    /// Bind the table to a palette with caller-chosen channel weights.
    pub fn configure_with_weights(
        &mut self,
        palette: &[u8],
        ncolors: usize,
        weights: [i32; 3],
        complexion: i32,
    ) {
        self.clear();
        self.ncolors = ncolors;
        self.palette = palette[..ncolors * 3].to_vec();
        self.weights = [
            weights[0] as i64 * complexion.max(1) as i64,
            weights[1] as i64,
            weights[2] as i64,
        ];
        match self.policy {
            LookupPolicy::Bits5 | LookupPolicy::Bits6 => {
                self.bits = cache_bits(self.policy);
                self.dense = vec![-1; 1usize << (3 * self.bits)];
            }
            LookupPolicy::CertLut => self.build_kdtree(),
            _ => {}
        }
    }

    /// Drop all cached state; the table must be configured before reuse.
    pub fn clear(&mut self) {
        self.ncolors = 0;
        self.palette.clear();
        self.dense.clear();
        self.kdnodes.clear();
        self.kdroot = -1;
    }

    /// Map an RGB pixel to the nearest palette index.
    pub fn map(&mut self, rgb: [u8; 3]) -> usize {
        if self.ncolors == 0 {
            return 0;
        }
        match self.policy {
            LookupPolicy::None => self.linear_scan(rgb),
            LookupPolicy::CertLut => {
                let mut best = self.kdnodes[self.kdroot as usize].index as usize;
                let mut best_distance = i64::MAX;
                self.search_kdtree(self.kdroot, rgb, &mut best, &mut best_distance);
                best
            }
            _ => {
                let shift = 8 - self.bits;
                let key = (((rgb[0] >> shift) as usize) << (2 * self.bits))
                    | (((rgb[1] >> shift) as usize) << self.bits)
                    | ((rgb[2] >> shift) as usize);
                let cached = self.dense[key];
                if cached >= 0 {
                    return cached as usize;
                }
                let found = self.linear_scan(rgb);
                self.dense[key] = found as i32;
                found
            }
        }
    }

    fn distance(&self, rgb: [u8; 3], index: usize) -> i64 {
        let mut distance = 0i64;
        for n in 0..3 {
            let diff = rgb[n] as i64 - self.palette[index * 3 + n] as i64;
            distance += diff * diff * self.weights[n];
        }
        distance
    }

    fn linear_scan(&self, rgb: [u8; 3]) -> usize {
        let mut best = 0usize;
        let mut best_distance = i64::MAX;
        for index in 0..self.ncolors {
            let distance = self.distance(rgb, index);
            if distance < best_distance {
                best_distance = distance;
                best = index;
            }
        }
        best
    }

    fn build_kdtree(&mut self) {
        self.kdnodes.clear();
        let mut indices: Vec<i32> = (0..self.ncolors as i32).collect();
        self.kdroot = self.build_kdtree_node(&mut indices, 0);
    }

    fn build_kdtree_node(&mut self, indices: &mut [i32], level: usize) -> i32 {
        if indices.is_empty() {
            return -1;
        }
        let axis = level % 3;
        sort_by_component(indices, axis, |i, a| self.palette[i * 3 + a] as f64);
        let median = indices.len() / 2;
        let node_index = self.kdnodes.len() as i32;
        self.kdnodes.push(KdNode {
            index: indices[median],
            axis,
            left: -1,
            right: -1,
        });
        let (lower, rest) = indices.split_at_mut(median);
        let upper = &mut rest[1..];
        let left = self.build_kdtree_node(lower, level + 1);
        let right = self.build_kdtree_node(upper, level + 1);
        self.kdnodes[node_index as usize].left = left;
        self.kdnodes[node_index as usize].right = right;
        node_index
    }

    fn search_kdtree(
        &self,
        node_index: i32,
        rgb: [u8; 3],
        best: &mut usize,
        best_distance: &mut i64,
    ) {
        if node_index < 0 {
            return;
        }
        let node = self.kdnodes[node_index as usize];
        let pivot = self.palette[node.index as usize * 3 + node.axis] as i64;
        let diff = rgb[node.axis] as i64 - pivot;
        let (next, other) = if diff > 0 {
            (node.right, node.left)
        } else {
            (node.left, node.right)
        };

        self.search_kdtree(next, rgb, best, best_distance);

        let distance = self.distance(rgb, node.index as usize);
        if distance < *best_distance
            || (distance == *best_distance && (node.index as usize) < *best)
        {
            *best_distance = distance;
            *best = node.index as usize;
        }

        // Cross the splitting plane when an equal-or-closer match may exist
        // on the other side; <= keeps ties resolving to the smallest index.
        let plane_distance = diff * diff * self.weights[node.axis];
        if plane_distance <= *best_distance {
            self.search_kdtree(other, rgb, best, best_distance);
        }
    }
}

/// Lookup table over float samples; palette components live in [0, 1].
///
/// The float path never coarse-quantizes: `CertLut` queries the kd-tree and
/// every other policy falls back to a linear scan at full precision.
pub struct FloatLut {
    policy: LookupPolicy,
    ncolors: usize,
    palette: Vec<f32>,
    weights: [f32; 3],
    kdnodes: Vec<KdNode>,
    kdroot: i32,
}

impl FloatLut {
    /// Create an unconfigured float table with the given policy.
    pub fn new(policy: LookupPolicy) -> Self {
        Self {
            policy: resolve_policy(policy),
            ncolors: 0,
            palette: Vec::new(),
            weights: [
                DEFAULT_WEIGHTS[0] as f32,
                DEFAULT_WEIGHTS[1] as f32,
                DEFAULT_WEIGHTS[2] as f32,
            ],
            kdnodes: Vec::new(),
            kdroot: -1,
        }
    }

    /// Bind the table to an 8-bit palette, converting entries to [0, 1].
    pub fn configure(&mut self, palette: &[u8], ncolors: usize, complexion: i32) {
        self.configure_with_weights(palette, ncolors, DEFAULT_WEIGHTS, complexion);
    }

    /// Bind the table to a palette with caller-chosen channel weights.
    pub fn configure_with_weights(
        &mut self,
        palette: &[u8],
        ncolors: usize,
        weights: [i32; 3],
        complexion: i32,
    ) {
        self.clear();
        self.ncolors = ncolors;
        self.palette = palette[..ncolors * 3]
            .iter()
            .map(|&v| v as f32 / 255.0)
            .collect();
        self.weights = [
            (weights[0] * complexion.max(1)) as f32,
            weights[1] as f32,
            weights[2] as f32,
        ];
        if self.policy == LookupPolicy::CertLut {
            self.build_kdtree();
        }
    }

    /// Drop all cached state.
    pub fn clear(&mut self) {
        self.ncolors = 0;
        self.palette.clear();
        self.kdnodes.clear();
        self.kdroot = -1;
    }

    /// Map a float sample to the nearest palette index.
    pub fn map(&self, sample: [f32; 3]) -> usize {
        if self.ncolors == 0 {
            return 0;
        }
        if self.policy == LookupPolicy::CertLut {
            let mut best = self.kdnodes[self.kdroot as usize].index as usize;
            let mut best_distance = f32::MAX;
            self.search_kdtree(self.kdroot, sample, &mut best, &mut best_distance);
            return best;
        }
        self.linear_scan(sample)
    }

    fn distance(&self, sample: [f32; 3], index: usize) -> f32 {
        let mut distance = 0f32;
        for n in 0..3 {
            let diff = sample[n] - self.palette[index * 3 + n];
            distance += diff * diff * self.weights[n];
        }
        distance
    }

    fn linear_scan(&self, sample: [f32; 3]) -> usize {
        let mut best = 0usize;
        let mut best_distance = f32::MAX;
        for index in 0..self.ncolors {
            let distance = self.distance(sample, index);
            if distance < best_distance {
                best_distance = distance;
                best = index;
            }
        }
        best
    }

    fn build_kdtree(&mut self) {
        self.kdnodes.clear();
        let mut indices: Vec<i32> = (0..self.ncolors as i32).collect();
        self.kdroot = self.build_kdtree_node(&mut indices, 0);
    }

    fn build_kdtree_node(&mut self, indices: &mut [i32], level: usize) -> i32 {
        if indices.is_empty() {
            return -1;
        }
        let axis = level % 3;
        sort_by_component(indices, axis, |i, a| self.palette[i * 3 + a] as f64);
        let median = indices.len() / 2;
        let node_index = self.kdnodes.len() as i32;
        self.kdnodes.push(KdNode {
            index: indices[median],
            axis,
            left: -1,
            right: -1,
        });
        let (lower, rest) = indices.split_at_mut(median);
        let upper = &mut rest[1..];
        let left = self.build_kdtree_node(lower, level + 1);
        let right = self.build_kdtree_node(upper, level + 1);
        self.kdnodes[node_index as usize].left = left;
        self.kdnodes[node_index as usize].right = right;
        node_index
    }

    fn search_kdtree(
        &self,
        node_index: i32,
        sample: [f32; 3],
        best: &mut usize,
        best_distance: &mut f32,
    ) {
        if node_index < 0 {
            return;
        }
        let node = self.kdnodes[node_index as usize];
        let pivot = self.palette[node.index as usize * 3 + node.axis];
        let diff = sample[node.axis] - pivot;
        let (next, other) = if diff > 0.0 {
            (node.right, node.left)
        } else {
            (node.left, node.right)
        };

        self.search_kdtree(next, sample, best, best_distance);

        let distance = self.distance(sample, node.index as usize);
        if distance < *best_distance
            || (distance == *best_distance && (node.index as usize) < *best)
        {
            *best_distance = distance;
            *best = node.index as usize;
        }

        let plane_distance = diff * diff * self.weights[node.axis];
        if plane_distance <= *best_distance {
            self.search_kdtree(other, sample, best, best_distance);
        }
    }
}

/// Stable insertion sort of palette indices along one component, matching
/// the deterministic ordering the kd-tree construction relies on.
fn sort_by_component<F: Fn(usize, usize) -> f64>(indices: &mut [i32], axis: usize, component: F) {
    for i in 1..indices.len() {
        let key = indices[i];
        let key_value = component(key as usize, axis);
        let mut j = i;
        while j > 0 && component(indices[j - 1] as usize, axis) > key_value {
            indices[j] = indices[j - 1];
            j -= 1;
        }
        indices[j] = key;
    }
}
