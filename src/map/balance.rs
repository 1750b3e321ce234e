// src/map/balance.rs
// One-shot construction of the left-balanced kd-tree over the photon array.
// Works on an index vector and records a heap permutation which is applied
// in place at the end, so full photon records are never shuffled during the
// recursion.
// RELEVANT FILES:src/map/mod.rs,src/map/knn.rs,src/photon.rs

use std::time::Instant;

use crate::math::Aabb;
use crate::photon::Photon;

use super::{left_child, right_child, PhotonMap};

impl PhotonMap {
    /// Rearrange the stored photons into the implicit heap layout of a
    /// left-balanced kd-tree. Called exactly once, after which the map is
    /// immutable and ready for queries.
    pub fn balance(&mut self) {
        if self.photon_count == 0 {
            log::info!("Photon map: no need for balancing, no photons available.");
            self.balanced = true;
            return;
        }
        assert!(!self.balanced, "photon map is already balanced");

        log::info!(
            "Photon map: balancing {} photons ({:.2} KiB)..",
            self.photon_count,
            (std::mem::size_of::<Photon>() * (self.photon_count + 1)) as f32 / 1024.0
        );
        let timer = Instant::now();

        // Shuffle indices instead of copying photons back and forth
        let mut order: Vec<u32> = (1..=self.photon_count as u32).collect();
        // Destination for the final heap permutation, indexed starting at 1
        let mut perm: Vec<u32> = vec![0; self.photon_count + 1];

        let mut aabb = self.aabb;
        balance_recursive(&mut self.photons, &mut order, &mut perm, &mut aabb, 1);
        log::info!("Done (took {} ms)", timer.elapsed().as_millis());

        // 'perm' now represents the properly left-balanced photon map;
        // apply it to the photon array
        let timer = Instant::now();
        let count = self.photon_count;
        permute_inplace(&mut self.photons[..=count], &mut perm);
        log::info!("Applied permutation (took {} ms)", timer.elapsed().as_millis());

        // Cheap inner-node and right-child tests during traversal
        self.last_inner_node = self.photon_count / 2;
        self.last_r_child_node = self.photon_count.saturating_sub(1) / 2;
        self.balanced = true;
    }
}

/// Maximum node count of the left subtree of a left-balanced tree holding
/// `tree_size > 1` nodes. Either the deepest layer spills past the left
/// subtree (which is then completely filled), or it does not reach half way
/// and the left subtree takes whatever the deepest layer holds.
pub(crate) fn left_subtree_size(tree_size: usize) -> usize {
    debug_assert!(tree_size > 1);

    // Size of the last completely filled layer, plus one
    let mut p = 1usize;
    while 2 * p <= tree_size {
        p *= 2;
    }

    // Nodes present in the deepest, partially filled layer
    let remaining = tree_size - p + 1;

    if 2 * remaining < p {
        // The deepest layer ends inside the left subtree
        p = (p >> 1) + remaining;
    }

    p - 1
}

/// Relaxed two-predicate partition over `order`, whose final element holds
/// the pivot value and doubles as the guard stopping the left scan.
///
/// Elements strictly below the pivot value end up left of the returned
/// position and elements strictly above it at or right of it; elements
/// equal to the pivot value may land on either side. Distributing the
/// equal run is what keeps the selection from degenerating to O(n^2) when
/// many photons share a coordinate, as they do on axis-aligned geometry.
fn guarded_partition(
    photons: &[Photon],
    order: &mut [u32],
    axis: usize,
    pivot_value: f32,
) -> usize {
    debug_assert!(order.len() >= 2);
    let mut start = 0usize;
    let mut end = order.len() - 2;

    loop {
        // Guarded: the pivot element at the end of `order` stops this scan
        while photons[order[start] as usize].pos[axis] < pivot_value {
            start += 1;
        }
        while end > start && photons[order[end] as usize].pos[axis] > pivot_value {
            end -= 1;
        }
        if start >= end {
            break;
        }
        order.swap(start, end);
        start += 1;
        end -= 1;
    }

    start
}

/// Hoare-style selection: partition `order` until the element at `pivot`
/// imposes an ordering with respect to every other element. Does not sort;
/// it repeatedly partitions against the rightmost element's coordinate and
/// recurses into whichever half still contains `pivot`.
fn quick_partition(photons: &[Photon], order: &mut [u32], pivot: usize, axis: usize) {
    let mut left = 0usize;
    let mut right = order.len() - 1;

    while right > left {
        let pivot_value = photons[order[right] as usize].pos[axis];

        let mid = left + guarded_partition(photons, &mut order[left..=right], axis, pivot_value);

        // Move the pivot in between the two sets
        order.swap(mid, right);

        if mid > pivot {
            right = mid - 1;
        } else if mid < pivot {
            left = mid + 1;
        } else {
            return;
        }
    }
}

/// Recursively balance the subtree whose photons are listed in `order`,
/// writing the photon index chosen for heap slot `heap_index` into `perm`.
/// The AABB is clamped to the visited half-space on each side and restored
/// afterwards.
fn balance_recursive(
    photons: &mut [Photon],
    order: &mut [u32],
    perm: &mut [u32],
    aabb: &mut Aabb,
    heap_index: usize,
) {
    let n = order.len();
    if n == 1 {
        perm[heap_index] = order[0];
        return;
    }

    // Pivot position that yields a fully left-balanced subtree
    let pivot = left_subtree_size(n);

    // Splitting along the axis with the widest spread works well in
    // practice and is cheap to compute
    let split_axis = aabb.largest_axis();

    quick_partition(photons, order, pivot, split_axis);

    let pivot_photon = order[pivot] as usize;
    let split_pos = photons[pivot_photon].pos[split_axis];

    perm[heap_index] = order[pivot];
    photons[pivot_photon].set_split_axis(split_axis);

    if pivot > 0 {
        let saved = aabb.max[split_axis];
        aabb.max[split_axis] = split_pos;
        balance_recursive(photons, &mut order[..pivot], perm, aabb, left_child(heap_index));
        aabb.max[split_axis] = saved;
    }

    if pivot + 1 < n {
        let saved = aabb.min[split_axis];
        aabb.min[split_axis] = split_pos;
        balance_recursive(
            photons,
            &mut order[pivot + 1..],
            perm,
            aabb,
            right_child(heap_index),
        );
        aabb.min[split_axis] = saved;
    }
}

/// Apply `perm` to `data` by following cycles: slot `i` receives
/// `data[perm[i]]`. Consumes the permutation, leaving it as the identity.
pub(crate) fn permute_inplace(data: &mut [Photon], perm: &mut [u32]) {
    for i in 0..perm.len() {
        if perm[i] as usize == i {
            continue;
        }

        // Start of a new cycle: the value at the cycle head is overwritten
        // first, so keep it for the final slot
        let saved = data[i];
        let mut j = i;
        loop {
            let k = perm[j] as usize;
            perm[j] = j as u32;
            if k == i {
                data[j] = saved;
                break;
            }
            data[j] = data[k];
            j = k;
        }
    }
}
