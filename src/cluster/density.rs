//! # Density mode
//!
//! $$
//! d_{\mathrm{mreach}}(a,b) = \max\{\mathrm{core}(a), \mathrm{core}(b), d(a,b)\}
//! $$
//!
//! Hierarchical density-based clustering in the HDBSCAN mold: core
//! distances, mutual-reachability graph, minimum spanning tree,
//! single-linkage hierarchy, condensation by minimum cluster size, and a
//! stability-maximizing flat extraction. Points no extracted cluster
//! claims keep the noise label 0. The whole procedure is deterministic:
//! no randomness enters at any step.

use ndarray::Array2;

use crate::cluster::NOISE_LABEL;
use crate::error::AnalysisError;

/// Density-mode parameters.
#[derive(Clone, Copy, Debug)]
pub struct DensityConfig {
  /// Smallest population a flat cluster may have. Larger values produce
  /// fewer, larger, more stable clusters and more noise points.
  pub min_cluster_size: usize,
  /// Neighbor count for core distances; defaults to `min_cluster_size`.
  pub min_samples: Option<usize>,
}

impl Default for DensityConfig {
  fn default() -> Self {
    Self {
      min_cluster_size: 5,
      min_samples: None,
    }
  }
}

/// Output of a density fit.
#[derive(Clone, Debug)]
pub struct DensityFit {
  /// Final label per input row; 0 is noise, clusters count from 1.
  pub labels: Vec<usize>,
  /// Number of extracted clusters.
  pub n_clusters: usize,
  /// Stability score per extracted cluster, indexed by label - 1.
  pub stabilities: Vec<f64>,
}

/// Guards against division by a zero merge distance (duplicate rows).
const MIN_MERGE_DISTANCE: f64 = 1e-12;

struct SingleLinkageTree {
  /// Children per internal node: `children[i]` belongs to node `n + i`.
  children: Vec<(usize, usize)>,
  /// Merge distance per internal node.
  distances: Vec<f64>,
  /// Subtree size per node (leaves and internal).
  sizes: Vec<usize>,
  n_leaves: usize,
}

impl SingleLinkageTree {
  fn root(&self) -> usize {
    2 * self.n_leaves - 2
  }

  fn is_leaf(&self, node: usize) -> bool {
    node < self.n_leaves
  }

  fn size(&self, node: usize) -> usize {
    self.sizes[node]
  }

  fn children(&self, node: usize) -> (usize, usize) {
    self.children[node - self.n_leaves]
  }

  fn distance(&self, node: usize) -> f64 {
    self.distances[node - self.n_leaves]
  }

  /// Leaf indices under `node`.
  fn leaves_under(&self, node: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(self.size(node));
    let mut stack = vec![node];
    while let Some(cur) = stack.pop() {
      if self.is_leaf(cur) {
        out.push(cur);
      } else {
        let (l, r) = self.children(cur);
        stack.push(l);
        stack.push(r);
      }
    }
    out
  }
}

fn pairwise_distances(matrix: &Array2<f64>) -> Array2<f64> {
  let n = matrix.nrows();
  let mut dist = Array2::zeros((n, n));
  for i in 0..n {
    for j in (i + 1)..n {
      let d = matrix
        .row(i)
        .iter()
        .zip(matrix.row(j).iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt();
      dist[[i, j]] = d;
      dist[[j, i]] = d;
    }
  }
  dist
}

fn core_distances(dist: &Array2<f64>, min_samples: usize) -> Vec<f64> {
  let n = dist.nrows();
  let k = min_samples.clamp(1, n - 1);
  (0..n)
    .map(|i| {
      let mut row: Vec<f64> = (0..n).filter(|j| *j != i).map(|j| dist[[i, j]]).collect();
      row.sort_by(|a, b| a.total_cmp(b));
      row[k - 1]
    })
    .collect()
}

/// Prim's MST over the implicit mutual-reachability graph.
fn mst_edges(dist: &Array2<f64>, core: &[f64]) -> Vec<(usize, usize, f64)> {
  let n = dist.nrows();
  let mut in_tree = vec![false; n];
  let mut best = vec![f64::INFINITY; n];
  let mut parent = vec![0usize; n];
  let mut edges = Vec::with_capacity(n - 1);

  in_tree[0] = true;
  for j in 1..n {
    best[j] = dist[[0, j]].max(core[0]).max(core[j]);
    parent[j] = 0;
  }

  for _ in 1..n {
    let next = (0..n)
      .filter(|j| !in_tree[*j])
      .min_by(|&a, &b| best[a].total_cmp(&best[b]))
      .expect("an out-of-tree vertex remains");
    in_tree[next] = true;
    edges.push((parent[next], next, best[next]));

    for j in 0..n {
      if in_tree[j] {
        continue;
      }
      let w = dist[[next, j]].max(core[next]).max(core[j]);
      if w < best[j] {
        best[j] = w;
        parent[j] = next;
      }
    }
  }
  edges
}

/// Merge MST edges in ascending order into a dendrogram.
fn single_linkage(n: usize, mut edges: Vec<(usize, usize, f64)>) -> SingleLinkageTree {
  edges.sort_by(|a, b| a.2.total_cmp(&b.2));

  let mut find_parent: Vec<usize> = (0..n).collect();
  fn find(parents: &mut Vec<usize>, mut x: usize) -> usize {
    while parents[x] != x {
      parents[x] = parents[parents[x]];
      x = parents[x];
    }
    x
  }

  let mut comp_node: Vec<usize> = (0..n).collect();
  let mut children = Vec::with_capacity(n - 1);
  let mut distances = Vec::with_capacity(n - 1);
  let mut sizes: Vec<usize> = vec![1; n];

  for (u, v, w) in edges {
    let ru = find(&mut find_parent, u);
    let rv = find(&mut find_parent, v);
    let node_u = comp_node[ru];
    let node_v = comp_node[rv];
    let new_node = n + children.len();

    children.push((node_u, node_v));
    distances.push(w);
    sizes.push(sizes[node_u] + sizes[node_v]);

    find_parent[rv] = ru;
    comp_node[ru] = new_node;
  }

  SingleLinkageTree {
    children,
    distances,
    sizes,
    n_leaves: n,
  }
}

#[derive(Clone, Debug)]
struct CondensedCluster {
  parent: Option<usize>,
  children: Vec<usize>,
  stability: f64,
}

/// Condensed-tree accumulator: clusters, and one exit event per point
/// `(point, cluster it fell out of, lambda)`.
struct Condensed {
  clusters: Vec<CondensedCluster>,
  events: Vec<(usize, usize, f64)>,
}

fn condense(tree: &SingleLinkageTree, min_cluster_size: usize) -> Condensed {
  let mut clusters = vec![CondensedCluster {
    parent: None,
    children: Vec::new(),
    stability: 0.0,
  }];
  let mut events = Vec::with_capacity(tree.n_leaves);
  let mut births = vec![0.0f64];

  // (tree node, condensed cluster it currently belongs to)
  let mut stack = vec![(tree.root(), 0usize)];
  while let Some((node, cluster)) = stack.pop() {
    debug_assert!(!tree.is_leaf(node));
    let (left, right) = tree.children(node);
    let lambda = 1.0 / tree.distance(node).max(MIN_MERGE_DISTANCE);
    let big_left = tree.size(left) >= min_cluster_size;
    let big_right = tree.size(right) >= min_cluster_size;
    let birth = births[cluster];

    if big_left && big_right {
      // True split: the parent cluster dies here, two children are born.
      clusters[cluster].stability +=
        (tree.size(left) + tree.size(right)) as f64 * (lambda - birth);
      for child_node in [left, right] {
        let child_cluster = clusters.len();
        clusters.push(CondensedCluster {
          parent: Some(cluster),
          children: Vec::new(),
          stability: 0.0,
        });
        births.push(lambda);
        clusters[cluster].children.push(child_cluster);
        stack.push((child_node, child_cluster));
      }
    } else if big_left || big_right {
      // Points on the small side fall out; the cluster itself survives.
      let (keep, shed) = if big_left { (left, right) } else { (right, left) };
      for point in tree.leaves_under(shed) {
        events.push((point, cluster, lambda));
        clusters[cluster].stability += lambda - birth;
      }
      // The surviving side has >= min_cluster_size >= 2 points, so it is
      // always an internal node.
      stack.push((keep, cluster));
    } else {
      // Neither side is viable: the cluster dissolves entirely.
      for point in tree
        .leaves_under(left)
        .into_iter()
        .chain(tree.leaves_under(right))
      {
        events.push((point, cluster, lambda));
        clusters[cluster].stability += lambda - birth;
      }
    }
  }

  Condensed { clusters, events }
}

/// Excess-of-mass extraction: keep a cluster when its own stability beats
/// the sum of its children's, never selecting the root.
fn select_clusters(clusters: &[CondensedCluster]) -> Vec<bool> {
  let m = clusters.len();
  let mut score = vec![0.0f64; m];
  let mut selected = vec![false; m];

  for c in (0..m).rev() {
    let child_sum: f64 = clusters[c].children.iter().map(|&ch| score[ch]).sum();
    if c != 0 && (clusters[c].children.is_empty() || clusters[c].stability >= child_sum) {
      score[c] = clusters[c].stability;
      selected[c] = true;
    } else {
      score[c] = child_sum;
    }
  }

  // A selected ancestor absorbs any selected descendants.
  let mut kept = vec![false; m];
  for c in 0..m {
    if !selected[c] {
      continue;
    }
    let mut ancestor = clusters[c].parent;
    let mut shadowed = false;
    while let Some(a) = ancestor {
      if selected[a] {
        shadowed = true;
        break;
      }
      ancestor = clusters[a].parent;
    }
    kept[c] = !shadowed;
  }
  kept
}

/// Fit the density mode over a preprocessed feature matrix.
pub fn fit(matrix: &Array2<f64>, config: &DensityConfig) -> Result<DensityFit, AnalysisError> {
  let n = matrix.nrows();
  let mcs = config.min_cluster_size;
  if mcs < 2 {
    return Err(AnalysisError::InsufficientPopulation {
      rows: n,
      required: 4,
    });
  }
  if n < 2 * mcs {
    return Err(AnalysisError::InsufficientPopulation {
      rows: n,
      required: 2 * mcs,
    });
  }

  let dist = pairwise_distances(matrix);
  let core = core_distances(&dist, config.min_samples.unwrap_or(mcs));
  let edges = mst_edges(&dist, &core);
  let tree = single_linkage(n, edges);
  let condensed = condense(&tree, mcs);
  let keep = select_clusters(&condensed.clusters);

  // Stable relabeling: extracted clusters numbered in creation order.
  let mut label_of_cluster = vec![NOISE_LABEL; condensed.clusters.len()];
  let mut stabilities = Vec::new();
  let mut next = 1usize;
  for (c, kept) in keep.iter().enumerate() {
    if *kept {
      label_of_cluster[c] = next;
      stabilities.push(condensed.clusters[c].stability);
      next += 1;
    }
  }

  let mut labels = vec![NOISE_LABEL; n];
  for (point, cluster, _) in &condensed.events {
    // Walk up to the extracted ancestor, if any.
    let mut cur = Some(*cluster);
    while let Some(c) = cur {
      if label_of_cluster[c] != NOISE_LABEL {
        labels[*point] = label_of_cluster[c];
        break;
      }
      cur = condensed.clusters[c].parent;
    }
  }

  Ok(DensityFit {
    labels,
    n_clusters: next - 1,
    stabilities,
  })
}
