//! Complete-linkage hierarchical clustering and dendrogram cutting.
//!
//! Nodes live in an index-based arena: leaves occupy `0..n`, merges are
//! appended after them, and the root is the last node.

use super::selection::DistanceMatrix;

#[derive(Debug, Clone)]
struct Node {
    children: Option<(usize, usize)>,
    /// Linkage distance at which this node was formed (0 for leaves)
    height: f64,
    /// Input indices below this node, ascending
    members: Vec<usize>,
}

/// Binary merge tree over the rows of a distance matrix.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    nodes: Vec<Node>,
}

impl Dendrogram {
    /// Agglomerate with complete linkage: cluster distance is the largest
    /// pairwise distance between their members. Ties merge the pair found
    /// first in ascending index order.
    pub fn complete_linkage(matrix: &DistanceMatrix) -> Self {
        let n = matrix.len();
        let mut nodes: Vec<Node> = (0..n)
            .map(|i| Node {
                children: None,
                height: 0.0,
                members: vec![i],
            })
            .collect();
        let mut active: Vec<usize> = (0..n).collect();

        while active.len() > 1 {
            let mut best = (0, 1, f64::INFINITY);
            for a in 0..active.len() {
                for b in (a + 1)..active.len() {
                    let d = linkage(matrix, &nodes[active[a]], &nodes[active[b]]);
                    if d < best.2 {
                        best = (a, b, d);
                    }
                }
            }

            let (a, b, height) = best;
            let (left, right) = (active[a], active[b]);
            let mut members = nodes[left].members.clone();
            members.extend_from_slice(&nodes[right].members);
            members.sort_unstable();

            nodes.push(Node {
                children: Some((left, right)),
                height,
                members,
            });

            // b > a, so removing b first keeps a valid
            active.remove(b);
            active[a] = nodes.len() - 1;
        }

        Self { nodes }
    }

    pub fn root(&self) -> Option<usize> {
        self.nodes.len().checked_sub(1)
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.children.is_none()).count()
    }

    pub fn members(&self, node: usize) -> &[usize] {
        &self.nodes[node].members
    }

    /// Cut the tree into `k` clusters, returning their node ids.
    ///
    /// Starting from the root, the cluster with the largest merge height is
    /// split into its two children until `k` clusters exist. Equal heights
    /// split the higher node id first, which is the later merge.
    ///
    /// This is a height-ordered cut, not a breadth-first level cut: it does
    /// not take the first `k` nodes of the shallowest tree level holding at
    /// least `k` nodes. The two agree on balanced trees, but on a lopsided
    /// tree the height order keeps the `k` most separated groups.
    pub fn cut(&self, k: usize) -> Vec<usize> {
        let Some(root) = self.root() else {
            return Vec::new();
        };
        let mut clusters = vec![root];

        while clusters.len() < k {
            let next = (0..clusters.len())
                .filter(|&pos| self.nodes[clusters[pos]].children.is_some())
                .max_by(|&a, &b| {
                    let (x, y) = (clusters[a], clusters[b]);
                    self.nodes[x]
                        .height
                        .total_cmp(&self.nodes[y].height)
                        .then(x.cmp(&y))
                });

            let Some(pos) = next else { break };
            let Some((left, right)) = self.nodes[clusters[pos]].children else {
                break;
            };
            clusters[pos] = left;
            clusters.insert(pos + 1, right);
        }

        clusters
    }

    /// Member of `node` with the smallest average distance to the others.
    ///
    /// A two-member cluster has no meaningful medoid; its lower index is used.
    pub fn medoid(&self, node: usize, matrix: &DistanceMatrix) -> usize {
        let members = &self.nodes[node].members;
        if members.len() <= 2 {
            return members[0];
        }

        let mut best = members[0];
        let mut best_avg = f64::INFINITY;
        for &i in members {
            let total: f64 = members.iter().filter(|&&j| j != i).map(|&j| matrix[i][j]).sum();
            let avg = total / (members.len() - 1) as f64;
            if avg < best_avg {
                best = i;
                best_avg = avg;
            }
        }
        best
    }

    /// Medoids of the `k` clusters of [`Dendrogram::cut`].
    pub fn select(&self, k: usize, matrix: &DistanceMatrix) -> Vec<usize> {
        self.cut(k)
            .into_iter()
            .map(|node| self.medoid(node, matrix))
            .collect()
    }
}

fn linkage(matrix: &DistanceMatrix, a: &Node, b: &Node) -> f64 {
    a.members
        .iter()
        .flat_map(|&i| b.members.iter().map(move |&j| matrix[i][j]))
        .fold(f64::NEG_INFINITY, f64::max)
}
