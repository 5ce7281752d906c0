// Disjoint-set forest used by the template miner
//
// `find` walks to the root iteratively and then compresses the path in a
// second loop, so arbitrarily long chains never touch the call stack.

#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    components: usize,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
            components: n,
        }
    }

    pub fn find(&mut self, a: usize) -> usize {
        let mut root = a;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut node = a;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }

        root
    }

    /// Merge the sets containing `a` and `b`; returns false if already merged
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (x, y) = (self.find(a), self.find(b));
        if x == y {
            return false;
        }

        let (big, small) = if self.size[x] >= self.size[y] {
            (x, y)
        } else {
            (y, x)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        self.components -= 1;
        true
    }

    pub fn components(&self) -> usize {
        self.components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons() {
        let mut uf = UnionFind::new(4);
        assert_eq!(uf.components(), 4);
        for i in 0..4 {
            assert_eq!(uf.find(i), i);
        }
    }

    #[test]
    fn test_union_merges() {
        let mut uf = UnionFind::new(5);
        assert!(uf.union(0, 1));
        assert!(uf.union(3, 4));
        assert!(!uf.union(1, 0));
        assert_eq!(uf.components(), 3);
        assert_eq!(uf.find(0), uf.find(1));
        assert_ne!(uf.find(0), uf.find(3));
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let n = 200_000;
        let mut uf = UnionFind::new(n);
        for i in 1..n {
            uf.union(i - 1, i);
        }
        assert_eq!(uf.components(), 1);
        let root = uf.find(n - 1);
        assert_eq!(uf.find(0), root);
    }
}
