pub const REL_CAPACITY: usize = 32;

/// Pair of (Level of the node in traversal algorithm, `node_id`).
#[derive(Debug, PartialEq)]
pub struct LevelNode<T>(pub usize, pub T)
where
    T: Copy;

/// Children first, then the node itself. Siblings are visited in the
/// order `iter_children` yields them.
pub struct PostOrder<F, I, T>
where
    F: FnMut(T) -> I,
    I: Iterator<Item = T>,
    T: Copy,
{
    iter_children: F,
    nodes: Vec<LevelNode<T>>,
}

impl<F, I, T> PostOrder<F, I, T>
where
    F: FnMut(T) -> I,
    I: Iterator<Item = T>,
    T: Copy,
{
    pub fn into_iter(self, root: T) -> impl Iterator<Item = LevelNode<T>> {
        self.populate_nodes(root).into_iter()
    }

    pub fn populate_nodes(mut self, root: T) -> Vec<LevelNode<T>> {
        self.nodes.clear();
        self.traverse(root, 0);
        self.nodes
    }

    fn traverse(&mut self, root: T, level: usize) {
        for child in (self.iter_children)(root) {
            self.traverse(child, level + 1);
        }
        self.nodes.push(LevelNode(level, root));
    }

    pub fn with_capacity(iter_children: F, capacity: usize) -> Self {
        Self {
            iter_children,
            nodes: Vec::with_capacity(capacity),
        }
    }
}

/// The node itself, then its children.
pub struct PreOrder<F, I, T>
where
    F: FnMut(T) -> I,
    I: Iterator<Item = T>,
    T: Copy,
{
    iter_children: F,
    nodes: Vec<LevelNode<T>>,
}

impl<F, I, T> PreOrder<F, I, T>
where
    F: FnMut(T) -> I,
    I: Iterator<Item = T>,
    T: Copy,
{
    pub fn into_iter(self, root: T) -> impl Iterator<Item = LevelNode<T>> {
        self.populate_nodes(root).into_iter()
    }

    pub fn populate_nodes(mut self, root: T) -> Vec<LevelNode<T>> {
        self.nodes.clear();
        self.traverse(root, 0);
        self.nodes
    }

    fn traverse(&mut self, root: T, level: usize) {
        self.nodes.push(LevelNode(level, root));
        for child in (self.iter_children)(root) {
            self.traverse(child, level + 1);
        }
    }

    pub fn with_capacity(iter_children: F, capacity: usize) -> Self {
        Self {
            iter_children,
            nodes: Vec::with_capacity(capacity),
        }
    }
}
