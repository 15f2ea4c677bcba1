//! Plan tree traversal.

pub mod traversal;

#[cfg(test)]
mod tests {
    use super::traversal::{LevelNode, PostOrder, PreOrder};
    use pretty_assertions::assert_eq;

    //      0
    //    /   \
    //   1     4
    //  / \
    // 2   3
    fn children(id: usize) -> std::vec::IntoIter<usize> {
        match id {
            0 => vec![1, 4].into_iter(),
            1 => vec![2, 3].into_iter(),
            _ => Vec::new().into_iter(),
        }
    }

    #[test]
    fn post_order() {
        let nodes = PostOrder::with_capacity(children, 5).populate_nodes(0);
        assert_eq!(
            nodes,
            vec![
                LevelNode(2, 2),
                LevelNode(2, 3),
                LevelNode(1, 1),
                LevelNode(1, 4),
                LevelNode(0, 0),
            ]
        );
    }

    #[test]
    fn pre_order() {
        let nodes = PreOrder::with_capacity(children, 5).populate_nodes(0);
        assert_eq!(
            nodes,
            vec![
                LevelNode(0, 0),
                LevelNode(1, 1),
                LevelNode(2, 2),
                LevelNode(2, 3),
                LevelNode(1, 4),
            ]
        );
    }
}
