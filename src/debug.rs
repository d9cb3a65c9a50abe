use core::ptr::NonNull;
use std::{collections::VecDeque, fmt};

use crate::{links, Color, Node, NodeAllocator, RbTree};

impl<K, V, A: NodeAllocator> RbTree<K, V, A> {
    /// Writes the tree to `w` as a Graphviz digraph named `name`.
    ///
    /// Nodes are labelled with their keys and filled with their colors; nil leaves are drawn
    /// as points. Each tree level is laid out on one rank.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
        K: fmt::Display,
    {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<K, V> {
            Node(NonNull<Node<K, V>>),
            Nil(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut nil = 0;
        let mut edges = String::new();

        while !queue.is_empty() {
            use fmt::Write;

            write!(w, "{{rank=same; ")?;

            for _ in 0..queue.len() {
                let node = match queue.pop_front() {
                    Some(Item::Node(node)) => node,
                    Some(Item::Nil(id)) => {
                        write!(w, "\"graph{name}-nil{id}\" [shape=point]; ")?;
                        continue;
                    }
                    None => break,
                };

                let (key, links) = unsafe { (&(*node.as_ptr()).key, links(node)) };
                let (fill, font) = match links.color() {
                    Color::Red => ("red", "black"),
                    Color::Black => ("black", "white"),
                };
                write!(
                    w,
                    "\"graph{name}-{key}\" [label=\"{key}\", style=filled, \
                     fillcolor={fill}, fontcolor={font}]; "
                )?;

                for child in [links.left(), links.right()] {
                    match child {
                        Some(child) => {
                            let child_key = unsafe { &(*child.as_ptr()).key };

                            queue.push_back(Item::Node(child));
                            writeln!(
                                edges,
                                "\"graph{name}-{key}\" -> \"graph{name}-{child_key}\";"
                            )?;
                        }
                        None => {
                            queue.push_back(Item::Nil(nil));
                            writeln!(edges, "\"graph{name}-{key}\" -> \"graph{name}-nil{nil}\";")?;
                            nil += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&edges)?;

        w.write_str(" }\n}")
    }
}

impl<K, V, A> fmt::Debug for RbTree<K, V, A>
where
    K: fmt::Debug,
    V: fmt::Debug,
    A: NodeAllocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.for_each(|key, value| {
            map.entry(key, value);
        });
        map.finish()
    }
}
