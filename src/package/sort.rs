use crate::semantic::SemanticError;
use log::debug;
use std::collections::BTreeSet;

/// Something that declares names and may refer to names declared by others.
pub trait DependencyNode {
    fn decls(&self) -> &[String];
    fn references(&self, name: &str) -> bool;
}

/// Orders `nodes` so that every node comes after the nodes declaring the
/// names it refers to. Among the nodes that are ready at the same time the
/// one given first goes first.
///
/// A node referring to its own declarations is not a dependency. Names no
/// node declares are ignored.
pub fn topo_sort<T: DependencyNode>(nodes: Vec<T>) -> Result<Vec<T>, SemanticError> {
    let count = nodes.len();
    let mut dependents = vec![vec![]; count];
    let mut pending = vec![0usize; count];

    for (i, node) in nodes.iter().enumerate() {
        for (j, other) in nodes.iter().enumerate() {
            if i != j && other.decls().iter().any(|name| node.references(name)) {
                dependents[j].push(i);
                pending[i] += 1;
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..count).filter(|i| pending[*i] == 0).collect();
    let mut order = Vec::with_capacity(count);

    loop {
        let next = match ready.iter().next() {
            Some(next) => *next,
            None => break,
        };

        ready.remove(&next);
        order.push(next);

        for dependent in &dependents[next] {
            pending[*dependent] -= 1;
            if pending[*dependent] == 0 {
                ready.insert(*dependent);
            }
        }
    }

    if order.len() < count {
        let mut emitted = vec![false; count];
        for i in &order {
            emitted[*i] = true;
        }

        let names: Vec<String> = nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| !emitted[*i])
            .flat_map(|(_, node)| node.decls().iter().cloned())
            .collect();

        debug!("[topo_sort] cycle among {:?}", names);
        return Err(SemanticError::DependencyCycle { names });
    }

    debug!("[topo_sort] order {:?}", order);

    let mut slots: Vec<Option<T>> = nodes.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
