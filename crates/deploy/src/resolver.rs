//! Dependency resolution: orders descriptors so that every artifact comes after
//! the artifacts whose addresses it references.

use std::collections::{BTreeSet, HashMap};

use crate::{ArtifactDescriptor, DeployError, artifact::validate_descriptors};

/// Order `descriptors` for deployment.
///
/// Artifacts with no ordering constraint between them keep their input order, so
/// identical input always yields an identical order. Fails without returning a
/// partial order if a reference is unknown or the graph has a cycle.
pub fn resolve(descriptors: &[ArtifactDescriptor]) -> Result<Vec<ArtifactDescriptor>, DeployError> {
    validate_descriptors(descriptors)?;

    let index_of: HashMap<&str, usize> = descriptors
        .iter()
        .enumerate()
        .map(|(index, descriptor)| (descriptor.name.as_str(), index))
        .collect();

    // dependencies[i]: artifacts that must be deployed before i.
    let mut dependencies: Vec<BTreeSet<usize>> = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let mut deps = BTreeSet::new();
        for reference in descriptor.references() {
            let dep = index_of.get(reference).copied().ok_or_else(|| {
                DeployError::UnknownReference {
                    artifact: descriptor.name.clone(),
                    reference: reference.to_string(),
                }
            })?;
            deps.insert(dep);
        }
        dependencies.push(deps);
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); descriptors.len()];
    for (index, deps) in dependencies.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(index);
        }
    }

    let mut pending: Vec<usize> = dependencies.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..descriptors.len())
        .filter(|&index| pending[index] == 0)
        .collect();
    let mut order = Vec::with_capacity(descriptors.len());

    while let Some(index) = ready.pop_first() {
        order.push(index);
        for &dependent in &dependents[index] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < descriptors.len() {
        let cycle = find_cycle(&dependencies, &pending);
        return Err(DeployError::Cycle {
            artifacts: cycle
                .into_iter()
                .map(|index| descriptors[index].name.clone())
                .collect(),
        });
    }

    tracing::debug!(
        order = ?order.iter().map(|&i| descriptors[i].name.as_str()).collect::<Vec<_>>(),
        "Resolved deployment order"
    );

    Ok(order.into_iter().map(|index| descriptors[index].clone()).collect())
}

/// Extract one concrete cycle from the nodes Kahn's algorithm could not place.
///
/// Every unplaced node has at least one unplaced dependency, so following
/// dependencies from any unplaced node must revisit a node.
fn find_cycle(dependencies: &[BTreeSet<usize>], pending: &[usize]) -> Vec<usize> {
    let unplaced = |index: usize| pending[index] > 0;

    let Some(start) = (0..pending.len()).find(|&index| unplaced(index)) else {
        return Vec::new();
    };

    let mut path = Vec::new();
    let mut position: HashMap<usize, usize> = HashMap::new();
    let mut current = start;

    loop {
        if let Some(&at) = position.get(&current) {
            let mut cycle = path.split_off(at);
            // Dependencies were followed, so reverse into dependency -> dependent order.
            cycle.reverse();
            let first = cycle
                .iter()
                .enumerate()
                .min_by_key(|&(_, index)| *index)
                .map(|(at, _)| at)
                .unwrap_or(0);
            cycle.rotate_left(first);
            return cycle;
        }

        position.insert(current, path.len());
        path.push(current);

        match dependencies[current].iter().copied().find(|&dep| unplaced(dep)) {
            Some(next) => current = next,
            None => return path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArgSpec;

    fn names(order: &[ArtifactDescriptor]) -> Vec<&str> {
        order.iter().map(|d| d.name.as_str()).collect()
    }

    fn with_refs(name: &str, refs: &[&str]) -> ArtifactDescriptor {
        refs.iter()
            .fold(ArtifactDescriptor::new(name), |d, r| d.arg(ArgSpec::reference(*r)))
    }

    #[test]
    fn test_independent_artifacts_keep_input_order() {
        let input = [with_refs("C", &[]), with_refs("A", &[]), with_refs("B", &[])];
        let order = resolve(&input).unwrap();
        assert_eq!(names(&order), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_dependents_after_dependencies() {
        let input = [
            with_refs("KeeperTB", &["Keeper", "KeeperNFT"]),
            with_refs("KeeperNFT", &[]),
            with_refs("Keeper", &[]),
        ];
        let order = resolve(&input).unwrap();
        assert_eq!(names(&order), vec!["KeeperNFT", "Keeper", "KeeperTB"]);
    }

    #[test]
    fn test_chain_and_diamond() {
        let input = [
            with_refs("D", &["B", "C"]),
            with_refs("C", &["A"]),
            with_refs("B", &["A"]),
            with_refs("A", &[]),
        ];
        let order = resolve(&input).unwrap();
        let order = names(&order);
        assert_eq!(order, vec!["A", "C", "B", "D"]);

        let pos = |n: &str| order.iter().position(|x| *x == n).unwrap();
        assert!(pos("A") < pos("B"));
        assert!(pos("A") < pos("C"));
        assert!(pos("B") < pos("D"));
        assert!(pos("C") < pos("D"));
    }

    #[test]
    fn test_repeated_reference_counts_once() {
        let input = [with_refs("B", &["A", "A"]), with_refs("A", &[])];
        let order = resolve(&input).unwrap();
        assert_eq!(names(&order), vec!["A", "B"]);
    }

    #[test]
    fn test_deterministic() {
        let input = [
            with_refs("E", &["A"]),
            with_refs("A", &[]),
            with_refs("D", &[]),
            with_refs("B", &["D", "A"]),
        ];
        let first = resolve(&input).unwrap();
        for _ in 0..10 {
            assert_eq!(resolve(&input).unwrap(), first);
        }
    }

    #[test]
    fn test_unknown_reference() {
        let input = [with_refs("KeeperTB", &["Keeper"])];
        match resolve(&input) {
            Err(DeployError::UnknownReference { artifact, reference }) => {
                assert_eq!(artifact, "KeeperTB");
                assert_eq!(reference, "Keeper");
            }
            other => panic!("expected unknown reference error, got {other:?}"),
        }
    }

    #[test]
    fn test_direct_cycle_names_both() {
        let input = [with_refs("A", &["B"]), with_refs("B", &["A"])];
        match resolve(&input) {
            Err(DeployError::Cycle { artifacts }) => assert_eq!(artifacts, vec!["A", "B"]),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_excludes_downstream_artifacts() {
        let input = [
            with_refs("Root", &[]),
            with_refs("Downstream", &["X"]),
            with_refs("X", &["Z", "Root"]),
            with_refs("Y", &["X"]),
            with_refs("Z", &["Y"]),
        ];
        match resolve(&input) {
            Err(DeployError::Cycle { artifacts }) => {
                assert_eq!(artifacts.len(), 3);
                assert_eq!(artifacts[0], "X");
                for name in ["X", "Y", "Z"] {
                    assert!(artifacts.iter().any(|a| a == name));
                }
                assert!(!artifacts.iter().any(|a| a == "Downstream" || a == "Root"));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let input = [with_refs("A", &["A"])];
        match resolve(&input) {
            Err(DeployError::Cycle { artifacts }) => assert_eq!(artifacts, vec!["A"]),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(resolve(&[]).unwrap().is_empty());
    }
}
