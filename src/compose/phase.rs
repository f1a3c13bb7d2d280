//! Phase planning
//!
//! A phase is an ordered list of batches. Each batch is acted on by a single
//! runtime command, batches run one after another in category order.

use super::builder::CategoryLists;
use super::config::{Category, ResolvedService};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Ordered batches of unit names
pub type Phase = Vec<Vec<String>>;

/// Which categories an operation acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOptions {
    included: BTreeSet<Category>,
}

impl Default for PhaseOptions {
    /// Everything except image-only units
    fn default() -> Self {
        Self {
            included: Category::ALL
                .into_iter()
                .filter(|c| *c != Category::Images)
                .collect(),
        }
    }
}

impl PhaseOptions {
    /// Every category, images included
    pub fn with_images() -> Self {
        Self {
            included: Category::ALL.into_iter().collect(),
        }
    }

    pub fn includes(&self, category: Category) -> bool {
        self.included.contains(&category)
    }
}

/// Non-empty category lists in phase order
pub fn category_batches(lists: &CategoryLists, options: &PhaseOptions) -> Phase {
    collapse(
        Category::ALL
            .into_iter()
            .filter(|c| options.includes(*c))
            .map(|c| lists.get(c).to_vec()),
    )
}

/// Every unit connected to a target through depends-on edges: what the
/// targets depend on, and what depends on them.
pub fn dependency_closure(services: &BTreeMap<String, ResolvedService>, targets: &[String]) -> BTreeSet<String> {
    let depends_on = |name: &str| -> Vec<String> {
        services
            .get(name)
            .and_then(|s| s.depends_on.as_ref())
            .map(|deps| deps.items().to_vec())
            .unwrap_or_default()
    };
    let dependents = |name: &str| -> Vec<String> {
        services
            .iter()
            .filter(|(_, s)| s.depends_on.as_ref().is_some_and(|deps| deps.items().iter().any(|d| d == name)))
            .map(|(n, _)| n.clone())
            .collect()
    };

    let mut closure = fixed_point(targets, depends_on);
    closure.extend(fixed_point(targets, dependents));
    closure
}

fn fixed_point(start: &[String], next: impl Fn(&str) -> Vec<String>) -> BTreeSet<String> {
    let mut seen: BTreeSet<String> = start.iter().cloned().collect();
    let mut frontier: VecDeque<String> = start.iter().cloned().collect();

    while let Some(name) = frontier.pop_front() {
        for found in next(&name) {
            if seen.insert(found.clone()) {
                frontier.push_back(found);
            }
        }
    }
    seen
}

/// Keep only `selected` units in each batch, dropping batches left empty
pub fn filter_batches(batches: Phase, selected: &BTreeSet<String>) -> Phase {
    collapse(
        batches
            .into_iter()
            .map(|batch| batch.into_iter().filter(|name| selected.contains(name)).collect()),
    )
}

/// Plan the batches for one operation.
///
/// Without targets every included unit takes part. With targets only they
/// take part, plus their dependency closure when `with_dependencies` is set.
pub fn plan(
    lists: &CategoryLists,
    services: &BTreeMap<String, ResolvedService>,
    options: &PhaseOptions,
    targets: &[String],
    with_dependencies: bool,
) -> Phase {
    let batches = category_batches(lists, options);
    if targets.is_empty() {
        return batches;
    }

    let selected = if with_dependencies {
        dependency_closure(services, targets)
    } else {
        targets.iter().cloned().collect()
    };
    tracing::trace!("Selected units: {:?}", selected);

    filter_batches(batches, &selected)
}

/// Drop empty batches and any batch equal to the one before it
fn collapse(batches: impl IntoIterator<Item = Vec<String>>) -> Phase {
    let mut phase: Phase = Vec::new();
    for batch in batches {
        if batch.is_empty() || phase.last() == Some(&batch) {
            continue;
        }
        phase.push(batch);
    }
    phase
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::config::ServiceDeclaration;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn lists(entries: Vec<(Category, Vec<&str>)>) -> CategoryLists {
        let mut lists = CategoryLists::default();
        for (category, units) in entries {
            lists.extend(category, names(&units).iter());
        }
        lists
    }

    fn chain() -> BTreeMap<String, ResolvedService> {
        let mut services = BTreeMap::new();
        services.insert("A".to_string(), ServiceDeclaration::default().with_depends_on(&["B"]));
        services.insert("B".to_string(), ServiceDeclaration::default().with_depends_on(&["C"]));
        services.insert("C".to_string(), ServiceDeclaration::default());
        services.insert("D".to_string(), ServiceDeclaration::default());
        services
    }

    #[test]
    fn test_adjacent_identical_batches_collapse() {
        let lists = lists(vec![(Category::Infrastructure, vec!["x"]), (Category::Packages, vec!["x"])]);
        assert_eq!(category_batches(&lists, &PhaseOptions::default()), vec![names(&["x"])]);
    }

    #[test]
    fn test_images_only_with_build_options() {
        let lists = lists(vec![
            (Category::Images, vec!["base"]),
            (Category::Infrastructure, vec!["mysql"]),
            (Category::Services, vec!["api"]),
        ]);

        assert_eq!(
            category_batches(&lists, &PhaseOptions::default()),
            vec![names(&["mysql"]), names(&["api"])]
        );
        assert_eq!(
            category_batches(&lists, &PhaseOptions::with_images()),
            vec![names(&["base"]), names(&["mysql"]), names(&["api"])]
        );
    }

    #[test]
    fn test_dependency_closure_follows_chain() {
        let closure = dependency_closure(&chain(), &names(&["A"]));
        assert_eq!(closure, names(&["A", "B", "C"]).into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_dependency_closure_includes_dependents() {
        let closure = dependency_closure(&chain(), &names(&["C"]));
        assert_eq!(closure, names(&["A", "B", "C"]).into_iter().collect::<BTreeSet<_>>());

        let isolated = dependency_closure(&chain(), &names(&["D"]));
        assert_eq!(isolated, names(&["D"]).into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_plan_with_targets() {
        let lists = lists(vec![
            (Category::Infrastructure, vec!["C", "D"]),
            (Category::Packages, vec!["B"]),
            (Category::Services, vec!["A"]),
        ]);
        let services = chain();
        let options = PhaseOptions::default();

        assert_eq!(
            plan(&lists, &services, &options, &names(&["A"]), true),
            vec![names(&["C"]), names(&["B"]), names(&["A"])]
        );
        assert_eq!(
            plan(&lists, &services, &options, &names(&["A"]), false),
            vec![names(&["A"])]
        );
        assert_eq!(
            plan(&lists, &services, &options, &[], false),
            vec![names(&["C", "D"]), names(&["B"]), names(&["A"])]
        );
    }

    #[test]
    fn test_filtering_collapses_again() {
        let lists = lists(vec![
            (Category::Infrastructure, vec!["x", "y"]),
            (Category::Batch, vec!["x", "z"]),
        ]);
        let phase = plan(&lists, &BTreeMap::new(), &PhaseOptions::default(), &names(&["x"]), false);
        assert_eq!(phase, vec![names(&["x"])]);
    }

    #[test]
    fn test_unknown_targets_plan_nothing() {
        let lists = lists(vec![(Category::Services, vec!["api"])]);
        let phase = plan(&lists, &BTreeMap::new(), &PhaseOptions::default(), &names(&["ghost"]), true);
        assert!(phase.is_empty());
    }
}
