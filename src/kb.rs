//! Knowledge source: the reasoning interface the search engines consume.
//!
//! The engines only ever ask a handful of read-only questions — instance
//! retrieval, class hierarchy navigation, property domains, satisfiability —
//! captured by the [`KnowledgeSource`] trait. Any ontology backend (a full
//! OWL reasoner, a triple store, a SPARQL endpoint) can sit behind it.
//!
//! [`MemoryKnowledgeBase`] is the built-in closed-world implementation:
//! explicit class/property assertions, a petgraph-indexed subsumption
//! hierarchy with transitive membership, and set-algebra evaluation of every
//! concept constructor. It is what the tests and small learning problems run
//! against.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;

use crate::error::{KbError, KbResult};
use crate::expr::{CardinalityBound, ConceptExpr};
use crate::vocab::{ClassId, IndividualId, IndividualSet, PropertyId};

/// Read-only reasoning interface consumed by the refinement operator and the
/// search engines.
///
/// All queries are side-effect-free; implementations must be safe for
/// concurrent read-only use (fitness evaluation fans out across rayon
/// workers). A failing backend reports [`KbError::Unavailable`], which aborts
/// the current search run.
pub trait KnowledgeSource: Send + Sync {
    /// All named individuals in the knowledge base.
    fn all_individuals(&self) -> KbResult<IndividualSet>;

    /// The instance set of a concept expression.
    fn individuals_of(&self, expr: &ConceptExpr) -> KbResult<IndividualSet>;

    /// Whether an individual is an instance of a concept expression.
    fn is_instance(&self, individual: &IndividualId, expr: &ConceptExpr) -> KbResult<bool> {
        Ok(self.individuals_of(expr)?.contains(individual))
    }

    /// All declared atomic classes, in deterministic order.
    fn atomic_classes(&self) -> Vec<ClassId>;

    /// Direct subclasses of a named class, in deterministic order.
    fn direct_subclasses(&self, class: &ClassId) -> Vec<ClassId>;

    /// Direct superclasses of a named class, in deterministic order.
    fn direct_superclasses(&self, class: &ClassId) -> Vec<ClassId>;

    /// All declared object properties, in deterministic order.
    fn properties(&self) -> Vec<PropertyId>;

    /// Properties whose domain overlaps the instance set of `domain`,
    /// in deterministic order.
    fn properties_with_domain(&self, domain: &ConceptExpr) -> KbResult<Vec<PropertyId>>;

    /// Whether a property is declared functional (at most one successor).
    fn is_functional(&self, property: &PropertyId) -> bool;

    /// Whether a concept expression has at least one instance.
    ///
    /// The default is ABox-witnessed satisfiability: satisfiable iff the
    /// retrieval is non-empty. A reasoner-backed implementation may answer
    /// from the TBox instead.
    fn is_satisfiable(&self, expr: &ConceptExpr) -> KbResult<bool> {
        Ok(!self.individuals_of(expr)?.is_empty())
    }
}

/// In-memory, closed-world knowledge base.
///
/// Classes form a subsumption DAG; an individual asserted into a class is an
/// instance of all its ancestors. Negation is complement against the full
/// individual set, and universal restrictions are vacuously satisfied by
/// individuals without successors, matching OWL semantics.
#[derive(Debug, Default)]
pub struct MemoryKnowledgeBase {
    hierarchy: DiGraph<ClassId, ()>,
    class_nodes: BTreeMap<ClassId, NodeIndex>,
    direct_members: BTreeMap<ClassId, IndividualSet>,
    individuals: IndividualSet,
    /// subject → objects, per property.
    relations: BTreeMap<PropertyId, BTreeMap<IndividualId, IndividualSet>>,
    domains: BTreeMap<PropertyId, ClassId>,
    functional: BTreeSet<PropertyId>,
}

impl MemoryKnowledgeBase {
    /// Create an empty knowledge base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a class, returning its identifier. Idempotent.
    pub fn declare_class(&mut self, name: impl Into<ClassId>) -> ClassId {
        let class = name.into();
        if !self.class_nodes.contains_key(&class) {
            let node = self.hierarchy.add_node(class.clone());
            self.class_nodes.insert(class.clone(), node);
            self.direct_members.insert(class.clone(), IndividualSet::new());
        }
        class
    }

    /// Declare `sub` a direct subclass of `sup`, declaring both if needed.
    pub fn declare_subclass(&mut self, sub: impl Into<ClassId>, sup: impl Into<ClassId>) {
        let sub = self.declare_class(sub);
        let sup = self.declare_class(sup);
        let sub_node = self.class_nodes[&sub];
        let sup_node = self.class_nodes[&sup];
        if !self.hierarchy.contains_edge(sup_node, sub_node) {
            self.hierarchy.add_edge(sup_node, sub_node, ());
        }
    }

    /// Declare an object property, returning its identifier. Idempotent.
    pub fn declare_property(&mut self, name: impl Into<PropertyId>) -> PropertyId {
        let property = name.into();
        self.relations.entry(property.clone()).or_default();
        property
    }

    /// Declare the domain class of a property.
    pub fn declare_domain(&mut self, property: impl Into<PropertyId>, class: impl Into<ClassId>) {
        let property = self.declare_property(property);
        let class = self.declare_class(class);
        self.domains.insert(property, class);
    }

    /// Declare a property functional (at most one successor per subject).
    pub fn declare_functional(&mut self, property: impl Into<PropertyId>) {
        let property = self.declare_property(property);
        self.functional.insert(property);
    }

    /// Assert that an individual belongs to a class, declaring both if needed.
    pub fn assert_class(&mut self, individual: impl Into<IndividualId>, class: impl Into<ClassId>) {
        let individual = individual.into();
        let class = self.declare_class(class);
        self.individuals.insert(individual.clone());
        self.direct_members
            .get_mut(&class)
            .expect("declared above")
            .insert(individual);
    }

    /// Assert an object-property relation between two individuals.
    pub fn assert_relation(
        &mut self,
        subject: impl Into<IndividualId>,
        property: impl Into<PropertyId>,
        object: impl Into<IndividualId>,
    ) {
        let subject = subject.into();
        let property = self.declare_property(property);
        let object = object.into();
        self.individuals.insert(subject.clone());
        self.individuals.insert(object.clone());
        self.relations
            .get_mut(&property)
            .expect("declared above")
            .entry(subject)
            .or_default()
            .insert(object);
    }

    /// Members of a named class, including members of all transitive
    /// subclasses.
    pub fn members_of(&self, class: &ClassId) -> KbResult<IndividualSet> {
        let start = *self
            .class_nodes
            .get(class)
            .ok_or_else(|| KbError::UnknownClass {
                name: class.as_str().to_string(),
            })?;
        let mut members = IndividualSet::new();
        let mut bfs = Bfs::new(&self.hierarchy, start);
        while let Some(node) = bfs.next(&self.hierarchy) {
            if let Some(direct) = self.direct_members.get(&self.hierarchy[node]) {
                members.extend(direct.iter().cloned());
            }
        }
        Ok(members)
    }

    /// Objects related to `subject` via `property` (empty if none).
    fn successors(&self, property: &PropertyId, subject: &IndividualId) -> Option<&IndividualSet> {
        self.relations.get(property)?.get(subject)
    }

    fn eval(&self, expr: &ConceptExpr) -> KbResult<IndividualSet> {
        match expr {
            ConceptExpr::Top => Ok(self.individuals.clone()),
            ConceptExpr::Bottom => Ok(IndividualSet::new()),
            ConceptExpr::Atomic(class) => match self.members_of(class) {
                Ok(members) => Ok(members),
                // Undeclared classes retrieve empty rather than failing:
                // search candidates may mention classes with no assertions.
                Err(KbError::UnknownClass { .. }) => Ok(IndividualSet::new()),
                Err(other) => Err(other),
            },
            ConceptExpr::Not(operand) => {
                let inner = self.eval(operand)?;
                Ok(self
                    .individuals
                    .iter()
                    .filter(|individual| !inner.contains(*individual))
                    .cloned()
                    .collect())
            }
            ConceptExpr::And(operands) => {
                let mut iter = operands.iter();
                let mut result = self.eval(iter.next().expect("arity >= 2"))?;
                for operand in iter {
                    let other = self.eval(operand)?;
                    result.retain(|individual| other.contains(individual));
                    if result.is_empty() {
                        break;
                    }
                }
                Ok(result)
            }
            ConceptExpr::Or(operands) => {
                let mut result = IndividualSet::new();
                for operand in operands {
                    result.extend(self.eval(operand)?);
                }
                Ok(result)
            }
            ConceptExpr::Some { property, filler } => {
                let filler_set = self.eval(filler)?;
                Ok(self
                    .individuals
                    .iter()
                    .filter(|subject| {
                        self.successors(property, subject)
                            .is_some_and(|objects| {
                                objects.iter().any(|object| filler_set.contains(object))
                            })
                    })
                    .cloned()
                    .collect())
            }
            ConceptExpr::All { property, filler } => {
                let filler_set = self.eval(filler)?;
                // Vacuously satisfied by individuals without successors.
                Ok(self
                    .individuals
                    .iter()
                    .filter(|subject| {
                        self.successors(property, subject).is_none_or(|objects| {
                            objects.iter().all(|object| filler_set.contains(object))
                        })
                    })
                    .cloned()
                    .collect())
            }
            ConceptExpr::Card {
                property,
                bound,
                n,
                filler,
            } => {
                let filler_set = self.eval(filler)?;
                Ok(self
                    .individuals
                    .iter()
                    .filter(|subject| {
                        let count = self
                            .successors(property, subject)
                            .map(|objects| {
                                objects
                                    .iter()
                                    .filter(|object| filler_set.contains(*object))
                                    .count() as u32
                            })
                            .unwrap_or(0);
                        match bound {
                            CardinalityBound::AtLeast => count >= *n,
                            CardinalityBound::AtMost => count <= *n,
                            CardinalityBound::Exactly => count == *n,
                        }
                    })
                    .cloned()
                    .collect())
            }
        }
    }
}

impl KnowledgeSource for MemoryKnowledgeBase {
    fn all_individuals(&self) -> KbResult<IndividualSet> {
        Ok(self.individuals.clone())
    }

    fn individuals_of(&self, expr: &ConceptExpr) -> KbResult<IndividualSet> {
        self.eval(expr)
    }

    fn atomic_classes(&self) -> Vec<ClassId> {
        self.class_nodes.keys().cloned().collect()
    }

    fn direct_subclasses(&self, class: &ClassId) -> Vec<ClassId> {
        let Some(&node) = self.class_nodes.get(class) else {
            return Vec::new();
        };
        let mut subs: Vec<ClassId> = self
            .hierarchy
            .neighbors_directed(node, Direction::Outgoing)
            .map(|sub| self.hierarchy[sub].clone())
            .collect();
        subs.sort();
        subs
    }

    fn direct_superclasses(&self, class: &ClassId) -> Vec<ClassId> {
        let Some(&node) = self.class_nodes.get(class) else {
            return Vec::new();
        };
        let mut sups: Vec<ClassId> = self
            .hierarchy
            .neighbors_directed(node, Direction::Incoming)
            .map(|sup| self.hierarchy[sup].clone())
            .collect();
        sups.sort();
        sups
    }

    fn properties(&self) -> Vec<PropertyId> {
        self.relations.keys().cloned().collect()
    }

    fn properties_with_domain(&self, domain: &ConceptExpr) -> KbResult<Vec<PropertyId>> {
        let domain_set = self.eval(domain)?;
        let mut matching = Vec::new();
        for property in self.relations.keys() {
            let overlaps = match self.domains.get(property) {
                Some(class) => self
                    .members_of(class)?
                    .iter()
                    .any(|member| domain_set.contains(member)),
                // No declared domain: fall back to the subjects actually
                // using the property.
                None => self
                    .relations[property]
                    .keys()
                    .any(|subject| domain_set.contains(subject)),
            };
            if overlaps {
                matching.push(property.clone());
            }
        }
        Ok(matching)
    }

    fn is_functional(&self, property: &PropertyId) -> bool {
        self.functional.contains(property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The family benchmark in miniature: Person splits into Male/Female,
    /// parents have children.
    fn family_kb() -> MemoryKnowledgeBase {
        let mut kb = MemoryKnowledgeBase::new();
        kb.declare_subclass("Male", "Person");
        kb.declare_subclass("Female", "Person");
        kb.declare_subclass("Parent", "Person");
        kb.declare_domain("hasChild", "Parent");

        for name in ["anna", "carla"] {
            kb.assert_class(name, "Female");
            kb.assert_class(name, "Parent");
        }
        kb.assert_class("eve", "Female");
        for name in ["bruno", "diego"] {
            kb.assert_class(name, "Male");
        }
        kb.assert_class("bruno", "Parent");

        kb.assert_relation("anna", "hasChild", "eve");
        kb.assert_relation("carla", "hasChild", "diego");
        kb.assert_relation("carla", "hasChild", "eve");
        kb.assert_relation("bruno", "hasChild", "diego");
        kb
    }

    fn names(set: &IndividualSet) -> Vec<&str> {
        let mut v: Vec<&str> = set.iter().map(|i| i.as_str()).collect();
        v.sort();
        v
    }

    #[test]
    fn atomic_retrieval_includes_subclass_members() {
        let kb = family_kb();
        let people = kb.individuals_of(&ConceptExpr::atomic("Person")).unwrap();
        assert_eq!(names(&people), ["anna", "bruno", "carla", "diego", "eve"]);
        let females = kb.individuals_of(&ConceptExpr::atomic("Female")).unwrap();
        assert_eq!(names(&females), ["anna", "carla", "eve"]);
    }

    #[test]
    fn undeclared_class_retrieves_empty() {
        let kb = family_kb();
        let set = kb.individuals_of(&ConceptExpr::atomic("Dragon")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn boolean_connectives_evaluate_by_set_algebra() {
        let kb = family_kb();
        let female_parent = ConceptExpr::atomic("Female").conjoin(ConceptExpr::atomic("Parent"));
        assert_eq!(
            names(&kb.individuals_of(&female_parent).unwrap()),
            ["anna", "carla"]
        );

        let not_male = ConceptExpr::not(ConceptExpr::atomic("Male"));
        assert_eq!(
            names(&kb.individuals_of(&not_male).unwrap()),
            ["anna", "carla", "eve"]
        );
    }

    #[test]
    fn existential_restriction_requires_a_witness() {
        let kb = family_kb();
        let has_female_child = ConceptExpr::some("hasChild", ConceptExpr::atomic("Female"));
        assert_eq!(
            names(&kb.individuals_of(&has_female_child).unwrap()),
            ["anna", "carla"]
        );
    }

    #[test]
    fn universal_restriction_is_vacuously_true_without_successors() {
        let kb = family_kb();
        let all_female_children = ConceptExpr::all("hasChild", ConceptExpr::atomic("Female"));
        // eve and diego have no children at all, so they qualify vacuously.
        assert_eq!(
            names(&kb.individuals_of(&all_female_children).unwrap()),
            ["anna", "diego", "eve"]
        );
    }

    #[test]
    fn cardinality_restrictions_count_matching_successors() {
        let kb = family_kb();
        let two_children = ConceptExpr::at_least(2, "hasChild", ConceptExpr::Top);
        assert_eq!(names(&kb.individuals_of(&two_children).unwrap()), ["carla"]);

        let at_most_one = ConceptExpr::at_most(1, "hasChild", ConceptExpr::Top);
        assert_eq!(
            names(&kb.individuals_of(&at_most_one).unwrap()),
            ["anna", "bruno", "diego", "eve"]
        );
    }

    #[test]
    fn is_instance_agrees_with_retrieval() {
        let kb = family_kb();
        let parent = ConceptExpr::atomic("Parent");
        assert!(kb.is_instance(&IndividualId::new("anna"), &parent).unwrap());
        assert!(!kb.is_instance(&IndividualId::new("eve"), &parent).unwrap());
    }

    #[test]
    fn satisfiability_is_abox_witnessed() {
        let kb = family_kb();
        assert!(kb.is_satisfiable(&ConceptExpr::atomic("Female")).unwrap());
        let impossible = ConceptExpr::atomic("Male").conjoin(ConceptExpr::atomic("Female"));
        assert!(!kb.is_satisfiable(&impossible).unwrap());
    }

    #[test]
    fn hierarchy_navigation_is_sorted() {
        let kb = family_kb();
        let person = ClassId::new("Person");
        assert_eq!(
            kb.direct_subclasses(&person),
            vec![
                ClassId::new("Female"),
                ClassId::new("Male"),
                ClassId::new("Parent")
            ]
        );
        assert_eq!(
            kb.direct_superclasses(&ClassId::new("Female")),
            vec![person]
        );
    }

    #[test]
    fn properties_with_domain_respects_declared_domain() {
        let kb = family_kb();
        let props = kb
            .properties_with_domain(&ConceptExpr::atomic("Female"))
            .unwrap();
        // Parents overlap Female (anna, carla), so hasChild qualifies.
        assert_eq!(props, vec![PropertyId::new("hasChild")]);

        // A class disjoint from all hasChild subjects does not.
        let mut kb2 = MemoryKnowledgeBase::new();
        kb2.assert_class("rock", "Mineral");
        kb2.assert_relation("anna", "hasChild", "eve");
        let props = kb2
            .properties_with_domain(&ConceptExpr::atomic("Mineral"))
            .unwrap();
        assert!(props.is_empty());
    }
}
