//! # kheper
//!
//! Symbolic concept learning over knowledge graphs: given positive and
//! negative example individuals, kheper searches the space of
//! description-logic class expressions for concepts that separate them,
//! ranked by a quality metric such as F1.
//!
//! ## Architecture
//!
//! - **Expressions** (`expr`): immutable DL class-expression trees with a
//!   canonical normal form
//! - **Knowledge source** (`kb`): the retrieval/hierarchy interface, plus a
//!   closed-world in-memory implementation
//! - **Refinement** (`refine`): downward refinement operator generating
//!   proper specializations
//! - **Search** (`search`): heuristic best-first engine (CELOE/OCEL style)
//! - **Evolution** (`evo`): population-based engine with genetic operators
//!   (EvoLearner style)
//! - **Facade** (`learner`): fit / best-hypotheses lifecycle over either
//!   engine
//!
//! ## Library usage
//!
//! ```
//! use std::sync::Arc;
//! use kheper::kb::MemoryKnowledgeBase;
//! use kheper::learner::{Learner, LearnerConfig};
//! use kheper::problem::LearningProblem;
//!
//! let mut kb = MemoryKnowledgeBase::new();
//! kb.declare_subclass("Female", "Person");
//! kb.declare_subclass("Male", "Person");
//! kb.assert_class("anna", "Female");
//! kb.assert_class("marco", "Male");
//!
//! let problem = LearningProblem::from_examples(&["anna"], &["marco"]).unwrap();
//! let mut learner = Learner::new(Arc::new(kb), LearnerConfig::default());
//! learner.fit(problem).unwrap();
//! for hypothesis in learner.best_hypotheses(3).unwrap() {
//!     println!("{} (quality {:.3})", hypothesis.expr, hypothesis.quality);
//! }
//! ```

pub mod cache;
pub mod error;
pub mod evo;
pub mod expr;
pub mod kb;
pub mod learner;
pub mod problem;
pub mod quality;
pub mod refine;
pub mod search;
pub mod vocab;
