//! Guard expressions for controlling transitions.
//!
//! A guard is a small boolean expression whose leaves are named slots.
//! The names are bound to concrete predicates when a machine definition
//! is provisioned, so an expression can be declared (and serialized)
//! before the code that decides it exists.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

/// Boolean expression over named guard slots.
///
/// Evaluation is bottom-up and short-circuits: `And` stops at the first
/// false child, `Or` at the first true one. An empty `And` is true and an
/// empty `Or` is false.
///
/// # Example
///
/// ```rust
/// use statecraft::core::GuardExpr;
///
/// let guard = GuardExpr::slot("isAdmin").or(GuardExpr::slot("isOwner").and(!GuardExpr::slot("isLocked")));
///
/// assert_eq!(guard.slot_names(), vec!["isAdmin", "isOwner", "isLocked"]);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GuardExpr {
    Slot(String),
    And(Vec<GuardExpr>),
    Or(Vec<GuardExpr>),
    Not(Box<GuardExpr>),
}

impl GuardExpr {
    /// A leaf referencing the guard slot `name`.
    pub fn slot(name: impl Into<String>) -> Self {
        GuardExpr::Slot(name.into())
    }

    /// Conjunction, flattening nested `And`s on the left.
    pub fn and(self, other: GuardExpr) -> Self {
        match self {
            GuardExpr::And(mut children) => {
                children.push(other);
                GuardExpr::And(children)
            }
            expr => GuardExpr::And(vec![expr, other]),
        }
    }

    /// Disjunction, flattening nested `Or`s on the left.
    pub fn or(self, other: GuardExpr) -> Self {
        match self {
            GuardExpr::Or(mut children) => {
                children.push(other);
                GuardExpr::Or(children)
            }
            expr => GuardExpr::Or(vec![expr, other]),
        }
    }

    pub fn all(children: impl IntoIterator<Item = GuardExpr>) -> Self {
        GuardExpr::And(children.into_iter().collect())
    }

    pub fn any(children: impl IntoIterator<Item = GuardExpr>) -> Self {
        GuardExpr::Or(children.into_iter().collect())
    }

    /// Names of every slot leaf, in first-occurrence order without duplicates.
    pub fn slot_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut pending = vec![self];
        while let Some(expr) = pending.pop() {
            match expr {
                GuardExpr::Slot(name) => {
                    if !names.contains(&name.as_str()) {
                        names.push(name.as_str());
                    }
                }
                GuardExpr::And(children) | GuardExpr::Or(children) => {
                    pending.extend(children.iter().rev());
                }
                GuardExpr::Not(inner) => pending.push(inner),
            }
        }
        names
    }

    /// Evaluate the expression, resolving each leaf through `leaf`.
    ///
    /// Leaves may suspend; children are awaited one at a time so a
    /// short-circuited branch never runs its predicate.
    pub fn evaluate<'a, F>(&'a self, leaf: &'a F) -> BoxFuture<'a, bool>
    where
        F: Fn(&str) -> BoxFuture<'static, bool> + Sync,
    {
        async move {
            match self {
                GuardExpr::Slot(name) => leaf(name).await,
                GuardExpr::And(children) => {
                    for child in children {
                        if !child.evaluate(leaf).await {
                            return false;
                        }
                    }
                    true
                }
                GuardExpr::Or(children) => {
                    for child in children {
                        if child.evaluate(leaf).await {
                            return true;
                        }
                    }
                    false
                }
                GuardExpr::Not(inner) => !inner.evaluate(leaf).await,
            }
        }
        .boxed()
    }
}

impl std::ops::Not for GuardExpr {
    type Output = GuardExpr;

    fn not(self) -> Self::Output {
        GuardExpr::Not(Box::new(self))
    }
}

impl From<&str> for GuardExpr {
    fn from(name: &str) -> Self {
        GuardExpr::slot(name)
    }
}
