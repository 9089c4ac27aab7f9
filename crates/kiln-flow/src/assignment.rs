use std::collections::BTreeSet;

/// Which fields are definitely assigned at a program point.
///
/// `Total` is the state after a statement that cannot complete normally: it
/// guarantees everything, vacuously, and is the identity of [`intersect`].
/// `Branch` wraps the state reached through one arm of a conditional, and
/// `Branched` is a sequence whose tail is still such a pending arm.
///
/// Reconciliation is one level deep: appending a second pending arm to a
/// `Branched` state keeps only the guaranteed set of the first.
///
/// [`intersect`]: FieldAssignment::intersect
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldAssignment {
    Total,
    Block(BTreeSet<String>),
    Branched {
        assigned: BTreeSet<String>,
        other: Box<FieldAssignment>,
    },
    Branch(Box<FieldAssignment>),
}

impl Default for FieldAssignment {
    fn default() -> Self {
        FieldAssignment::empty()
    }
}

impl FieldAssignment {
    /// Nothing assigned yet.
    pub fn empty() -> Self {
        FieldAssignment::Block(BTreeSet::new())
    }

    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldAssignment::Block(names.into_iter().map(Into::into).collect())
    }

    pub fn branch(arm: FieldAssignment) -> Self {
        FieldAssignment::Branch(Box::new(arm))
    }

    pub fn is_total(&self) -> bool {
        matches!(self, FieldAssignment::Total)
    }

    /// The state after also assigning `name`.
    #[must_use]
    pub fn assign(self, name: &str) -> Self {
        self.combine_with(FieldAssignment::of([name]))
    }

    /// Sequential composition: `self`, then `next`.
    #[must_use]
    pub fn combine_with(self, next: FieldAssignment) -> Self {
        use FieldAssignment::*;
        match (self, next) {
            (Total, _) | (_, Total) => Total,
            (Branch(inner), next) => Branch(Box::new((*inner).combine_with(next))),
            (state, Branch(arm)) => Branched {
                assigned: state.into_guaranteed(),
                other: arm,
            },
            (Block(mut a), Block(b)) => {
                a.extend(b);
                Block(a)
            }
            (Branched { mut assigned, other }, Block(b)) | (Block(b), Branched { mut assigned, other }) => {
                assigned.extend(b);
                Branched { assigned, other }
            }
            (Branched { mut assigned, .. }, Branched { assigned: b, other }) => {
                assigned.extend(b);
                Branched { assigned, other }
            }
        }
    }

    /// Meet: what both control-flow paths guarantee. Commutative; `Total`
    /// is the identity and equal operands return themselves.
    #[must_use]
    pub fn intersect(self, other: FieldAssignment) -> Self {
        let (this, other) = (self.settled(), other.settled());
        if this == other {
            return this;
        }
        match (this, other) {
            (FieldAssignment::Total, x) | (x, FieldAssignment::Total) => x,
            (this, other) => this.meet(other),
        }
    }

    /// The state with any outer `Branch` wrappers removed.
    fn settled(self) -> Self {
        match self {
            FieldAssignment::Branch(inner) => (*inner).settled(),
            other => other,
        }
    }

    /// A pending arm meets its sibling; whatever was guaranteed before the
    /// arm stays guaranteed.
    fn meet(self, other: FieldAssignment) -> Self {
        use FieldAssignment::*;
        match (self, other) {
            (Branch(inner), x) => (*inner).meet(x),
            (x, Branch(inner)) => x.meet(*inner),
            (Total, Total) => Total,
            (Block(a), Block(b)) => Block(a.intersection(&b).cloned().collect()),
            (Total, x @ Block(_)) | (x @ Block(_), Total) => x,
            (Branched { assigned, other }, sibling) | (sibling, Branched { assigned, other }) => {
                Block(assigned).combine_with((*other).meet(sibling))
            }
        }
    }

    /// Whether `name` is guaranteed to be assigned here.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            FieldAssignment::Total => true,
            FieldAssignment::Block(names) => names.contains(name),
            FieldAssignment::Branch(inner) => inner.contains(name),
            FieldAssignment::Branched { assigned, .. } => assigned.contains(name),
        }
    }

    fn into_guaranteed(self) -> BTreeSet<String> {
        match self {
            FieldAssignment::Block(names) | FieldAssignment::Branched { assigned: names, .. } => names,
            FieldAssignment::Branch(inner) => (*inner).into_guaranteed(),
            FieldAssignment::Total => BTreeSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn blocks_meet_by_set_intersection() {
        let a = FieldAssignment::of(["a"]);
        let ab = FieldAssignment::of(["a", "b"]);
        assert_eq!(a.clone().intersect(ab.clone()), a);
        assert_eq!(ab.intersect(a.clone()), a);
    }

    #[test]
    fn total_absorbs_sequences() {
        let a = FieldAssignment::of(["a"]);
        assert!(a.clone().combine_with(FieldAssignment::Total).is_total());
        assert!(FieldAssignment::Total.combine_with(a).is_total());
    }

    #[test]
    fn if_else_keeps_fields_assigned_in_both_arms() {
        let pre = FieldAssignment::of(["x"]);
        let then_arm = pre.clone().assign("a").assign("b");
        let else_arm = pre.clone().assign("a");

        let joined = pre
            .combine_with(FieldAssignment::branch(then_arm))
            .intersect(FieldAssignment::branch(else_arm));
        assert_eq!(joined, FieldAssignment::of(["a", "x"]));
        assert!(joined.contains("a"));
        assert!(!joined.contains("b"));
    }

    #[test]
    fn an_arm_that_returns_does_not_weaken_the_join() {
        let pre = FieldAssignment::empty();
        let joined = pre
            .clone()
            .combine_with(FieldAssignment::branch(FieldAssignment::Total))
            .intersect(FieldAssignment::branch(pre.assign("a")));
        assert_eq!(joined, FieldAssignment::of(["a"]));
    }

    #[test]
    fn pending_arm_is_not_yet_guaranteed() {
        let state = FieldAssignment::of(["a"]).combine_with(FieldAssignment::branch(FieldAssignment::of(["b"])));
        assert!(state.contains("a"));
        assert!(!state.contains("b"));

        let extended = state.combine_with(FieldAssignment::of(["c"]));
        assert!(extended.contains("c"));
    }

    #[test]
    fn combining_into_a_branch_stays_inside_it() {
        let state = FieldAssignment::branch(FieldAssignment::of(["a"])).assign("b");
        assert_eq!(state, FieldAssignment::branch(FieldAssignment::of(["a", "b"])));
        assert!(state.contains("b"));
    }
}
