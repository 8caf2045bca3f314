//! The traversal policy algebra.
//!
//! A policy is an immutable tuple of three orthogonal axes. The processor
//! reads only `transitivity` (how far to follow edges) and `freshness` (when
//! an already-stored document is reprocessed); `fetch` is carried through for
//! the fetch layer. Transitions never mutate: `child_for` returns the policy
//! a child request inherits for a given edge role.

/// How far child edges are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Transitivity {
    Shallow,
    #[serde(alias = "forceNormal")]
    DeepShallow,
    #[serde(alias = "forceForce")]
    DeepDeep,
}

/// When a document that is already in the store is handled again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Freshness {
    Always,
    Match,
    Version,
    Mutables,
}

/// Fetch strategy. Consumed by the fetch layer; the processor never reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Fetch {
    None,
    Storage,
    OriginStorage,
    Mutables,
    Always,
}

/// The role a child edge plays relative to the request that enqueues it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRole {
    /// The next page of the collection currently being walked.
    CollectionPage,
    /// An element of a top-level listing (`orgs`, `users`).
    RootCollectionElement,
    /// An element of an interior collection (a repo's issues, a PR's commits).
    CollectionElement,
    /// A singleton reference (owner, actor, assignee, ...).
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalPolicy {
    pub transitivity: Transitivity,
    pub freshness: Freshness,
    pub fetch: Fetch,
}

impl TraversalPolicy {
    pub fn new(transitivity: Transitivity, freshness: Freshness, fetch: Fetch) -> TraversalPolicy {
        TraversalPolicy {
            transitivity,
            freshness,
            fetch,
        }
    }

    /// The standard crawl policy: walk collections one level deep, skip
    /// documents whose stored etag still matches.
    pub fn default_policy() -> TraversalPolicy {
        TraversalPolicy::new(Transitivity::DeepShallow, Freshness::Match, Fetch::OriginStorage)
    }

    /// User-initiated force refresh: refetch and rehandle everything reachable.
    pub fn update() -> TraversalPolicy {
        TraversalPolicy::new(Transitivity::DeepDeep, Freshness::Always, Fetch::Always)
    }

    /// Reprocess from storage after a processor version bump.
    pub fn reprocess() -> TraversalPolicy {
        TraversalPolicy::new(Transitivity::DeepShallow, Freshness::Version, Fetch::Storage)
    }

    /// The policy a child request inherits over an edge of the given role.
    ///
    /// Transitivity follows the transition table; pages keep the parent's
    /// level, elements and resources decay toward `Shallow`. A force-refresh
    /// freshness (`Always`) decays to `Match` on exactly the roles whose
    /// transitivity column steps down, so an `update` crawl does not refetch
    /// the entire reachable graph forever. The fetch axis propagates
    /// unchanged.
    pub fn child_for(&self, role: EdgeRole) -> TraversalPolicy {
        use EdgeRole::*;
        use Transitivity::*;

        let transitivity = match (self.transitivity, role) {
            (Shallow, _) => Shallow,
            (DeepShallow, CollectionPage) | (DeepShallow, CollectionElement) => DeepShallow,
            (DeepShallow, RootCollectionElement) | (DeepShallow, Resource) => Shallow,
            (DeepDeep, CollectionPage) => DeepDeep,
            (DeepDeep, _) => DeepShallow,
        };

        let freshness = match (self.freshness, role) {
            (Freshness::Always, CollectionPage) => Freshness::Always,
            (Freshness::Always, _) => Freshness::Match,
            (other, _) => other,
        };

        TraversalPolicy {
            transitivity,
            freshness,
            fetch: self.fetch,
        }
    }
}

impl Default for TraversalPolicy {
    fn default() -> TraversalPolicy {
        TraversalPolicy::default_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn policy(transitivity: Transitivity) -> TraversalPolicy {
        TraversalPolicy::new(transitivity, Freshness::Match, Fetch::OriginStorage)
    }

    #[test]
    fn test_transitivity_transition_table() {
        use EdgeRole::*;
        use Transitivity::*;

        // (parent, role, expected child)
        let table = [
            (Shallow, CollectionPage, Shallow),
            (Shallow, RootCollectionElement, Shallow),
            (Shallow, CollectionElement, Shallow),
            (Shallow, Resource, Shallow),
            (DeepShallow, CollectionPage, DeepShallow),
            (DeepShallow, RootCollectionElement, Shallow),
            (DeepShallow, CollectionElement, DeepShallow),
            (DeepShallow, Resource, Shallow),
            (DeepDeep, CollectionPage, DeepDeep),
            (DeepDeep, RootCollectionElement, DeepShallow),
            (DeepDeep, CollectionElement, DeepShallow),
            (DeepDeep, Resource, DeepShallow),
        ];

        for (parent, role, expected) in table {
            assert_eq!(
                expected,
                policy(parent).child_for(role).transitivity,
                "child_for({:?}) on {:?}",
                role,
                parent,
            );
        }
    }

    #[test]
    fn test_freshness_and_fetch_propagate() {
        let parent = TraversalPolicy::new(
            Transitivity::DeepShallow,
            Freshness::Version,
            Fetch::Storage,
        );
        for role in [
            EdgeRole::CollectionPage,
            EdgeRole::RootCollectionElement,
            EdgeRole::CollectionElement,
            EdgeRole::Resource,
        ] {
            let child = parent.child_for(role);
            assert_eq!(Freshness::Version, child.freshness);
            assert_eq!(Fetch::Storage, child.fetch);
        }
    }

    #[test]
    fn test_update_policy_decays_off_pages() {
        let update = TraversalPolicy::update();
        assert_eq!(
            Freshness::Always,
            update.child_for(EdgeRole::CollectionPage).freshness
        );
        assert_eq!(
            Freshness::Match,
            update.child_for(EdgeRole::CollectionElement).freshness
        );
        assert_eq!(
            Freshness::Match,
            update.child_for(EdgeRole::Resource).freshness
        );
    }

    #[test]
    fn test_policy_aliases_deserialize() {
        let policy: TraversalPolicy = serde_json::from_str(
            r#"{"transitivity":"forceForce","freshness":"always","fetch":"always"}"#,
        )
        .unwrap();
        assert_eq!(Transitivity::DeepDeep, policy.transitivity);

        let policy: TraversalPolicy = serde_json::from_str(
            r#"{"transitivity":"forceNormal","freshness":"match","fetch":"originStorage"}"#,
        )
        .unwrap();
        assert_eq!(Transitivity::DeepShallow, policy.transitivity);
    }
}
