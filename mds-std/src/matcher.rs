//! # Marker Index
//!
//! The default [`MatchPredicate`]: a flat lookup table precomputed from marker
//! declarations and type ancestry.
//!
//! Declarations come from two places:
//!
//! - the programmatic [`MarkerIndexBuilder`]
//! - `#[routable]` items, collected through `inventory` (feature `inventory`)
//!
//! # Search Order
//!
//! For a call site `T::m` the lineage of `T` is `T` followed by its ancestors
//! breadth-first (direct parents before grandparents, declaration order within
//! a level). The first method-level marker for `m` along the lineage wins;
//! failing that, the first type-level marker along the lineage. The walk runs
//! once in [`MarkerIndexBuilder::build`], never per call.

use mds_core::{CallSite, Marker, MatchPredicate};
use std::collections::{HashMap, HashSet, VecDeque};

/// The name of a type or trait, spelled out or computed at startup.
///
/// `#[routable]` emits computed names (`std::any::type_name` for types, the
/// defining module path for traits) so that same-named items in different
/// modules never share markers.
#[derive(Debug, Clone, Copy)]
pub enum OwnerName {
    /// A name given verbatim.
    Literal(&'static str),
    /// A name produced by a function, resolved when the index is built.
    Computed(fn() -> &'static str),
}

impl OwnerName {
    /// The name text.
    pub fn resolve(self) -> &'static str {
        match self {
            OwnerName::Literal(name) => name,
            OwnerName::Computed(name) => name(),
        }
    }
}

/// Appends `(trait, supertrait)` edges for a trait's whole supertrait tree.
pub type SupertraitEdges = fn(&mut Vec<(&'static str, &'static str)>);

/// A marker declaration: method-level when `method` is set, type-level otherwise.
#[derive(Debug, Clone, Copy)]
pub struct MarkerDecl {
    /// Type or trait carrying the marker.
    pub owner: OwnerName,
    /// Marked method; `None` marks every method of `owner`.
    pub method: Option<&'static str>,
    /// Declared key; empty defers to the configured default key.
    pub key: &'static str,
}

impl MarkerDecl {
    /// Declare a marker on `owner::method`.
    pub const fn method(owner: &'static str, method: &'static str, key: &'static str) -> Self {
        Self {
            owner: OwnerName::Literal(owner),
            method: Some(method),
            key,
        }
    }

    /// Declare a marker on `method` of the type named by `owner`.
    pub const fn method_of(
        owner: fn() -> &'static str,
        method: &'static str,
        key: &'static str,
    ) -> Self {
        Self {
            owner: OwnerName::Computed(owner),
            method: Some(method),
            key,
        }
    }

    /// Declare a marker covering every method of `owner`.
    pub const fn type_level(owner: &'static str, key: &'static str) -> Self {
        Self {
            owner: OwnerName::Literal(owner),
            method: None,
            key,
        }
    }

    /// Declare a marker covering every method of the type named by `owner`.
    pub const fn type_level_of(owner: fn() -> &'static str, key: &'static str) -> Self {
        Self {
            owner: OwnerName::Computed(owner),
            method: None,
            key,
        }
    }
}

/// Records that `ty` extends or implements `parent`.
#[derive(Debug, Clone, Copy)]
pub struct AncestryDecl {
    /// The more specific type.
    pub ty: OwnerName,
    /// Its supertype or implemented trait.
    pub parent: OwnerName,
    /// Edges below `parent`, when it is a trait with supertraits.
    pub supertraits: Option<SupertraitEdges>,
}

impl AncestryDecl {
    /// Declare `ty: parent`.
    pub const fn new(ty: &'static str, parent: &'static str) -> Self {
        Self {
            ty: OwnerName::Literal(ty),
            parent: OwnerName::Literal(parent),
            supertraits: None,
        }
    }

    /// Declare that the type named by `ty` implements the trait named by
    /// `parent`, whose own supertrait edges `supertraits` appends.
    pub const fn implements(
        ty: fn() -> &'static str,
        parent: fn() -> &'static str,
        supertraits: SupertraitEdges,
    ) -> Self {
        Self {
            ty: OwnerName::Computed(ty),
            parent: OwnerName::Computed(parent),
            supertraits: Some(supertraits),
        }
    }
}

#[cfg(feature = "inventory")]
inventory::collect!(MarkerDecl);
#[cfg(feature = "inventory")]
inventory::collect!(AncestryDecl);

/// Precomputed call site to marker lookup.
#[derive(Debug, Clone, Default)]
pub struct MarkerIndex {
    methods: HashMap<(&'static str, &'static str), Marker>,
    types: HashMap<&'static str, Marker>,
}

impl MarkerIndex {
    /// Start a new index.
    pub fn builder() -> MarkerIndexBuilder {
        MarkerIndexBuilder::new()
    }

    /// Build an index from every `#[routable]` declaration linked into the binary.
    #[cfg(feature = "inventory")]
    pub fn from_inventory() -> Self {
        MarkerIndexBuilder::new().with_inventory().build()
    }

    /// Number of resolved method-level entries.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if no marker was declared at all.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.types.is_empty()
    }
}

impl MatchPredicate for MarkerIndex {
    fn marker(&self, site: &CallSite) -> Option<Marker> {
        self.methods
            .get(&(site.owner(), site.method()))
            .or_else(|| self.types.get(site.owner()))
            .cloned()
    }
}

/// Builder for [`MarkerIndex`].
#[derive(Debug, Default)]
pub struct MarkerIndexBuilder {
    parents: HashMap<&'static str, Vec<&'static str>>,
    methods: HashMap<&'static str, Vec<(&'static str, Marker)>>,
    types: HashMap<&'static str, Marker>,
    conflicts: usize,
}

impl MarkerIndexBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `ty` extends or implements `parent`.
    pub fn extends(mut self, ty: &'static str, parent: &'static str) -> Self {
        self.add_edge(ty, parent);
        self
    }

    /// Mark `owner::method` with `key` (empty defers to the default key).
    pub fn mark_method(
        mut self,
        owner: &'static str,
        method: &'static str,
        key: &'static str,
    ) -> Self {
        self.add_marker(MarkerDecl::method(owner, method, key));
        self
    }

    /// Mark every method of `owner` with `key` (empty defers to the default key).
    pub fn mark_type(mut self, owner: &'static str, key: &'static str) -> Self {
        self.add_marker(MarkerDecl::type_level(owner, key));
        self
    }

    /// Add a marker declaration.
    pub fn declare(mut self, decl: MarkerDecl) -> Self {
        self.add_marker(decl);
        self
    }

    /// Add every declaration submitted through `inventory`.
    #[cfg(feature = "inventory")]
    pub fn with_inventory(mut self) -> Self {
        for decl in inventory::iter::<AncestryDecl>() {
            self.add_ancestry(*decl);
        }
        for decl in inventory::iter::<MarkerDecl>() {
            self.add_marker(*decl);
        }
        self
    }

    /// Add an ancestry declaration, including its supertrait edges.
    pub fn ancestry(mut self, decl: AncestryDecl) -> Self {
        self.add_ancestry(decl);
        self
    }

    /// Number of declarations that replaced a different earlier one.
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    fn add_ancestry(&mut self, decl: AncestryDecl) {
        let ty = decl.ty.resolve();
        let parent = decl.parent.resolve();
        self.add_edge(ty, parent);
        if let Some(supertraits) = decl.supertraits {
            let mut edges = Vec::new();
            supertraits(&mut edges);
            for (ty, parent) in edges {
                self.add_edge(ty, parent);
            }
        }
    }

    fn add_edge(&mut self, ty: &'static str, parent: &'static str) {
        let parents = self.parents.entry(ty).or_default();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    // A later declaration for the same method or type replaces the earlier one.
    fn add_marker(&mut self, decl: MarkerDecl) {
        let owner = decl.owner.resolve();
        let marker = Marker::from_declared(decl.key);
        let replaced = match decl.method {
            Some(method) => {
                let entries = self.methods.entry(owner).or_default();
                let position = entries.iter().position(|(m, _)| *m == method);
                let replaced = position.map(|i| entries.remove(i).1);
                entries.push((method, marker.clone()));
                replaced
            }
            None => self.types.insert(owner, marker.clone()),
        };

        if let Some(previous) = replaced.filter(|previous| *previous != marker) {
            self.conflicts += 1;
            #[cfg(feature = "tracing")]
            tracing::warn!(
                owner,
                method = decl.method,
                previous = ?previous.key(),
                key = ?marker.key(),
                "conflicting routing markers, the later declaration wins"
            );
            #[cfg(not(feature = "tracing"))]
            let _ = previous;
        }
    }

    /// `ty` followed by its ancestors, breadth-first, without repeats.
    fn lineage(&self, ty: &'static str) -> Vec<&'static str> {
        let mut seen = HashSet::from([ty]);
        let mut order = vec![ty];
        let mut queue = VecDeque::from([ty]);
        while let Some(current) = queue.pop_front() {
            for &parent in self.parents.get(current).into_iter().flatten() {
                if seen.insert(parent) {
                    order.push(parent);
                    queue.push_back(parent);
                }
            }
        }
        order
    }

    /// Walk every known type's lineage once and flatten the result.
    pub fn build(self) -> MarkerIndex {
        let known: HashSet<&'static str> = self
            .parents
            .keys()
            .chain(self.methods.keys())
            .chain(self.types.keys())
            .copied()
            .collect();

        let mut index = MarkerIndex::default();
        for ty in known {
            let lineage = self.lineage(ty);
            for ancestor in &lineage {
                for (method, marker) in self.methods.get(ancestor).into_iter().flatten() {
                    index
                        .methods
                        .entry((ty, *method))
                        .or_insert_with(|| marker.clone());
                }
            }
            if let Some(marker) = lineage.iter().find_map(|a| self.types.get(a)) {
                index.types.insert(ty, marker.clone());
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            methods = index.methods.len(),
            types = index.types.len(),
            "marker index built"
        );

        index
    }
}
