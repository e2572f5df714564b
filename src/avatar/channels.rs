//! Morph target channel table and scene discovery.
//!
//! The channel table is built once from the mesh's morph target names: an
//! immutable name → slot map plus a fixed-length weight array that the
//! blender writes into every frame.

use std::collections::HashMap;

/// Named morph target slots and their current weights.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTable {
    /// Morph target name → index in the weights array
    name_to_index: HashMap<String, usize>,
    /// Slot names in index order
    names: Vec<String>,
    /// Current weight per slot, in [0.0, 1.0]
    weights: Vec<f32>,
}

impl ChannelTable {
    /// Create a table from the mesh's morph target name list.
    ///
    /// Duplicate names keep their first slot.
    pub fn new(morph_target_names: &[String]) -> Self {
        let mut name_to_index = HashMap::with_capacity(morph_target_names.len());
        for (i, name) in morph_target_names.iter().enumerate() {
            name_to_index.entry(name.clone()).or_insert(i);
        }
        Self {
            name_to_index,
            names: morph_target_names.to_vec(),
            weights: vec![0.0; morph_target_names.len()],
        }
    }

    /// Convenience constructor from string slices
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let owned: Vec<String> = names.iter().map(|s| s.as_ref().to_string()).collect();
        Self::new(&owned)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(|s| s.as_str())
    }

    /// Current weight of a named channel
    pub fn weight(&self, name: &str) -> Option<f32> {
        self.index_of(name).map(|i| self.weights[i])
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Mutable view of the slot values; the slot count itself is fixed.
    pub fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Iterate (name, weight) pairs in slot order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.names
            .iter()
            .map(|s| s.as_str())
            .zip(self.weights.iter().copied())
    }
}

/// Locates the target mesh once and hands back its channel table.
pub trait SceneResolver {
    fn resolve(&self) -> Option<ChannelTable>;
}

impl<F> SceneResolver for F
where
    F: Fn() -> Option<ChannelTable>,
{
    fn resolve(&self) -> Option<ChannelTable> {
        self()
    }
}

/// Resolver that always yields a fixed table.
#[derive(Debug, Clone)]
pub struct StaticResolver(pub ChannelTable);

impl SceneResolver for StaticResolver {
    fn resolve(&self) -> Option<ChannelTable> {
        Some(self.0.clone())
    }
}

/// Minimal scene graph node as handed over by the rendering host.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub name: String,
    /// Morph target names if this node is a mesh with morph targets
    pub morph_targets: Option<Vec<String>>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// A plain transform node
    pub fn group(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// A mesh node carrying morph targets
    pub fn mesh<S: AsRef<str>>(name: &str, morph_targets: &[S]) -> Self {
        Self {
            name: name.to_string(),
            morph_targets: Some(morph_targets.iter().map(|s| s.as_ref().to_string()).collect()),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first pre-order traversal
    pub fn traverse<'a>(&'a self, visit: &mut impl FnMut(&'a SceneNode)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }
}

/// Finds the head mesh by case-insensitive substring match on its name.
///
/// When several meshes match, the last one visited wins.
#[derive(Debug, Clone)]
pub struct HeadMeshResolver<'a> {
    root: &'a SceneNode,
    hint: String,
}

impl<'a> HeadMeshResolver<'a> {
    pub fn new(root: &'a SceneNode, hint: &str) -> Self {
        Self {
            root,
            hint: hint.to_lowercase(),
        }
    }
}

impl SceneResolver for HeadMeshResolver<'_> {
    fn resolve(&self) -> Option<ChannelTable> {
        let mut found: Option<&SceneNode> = None;
        self.root.traverse(&mut |node| {
            if node.morph_targets.is_some() && node.name.to_lowercase().contains(&self.hint) {
                found = Some(node);
            }
        });

        let node = found?;
        let names = node.morph_targets.as_deref().unwrap_or_default();
        tracing::debug!(
            "Head mesh '{}' found with {} morph targets",
            node.name,
            names.len()
        );
        Some(ChannelTable::new(names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scene() -> SceneNode {
        SceneNode::group("Armature")
            .with_child(SceneNode::mesh("Body", &["bodyFat"]))
            .with_child(
                SceneNode::group("Neck").with_child(SceneNode::mesh(
                    "Wolf3D_Head",
                    &["browInnerUp", "eyeSquintLeft", "jawOpen"],
                )),
            )
            .with_child(SceneNode::group("HeadTop_End"))
    }

    #[test]
    fn test_table_lookup() {
        let table = ChannelTable::from_names(&["a", "b", "c"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.index_of("b"), Some(1));
        assert_eq!(table.index_of("z"), None);
        assert_eq!(table.name(2), Some("c"));
        assert_eq!(table.weight("a"), Some(0.0));
        assert!(table.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_duplicate_names_keep_first_slot() {
        let table = ChannelTable::from_names(&["a", "b", "a"]);
        assert_eq!(table.index_of("a"), Some(0));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_head_resolver_finds_mesh() {
        let scene = sample_scene();
        let table = HeadMeshResolver::new(&scene, "head").resolve().unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.contains("jawOpen"));
        assert!(!table.contains("bodyFat"));
    }

    #[test]
    fn test_head_resolver_skips_groups_without_targets() {
        // "HeadTop_End" matches the hint but carries no morph targets
        let scene = SceneNode::group("root").with_child(SceneNode::group("HeadTop_End"));
        assert!(HeadMeshResolver::new(&scene, "head").resolve().is_none());
    }

    #[test]
    fn test_head_resolver_last_match_wins() {
        let scene = SceneNode::group("root")
            .with_child(SceneNode::mesh("head_lod1", &["a"]))
            .with_child(SceneNode::mesh("HEAD_lod0", &["a", "b"]));
        let table = HeadMeshResolver::new(&scene, "Head").resolve().unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = || Some(ChannelTable::from_names(&["x"]));
        assert!(resolver.resolve().unwrap().contains("x"));

        let none = || -> Option<ChannelTable> { None };
        assert!(none.resolve().is_none());
    }
}
