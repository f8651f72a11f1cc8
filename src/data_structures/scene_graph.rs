//! Scene graph and hierarchical scene organization.
//!
//! Provides the [`SceneNode`] trait, the node kinds the scene is built from and
//! [`dispose`], which tears a subtree down and frees its GPU memory.

use log::debug;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::{
        dispose::Dispose,
        geometry::Geometry,
        instance::{Instance, InstanceRaw},
        material::Material,
    },
    render::Instanced,
};

/// State every node kind carries.
#[derive(Default)]
pub struct NodeCore {
    pub name: String,
    pub children: Vec<Box<dyn SceneNode>>,
    pub local: Instance,
    world: Instance,
    disposed: bool,
}

impl NodeCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn world(&self) -> &Instance {
        &self.world
    }
}

pub trait SceneNode {
    fn core(&self) -> &NodeCore;

    fn core_mut(&mut self) -> &mut NodeCore;

    fn name(&self) -> &str {
        &self.core().name
    }

    fn get_children(&self) -> &Vec<Box<dyn SceneNode>> {
        &self.core().children
    }

    fn get_children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.core_mut().children
    }

    fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.core_mut().children.push(child);
    }

    fn get_local_transform(&self) -> &Instance {
        &self.core().local
    }

    fn set_local_transform(&mut self, instance: Instance) {
        self.core_mut().local = instance;
    }

    fn get_world_transform(&self) -> &Instance {
        self.core().world()
    }

    /// Recomputes `world = parent * local` for `self` and everything below.
    fn update_world_transforms(&mut self, parent: &Instance) {
        let core = self.core_mut();
        let world = parent * &core.local;
        for child in core.children.iter_mut() {
            child.update_world_transforms(&world);
        }
        core.world = world;
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        self.get_children_mut()
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        self.get_children()
            .iter()
            .flat_map(|child| child.get_render())
            .collect()
    }

    /// Ambient light contributed by this node alone (linear rgb, already scaled by intensity).
    fn ambient(&self) -> Option<[f32; 3]> {
        None
    }

    /// Geometry buffers owned by this node.
    fn geometry_mut(&mut self) -> Option<&mut dyn Dispose> {
        None
    }

    fn material_mut(&mut self) -> Option<&mut dyn Material> {
        None
    }

    fn is_disposed(&self) -> bool {
        self.core().disposed
    }

    fn mark_disposed(&mut self) {
        self.core_mut().disposed = true;
    }
}

/// Releases every GPU resource below and including `node`, children first.
///
/// Children are detached one by one from the front of the child list and
/// dropped once their own subtree is released. Afterwards `node` is an empty,
/// resource-free node that still sits in its parent. Calling this again on the
/// same node releases nothing of its own, but still drains children that were
/// added in between.
pub fn dispose(node: &mut dyn SceneNode) {
    let freed = dispose_subtree(node);
    debug!(
        "disposed scene node {:?}: {} GPU objects freed",
        node.name(),
        freed
    );
}

fn dispose_subtree(node: &mut dyn SceneNode) -> usize {
    let mut freed = 0;

    let children = node.get_children_mut();
    while !children.is_empty() {
        let mut child = children.remove(0);
        freed += dispose_subtree(child.as_mut());
    }

    if node.is_disposed() {
        return freed;
    }
    if let Some(geometry) = node.geometry_mut() {
        freed += geometry.dispose();
    }
    if let Some(material) = node.material_mut() {
        for field in material.disposables() {
            freed += field.dispose();
        }
    }

    node.mark_disposed();
    freed
}

pub fn count_nodes(node: &dyn SceneNode) -> usize {
    1 + node
        .get_children()
        .iter()
        .map(|child| count_nodes(child.as_ref()))
        .sum::<usize>()
}

/// Total ambient light of a subtree; lights add up.
pub fn collect_ambient(node: &dyn SceneNode) -> [f32; 3] {
    let own = node.ambient().unwrap_or([0.0; 3]);
    node.get_children().iter().fold(own, |acc, child| {
        let [r, g, b] = collect_ambient(child.as_ref());
        [acc[0] + r, acc[1] + g, acc[2] + b]
    })
}

/// A grouping node without resources: the scene root, glTF nodes without meshes.
pub struct ContainerNode {
    core: NodeCore,
}

impl ContainerNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: NodeCore::new(name),
        }
    }
}

impl SceneNode for ContainerNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }
}

/// Vertex, index and instance buffers of a mesh node, released together.
#[derive(Debug)]
struct MeshBuffers {
    geometry: Option<Geometry>,
    instance: Option<wgpu::Buffer>,
}

impl Dispose for MeshBuffers {
    fn dispose(&mut self) -> usize {
        self.geometry.dispose() + self.instance.dispose()
    }

    fn holds_resource(&self) -> bool {
        self.geometry.holds_resource() || self.instance.holds_resource()
    }
}

/// A drawable: geometry, a material and the world transform as instance data.
pub struct MeshNode {
    core: NodeCore,
    buffers: MeshBuffers,
    material: Option<Box<dyn Material>>,
}

impl MeshNode {
    pub fn new(
        device: &wgpu::Device,
        name: impl Into<String>,
        geometry: Geometry,
        material: Box<dyn Material>,
    ) -> Self {
        let core = NodeCore::new(name);
        let instance = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Instance Buffer", core.name)),
            contents: bytemuck::cast_slice(&[core.world().to_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            core,
            buffers: MeshBuffers {
                geometry: Some(geometry),
                instance: Some(instance),
            },
            material: Some(material),
        }
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.buffers.geometry.as_ref()
    }
}

impl SceneNode for MeshNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn write_to_buffers(&mut self, queue: &wgpu::Queue) {
        if let Some(instance) = &self.buffers.instance {
            let raw: [InstanceRaw; 1] = [self.core.world().to_raw()];
            queue.write_buffer(instance, 0, bytemuck::cast_slice(&raw));
        }
        self.core
            .children
            .iter_mut()
            .for_each(|child| child.write_to_buffers(queue));
    }

    fn get_render(&self) -> Vec<Instanced<'_>> {
        let own = match (
            &self.buffers.instance,
            &self.buffers.geometry,
            self.material.as_deref(),
        ) {
            (Some(instance), Some(geometry), Some(material)) => {
                material.bind_group().map(|bind_group| Instanced {
                    instance,
                    geometry,
                    bind_group,
                    side: material.side(),
                })
            }
            _ => None,
        };
        self.core
            .children
            .iter()
            .flat_map(|child| child.get_render())
            .chain(own)
            .collect()
    }

    fn geometry_mut(&mut self) -> Option<&mut dyn Dispose> {
        Some(&mut self.buffers)
    }

    fn material_mut(&mut self) -> Option<&mut dyn Material> {
        match &mut self.material {
            Some(material) => Some(material.as_mut()),
            None => None,
        }
    }
}

/// Light that illuminates every lit surface equally.
///
/// The position has no effect on shading; it is kept as part of the node's transform.
pub struct AmbientLightNode {
    core: NodeCore,
    pub color: [f32; 3],
    pub intensity: f32,
}

impl AmbientLightNode {
    pub fn new(color: [f32; 3], intensity: f32) -> Self {
        Self {
            core: NodeCore::new("ambient light"),
            color,
            intensity,
        }
    }
}

impl SceneNode for AmbientLightNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn ambient(&self) -> Option<[f32; 3]> {
        let [r, g, b] = self.color;
        Some([r * self.intensity, g * self.intensity, b * self.intensity])
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::data_structures::{
        dispose::{
            Shared,
            tests::{Tracked, tracked},
        },
        material::Side,
    };

    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct MockMaterial {
        color: [f32; 4],
        map: Shared<Tracked>,
        bump_map: Shared<Tracked>,
        env_map: Option<Tracked>,
    }

    impl Material for MockMaterial {
        fn side(&self) -> Side {
            Side::Front
        }

        fn bind_group(&self) -> Option<&wgpu::BindGroup> {
            None
        }

        fn disposables(&mut self) -> Vec<&mut dyn Dispose> {
            vec![&mut self.map, &mut self.bump_map, &mut self.env_map]
        }
    }

    struct MockNode {
        core: NodeCore,
        geometry: Option<Tracked>,
        material: Option<MockMaterial>,
    }

    impl MockNode {
        fn group(name: &'static str) -> Self {
            Self {
                core: NodeCore::new(name),
                geometry: None,
                material: None,
            }
        }

        fn with_geometry(name: &'static str, log: &Log) -> Self {
            Self {
                geometry: Some(tracked(name, log)),
                ..Self::group(name)
            }
        }

        fn with_children(mut self, children: Vec<MockNode>) -> Self {
            for child in children {
                self.add_child(Box::new(child));
            }
            self
        }
    }

    impl SceneNode for MockNode {
        fn core(&self) -> &NodeCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut NodeCore {
            &mut self.core
        }

        fn geometry_mut(&mut self) -> Option<&mut dyn Dispose> {
            Some(&mut self.geometry)
        }

        fn material_mut(&mut self) -> Option<&mut dyn Material> {
            match &mut self.material {
                Some(material) => Some(material),
                None => None,
            }
        }
    }

    fn textured(name: &'static str, map: &'static str, bump: &'static str, log: &Log) -> MockNode {
        MockNode {
            material: Some(MockMaterial {
                color: [0.2, 0.4, 0.6, 1.0],
                map: Shared::new(tracked(map, log)),
                bump_map: Shared::new(tracked(bump, log)),
                env_map: None,
            }),
            ..MockNode::group(name)
        }
    }

    fn count(log: &Log, name: &str) -> usize {
        log.borrow().iter().filter(|entry| **entry == name).count()
    }

    #[test]
    fn releases_geometry_and_texture_maps_once() {
        let log: Log = Rc::default();
        let mut root = MockNode::group("root").with_children(vec![
            MockNode::with_geometry("a.geometry", &log),
            textured("b", "b.map", "b.bump", &log),
        ]);

        dispose(&mut root);

        assert!(root.get_children().is_empty());
        assert_eq!(count(&log, "a.geometry"), 1);
        assert_eq!(count(&log, "b.map"), 1);
        assert_eq!(count(&log, "b.bump"), 1);
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn plain_material_values_are_untouched() {
        let log: Log = Rc::default();
        let mut node = textured("b", "b.map", "b.bump", &log);

        dispose(&mut node);

        let material = node.material.as_ref().unwrap();
        assert_eq!(material.color, [0.2, 0.4, 0.6, 1.0]);
        assert!(!material.map.holds_resource());
        assert!(material.env_map.is_none());
    }

    #[test]
    fn releases_in_post_order() {
        let log: Log = Rc::default();
        let mut parent = MockNode::with_geometry("parent", &log).with_children(vec![
            MockNode::with_geometry("left", &log)
                .with_children(vec![MockNode::with_geometry("left.child", &log)]),
            MockNode::with_geometry("right", &log),
        ]);
        parent.material = Some(MockMaterial {
            color: [1.0; 4],
            map: Shared::new(tracked("parent.map", &log)),
            bump_map: Shared::empty(),
            env_map: Some(tracked("parent.env", &log)),
        });
        let mut root = MockNode::group("root").with_children(vec![parent]);

        dispose(&mut root);

        assert_eq!(
            *log.borrow(),
            vec!["left.child", "left", "right", "parent", "parent.map", "parent.env"]
        );
    }

    #[test]
    fn empty_node_is_a_noop() {
        let mut node = MockNode::group("empty");
        dispose(&mut node);
        assert!(node.get_children().is_empty());
        assert!(node.is_disposed());
    }

    #[test]
    fn second_dispose_releases_nothing() {
        let log: Log = Rc::default();
        let mut root = MockNode::with_geometry("root", &log)
            .with_children(vec![textured("b", "b.map", "b.bump", &log)]);

        dispose(&mut root);
        dispose(&mut root);

        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn children_added_after_dispose_are_drained_by_the_next_one() {
        let log: Log = Rc::default();
        let mut root = MockNode::with_geometry("root", &log)
            .with_children(vec![MockNode::with_geometry("early", &log)]);
        dispose(&mut root);

        root.add_child(Box::new(
            textured("late", "late.map", "late.bump", &log)
                .with_children(vec![MockNode::with_geometry("late.child", &log)]),
        ));
        dispose(&mut root);

        assert!(root.get_children().is_empty());
        assert_eq!(
            *log.borrow(),
            vec!["early", "root", "late.child", "late.map", "late.bump"]
        );
    }

    #[test]
    fn nodes_above_the_subtree_are_untouched() {
        let log: Log = Rc::default();
        let mut root = MockNode::with_geometry("root", &log).with_children(vec![
            MockNode::with_geometry("child", &log)
                .with_children(vec![MockNode::with_geometry("grandchild", &log)]),
        ]);

        dispose(root.get_children_mut()[0].as_mut());

        assert_eq!(*log.borrow(), vec!["grandchild", "child"]);
        assert_eq!(root.get_children().len(), 1);
        assert!(root.get_children()[0].get_children().is_empty());
        assert!(root.geometry.is_some());
    }

    #[test]
    fn texture_shared_by_two_materials_is_released_once() {
        let log: Log = Rc::default();
        let shared = Shared::new(tracked("shared.map", &log));
        let material = |map: Shared<Tracked>| MockMaterial {
            color: [1.0; 4],
            map,
            bump_map: Shared::empty(),
            env_map: None,
        };
        let mut first = MockNode::group("first");
        first.material = Some(material(shared.clone()));
        let mut second = MockNode::group("second");
        second.material = Some(material(shared));
        let mut root = MockNode::group("root").with_children(vec![first, second]);

        dispose(&mut root);

        assert_eq!(*log.borrow(), vec!["shared.map"]);
    }

    #[test]
    fn only_the_last_holder_counts_as_freed() {
        let log: Log = Rc::default();
        let shared = Shared::new(tracked("shared.map", &log));
        let mut keeper = shared.clone();
        let mut node = MockNode::with_geometry("mesh", &log);
        node.material = Some(MockMaterial {
            color: [1.0; 4],
            map: shared,
            bump_map: Shared::empty(),
            env_map: None,
        });

        assert_eq!(dispose_subtree(&mut node), 1);
        assert_eq!(*log.borrow(), vec!["mesh"]);

        assert_eq!(keeper.dispose(), 1);
        assert_eq!(*log.borrow(), vec!["mesh", "shared.map"]);
    }

    #[test]
    fn deep_graphs_are_emptied() {
        let log: Log = Rc::default();
        let mut chain = MockNode::with_geometry("leaf", &log);
        for _ in 0..50 {
            chain = MockNode::group("link").with_children(vec![chain]);
        }
        let mut root = MockNode::group("root").with_children(vec![chain]);
        assert_eq!(count_nodes(&root), 52);

        dispose(&mut root);

        assert_eq!(count_nodes(&root), 1);
        assert_eq!(*log.borrow(), vec!["leaf"]);
    }

    #[test]
    fn world_transforms_follow_the_hierarchy() {
        let mut root = ContainerNode::new("root");
        let mut group = ContainerNode::new("group");
        group.set_local_transform(Instance::from(cgmath::Vector3::new(1.0, 0.0, 0.0)));
        let mut leaf = ContainerNode::new("leaf");
        leaf.set_local_transform(Instance::from(cgmath::Vector3::new(0.0, 2.0, 0.0)));
        group.add_child(Box::new(leaf));
        root.add_child(Box::new(group));

        root.update_world_transforms(&Instance::new());

        let leaf = &root.get_children()[0].get_children()[0];
        assert_eq!(leaf.get_world_transform().position, [1.0, 2.0, 0.0].into());
    }

    #[test]
    fn ambient_lights_add_up() {
        let mut root = ContainerNode::new("root");
        root.add_child(Box::new(AmbientLightNode::new([1.0, 1.0, 1.0], 1.0)));
        let mut group = ContainerNode::new("group");
        group.add_child(Box::new(AmbientLightNode::new([1.0, 0.5, 0.0], 0.5)));
        root.add_child(Box::new(group));

        assert_eq!(collect_ambient(&root), [1.5, 1.25, 1.0]);
    }

    #[test]
    fn lights_and_groups_dispose_as_noops() {
        let mut root = ContainerNode::new("root");
        root.add_child(Box::new(AmbientLightNode::new([1.0; 3], 1.0)));
        dispose(&mut root);
        assert!(root.get_children().is_empty());
        assert_eq!(collect_ambient(&root), [0.0; 3]);
    }
}
