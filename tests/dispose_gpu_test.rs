#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
fn textured_sphere(
    device: &wgpu::Device,
    defaults: &scene_canvas::data_structures::material::MaterialDefaults,
    name: &str,
    map: scene_canvas::Shared<scene_canvas::data_structures::texture::Texture>,
) -> scene_canvas::data_structures::scene_graph::MeshNode {
    use scene_canvas::data_structures::{
        geometry::SphereGeometry,
        material::{BasicMaterial, Side},
        scene_graph::MeshNode,
    };

    let geometry = SphereGeometry::new(1.0, 8, 4).upload(device, name);
    let material = BasicMaterial::new(device, defaults, name, map, Side::Double)
        .expect("Failed to create material");
    MeshNode::new(device, name, geometry, Box::new(material))
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_release_a_loaded_graph() {
    use scene_canvas::{
        Dispose, SceneNode, Shared, dispose,
        data_structures::{
            material::MaterialDefaults,
            scene_graph::{ContainerNode, count_nodes},
            texture::Texture,
        },
    };

    gpu_test!(|device, queue| {
        let defaults = MaterialDefaults::new(&device, &queue);
        let mut texture = Shared::new(Texture::create_white(&device, &queue));

        let mut group = ContainerNode::new("group");
        group.add_child(Box::new(textured_sphere(&device, &defaults, "b", texture.clone())));
        let mut root = ContainerNode::new("root");
        root.add_child(Box::new(textured_sphere(&device, &defaults, "a", texture.clone())));
        root.add_child(Box::new(group));
        assert_eq!(count_nodes(&root), 4);
        assert_eq!(texture.holders(), 3);
        assert_eq!(root.get_render().len(), 2);

        dispose(&mut root);

        assert_eq!(count_nodes(&root), 1);
        assert!(root.get_render().is_empty());
        assert!(root.is_disposed());
        // both materials gave up their reference; ours still keeps the texture alive
        assert_eq!(texture.holders(), 1);
        assert!(texture.get().is_some());

        texture.dispose();
        assert!(!texture.holds_resource());

        // disposing again is a no-op
        dispose(&mut root);
        assert_eq!(count_nodes(&root), 1);
    });
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_leave_nothing_to_draw_after_disposing_a_mesh() {
    use scene_canvas::{
        Shared, dispose,
        data_structures::{material::MaterialDefaults, scene_graph::SceneNode},
    };

    gpu_test!(|device, queue| {
        let defaults = MaterialDefaults::new(&device, &queue);
        let mut mesh = textured_sphere(&device, &defaults, "sphere", Shared::empty());
        assert!(mesh.geometry().is_some());
        assert_eq!(mesh.get_render().len(), 1);

        dispose(&mut mesh);

        assert!(mesh.geometry().is_none());
        assert!(mesh.get_render().is_empty());
        assert!(mesh.material_mut().is_some_and(|m| m.bind_group().is_none()));
    });
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_validate_cube_faces() {
    use scene_canvas::data_structures::texture::Texture;

    gpu_test!(|device, queue| {
        let face = |w, h| image::DynamicImage::new_rgba8(w, h);

        let square: [image::DynamicImage; 6] = std::array::from_fn(|_| face(4, 4));
        assert!(Texture::create_cube(&device, &queue, &square, "square").is_ok());

        let wide: [image::DynamicImage; 6] = std::array::from_fn(|_| face(8, 4));
        assert!(Texture::create_cube(&device, &queue, &wide, "wide").is_err());

        let mut mixed: [image::DynamicImage; 6] = std::array::from_fn(|_| face(4, 4));
        mixed[3] = face(2, 2);
        let err = Texture::create_cube(&device, &queue, &mixed, "mixed").unwrap_err();
        assert!(err.to_string().contains("face 3"), "{err}");
    });
}
