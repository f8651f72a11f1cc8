#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn should_start_with_the_ambient_light() {
    use crate::common::test_utils::{config, target};
    use scene_canvas::Scene;

    gpu_test!(|device, queue| {
        let config = config();
        let scene = Scene::with_target(&device, &queue, target(), &config)
            .expect("Failed to create scene");
        // root and ambient light
        assert_eq!(scene.node_count(), 2);
        assert_eq!(scene.camera().position.z, config.camera_z);
        assert!(!scene.is_destroyed());
    });
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_render_and_destroy() {
    use crate::common::test_utils::{Offscreen, config, target};
    use scene_canvas::{
        Dispose, Scene, SceneNode, Shared,
        data_structures::{
            geometry::SphereGeometry,
            material::{BasicMaterial, Side},
            scene_graph::MeshNode,
            texture::Texture,
        },
    };

    gpu_test!(|device, queue| {
        let mut scene = Scene::with_target(&device, &queue, target(), &config())
            .expect("Failed to create scene");
        let sky = Texture::create_blank_cube(&device, &queue).expect("Failed to create cube");
        scene.set_background(&device, sky);

        let map = Shared::new(Texture::create_white(&device, &queue));
        let geometry = SphereGeometry::new(40.0, 16, 8).upload(&device, "sphere");
        let material = BasicMaterial::new(&device, scene.defaults(), "sphere", map, Side::Back)
            .expect("Failed to create material");
        scene.add(Box::new(MeshNode::new(&device, "sphere", geometry, Box::new(material))));
        assert_eq!(scene.node_count(), 3);

        let offscreen = Offscreen::new(&device);
        let frame = |scene: &mut Scene| {
            scene.prepare(&queue);
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Test Encoder"),
            });
            scene.draw(
                &mut encoder,
                offscreen.colour_attachment(),
                offscreen.depth_attachment(),
            );
            queue.submit(std::iter::once(encoder.finish()));
        };
        frame(&mut scene);

        scene.destroy();
        assert!(scene.is_destroyed());
        assert_eq!(scene.node_count(), 1);
        assert!(scene.root().get_render().is_empty());
        assert!(!scene.defaults().white.holds_resource());

        // a destroyed scene still clears the frame
        frame(&mut scene);
        scene.destroy();
    });
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_dispose_nodes_added_after_destroy() {
    use crate::common::test_utils::{config, target};
    use scene_canvas::{
        Scene, SceneNode,
        data_structures::{
            geometry::SphereGeometry,
            material::{BasicMaterial, Side},
            scene_graph::MeshNode,
        },
    };

    gpu_test!(|device, queue| {
        let mut scene = Scene::with_target(&device, &queue, target(), &config())
            .expect("Failed to create scene");
        let geometry = SphereGeometry::new(1.0, 8, 4).upload(&device, "late");
        let material = BasicMaterial::new(
            &device,
            scene.defaults(),
            "late",
            Default::default(),
            Side::Front,
        )
        .expect("Failed to create material");
        let late = MeshNode::new(&device, "late", geometry, Box::new(material));

        scene.destroy();
        scene.add(Box::new(late));

        assert_eq!(scene.node_count(), 1);
        assert!(scene.root().get_render().is_empty());
    });
}
