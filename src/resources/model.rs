//! glTF 2.0 loading into scene nodes.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result, bail};

use crate::{
    data_structures::{
        dispose::Shared,
        geometry::{Geometry, ModelVertex, compute_tangents},
        instance::Instance,
        material::{MaterialDefaults, Side, StandardMaterial, StandardMaterialParams},
        scene_graph::{ContainerNode, MeshNode, SceneNode},
        texture::Texture,
    },
    resources::load_binary,
};

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// An image decoded for one colour space. Colour maps are sRGB, data maps linear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct ImageKey {
    image: usize,
    linear: bool,
}

/// Textures of one model, each uploaded once and shared by every material using it.
type TextureCache = HashMap<ImageKey, Shared<Texture>>;

/// Fails for files that can't be displayed without a decoder we don't have.
fn check_required_extensions(gltf: &gltf::Gltf) -> Result<()> {
    if gltf.extensions_required().any(|ext| ext == DRACO_EXTENSION) {
        bail!("{DRACO_EXTENSION} is required but Draco compressed meshes are not supported");
    }
    Ok(())
}

/// Parses `data`, rejecting unsupported required extensions before validation
/// so the error names the extension.
fn parse(file_name: &str, data: &[u8]) -> Result<gltf::Gltf> {
    let unvalidated = gltf::Gltf::from_slice_without_validation(data)
        .with_context(|| format!("Failed to parse {file_name}"))?;
    check_required_extensions(&unvalidated)
        .with_context(|| format!("Cannot display {file_name}"))?;
    gltf::Gltf::from_slice(data).with_context(|| format!("Invalid glTF in {file_name}"))
}

/// Resolves `uri` relative to the directory of the model file.
fn relative_to(file_name: &str, uri: &str) -> String {
    match file_name.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{uri}"),
        None => uri.to_string(),
    }
}

async fn load_buffers(file_name: &str, gltf: &gltf::Gltf) -> Result<Vec<Vec<u8>>> {
    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .with_context(|| format!("{file_name} has no binary chunk"))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                bail!("{file_name}: embedded data URIs are not supported, use .glb")
            }
            gltf::buffer::Source::Uri(uri) => {
                let bin = load_binary(&relative_to(file_name, uri)).await?;
                buffer_data.push(bin);
            }
        }
    }
    Ok(buffer_data)
}

/// Images referenced by materials, with the colour space each use needs.
fn referenced_images(gltf: &gltf::Gltf) -> HashSet<ImageKey> {
    let mut keys = HashSet::new();
    for material in gltf.materials() {
        let pbr = material.pbr_metallic_roughness();
        let mut add = |image: usize, linear| {
            keys.insert(ImageKey { image, linear });
        };
        if let Some(info) = pbr.base_color_texture() {
            add(info.texture().source().index(), false);
        }
        if let Some(info) = material.emissive_texture() {
            add(info.texture().source().index(), false);
        }
        if let Some(normal) = material.normal_texture() {
            add(normal.texture().source().index(), true);
        }
        if let Some(occlusion) = material.occlusion_texture() {
            add(occlusion.texture().source().index(), true);
        }
    }
    keys
}

async fn load_images(
    file_name: &str,
    gltf: &gltf::Gltf,
    buffer_data: &[Vec<u8>],
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Result<TextureCache> {
    let images: Vec<gltf::Image> = gltf.images().collect();
    let mut cache = TextureCache::new();
    for key in referenced_images(gltf) {
        let image = images
            .get(key.image)
            .with_context(|| format!("{file_name}: image {} does not exist", key.image))?;
        let label = format!("{file_name} image {}", key.image);
        let texture = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let buffer = buffer_data
                    .get(view.buffer().index())
                    .with_context(|| format!("{label}: missing buffer"))?;
                let bytes = buffer
                    .get(view.offset()..view.offset() + view.length())
                    .with_context(|| format!("{label}: buffer view out of range"))?;
                Texture::from_bytes(
                    device,
                    queue,
                    bytes,
                    &label,
                    mime_type.rsplit('/').next(),
                    key.linear,
                )?
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let path = relative_to(file_name, uri);
                let bytes = load_binary(&path).await?;
                let format = mime_type
                    .and_then(|mt| mt.rsplit('/').next())
                    .or_else(|| path.rsplit_once('.').map(|(_, ext)| ext));
                Texture::from_bytes(device, queue, &bytes, &label, format, key.linear)?
            }
        };
        cache.insert(key, Shared::new(texture));
    }
    Ok(cache)
}

fn cached(cache: &TextureCache, texture: Option<gltf::Texture>, linear: bool) -> Shared<Texture> {
    texture
        .and_then(|texture| {
            cache.get(&ImageKey {
                image: texture.source().index(),
                linear,
            })
        })
        .cloned()
        .unwrap_or_default()
}

fn material_params(material: &gltf::Material, cache: &TextureCache) -> StandardMaterialParams {
    let pbr = material.pbr_metallic_roughness();
    StandardMaterialParams {
        color: pbr.base_color_factor(),
        emissive: material.emissive_factor(),
        metalness: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        side: if material.double_sided() {
            Side::Double
        } else {
            Side::Front
        },
        map: cached(cache, pbr.base_color_texture().map(|i| i.texture()), false),
        normal_map: cached(cache, material.normal_texture().map(|n| n.texture()), true),
        emissive_map: cached(cache, material.emissive_texture().map(|i| i.texture()), false),
        occlusion_map: cached(cache, material.occlusion_texture().map(|o| o.texture()), true),
    }
}

/// Reads one triangle primitive into CPU vertices and indices.
fn read_primitive(
    primitive: &gltf::Primitive,
    buffer_data: &[Vec<u8>],
) -> Option<(Vec<ModelVertex>, Vec<u32>)> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("Skipping primitive {} with mode {:?}", primitive.index(), primitive.mode());
        return None;
    }
    let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(|b| b.as_slice()));

    let mut vertices: Vec<ModelVertex> = reader
        .read_positions()?
        .map(|position| ModelVertex {
            position,
            ..Default::default()
        })
        .collect();
    if let Some(normals) = reader.read_normals() {
        vertices
            .iter_mut()
            .zip(normals)
            .for_each(|(vertex, normal)| vertex.normal = normal);
    }
    if let Some(tex_coords) = reader.read_tex_coords(0) {
        vertices
            .iter_mut()
            .zip(tex_coords.into_f32())
            .for_each(|(vertex, tex_coords)| vertex.tex_coords = tex_coords);
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    match reader.read_tangents() {
        Some(tangents) => {
            // glTF tangents are vec4, w being the handedness of the bitangent
            for (vertex, tangent) in vertices.iter_mut().zip(tangents) {
                let tangent: cgmath::Vector4<f32> = tangent.into();
                let normal: cgmath::Vector3<f32> = vertex.normal.into();
                vertex.tangent = tangent.truncate().into();
                vertex.bitangent = (normal.cross(tangent.truncate()) * tangent.w).into();
            }
        }
        None if primitive.material().normal_texture().is_some() => {
            compute_tangents(&mut vertices, &indices);
        }
        None => (),
    }

    Some((vertices, indices))
}

struct Loader<'a> {
    device: &'a wgpu::Device,
    defaults: &'a MaterialDefaults,
    buffer_data: &'a [Vec<u8>],
    cache: &'a TextureCache,
}

impl Loader<'_> {
    fn mesh_node(&self, name: String, primitive: &gltf::Primitive) -> Result<Option<MeshNode>> {
        let Some((vertices, indices)) = read_primitive(primitive, self.buffer_data) else {
            return Ok(None);
        };
        let geometry = Geometry::new(self.device, &name, &vertices, &indices);
        let material = primitive.material();
        let material = StandardMaterial::new(
            self.device,
            self.defaults,
            material.name().unwrap_or(&name),
            material_params(&material, self.cache),
        )?;
        Ok(Some(MeshNode::new(
            self.device,
            name,
            geometry,
            Box::new(material),
        )))
    }

    /// Mirrors a glTF node and its children. A mesh with one primitive becomes a
    /// [`MeshNode`]; several primitives become mesh children of a container.
    fn to_scene_node(&self, node: gltf::Node) -> Result<Box<dyn SceneNode>> {
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node {}", node.index()));

        let mut scene_node: Box<dyn SceneNode> = match node.mesh() {
            Some(mesh) if mesh.primitives().len() == 1 => {
                let primitive = mesh.primitives().next();
                match primitive.map(|p| self.mesh_node(name.clone(), &p)).transpose()? {
                    Some(Some(mesh_node)) => Box::new(mesh_node),
                    _ => Box::new(ContainerNode::new(name)),
                }
            }
            Some(mesh) => {
                let mut container = ContainerNode::new(name.clone());
                for primitive in mesh.primitives() {
                    let primitive_name = format!("{name} primitive {}", primitive.index());
                    if let Some(mesh_node) = self.mesh_node(primitive_name, &primitive)? {
                        container.add_child(Box::new(mesh_node));
                    }
                }
                Box::new(container)
            }
            None => Box::new(ContainerNode::new(name)),
        };

        scene_node.set_local_transform(Instance::from(node.transform()));
        for child in node.children() {
            scene_node.add_child(self.to_scene_node(child)?);
        }
        Ok(scene_node)
    }
}

/// Loads a `.glb` or `.gltf` file below `assets/` into a node hierarchy.
///
/// The returned container is named after the file and holds the nodes of the
/// default scene (or the first scene).
pub async fn load_model_gltf(
    file_name: &str,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    defaults: &MaterialDefaults,
) -> Result<Box<dyn SceneNode>> {
    let data = load_binary(file_name).await?;
    let gltf = parse(file_name, &data)?;

    let buffer_data = load_buffers(file_name, &gltf).await?;
    let cache = load_images(file_name, &gltf, &buffer_data, device, queue).await?;
    let loader = Loader {
        device,
        defaults,
        buffer_data: &buffer_data,
        cache: &cache,
    };

    let mut root = ContainerNode::new(file_name);
    if let Some(scene) = gltf.default_scene().or_else(|| gltf.scenes().next()) {
        for node in scene.nodes() {
            root.add_child(loader.to_scene_node(node)?);
        }
    }
    log::info!(
        "Loaded {file_name}: {} meshes, {} textures",
        gltf.meshes().len(),
        cache.len()
    );
    Ok(Box::new(root))
}
