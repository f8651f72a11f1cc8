//! Loading of textures and models from the `assets/` directory.
//!
//! Natively files are read from `./assets/`, on the web they are fetched from
//! `<origin>/assets/`.

use anyhow::{Context, Result};

use crate::data_structures::texture::{self, Texture};

pub mod model;

pub use model::load_model_gltf;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> Result<reqwest::Url> {
    let window = web_sys::window().context("no window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page origin is unavailable"))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))?;
    Ok(base.join(file_name)?)
}

pub async fn load_string(file_name: &str) -> Result<String> {
    let data = load_binary(file_name).await?;
    String::from_utf8(data).with_context(|| format!("{file_name} is not valid UTF-8"))
}

pub async fn load_binary(file_name: &str) -> Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url)
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    Ok(data)
}

/// File extension of `file_name`, used as a decoding hint.
fn extension(file_name: &str) -> Option<&str> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
}

pub async fn load_texture(
    file_name: &str,
    is_normal_map: bool,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Result<Texture> {
    let data = load_binary(file_name).await?;
    Texture::from_bytes(
        device,
        queue,
        &data,
        file_name,
        extension(file_name),
        is_normal_map,
    )
    .with_context(|| format!("Failed to load texture {file_name}"))
}

/// Loads the six faces of a cube map, ordered `+x, -x, +y, -y, +z, -z`.
pub async fn load_cube_texture(
    faces: &[String; 6],
    device: &wgpu::Device,
    queue: &wgpu::Queue,
) -> Result<Texture> {
    let loads = faces.iter().map(|face| async move {
        let data = load_binary(face).await?;
        texture::decode(&data, extension(face))
            .with_context(|| format!("Failed to decode cube face {face}"))
    });
    let images = futures::future::try_join_all(loads).await?;
    let images: [image::DynamicImage; 6] = images
        .try_into()
        .map_err(|_| anyhow::anyhow!("a cube map needs exactly six faces"))?;
    Texture::create_cube(device, queue, &images, &faces[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_hint() {
        assert_eq!(extension("textures/Yokohama/posx.jpg"), Some("jpg"));
        assert_eq!(extension("models/cat.glb"), Some("glb"));
        assert_eq!(extension("LICENSE"), None);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn missing_files_name_the_path() {
        let err = load_binary("does/not/exist.bin").await.unwrap_err();
        assert!(format!("{err:#}").contains("exist.bin"), "{err:#}");
    }
}
