// SPDX-License-Identifier: GPL-3.0-only

//! Storage utilities for captured photos

use crate::backends::camera::Image;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write an image's bytes to `target` and return the absolute path
///
/// Parent directories are created. An existing file is replaced.
pub async fn save_image(image: &Image, target: &Path) -> io::Result<PathBuf> {
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(target, image.data.clone()).await?;
    let path = std::path::absolute(target)?;

    debug!(path = %path.display(), bytes = image.data.len(), "Image written");
    Ok(path)
}

/// Timestamped photo file inside `dir`, e.g. `IMG_20250101_120000.jpg`
pub fn timestamped_photo_path(dir: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("IMG_{}.jpg", timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::{ImageFormat, Size};

    fn jpeg(bytes: &[u8]) -> Image {
        Image {
            format: ImageFormat::Jpeg,
            size: Size::new(4, 3),
            timestamp_ns: 0,
            data: bytes.into(),
        }
    }

    #[tokio::test]
    async fn test_save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("photo.jpg");

        let saved = save_image(&jpeg(&[0xFF, 0xD8, 0xFF, 0xD9]), &target)
            .await
            .unwrap();

        assert_eq!(saved, target);
        assert_eq!(std::fs::read(&target).unwrap(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_photo() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("photo.jpg");

        save_image(&jpeg(&[1; 10]), &target).await.unwrap();
        save_image(&jpeg(&[2; 3]), &target).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), vec![2; 3]);
    }

    #[test]
    fn test_timestamped_name() {
        let path = timestamped_photo_path(Path::new("/tmp/photos"));
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("IMG_"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(path.parent().unwrap(), Path::new("/tmp/photos"));
    }
}
