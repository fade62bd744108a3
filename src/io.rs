//! File helpers for the binaries. The matching pipeline itself never touches
//! the filesystem apart from optional debug crops.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::catalog::CatalogEntry;
use crate::cropper::CroppedSymbol;
use crate::geometry::Vector;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Sort key: the stem without its trailing digits, then those digits as a
/// number, then the full name. `frame_2` sorts before `frame_10`.
fn numbered_name_key(path: &Path) -> (String, Option<u64>, String) {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_owned();
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let prefix = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    let number = stem[prefix.len()..].parse().ok();
    (prefix.to_owned(), number, name)
}

/// Image files directly inside `dir`, in numbered file name order.
pub fn image_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    paths.sort_by_cached_key(|p| numbered_name_key(p));
    Ok(paths)
}

fn open_rgb(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("failed to decode {}", path.display()))?
        .to_rgb8())
}

/// Load the catalog from `<name>.png` files.
///
/// Entries are ordered by file name, with numbered names in numeric order.
/// Identification is first-match, so the order matters when two symbols look
/// alike; prefix names to control it.
pub fn load_catalog(dir: &Path) -> Result<Vec<Arc<CatalogEntry>>> {
    let mut catalog = Vec::new();

    for path in image_paths(dir)? {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_owned();
        match open_rgb(&path) {
            Ok(image) => {
                let (width, height) = image.dimensions();
                tracing::info!("loaded catalog symbol {name} ({width}x{height})");
                catalog.push(Arc::new(CatalogEntry::new(name, image)));
            }
            Err(e) => tracing::warn!("{e:#}"),
        }
    }

    if catalog.is_empty() {
        anyhow::bail!("no catalog symbols could be loaded from {}", dir.display());
    }

    Ok(catalog)
}

/// All images directly inside `dir`, in numbered file name order.
pub fn read_images(dir: &Path) -> Result<Vec<RgbImage>> {
    image_paths(dir)?.iter().map(|p| open_rgb(p)).collect()
}

/// Lazily decode the images of `dir` in numbered file name order, so that
/// `frame_9` is followed by `frame_10`.
///
/// Undecodable files are logged and skipped so that one bad capture does not
/// end the stream.
pub fn frame_stream(dir: &Path) -> Result<impl Iterator<Item = RgbImage> + use<>> {
    let paths = image_paths(dir)?;
    Ok(paths.into_iter().filter_map(|path| match open_rgb(&path) {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::warn!("skipping frame: {e:#}");
            None
        }
    }))
}

/// Every symbol crop below `root`, one subdirectory per frame, as written by
/// the cropper's debug output.
pub fn read_symbol_crops(root: &Path) -> Result<Vec<RgbImage>> {
    let mut frame_dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .with_context(|| format!("failed to read {}", root.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    frame_dirs.sort_by_cached_key(|p| numbered_name_key(p));

    let mut crops = Vec::new();
    for dir in &frame_dirs {
        crops.extend(read_images(dir)?);
    }
    Ok(crops)
}

/// Reload the debug crops of one frame written by the cropper.
///
/// The frame id is the directory name and every `symbol_<column>_<row>` file
/// becomes one crop at that grid index. Crops come back in row-major order.
pub fn read_cropped_symbols(frame_dir: &Path) -> Result<Vec<CroppedSymbol>> {
    let frame = frame_dir
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("no frame name in {}", frame_dir.display()))?
        .to_owned();

    let mut symbols = Vec::new();
    for path in image_paths(frame_dir)? {
        let index = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(parse_symbol_index)
            .with_context(|| format!("not a symbol_<column>_<row> file: {}", path.display()))?;
        symbols.push(CroppedSymbol {
            frame: frame.clone(),
            index,
            image: open_rgb(&path)?,
        });
    }

    symbols.sort_by_key(|s| (s.index.y, s.index.x));
    tracing::debug!("read {} crop(s) of {frame}", symbols.len());
    Ok(symbols)
}

fn parse_symbol_index(stem: &str) -> Option<Vector> {
    let (column, row) = stem.strip_prefix("symbol_")?.split_once('_')?;
    Some(Vector::new(column.parse().ok()?, row.parse().ok()?))
}

/// Write `images` as `image_<i>.png`.
pub fn save_images(dir: &Path, images: &[RgbImage]) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    for (index, image) in images.iter().enumerate() {
        let path = dir.join(format!("image_{index}.png"));
        image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    use crate::cropper::SymbolCropper;
    use crate::geometry::SymbolsGrid;

    fn solid(v: u8) -> RgbImage {
        RgbImage::from_pixel(4, 3, Rgb([v, v, v]))
    }

    #[test]
    fn test_save_and_load_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        save_images(tmp.path(), &[solid(10), solid(20)]).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "not an image").unwrap();

        let catalog = load_catalog(tmp.path()).unwrap();
        let names: Vec<_> = catalog.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["image_0", "image_1"]);
        assert_eq!(catalog[1].image.get_pixel(0, 0).0, [20, 20, 20]);
    }

    #[test]
    fn test_empty_catalog_dir_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_catalog(tmp.path()).is_err());
    }

    #[test]
    fn test_read_symbol_crops_walks_frame_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        save_images(&tmp.path().join("frame_0"), &[solid(1), solid(2)]).unwrap();
        save_images(&tmp.path().join("frame_1"), &[solid(3)]).unwrap();

        let crops = read_symbol_crops(tmp.path()).unwrap();
        assert_eq!(crops.len(), 3);
        assert_eq!(crops[2].get_pixel(0, 0).0, [3, 3, 3]);
    }

    #[test]
    fn test_frame_stream_skips_broken_files() {
        let tmp = tempfile::tempdir().unwrap();
        save_images(tmp.path(), &[solid(5), solid(6)]).unwrap();
        std::fs::write(tmp.path().join("image_9.png"), b"garbage").unwrap();

        let frames: Vec<_> = frame_stream(tmp.path()).unwrap().collect();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_frame_stream_follows_frame_numbers() {
        let tmp = tempfile::tempdir().unwrap();
        for n in [10u8, 2, 1] {
            solid(n).save(tmp.path().join(format!("frame_{n}.png"))).unwrap();
        }

        let order: Vec<u8> = frame_stream(tmp.path())
            .unwrap()
            .map(|f| f.get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(order, vec![1, 2, 10]);
    }

    #[test]
    fn test_unnumbered_names_sort_after_prefix() {
        let paths = [
            Path::new("b.png"),
            Path::new("a_10.png"),
            Path::new("a_9.png"),
            Path::new("a_.png"),
        ];
        let mut sorted = paths.to_vec();
        sorted.sort_by_cached_key(|p| numbered_name_key(p));
        assert_eq!(
            sorted,
            vec![
                Path::new("a_.png"),
                Path::new("a_9.png"),
                Path::new("a_10.png"),
                Path::new("b.png"),
            ]
        );
    }

    #[test]
    fn test_read_cropped_symbols_reloads_debug_crops() {
        let tmp = tempfile::tempdir().unwrap();
        let grid = SymbolsGrid {
            start_point: Vector::new(1, 2),
            symbol_size: Vector::new(5, 4),
            offset: Vector::new(1, 1),
            number_of_elements: Vector::new(3, 2),
        };
        let frame = RgbImage::from_fn(30, 20, |x, y| Rgb([x as u8, y as u8, (x + y) as u8]));
        let written = SymbolCropper::new()
            .with_debug_dir(tmp.path())
            .extract_symbols("frame_12", &frame, &grid)
            .unwrap();

        let read = read_cropped_symbols(&tmp.path().join("frame_12")).unwrap();
        assert_eq!(read.len(), written.len());
        for (a, b) in read.iter().zip(&written) {
            assert_eq!(a.frame, "frame_12");
            assert_eq!(a.index, b.index);
            assert_eq!(a.image.as_raw(), b.image.as_raw());
        }
    }

    #[test]
    fn test_read_cropped_symbols_rejects_foreign_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("frame_0");
        save_images(&dir, &[solid(1)]).unwrap();
        assert!(read_cropped_symbols(&dir).is_err());
    }

    #[test]
    fn test_parse_symbol_index() {
        assert_eq!(parse_symbol_index("symbol_4_2"), Some(Vector::new(4, 2)));
        assert_eq!(parse_symbol_index("symbol_4"), None);
        assert_eq!(parse_symbol_index("image_0"), None);
    }
}
