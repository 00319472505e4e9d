//! JSON persistence for drawings.
//!
//! The file layout is the contract with the drawing UI:
//!
//! ```text
//! {
//!     "drawing": {
//!         "strokes": [
//!             [
//!                 { "x": 100.0, "y": 200.0, "a": 15.0, "p": 0.4 },
//!                 ...
//!             ],
//!             ...
//!         ]
//!     }
//! }
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{Drawing, Point, Stroke};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Malformed drawing data: {0}")]
    Format(String),
    #[error("Could not access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Format(err.to_string())
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Deserialize)]
struct DrawingDocument {
    drawing: Drawing,
}

#[derive(Serialize)]
struct DrawingDocumentRef<'a> {
    drawing: &'a Drawing,
}

pub fn parse(text: &str) -> Result<Drawing, StoreError> {
    let document: DrawingDocument = serde_json::from_str(text)?;
    Ok(document.drawing)
}

/// Four space indented JSON with the point fields in x, y, a, p order
///
/// JSON has no NaN or infinity, so drawings holding them are refused.
pub fn serialize(drawing: &Drawing) -> Result<String, StoreError> {
    if let Some((stroke, point)) = drawing.first_non_finite() {
        return Err(StoreError::Format(format!(
            "Stroke {} point {} is not a finite number",
            stroke, point
        )));
    }

    let mut output = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut output, formatter);
    DrawingDocumentRef { drawing }.serialize(&mut serializer)?;

    String::from_utf8(output).map_err(|err| StoreError::Format(err.to_string()))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Drawing, StoreError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    parse(&text)
}

/// Overwrites whatever is at `path`. The parent directory must exist
pub fn save_to_path(drawing: &Drawing, path: impl AsRef<Path>) -> Result<(), StoreError> {
    let path = path.as_ref();
    let text = serialize(drawing)?;
    fs::write(path, text).map_err(io_error(path))
}

/// Write drawing text as given, after checking that it parses
///
/// Nothing is written when the text is malformed.
pub fn save_text_to_path(text: &str, path: impl AsRef<Path>) -> Result<Drawing, StoreError> {
    let path = path.as_ref();
    let drawing = parse(text)?;
    fs::write(path, text).map_err(io_error(path))?;
    Ok(drawing)
}

/// A rectangle that shows the page bounds after the canvas is cleared
pub fn default_boundary_drawing() -> Drawing {
    let corners = [
        (0.0, 350.0),
        (150.0, 350.0),
        (150.0, 250.0),
        (0.0, 250.0),
        (0.0, 350.0),
    ];

    let points = corners
        .iter()
        .map(|&(x, y)| Point::new(x, y, 0.0, 0.0))
        .collect();

    Drawing::new(vec![Stroke::new(points)])
}

/// The current drawing together with the file that backs it
///
/// Every accepted drawing replaces the previous one as a whole and is written
/// to the backing file. A rejected drawing leaves both untouched.
#[derive(Debug)]
pub struct DrawingStore {
    path: PathBuf,
    drawing: Drawing,
}

impl DrawingStore {
    /// Read the drawing at `path`, creating the boundary drawing when there is
    /// no file yet
    ///
    /// A malformed file is reported and left on disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        match load_from_path(&path) {
            Ok(drawing) => {
                info!(
                    "Loaded {} strokes from {}",
                    drawing.strokes.len(),
                    path.display()
                );
                Ok(Self { path, drawing })
            }
            Err(StoreError::Format(err)) => {
                warn!("Drawing at {} is malformed: {}", path.display(), err);
                Err(StoreError::Format(format!("{}: {}", path.display(), err)))
            }
            Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("No drawing at {}. Creating one", path.display());
                Self::create(path)
            }
            Err(err) => Err(err),
        }
    }

    /// Write the boundary drawing to `path` whatever is there now
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let drawing = default_boundary_drawing();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        save_to_path(&drawing, &path)?;

        Ok(Self { path, drawing })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn drawing(&self) -> &Drawing {
        &self.drawing
    }

    pub fn replace(&mut self, drawing: Drawing) -> Result<&Drawing, StoreError> {
        save_to_path(&drawing, &self.path)?;
        self.drawing = drawing;
        Ok(&self.drawing)
    }

    pub fn load_file(&mut self, source: impl AsRef<Path>) -> Result<&Drawing, StoreError> {
        let drawing = load_from_path(source)?;
        self.replace(drawing)
    }

    pub fn load_text(&mut self, text: &str) -> Result<&Drawing, StoreError> {
        let drawing = save_text_to_path(text, &self.path)?;
        self.drawing = drawing;
        Ok(&self.drawing)
    }

    pub fn reset(&mut self) -> Result<&Drawing, StoreError> {
        self.replace(default_boundary_drawing())
    }
}
