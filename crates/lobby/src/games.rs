//! The on-disk game repository: installed games and uploaded packages.
//!
//! ```text
//! games_dir/
//!   <game_id>/manifest.json    installed game, launched from here
//!   <game_id>/...
//!   packages/<game_id>.zip     the package as uploaded, served to downloads
//! ```

use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};

use lobby_protocol::{ErrorKind, GameManifest};

/// Name of the manifest at the root of every package and game directory.
pub const MANIFEST_FILE: &str = "manifest.json";

const PACKAGES_DIR: &str = "packages";

/// Problems with game packages and installed game files.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// The game has no installed files on this host.
    #[error("game files for {0} are missing")]
    FilesMissing(String),

    /// `manifest.json` exists but does not describe a game.
    #[error("bad manifest: {0}")]
    BadManifest(String),

    /// The package has no `manifest.json` at its root.
    #[error("package has no {MANIFEST_FILE}")]
    MissingManifest,

    /// The upload is not a readable zip archive.
    #[error("bad package archive: {0}")]
    Archive(String),

    #[error("version {offered} of {game_id} is not newer than installed version {installed}")]
    NotNewer {
        game_id: String,
        installed: String,
        offered: String,
    },

    /// A name that would escape the games directory.
    #[error("unsafe name: {0}")]
    UnsafeName(String),

    #[error("game file I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl PackageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FilesMissing(_) => ErrorKind::NotFound,
            Self::BadManifest(_)
            | Self::MissingManifest
            | Self::Archive(_)
            | Self::UnsafeName(_) => ErrorKind::Invalid,
            Self::NotNewer { .. } => ErrorKind::Conflict,
            Self::Io(_) => ErrorKind::Internal,
        }
    }
}

/// Rejects ids and file names that are empty or could leave their directory.
pub(crate) fn check_name(name: &str) -> Result<(), PackageError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name == PACKAGES_DIR;
    if bad {
        return Err(PackageError::UnsafeName(name.to_string()));
    }
    Ok(())
}

/// A non-empty relative path that stays inside the game directory.
fn is_contained(entry: &str) -> bool {
    let path = Path::new(entry);
    !entry.trim().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && path.components().any(|c| matches!(c, Component::Normal(_)))
}

fn parse_manifest(bytes: &[u8]) -> Result<GameManifest, PackageError> {
    let mut manifest: GameManifest =
        serde_json::from_slice(bytes).map_err(|e| PackageError::BadManifest(e.to_string()))?;
    check_name(&manifest.game_id)
        .map_err(|_| PackageError::BadManifest(format!("bad game_id {:?}", manifest.game_id)))?;
    if !is_contained(&manifest.server_entry) {
        return Err(PackageError::BadManifest(format!(
            "bad server_entry {:?}",
            manifest.server_entry
        )));
    }
    manifest.strip_record_keys();
    Ok(manifest)
}

/// Games installed under one directory.
#[derive(Debug, Clone)]
pub struct GameRepository {
    root: PathBuf,
}

impl GameRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn game_dir(&self, game_id: &str) -> PathBuf {
        self.root.join(game_id)
    }

    pub fn package_path(&self, game_id: &str) -> PathBuf {
        self.root.join(PACKAGES_DIR).join(format!("{game_id}.zip"))
    }

    /// Reads the installed manifest of `game_id`.
    ///
    /// # Errors
    /// `FilesMissing` if the game is not installed, `BadManifest` if its
    /// manifest does not parse.
    pub async fn load_manifest(&self, game_id: &str) -> Result<GameManifest, PackageError> {
        check_name(game_id).map_err(|_| PackageError::FilesMissing(game_id.to_string()))?;
        let path = self.game_dir(game_id).join(MANIFEST_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PackageError::FilesMissing(game_id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        parse_manifest(&bytes)
    }

    /// Validates and installs an uploaded package.
    ///
    /// The package must carry a manifest whose version compares greater
    /// than the installed one. On success the game directory is replaced
    /// and the package is kept for downloads.
    pub async fn install(&self, package: Vec<u8>) -> Result<GameManifest, PackageError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || install_blocking(&root, package))
            .await
            .map_err(|e| PackageError::Io(io::Error::other(e)))?
    }

    /// The stored package of `game_id`.
    pub async fn read_package(&self, game_id: &str) -> Result<Vec<u8>, PackageError> {
        check_name(game_id).map_err(|_| PackageError::FilesMissing(game_id.to_string()))?;
        match tokio::fs::read(self.package_path(game_id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(PackageError::FilesMissing(game_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the installed directory and package of `game_id`. Missing
    /// files are not an error.
    pub async fn remove(&self, game_id: &str) -> Result<(), PackageError> {
        check_name(game_id)?;
        match tokio::fs::remove_dir_all(self.game_dir(game_id)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        match tokio::fs::remove_file(self.package_path(game_id)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

fn open_archive(package: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>, PackageError> {
    zip::ZipArchive::new(Cursor::new(package)).map_err(|e| PackageError::Archive(e.to_string()))
}

fn archive_manifest(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
) -> Result<GameManifest, PackageError> {
    let mut entry = match archive.by_name(MANIFEST_FILE) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Err(PackageError::MissingManifest),
        Err(e) => return Err(PackageError::Archive(e.to_string())),
    };
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    parse_manifest(&bytes)
}

/// Reads the manifest of a package without installing anything.
pub fn package_manifest(package: &[u8]) -> Result<GameManifest, PackageError> {
    archive_manifest(&mut open_archive(package)?)
}

fn install_blocking(root: &Path, package: Vec<u8>) -> Result<GameManifest, PackageError> {
    let mut archive = open_archive(&package)?;
    let manifest = archive_manifest(&mut archive)?;

    let game_id = manifest.game_id.clone();
    let game_dir = root.join(&game_id);
    if let Ok(bytes) = fs::read(game_dir.join(MANIFEST_FILE)) {
        // An unreadable installed manifest is simply overwritten.
        if let Ok(installed) = parse_manifest(&bytes) {
            if !manifest.supersedes(&installed) {
                return Err(PackageError::NotNewer {
                    game_id,
                    installed: installed.version,
                    offered: manifest.version,
                });
            }
        }
    }

    // Extract next to the target, then swap it in.
    let staging = root.join(format!(".{game_id}.incoming"));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;
    if let Err(e) = archive.extract(&staging) {
        let _ = fs::remove_dir_all(&staging);
        return Err(PackageError::Archive(e.to_string()));
    }
    if game_dir.exists() {
        fs::remove_dir_all(&game_dir)?;
    }
    fs::rename(&staging, &game_dir)?;

    let packages = root.join(PACKAGES_DIR);
    fs::create_dir_all(&packages)?;
    fs::write(packages.join(format!("{game_id}.zip")), &package)?;

    tracing::info!(game = %game_id, version = %manifest.version, "game installed");
    Ok(manifest)
}
