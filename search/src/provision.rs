//! Locating or installing the ripgrep binary.
//!
//! Resolution order: `rg` on `PATH`, then the per-user cache directory, then a
//! download of the pinned release for this platform. The downloaded archive is
//! unpacked into a staging directory and the binary is moved into the cache with a
//! no-clobber rename, so concurrent installers cannot observe a partial file.

use std::env;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use futures_util::StreamExt;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use trawl_utils::{AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write_new_with_options};

use crate::SearchError;

pub const DEFAULT_RIPGREP_VERSION: &str = "14.1.0";
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://github.com/BurntSushi/ripgrep/releases/download";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }

    /// File name of the binary inside an archive of this format.
    const fn archived_binary(self) -> &'static str {
        match self {
            Self::TarGz => "rg",
            Self::Zip => "rg.exe",
        }
    }
}

/// A published release asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseTarget {
    pub triple: &'static str,
    pub format: ArchiveFormat,
}

const PLATFORMS: [(&str, ReleaseTarget); 5] = [
    (
        "aarch64-macos",
        ReleaseTarget {
            triple: "aarch64-apple-darwin",
            format: ArchiveFormat::TarGz,
        },
    ),
    (
        "aarch64-linux",
        ReleaseTarget {
            triple: "aarch64-unknown-linux-gnu",
            format: ArchiveFormat::TarGz,
        },
    ),
    (
        "x86_64-macos",
        ReleaseTarget {
            triple: "x86_64-apple-darwin",
            format: ArchiveFormat::TarGz,
        },
    ),
    (
        "x86_64-linux",
        ReleaseTarget {
            triple: "x86_64-unknown-linux-musl",
            format: ArchiveFormat::TarGz,
        },
    ),
    (
        "x86_64-windows",
        ReleaseTarget {
            triple: "x86_64-pc-windows-msvc",
            format: ArchiveFormat::Zip,
        },
    ),
];

/// `<arch>-<os>` for the running process.
#[must_use]
pub fn platform_key() -> String {
    format!("{}-{}", env::consts::ARCH, env::consts::OS)
}

pub fn release_target(platform_key: &str) -> Result<ReleaseTarget, SearchError> {
    PLATFORMS
        .iter()
        .find(|(key, _)| *key == platform_key)
        .map(|(_, target)| *target)
        .ok_or_else(|| SearchError::UnsupportedPlatform {
            key: platform_key.to_string(),
        })
}

/// Name of the binary in the cache directory.
#[must_use]
pub const fn binary_name() -> &'static str {
    if cfg!(windows) { "rg.exe" } else { "rg" }
}

/// Cache location used when none is configured.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".trawl")
        .join("bin")
}

#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub cache_dir: PathBuf,
    pub version: String,
    pub release_base_url: String,
    /// Consult `PATH` before the cache.
    pub search_path: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            version: DEFAULT_RIPGREP_VERSION.to_string(),
            release_base_url: DEFAULT_RELEASE_BASE_URL.to_string(),
            search_path: true,
        }
    }
}

impl ProvisionConfig {
    #[must_use]
    pub fn asset_url(&self, target: ReleaseTarget) -> String {
        format!(
            "{}/{version}/ripgrep-{version}-{}.{}",
            self.release_base_url.trim_end_matches('/'),
            target.triple,
            target.format.extension(),
            version = self.version,
        )
    }

    fn cached_binary(&self) -> PathBuf {
        self.cache_dir.join(binary_name())
    }
}

/// Resolves the ripgrep binary once per process and hands out the same path after.
#[derive(Debug)]
pub struct Provisioner {
    config: ProvisionConfig,
    client: reqwest::Client,
    resolved: OnceCell<PathBuf>,
}

impl Provisioner {
    #[must_use]
    pub fn new(config: ProvisionConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    #[must_use]
    pub fn with_client(config: ProvisionConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            resolved: OnceCell::new(),
        }
    }

    /// A provisioner that already knows where the binary lives.
    #[must_use]
    pub fn preresolved(binary: impl Into<PathBuf>) -> Self {
        Self {
            config: ProvisionConfig::default(),
            client: reqwest::Client::new(),
            resolved: OnceCell::new_with(Some(binary.into())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Path to a working ripgrep binary, installing it on first use if needed.
    pub async fn resolve(&self) -> Result<&Path, SearchError> {
        self.resolved
            .get_or_try_init(|| self.locate_or_install())
            .await
            .map(PathBuf::as_path)
    }

    async fn locate_or_install(&self) -> Result<PathBuf, SearchError> {
        if self.config.search_path
            && let Ok(path) = which::which("rg")
        {
            info!(path = %path.display(), "Using ripgrep from PATH");
            return Ok(path);
        }

        let cached = self.config.cached_binary();
        if tokio::fs::metadata(&cached)
            .await
            .is_ok_and(|meta| meta.is_file())
        {
            info!(path = %cached.display(), "Using cached ripgrep");
            return Ok(cached);
        }

        let target = release_target(&platform_key())?;
        self.install(target, &cached).await?;
        info!(path = %cached.display(), version = %self.config.version, "Installed ripgrep");
        Ok(cached)
    }

    async fn install(&self, target: ReleaseTarget, dest: &Path) -> Result<(), SearchError> {
        tokio::fs::create_dir_all(&self.config.cache_dir).await?;

        let url = self.config.asset_url(target);
        let archive = self.download(&url, target.format).await?;

        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || install_from_archive(archive, target.format, &dest))
            .await
            .map_err(|err| SearchError::Extract {
                message: format!("extraction task failed: {err}"),
            })?
    }

    /// Stream the asset into a temp file inside the cache directory.
    async fn download(&self, url: &str, format: ArchiveFormat) -> Result<NamedTempFile, SearchError> {
        debug!(url, "Downloading ripgrep release");
        let download_err = |source| SearchError::Download {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(download_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::DownloadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let archive = tempfile::Builder::new()
            .prefix(".ripgrep-")
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(&self.config.cache_dir)?;
        let mut file = tokio::fs::File::from_std(archive.reopen()?);
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk.map_err(download_err)?).await?;
        }
        file.flush().await?;

        Ok(archive)
    }
}

/// Extract the binary from `archive` and install it at `dest`.
///
/// The archive is deleted when this returns, whatever the outcome. If another
/// installer already placed a binary at `dest`, that binary is kept.
pub(crate) fn install_from_archive(
    archive: NamedTempFile,
    format: ArchiveFormat,
    dest: &Path,
) -> Result<(), SearchError> {
    let bytes = match format {
        ArchiveFormat::TarGz => {
            let staging_root = dest.parent().unwrap_or_else(|| Path::new("."));
            let staging = tempfile::Builder::new()
                .prefix(".ripgrep-staging-")
                .tempdir_in(staging_root)?;
            unpack_tar_gz(archive.path(), staging.path())?;
            read_binary(&staging.path().join(format.archived_binary()))?
        }
        ArchiveFormat::Zip => read_zip_binary(archive.path(), format.archived_binary())?,
    };
    drop(archive);

    let options = AtomicWriteOptions {
        file_sync: FileSyncPolicy::SyncAll,
        mode: PersistMode::Executable,
    };
    match atomic_write_new_with_options(dest, &bytes, options) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            debug!(path = %dest.display(), "ripgrep was installed concurrently; keeping existing binary");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

/// Unpack a gzipped tarball into `dest`, dropping the top-level directory.
fn unpack_tar_gz(archive: &Path, dest: &Path) -> Result<(), SearchError> {
    let mut tarball = tar::Archive::new(GzDecoder::new(File::open(archive)?));
    for entry in tarball.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();
        let Some(relative) = strip_top_level(&path) else {
            continue;
        };
        let out = dest.join(relative);
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&out)?;
    }
    Ok(())
}

/// `top/a/b` becomes `a/b`. Paths that are empty after stripping or that try to
/// escape the destination yield `None`.
fn strip_top_level(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    components.next()?;
    let rest: PathBuf = components.as_path().to_path_buf();
    let safe = rest
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    (safe && !rest.as_os_str().is_empty()).then_some(rest)
}

fn read_binary(path: &Path) -> Result<Vec<u8>, SearchError> {
    std::fs::read(path).map_err(|err| SearchError::Extract {
        message: format!("{} missing from archive: {err}", path.display()),
    })
}

/// Read the single entry whose file name is `name`.
fn read_zip_binary(archive: &Path, name: &str) -> Result<Vec<u8>, SearchError> {
    let zip_err = |err: zip::result::ZipError| SearchError::Extract {
        message: err.to_string(),
    };
    let mut zip = zip::ZipArchive::new(File::open(archive)?).map_err(zip_err)?;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(zip_err)?;
        if !entry.is_file() || entry.name().rsplit('/').next() != Some(name) {
            continue;
        }
        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut bytes)?;
        return Ok(bytes);
    }
    Err(SearchError::Extract {
        message: format!("{name} not found in archive"),
    })
}
