//! The acoustic-model catalog, plus the model lifecycle operations:
//! download, atomic selection persistence, delete with auto-failover.

use crate::device::DeviceProfile;
use crate::error::{EngineError, EngineResult};
use crate::settings::{Settings, SettingsStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// URL template models are downloaded from.
const MODEL_SOURCE_TEMPLATE: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{file_name}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    pub whisper_ref: &'static str,
    pub file_name: &'static str,
    pub approx_size_gb: f64,
    pub min_ram_gb: f64,
    pub recommended_ram_gb: f64,
    pub speed_note: &'static str,
    pub quality_note: &'static str,
}

/// The fixed, ordered catalog of exactly 12 entries.
pub const CATALOG: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "tiny-en",
        display_name: "Tiny (English)",
        whisper_ref: "tiny.en",
        file_name: "ggml-tiny.en.bin",
        approx_size_gb: 0.075,
        min_ram_gb: 1.0,
        recommended_ram_gb: 2.0,
        speed_note: "Fastest",
        quality_note: "Basic accuracy, English only",
    },
    ModelDescriptor {
        id: "tiny",
        display_name: "Tiny (Multilingual)",
        whisper_ref: "tiny",
        file_name: "ggml-tiny.bin",
        approx_size_gb: 0.075,
        min_ram_gb: 1.0,
        recommended_ram_gb: 2.0,
        speed_note: "Fastest",
        quality_note: "Basic accuracy, all languages",
    },
    ModelDescriptor {
        id: "base-en",
        display_name: "Base (English)",
        whisper_ref: "base.en",
        file_name: "ggml-base.en.bin",
        approx_size_gb: 0.142,
        min_ram_gb: 2.0,
        recommended_ram_gb: 4.0,
        speed_note: "Very fast",
        quality_note: "Good balance, English only",
    },
    ModelDescriptor {
        id: "base",
        display_name: "Base (Multilingual)",
        whisper_ref: "base",
        file_name: "ggml-base.bin",
        approx_size_gb: 0.142,
        min_ram_gb: 2.0,
        recommended_ram_gb: 4.0,
        speed_note: "Very fast",
        quality_note: "Good balance, all languages",
    },
    ModelDescriptor {
        id: "small-en",
        display_name: "Small (English)",
        whisper_ref: "small.en",
        file_name: "ggml-small.en.bin",
        approx_size_gb: 0.466,
        min_ram_gb: 4.0,
        recommended_ram_gb: 6.0,
        speed_note: "Fast",
        quality_note: "Better accuracy, English only",
    },
    ModelDescriptor {
        id: "small",
        display_name: "Small (Multilingual)",
        whisper_ref: "small",
        file_name: "ggml-small.bin",
        approx_size_gb: 0.466,
        min_ram_gb: 4.0,
        recommended_ram_gb: 6.0,
        speed_note: "Fast",
        quality_note: "Better accuracy, all languages",
    },
    ModelDescriptor {
        id: "medium-en",
        display_name: "Medium (English)",
        whisper_ref: "medium.en",
        file_name: "ggml-medium.en.bin",
        approx_size_gb: 1.5,
        min_ram_gb: 6.0,
        recommended_ram_gb: 8.0,
        speed_note: "Moderate",
        quality_note: "High accuracy, English only",
    },
    ModelDescriptor {
        id: "medium",
        display_name: "Medium (Multilingual)",
        whisper_ref: "medium",
        file_name: "ggml-medium.bin",
        approx_size_gb: 1.5,
        min_ram_gb: 6.0,
        recommended_ram_gb: 8.0,
        speed_note: "Moderate",
        quality_note: "High accuracy, all languages",
    },
    ModelDescriptor {
        id: "large-v1",
        display_name: "Large v1",
        whisper_ref: "large-v1",
        file_name: "ggml-large-v1.bin",
        approx_size_gb: 3.1,
        min_ram_gb: 18.0,
        recommended_ram_gb: 24.0,
        speed_note: "Slow",
        quality_note: "Best accuracy (legacy), all languages",
    },
    ModelDescriptor {
        id: "large-v2",
        display_name: "Large v2",
        whisper_ref: "large-v2",
        file_name: "ggml-large-v2.bin",
        approx_size_gb: 3.1,
        min_ram_gb: 18.0,
        recommended_ram_gb: 24.0,
        speed_note: "Slow",
        quality_note: "Best accuracy, all languages",
    },
    ModelDescriptor {
        id: "large-v3",
        display_name: "Large v3",
        whisper_ref: "large-v3",
        file_name: "ggml-large-v3.bin",
        approx_size_gb: 3.1,
        min_ram_gb: 18.0,
        recommended_ram_gb: 24.0,
        speed_note: "Slow",
        quality_note: "Best accuracy, all languages",
    },
    ModelDescriptor {
        id: "turbo",
        display_name: "Turbo",
        whisper_ref: "large-v3-turbo",
        file_name: "ggml-large-v3-turbo.bin",
        approx_size_gb: 1.6,
        min_ram_gb: 4.0,
        recommended_ram_gb: 6.0,
        speed_note: "Fast + accurate",
        quality_note: "Near-large accuracy at a fraction of the cost",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRuntimeState {
    pub descriptor: ModelDescriptor,
    pub installed: bool,
    pub likely_runnable: bool,
    pub recommended: bool,
}

pub struct ModelCatalog;

impl ModelCatalog {
    pub fn list() -> &'static [ModelDescriptor] {
        CATALOG
    }

    pub fn find(id: &str) -> Option<&'static ModelDescriptor> {
        CATALOG.iter().find(|m| m.id == id)
    }

    pub fn file_path(models_dir: &Path, descriptor: &ModelDescriptor) -> PathBuf {
        models_dir.join(descriptor.file_name)
    }

    pub fn download_url(descriptor: &ModelDescriptor) -> String {
        MODEL_SOURCE_TEMPLATE.replace("{file_name}", descriptor.file_name)
    }

    /// Annotate every catalog entry against a device profile and the current
    /// on-disk state, picking at most one `recommended` entry.
    pub fn evaluate(
        profile: &DeviceProfile,
        models_dir: &Path,
        selected_id: Option<&str>,
    ) -> Vec<ModelRuntimeState> {
        let _ = selected_id; // selection does not influence recommendation ranking
        let mut states: Vec<ModelRuntimeState> = CATALOG
            .iter()
            .map(|descriptor| {
                let installed = Self::file_path(models_dir, descriptor).exists();
                let likely_runnable = profile.total_memory_gb >= descriptor.min_ram_gb;
                ModelRuntimeState {
                    descriptor: descriptor.clone(),
                    installed,
                    likely_runnable,
                    recommended: false,
                }
            })
            .collect();

        if let Some(best_index) = Self::best_runnable_index(&states, profile) {
            states[best_index].recommended = true;
        }
        states
    }

    /// Recommendation ranking: among `likely_runnable` entries, pick
    /// the entry with, in order: (1) device meets the comfort floor, (2)
    /// highest comfort floor, (3) largest size, (4) catalog order.
    fn best_runnable_index(states: &[ModelRuntimeState], profile: &DeviceProfile) -> Option<usize> {
        states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.likely_runnable)
            .max_by(|(ia, a), (ib, b)| {
                let fit_a = profile.total_memory_gb >= a.descriptor.recommended_ram_gb;
                let fit_b = profile.total_memory_gb >= b.descriptor.recommended_ram_gb;
                fit_a
                    .cmp(&fit_b)
                    .then(
                        a.descriptor
                            .recommended_ram_gb
                            .partial_cmp(&b.descriptor.recommended_ram_gb)
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
                    .then(
                        a.descriptor
                            .approx_size_gb
                            .partial_cmp(&b.descriptor.approx_size_gb)
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
                    // Reverse catalog-order tiebreak: earlier entries should win ties, so
                    // among otherwise-equal candidates the one with the *smaller* index wins.
                    .then(ib.cmp(ia))
            })
            .map(|(i, _)| i)
    }

    /// Rank installed models best-first, for delete auto-failover.
    pub fn best_installed(states: &[ModelRuntimeState], profile: &DeviceProfile) -> Option<&ModelRuntimeState> {
        states
            .iter()
            .filter(|s| s.installed)
            .max_by(|a, b| {
                let fit_a = profile.total_memory_gb >= a.descriptor.recommended_ram_gb
                    && a.likely_runnable;
                let fit_b = profile.total_memory_gb >= b.descriptor.recommended_ram_gb
                    && b.likely_runnable;
                fit_a
                    .cmp(&fit_b)
                    .then(
                        a.descriptor
                            .recommended_ram_gb
                            .partial_cmp(&b.descriptor.recommended_ram_gb)
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
                    .then(
                        a.descriptor
                            .approx_size_gb
                            .partial_cmp(&b.descriptor.approx_size_gb)
                            .unwrap_or(std::cmp::Ordering::Equal),
                    )
            })
    }
}

/// Bounded retries for a transient I/O or network interruption mid-download
/// before surfacing `DownloadFailed`.
const MAX_DOWNLOAD_RETRIES: u32 = 3;

fn download_client() -> EngineResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(std::time::Duration::from_secs(30))
        .read_timeout(std::time::Duration::from_secs(300))
        .build()
        .map_err(|e| EngineError::DownloadFailed {
            status: "client".into(),
            detail: e.to_string(),
        })
}

/// Download a model's binary to the models directory. Runs on a dedicated
/// worker; progress is not reported mid-flight in this core (boundary
/// concern). Resumes a `.part` file left over from an interrupted attempt
/// via an HTTP `Range` request and retries a bounded number of times on
/// transient I/O/network errors before giving up.
pub async fn download_model(models_dir: &Path, descriptor: &ModelDescriptor) -> EngineResult<PathBuf> {
    std::fs::create_dir_all(models_dir)
        .map_err(|e| EngineError::DownloadFailed {
            status: "io".into(),
            detail: format!("failed to create models dir: {e}"),
        })?;

    let url = ModelCatalog::download_url(descriptor);
    let dest = ModelCatalog::file_path(models_dir, descriptor);
    let tmp_dest = dest.with_extension("part");
    let client = download_client()?;

    tracing::info!("downloading model {} from {}", descriptor.id, url);

    let mut downloaded: u64 = match tokio::fs::metadata(&tmp_dest).await {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    };

    let mut attempt = 0u32;
    loop {
        match download_attempt(&client, &url, &tmp_dest, &mut downloaded).await {
            Ok(()) => break,
            Err(detail) => {
                attempt += 1;
                if attempt > MAX_DOWNLOAD_RETRIES {
                    let _ = tokio::fs::remove_file(&tmp_dest).await;
                    return Err(EngineError::DownloadFailed {
                        status: "network".into(),
                        detail: format!("gave up after {attempt} attempts: {detail}"),
                    });
                }
                tracing::warn!(
                    "model download interrupted (attempt {attempt}/{MAX_DOWNLOAD_RETRIES}): {detail}, resuming from {downloaded} bytes"
                );
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            }
        }
    }

    tokio::fs::rename(&tmp_dest, &dest)
        .await
        .map_err(|e| EngineError::DownloadFailed {
            status: "io".into(),
            detail: format!("failed to finalize model file: {e}"),
        })?;

    Ok(dest)
}

/// One streamed GET (plain or range-resumed), verifying the final byte
/// count against `Content-Length`/`Content-Range` when the server reports
/// one. Returns `Err(detail)` on any transient failure; the caller decides
/// whether to retry.
async fn download_attempt(
    client: &reqwest::Client,
    url: &str,
    tmp_dest: &Path,
    downloaded: &mut u64,
) -> Result<(), String> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let mut request = client.get(url);
    if *downloaded > 0 {
        request = request.header(reqwest::header::RANGE, format!("bytes={}-", downloaded));
    }

    let response = request.send().await.map_err(|e| e.to_string())?;
    let status = response.status();

    if status == reqwest::StatusCode::RANGE_NOT_SATISFIABLE {
        // Already fully downloaded from a prior attempt.
        return Ok(());
    }
    if !status.is_success() && status != reqwest::StatusCode::PARTIAL_CONTENT {
        return Err(format!("unexpected status {status}"));
    }

    let resumed = status == reqwest::StatusCode::PARTIAL_CONTENT;
    if !resumed && *downloaded > 0 {
        // Server does not honor Range; start over.
        *downloaded = 0;
    }

    let total_size = if resumed {
        response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit('/').next())
            .and_then(|s| s.parse::<u64>().ok())
    } else {
        response.content_length()
    };

    let mut file = if resumed {
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(tmp_dest)
            .await
            .map_err(|e| e.to_string())?
    } else {
        tokio::fs::File::create(tmp_dest).await.map_err(|e| e.to_string())?
    };

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        *downloaded += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| e.to_string())?;

    if let Some(total) = total_size {
        if *downloaded != total {
            return Err(format!("incomplete: got {downloaded} bytes, expected {total}"));
        }
    }

    Ok(())
}

/// Delete an installed model and, if it was the current selection, fail
/// over to the next best-ranked installed model.
pub fn delete_model(
    models_dir: &Path,
    settings_store: &SettingsStore,
    profile: &DeviceProfile,
    model_id: &str,
) -> EngineResult<Settings> {
    let descriptor = ModelCatalog::find(model_id)
        .ok_or_else(|| EngineError::UnknownModel(model_id.to_string()))?;
    let path = ModelCatalog::file_path(models_dir, descriptor);
    if path.exists() {
        std::fs::remove_file(&path)
            .map_err(|e| EngineError::Other(format!("failed to delete model file: {e}")))?;
    }

    let mut settings = settings_store.load_or_recover()?;
    if settings.selected_model_id.as_deref() == Some(model_id) {
        let states = ModelCatalog::evaluate(profile, models_dir, None);
        match ModelCatalog::best_installed(&states, profile) {
            Some(next) => {
                settings.selected_model_id = Some(next.descriptor.id.to_string());
                settings.selected_model_path =
                    Some(ModelCatalog::file_path(models_dir, &next.descriptor));
            }
            None => {
                settings.selected_model_id = None;
                settings.selected_model_path = None;
            }
        }
        settings_store.save(&settings)?;
    }
    Ok(settings)
}

/// Install (download + persist selection) a model by id.
pub async fn install_model(
    models_dir: &Path,
    settings_store: &SettingsStore,
    model_id: &str,
) -> EngineResult<Settings> {
    let descriptor = ModelCatalog::find(model_id)
        .ok_or_else(|| EngineError::UnknownModel(model_id.to_string()))?;
    let path = download_model(models_dir, descriptor).await?;

    let mut settings = settings_store.load_or_recover()?;
    settings.selected_model_id = Some(descriptor.id.to_string());
    settings.selected_model_path = Some(path);
    settings_store.save(&settings)?;
    Ok(settings)
}
