use bytes::Bytes;
use reqwest::{Method, multipart};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiError;
use crate::api::http::{self, HttpClient};
use crate::models::{FileDto, MedicalHistoryRequest, MedicalHistoryResponse, UserDto};

/// Stateless typed operations over the medical-history endpoints. Every
/// view re-fetches through these; nothing is cached client-side.
#[derive(Debug, Clone)]
pub struct MedicalHistoryClient {
    http: Arc<HttpClient>,
}

impl MedicalHistoryClient {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    // ---- provider ----

    pub async fn provider_histories(&self) -> Result<Vec<MedicalHistoryResponse>, ApiError> {
        let builder = self.http.request(Method::GET, "/api/provider/medical-history");
        self.http.expect_json(builder).await
    }

    pub async fn provider_history(
        &self,
        patient_id: i64,
    ) -> Result<MedicalHistoryResponse, ApiError> {
        let builder = self
            .http
            .request(Method::GET, &format!("/api/provider/medical-history/{patient_id}"));
        self.http.expect_json(builder).await
    }

    pub async fn create(
        &self,
        request: &MedicalHistoryRequest,
    ) -> Result<MedicalHistoryResponse, ApiError> {
        info!("creating medical history for patient {}", request.patient_id);
        let builder = self
            .http
            .request(Method::POST, "/api/provider/medical-history")
            .json(request);
        self.http.expect_json(builder).await
    }

    pub async fn update(
        &self,
        patient_id: i64,
        request: &MedicalHistoryRequest,
    ) -> Result<MedicalHistoryResponse, ApiError> {
        info!("updating medical history for patient {patient_id}");
        let builder = self
            .http
            .request(Method::PUT, &format!("/api/provider/medical-history/{patient_id}"))
            .json(request);
        self.http.expect_json(builder).await
    }

    pub async fn delete(&self, patient_id: i64) -> Result<(), ApiError> {
        info!("deleting medical history for patient {patient_id}");
        let builder = self
            .http
            .request(Method::DELETE, &format!("/api/provider/medical-history/{patient_id}"));
        self.http.expect_empty(builder).await
    }

    pub async fn patients(&self) -> Result<Vec<UserDto>, ApiError> {
        let builder = self
            .http
            .request(Method::GET, "/api/provider/medical-history/patients");
        self.http.expect_json(builder).await
    }

    pub async fn caregivers(&self) -> Result<Vec<UserDto>, ApiError> {
        let builder = self
            .http
            .request(Method::GET, "/api/provider/medical-history/caregivers");
        self.http.expect_json(builder).await
    }

    pub async fn providers(&self) -> Result<Vec<UserDto>, ApiError> {
        let builder = self
            .http
            .request(Method::GET, "/api/provider/medical-history/providers");
        self.http.expect_json(builder).await
    }

    /// Fetch the three pick-lists the record form needs, concurrently.
    pub async fn picklists(
        &self,
    ) -> Result<(Vec<UserDto>, Vec<UserDto>, Vec<UserDto>), ApiError> {
        futures::future::try_join3(self.patients(), self.caregivers(), self.providers()).await
    }

    pub async fn delete_patient_file(&self, patient_id: i64, file_id: i64) -> Result<(), ApiError> {
        info!("deleting file {file_id} of patient {patient_id}");
        let builder = self.http.request(
            Method::DELETE,
            &format!("/api/provider/medical-history/{patient_id}/files/{file_id}"),
        );
        self.http.expect_empty(builder).await
    }

    // ---- patient self-service ----

    pub async fn my_history(&self) -> Result<MedicalHistoryResponse, ApiError> {
        let builder = self
            .http
            .request(Method::GET, "/api/patient/medical-history/me");
        self.http.expect_json(builder).await
    }

    pub async fn my_files(&self) -> Result<Vec<FileDto>, ApiError> {
        let builder = self
            .http
            .request(Method::GET, "/api/patient/medical-history/me/files");
        self.http.expect_json(builder).await
    }

    /// Upload a file into the caller's own record, as multipart field
    /// `file`.
    pub async fn upload_my_file(&self, path: &Path) -> Result<FileDto, ApiError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::BadRequest("invalid file name".to_string()))?
            .to_string();
        let data = tokio::fs::read(path).await?;
        info!("uploading {} ({} bytes)", file_name, data.len());

        let part = multipart::Part::bytes(data)
            .file_name(file_name.clone())
            .mime_str(guess_mime(&file_name).as_ref())
            .map_err(http::classify_transport)?;
        let form = multipart::Form::new().part("file", part);

        let builder = self
            .http
            .request(Method::POST, "/api/patient/medical-history/me/files")
            .multipart(form);
        self.http.expect_json(builder).await
    }

    pub async fn delete_my_file(&self, file_id: i64) -> Result<(), ApiError> {
        info!("deleting own file {file_id}");
        let builder = self.http.request(
            Method::DELETE,
            &format!("/api/patient/medical-history/me/files/{file_id}"),
        );
        self.http.expect_empty(builder).await
    }

    // ---- caregiver ----

    pub async fn assigned_patients(&self) -> Result<Vec<UserDto>, ApiError> {
        let builder = self
            .http
            .request(Method::GET, "/api/caregiver/medical-history/patients");
        self.http.expect_json(builder).await
    }

    pub async fn patient_history_for_caregiver(
        &self,
        patient_id: i64,
    ) -> Result<MedicalHistoryResponse, ApiError> {
        let builder = self
            .http
            .request(Method::GET, &format!("/api/caregiver/medical-history/{patient_id}"));
        self.http.expect_json(builder).await
    }

    // ---- files ----

    pub async fn download_file(&self, file_id: i64) -> Result<Bytes, ApiError> {
        let builder = self.http.request(Method::GET, &format!("/files/{file_id}"));
        self.http.expect_bytes(builder).await
    }

    /// Download into `dir`, writing through a temporary file that only
    /// lands under the final name once the body is fully written. No
    /// partial file is left behind on failure.
    pub async fn download_to(
        &self,
        file_id: i64,
        file_name: &str,
        dir: &Path,
    ) -> Result<PathBuf, ApiError> {
        let bytes = self.download_file(file_id).await?;

        // Strip any path the server-supplied name may carry.
        let safe_name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::BadRequest("invalid file name".to_string()))?;
        let target = dir.join(safe_name);

        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, &bytes)?;
        tmp.persist(&target).map_err(|e| ApiError::Io(e.error))?;

        info!("saved file {file_id} to {}", target.display());
        Ok(target)
    }
}

/// Best-effort content type from the file extension; the gateway falls
/// back to sniffing on its side.
fn guess_mime(file_name: &str) -> mime::Mime {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("pdf") => mime::APPLICATION_PDF,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("txt") => mime::TEXT_PLAIN,
        Some("json") => mime::APPLICATION_JSON,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}
