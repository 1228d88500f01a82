use crate::adapters::DirectoryRow;
use crate::core::colonia_key::normalize_colonia_name;
use crate::domain::model::{ColoniaKey, ZipCode, ZipCodeRecord};
use crate::domain::ports::ZipCodeDirectory;
use crate::utils::error::{EligibilityError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const REQUIRED_COLUMNS: [&str; 4] = ["zip_code", "colonia", "municipality", "state"];

/// In-memory directory loaded from a CSV export.
///
/// Expected headers: `zip_code,colonia,municipality,state` plus optional
/// `city`, `latitude`, `longitude`.
#[derive(Debug, Clone, Default)]
pub struct CsvZipDirectory {
    by_zip: HashMap<ZipCode, Vec<ZipCodeRecord>>,
}

impl CsvZipDirectory {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(EligibilityError::IoError)?;
        let directory = Self::from_reader(file)?;
        tracing::info!(
            "📁 Loaded {} zip codes ({} colonias) from {}",
            directory.by_zip.len(),
            directory.len(),
            path.as_ref().display()
        );
        Ok(directory)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = reader.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(EligibilityError::ConfigValidationError {
                    field: "directory.path".to_string(),
                    message: format!("CSV is missing the '{}' column", column),
                });
            }
        }

        let mut directory = Self::default();
        for (index, row) in reader.deserialize::<DirectoryRow>().enumerate() {
            match row {
                Ok(row) => {
                    if let Some(record) = row.into_record() {
                        directory.insert(record);
                    }
                }
                // 單一壞列不影響其他資料
                Err(e) => tracing::warn!("⚠️ Skipping CSV row {}: {}", index + 2, e),
            }
        }

        Ok(directory)
    }

    pub fn from_records(records: impl IntoIterator<Item = ZipCodeRecord>) -> Self {
        let mut directory = Self::default();
        for record in records {
            directory.insert(record);
        }
        directory
    }

    fn insert(&mut self, record: ZipCodeRecord) {
        let colonias = self.by_zip.entry(record.zip_code.clone()).or_default();
        let slug = normalize_colonia_name(&record.colonia);
        if !colonias
            .iter()
            .any(|r| normalize_colonia_name(&r.colonia) == slug)
        {
            colonias.push(record);
        }
    }

    /// Number of colonias.
    pub fn len(&self) -> usize {
        self.by_zip.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_zip.is_empty()
    }
}

#[async_trait]
impl ZipCodeDirectory for CsvZipDirectory {
    async fn find_by_zip(&self, zip: &ZipCode) -> Result<Vec<ZipCodeRecord>> {
        Ok(self.by_zip.get(zip).cloned().unwrap_or_default())
    }

    async fn find_by_colonia_key(&self, key: &ColoniaKey) -> Result<Option<ZipCodeRecord>> {
        Ok(self.by_zip.get(&key.zip_code).and_then(|colonias| {
            colonias
                .iter()
                .find(|r| normalize_colonia_name(&r.colonia) == key.colonia_name)
                .cloned()
        }))
    }
}
