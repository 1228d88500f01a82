use crate::adapters::{
    CsvZipDirectory, HttpServiceAreaStore, HttpZipDirectory, StaticServiceAreaStore,
};
use crate::core::colonia_key;
use crate::domain::model::{ColoniaKey, Coordinate, ServiceArea, ZipCode, ZipCodeRecord};
use crate::domain::ports::{ServiceAreaStore, ZipCodeDirectory};
use crate::utils::error::{EligibilityError, Result};
use crate::utils::validation::{self, Validate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub directory: DirectoryConfig,
    pub service_areas: Option<ServiceAreaSourceConfig>,
    #[serde(default)]
    pub vendors: HashMap<String, ServiceArea>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DirectoryConfig {
    Csv {
        path: String,
    },
    Http {
        endpoint: String,
        table: Option<String>,
        api_key: Option<String>,
        timeout_seconds: Option<u64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServiceAreaSourceConfig {
    Static,
    Http {
        endpoint: String,
        table: Option<String>,
        api_key: Option<String>,
        timeout_seconds: Option<u64>,
    },
}

impl DeliveryConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EligibilityError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${SUPABASE_KEY})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EligibilityError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        match &self.directory {
            DirectoryConfig::Csv { path } => validation::validate_path("directory.path", path)?,
            DirectoryConfig::Http {
                endpoint,
                timeout_seconds,
                ..
            } => {
                validation::validate_url("directory.endpoint", endpoint)?;
                if let Some(timeout) = timeout_seconds {
                    validation::validate_positive_number("directory.timeout_seconds", *timeout, 1)?;
                }
            }
        }

        if let Some(ServiceAreaSourceConfig::Http {
            endpoint,
            timeout_seconds,
            ..
        }) = &self.service_areas
        {
            validation::validate_url("service_areas.endpoint", endpoint)?;
            if let Some(timeout) = timeout_seconds {
                validation::validate_positive_number("service_areas.timeout_seconds", *timeout, 1)?;
            }
        }

        for (vendor_id, area) in &self.vendors {
            validation::validate_non_empty_string("vendors", vendor_id)?;
            self.validate_service_area(vendor_id, area)?;
        }

        Ok(())
    }

    fn validate_service_area(&self, vendor_id: &str, area: &ServiceArea) -> Result<()> {
        match area {
            ServiceArea::Radius { center, radius_km } => {
                let field = format!("vendors.{}", vendor_id);
                validation::validate_range(
                    &format!("{}.center.latitude", field),
                    center.latitude,
                    -90.0,
                    90.0,
                )?;
                validation::validate_range(
                    &format!("{}.center.longitude", field),
                    center.longitude,
                    -180.0,
                    180.0,
                )?;
                if !(radius_km.is_finite() && *radius_km > 0.0) {
                    return Err(EligibilityError::InvalidConfigValueError {
                        field: format!("{}.radius_km", field),
                        value: radius_km.to_string(),
                        reason: "Radius must be a positive number of kilometres".to_string(),
                    });
                }
            }
            ServiceArea::Allowlist { colonia_keys } => {
                // 個別壞項目只記錄警告；全部無效才算配置錯誤
                if colonia_key::decode_all(colonia_keys).keys.is_empty() {
                    return Err(EligibilityError::InvalidConfigValueError {
                        field: format!("vendors.{}.colonia_keys", vendor_id),
                        value: format!("{:?}", colonia_keys),
                        reason: "No valid '<colonia>-<zip>' entries".to_string(),
                    });
                }
            }
            ServiceArea::Unconfigured => {}
        }
        Ok(())
    }

    pub fn build_directory(&self) -> Result<Directory> {
        match &self.directory {
            DirectoryConfig::Csv { path } => Ok(Directory::Csv(CsvZipDirectory::from_path(path)?)),
            DirectoryConfig::Http {
                endpoint,
                table,
                api_key,
                timeout_seconds,
            } => Ok(Directory::Http(HttpZipDirectory::new(
                endpoint,
                table.as_deref().unwrap_or("zip_codes"),
                api_key.clone(),
                Duration::from_secs(timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)),
            ))),
        }
    }

    pub fn build_service_area_store(&self) -> Result<AreaStore> {
        match &self.service_areas {
            None | Some(ServiceAreaSourceConfig::Static) => Ok(AreaStore::Static(
                StaticServiceAreaStore::new(self.vendors.clone()),
            )),
            Some(ServiceAreaSourceConfig::Http {
                endpoint,
                table,
                api_key,
                timeout_seconds,
            }) => Ok(AreaStore::Http(HttpServiceAreaStore::new(
                endpoint,
                table.as_deref().unwrap_or("vendors"),
                api_key.clone(),
                Duration::from_secs(timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)),
            ))),
        }
    }
}

impl Validate for DeliveryConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// Directory adapter selected by configuration.
pub enum Directory {
    Csv(CsvZipDirectory),
    Http(HttpZipDirectory),
}

#[async_trait]
impl ZipCodeDirectory for Directory {
    async fn find_by_zip(&self, zip: &ZipCode) -> Result<Vec<ZipCodeRecord>> {
        match self {
            Self::Csv(d) => d.find_by_zip(zip).await,
            Self::Http(d) => d.find_by_zip(zip).await,
        }
    }

    async fn find_by_colonia_key(&self, key: &ColoniaKey) -> Result<Option<ZipCodeRecord>> {
        match self {
            Self::Csv(d) => d.find_by_colonia_key(key).await,
            Self::Http(d) => d.find_by_colonia_key(key).await,
        }
    }

    async fn locate(&self, zip: &ZipCode) -> Result<Option<Coordinate>> {
        match self {
            Self::Csv(d) => d.locate(zip).await,
            Self::Http(d) => d.locate(zip).await,
        }
    }
}

/// Service area source selected by configuration.
pub enum AreaStore {
    Static(StaticServiceAreaStore),
    Http(HttpServiceAreaStore),
}

#[async_trait]
impl ServiceAreaStore for AreaStore {
    async fn service_area(&self, vendor_id: &str) -> Result<Option<ServiceArea>> {
        match self {
            Self::Static(s) => s.service_area(vendor_id).await,
            Self::Http(s) => s.service_area(vendor_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[directory]
type = "csv"
path = "data/zip_codes.csv"

[vendors.tacos-coyoacan]
mode = "radius"
center = { latitude = 19.3327, longitude = -99.1882 }
radius_km = 10.0

[vendors.panaderia-polanco]
mode = "allowlist"
colonia_keys = ["polanco-11510", "granada-11520"]

[vendors.nuevo]
mode = "unconfigured"
"#;

    #[test]
    fn test_parse_basic_toml_config() {
        let config = DeliveryConfig::from_toml_str(BASIC).unwrap();

        assert!(matches!(config.directory, DirectoryConfig::Csv { .. }));
        assert!(config.service_areas.is_none());
        assert_eq!(config.vendors.len(), 3);
        assert_eq!(config.vendors["tacos-coyoacan"].mode_name(), "radius");
        assert_eq!(config.vendors["panaderia-polanco"].mode_name(), "allowlist");
        assert_eq!(config.vendors["nuevo"], ServiceArea::Unconfigured);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TEST_DELIVERY_DIRECTORY_URL", "https://test.supabase.co/rest/v1");

        let toml_content = r#"
[directory]
type = "http"
endpoint = "${TEST_DELIVERY_DIRECTORY_URL}"
api_key = "${TEST_DELIVERY_UNSET_KEY}"
"#;

        let config = DeliveryConfig::from_toml_str(toml_content).unwrap();
        match &config.directory {
            DirectoryConfig::Http {
                endpoint, api_key, ..
            } => {
                assert_eq!(endpoint, "https://test.supabase.co/rest/v1");
                assert_eq!(api_key.as_deref(), Some("${TEST_DELIVERY_UNSET_KEY}"));
            }
            other => panic!("unexpected directory config: {:?}", other),
        }

        std::env::remove_var("TEST_DELIVERY_DIRECTORY_URL");
    }

    #[test]
    fn test_config_validation() {
        let bad_url = r#"
[directory]
type = "http"
endpoint = "invalid-url"
"#;
        let config = DeliveryConfig::from_toml_str(bad_url).unwrap();
        assert!(config.validate().is_err());

        let bad_radius = r#"
[directory]
type = "csv"
path = "cp.csv"

[vendors.v1]
mode = "radius"
center = { latitude = 19.3327, longitude = -99.1882 }
radius_km = 0.0
"#;
        let config = DeliveryConfig::from_toml_str(bad_radius).unwrap();
        assert!(matches!(
            config.validate(),
            Err(EligibilityError::InvalidConfigValueError { .. })
        ));

        let bad_keys = r#"
[directory]
type = "csv"
path = "cp.csv"

[vendors.v1]
mode = "allowlist"
colonia_keys = ["polanco", "roma"]
"#;
        let config = DeliveryConfig::from_toml_str(bad_keys).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let content = r#"
[directory]
type = "csv"
path = "cp.csv"

[vendors.v1]
mode = "polygon"
"#;
        let err = DeliveryConfig::from_toml_str(content).unwrap_err();
        assert!(matches!(err, EligibilityError::ConfigValidationError { .. }));
    }

    #[tokio::test]
    async fn test_build_from_file() {
        let mut csv_file = NamedTempFile::new().unwrap();
        csv_file
            .write_all(b"zip_code,colonia,municipality,state\n11510,Polanco,Miguel Hidalgo,CDMX\n")
            .unwrap();

        let mut config_file = NamedTempFile::new().unwrap();
        let content = format!(
            "[directory]\ntype = \"csv\"\npath = \"{}\"\n\n\
             [vendors.v1]\nmode = \"allowlist\"\ncolonia_keys = [\"polanco-11510\"]\n",
            csv_file.path().display().to_string().replace('\\', "/")
        );
        config_file.write_all(content.as_bytes()).unwrap();

        let config = DeliveryConfig::from_file(config_file.path()).unwrap();
        let directory = config.build_directory().unwrap();
        let store = config.build_service_area_store().unwrap();

        let zip = ZipCode::parse("11510").unwrap();
        assert_eq!(directory.find_by_zip(&zip).await.unwrap().len(), 1);
        assert!(store.service_area("v1").await.unwrap().is_some());
    }
}
